use clap::{Args, Parser, Subcommand, ValueEnum};
use retrocam::config::{self, RenderConfig};
use retrocam::effects::Rng64;
use retrocam::imaging::{OutputFormat, Renderer, RustCodec};
use retrocam::{logging, output, process};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "retrocam")]
#[command(about = "Disposable-camera look for your photos")]
#[command(long_about = "\
Disposable-camera look for your photos

Every photo is center-cropped to 5:4 (landscape) or 4:5 (portrait), scaled
to 1200 px wide, run through a fixed chain of film-stock effects and
stamped with its capture time in the bottom-right corner:

  exposure/contrast → temperature/tint → saturation/vibrance →
  clarity/texture → vignette → grain → sepia → directional blur →
  timestamp

Settings are read from --config, or from ./retrocam.toml when present.
Run 'retrocam gen-config' to print a documented config file.")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./retrocam.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// Flags shared by commands that render.
#[derive(Args, Clone)]
struct RenderArgs {
    /// Seed for the grain; same seed, same output
    #[arg(long)]
    seed: Option<u64>,

    /// Stamp this time instead of the file's modification time
    /// (e.g. 2024-03-05T14:07)
    #[arg(long, value_parser = parse_captured_at)]
    captured_at: Option<chrono::NaiveDateTime>,

    /// Leave out the grain stage
    #[arg(long)]
    no_grain: bool,

    /// Leave out the timestamp
    #[arg(long)]
    no_timestamp: bool,

    /// Output format (overrides config)
    #[arg(long, value_enum)]
    format: Option<FormatArg>,
}

#[derive(Subcommand)]
enum Command {
    /// Render one photo
    Render {
        input: PathBuf,
        /// Output file (defaults to <input stem>-retro.<ext> next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        args: RenderArgs,
    },
    /// Render every photo in a directory
    Batch {
        source: PathBuf,
        /// Output directory
        #[arg(short, long, default_value = "retro")]
        output: PathBuf,
        #[command(flatten)]
        args: RenderArgs,
    },
    /// Print the effective stage order
    Stages,
    /// Print a stock retrocam.toml with all options documented
    GenConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Jpeg,
    Png,
    Webp,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Jpeg => OutputFormat::Jpeg,
            FormatArg::Png => OutputFormat::Png,
            FormatArg::Webp => OutputFormat::Webp,
        }
    }
}

fn parse_captured_at(text: &str) -> Result<chrono::NaiveDateTime, String> {
    process::parse_capture_time(text)
        .ok_or_else(|| format!("expected YYYY-MM-DDTHH:MM[:SS], got '{text}'"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(logging::level_for_verbosity(cli.verbose));

    match cli.command {
        Command::Render {
            input,
            output: output_file,
            args,
        } => {
            let renderer = build_renderer(cli.config.as_deref(), &args)?;
            let format = renderer.encode_params().format;
            let output_file = output_file.unwrap_or_else(|| {
                let dir = input.parent().unwrap_or(Path::new(""));
                process::output_path(dir, dir, &input, format)
            });
            let captured_at = args
                .captured_at
                .or_else(|| process::capture_time(&input))
                .unwrap_or_else(|| chrono::Local::now().naive_local());
            let mut rng = args.seed.map(Rng64::new).unwrap_or_else(Rng64::from_entropy);

            let photo = process::render_file(
                &renderer,
                &RustCodec::new(),
                &input,
                &output_file,
                &captured_at,
                &mut rng,
            )?;
            output::print_render_summary(&photo, &input, &output_file);
        }
        Command::Batch {
            source,
            output: output_dir,
            args,
        } => {
            let renderer = build_renderer(cli.config.as_deref(), &args)?;
            init_thread_pool(&renderer.config().processing);
            let options = process::BatchOptions {
                seed: args.seed,
                captured_at: args.captured_at,
            };
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_process_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = process::process(&renderer, &source, &output_dir, &options, Some(tx));
            printer.join().ok();
            let manifest = result?;
            output::print_batch_summary(&manifest);
            if manifest.failed > 0 {
                std::process::exit(1);
            }
        }
        Command::Stages => {
            let config = load_config(cli.config.as_deref())?;
            let renderer = Renderer::new(config)?;
            output::print_stages(renderer.pipeline());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Explicit `--config`, else `./retrocam.toml`, else stock defaults.
fn load_config(path: Option<&Path>) -> Result<RenderConfig, config::ConfigError> {
    match path {
        Some(p) => config::load_config(Some(p)),
        None => {
            let discovered = std::env::current_dir()
                .ok()
                .and_then(|cwd| config::discover_config(&cwd));
            config::load_config(discovered.as_deref())
        }
    }
}

fn build_renderer(
    config_path: Option<&Path>,
    args: &RenderArgs,
) -> Result<Renderer, config::ConfigError> {
    let mut config = load_config(config_path)?;
    if args.no_grain {
        config.effects.grain.enabled = false;
    }
    if args.no_timestamp {
        config.timestamp.enabled = false;
    }
    if let Some(format) = args.format {
        config.output.format = format.into();
    }
    Renderer::new(config)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Never more threads than cores; the config can only constrain down.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
