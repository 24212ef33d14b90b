//! Batch rendering of a directory of captures.
//!
//! Walks the source directory, renders every supported image through one
//! shared [`Renderer`], and writes the results next to a JSON manifest.
//!
//! ## Output Structure
//!
//! ```text
//! out/
//! ├── retrocam-manifest.json     # What was rendered, with geometry and degradations
//! ├── IMG_0001-retro.jpg
//! └── trip/
//!     └── IMG_0042-retro.jpg     # Subdirectories are mirrored
//! ```
//!
//! ## Parallel Processing
//!
//! Whole renders run in parallel using [rayon](https://docs.rs/rayon); a
//! single render's stages always run in order on one thread. Each photo gets
//! its own buffer and random source, so no state is shared between workers.
//! A photo that fails is recorded and the batch carries on.

use crate::effects::{Rng64, StageDegradation};
use crate::imaging::{
    CropGeometry, Dimensions, ImageCodec, OutputFormat, RenderError, RenderedPhoto, Renderer,
    RustCodec, is_supported_input,
};
use chrono::{DateTime, Local, NaiveDateTime};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Appended to the source stem to name the rendered file.
pub const OUTPUT_SUFFIX: &str = "-retro";
pub const MANIFEST_FILE: &str = "retrocam-manifest.json";

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Source not found: {0}")]
    SourceNotFound(PathBuf),
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("Rendering {path} failed: {source}")]
    Render {
        path: PathBuf,
        #[source]
        source: RenderError,
    },
}

/// Progress events emitted during batch processing.
///
/// Sent through an optional channel so the caller can display progress
/// as renders finish. Events arrive in completion order, not source order.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    Started {
        total: usize,
    },
    PhotoRendered {
        /// 1-based position in source order.
        index: usize,
        source: String,
        output: String,
        dimensions: Dimensions,
        degraded: Vec<StageDegradation>,
    },
    PhotoFailed {
        index: usize,
        source: String,
        error: String,
    },
}

/// Knobs that apply to every photo in a batch.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Base seed; photo `i` draws from `Rng64::derive(seed, i)`.
    /// `None` seeds each photo from entropy.
    pub seed: Option<u64>,
    /// Stamp every photo with this time instead of its file's mtime.
    pub captured_at: Option<NaiveDateTime>,
}

/// Per-photo outcome, without the encoded bytes.
#[derive(Debug, Clone, Serialize)]
pub struct RenderSummary {
    pub dimensions: Dimensions,
    pub geometry: CropGeometry,
    pub degraded: Vec<StageDegradation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl From<&RenderedPhoto> for RenderSummary {
    fn from(photo: &RenderedPhoto) -> Self {
        Self {
            dimensions: photo.dimensions,
            geometry: photo.geometry,
            degraded: photo.report.degraded.clone(),
            timestamp: photo.timestamp.as_ref().map(|t| t.text.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
    /// Path relative to the source directory.
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub captured_at: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render: Option<RenderSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Written to `retrocam-manifest.json` in the output directory.
#[derive(Debug, Clone, Serialize)]
pub struct BatchManifest {
    pub version: String,
    pub format: OutputFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub rendered: usize,
    pub failed: usize,
    pub photos: Vec<ManifestEntry>,
}

/// Every supported image under `dir`, sorted by path.
///
/// Anything under `exclude` (typically the output directory) is skipped so
/// re-running a batch never renders its own output.
pub fn find_sources(dir: &Path, exclude: Option<&Path>) -> Result<Vec<PathBuf>, ProcessError> {
    if !dir.exists() {
        return Err(ProcessError::SourceNotFound(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(ProcessError::NotADirectory(dir.to_path_buf()));
    }

    let mut sources = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || !is_supported_input(path) {
            continue;
        }
        if exclude.is_some_and(|ex| path.starts_with(ex)) {
            continue;
        }
        sources.push(path.to_path_buf());
    }
    Ok(sources)
}

/// `<output_dir>/<relative dir>/<stem>-retro.<ext>`
pub fn output_path(
    source_dir: &Path,
    output_dir: &Path,
    source: &Path,
    format: OutputFormat,
) -> PathBuf {
    let relative = source.strip_prefix(source_dir).unwrap_or(source);
    let stem = relative
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = format!("{stem}{OUTPUT_SUFFIX}.{}", format.extension());
    match relative.parent() {
        Some(parent) => output_dir.join(parent).join(name),
        None => output_dir.join(name),
    }
}

/// File modification time in local wall-clock time.
pub fn capture_time(path: &Path) -> Option<NaiveDateTime> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Local>::from(modified).naive_local())
}

/// Parse a user-supplied capture time, e.g. `2024-03-05T14:07` or
/// `2024-03-05 14:07:33`.
pub fn parse_capture_time(text: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    let text = text.trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}

/// Read, render and write one photo.
pub fn render_file(
    renderer: &Renderer,
    codec: &impl ImageCodec,
    source: &Path,
    output: &Path,
    captured_at: &NaiveDateTime,
    rng: &mut Rng64,
) -> Result<RenderedPhoto, ProcessError> {
    if !source.is_file() {
        return Err(ProcessError::SourceNotFound(source.to_path_buf()));
    }
    let bytes = fs::read(source)?;
    let photo = renderer
        .render_bytes(codec, &bytes, captured_at, rng)
        .map_err(|e| ProcessError::Render {
            path: source.to_path_buf(),
            source: e,
        })?;
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, &photo.bytes)?;
    Ok(photo)
}

/// Render a directory with the built-in [`RustCodec`].
pub fn process(
    renderer: &Renderer,
    source_dir: &Path,
    output_dir: &Path,
    options: &BatchOptions,
    events: Option<Sender<ProcessEvent>>,
) -> Result<BatchManifest, ProcessError> {
    process_dir(
        renderer,
        &RustCodec::new(),
        source_dir,
        output_dir,
        options,
        events,
    )
}

/// Render a directory using a specific codec (allows testing with mock).
pub fn process_dir(
    renderer: &Renderer,
    codec: &impl ImageCodec,
    source_dir: &Path,
    output_dir: &Path,
    options: &BatchOptions,
    events: Option<Sender<ProcessEvent>>,
) -> Result<BatchManifest, ProcessError> {
    let sources = find_sources(source_dir, Some(output_dir))?;
    fs::create_dir_all(output_dir)?;
    let format = renderer.encode_params().format;
    info!(count = sources.len(), dir = %source_dir.display(), "batch started");
    if let Some(tx) = &events {
        tx.send(ProcessEvent::Started {
            total: sources.len(),
        })
        .ok();
    }

    let photos: Vec<ManifestEntry> = sources
        .par_iter()
        .enumerate()
        .map(|(i, source)| {
            let index = i + 1;
            let relative = source
                .strip_prefix(source_dir)
                .unwrap_or(source)
                .to_string_lossy()
                .into_owned();
            let output = output_path(source_dir, output_dir, source, format);
            let captured_at = options
                .captured_at
                .or_else(|| capture_time(source))
                .unwrap_or_else(|| Local::now().naive_local());
            let mut rng = match options.seed {
                Some(seed) => Rng64::derive(seed, i as u64),
                None => Rng64::from_entropy(),
            };

            match render_file(renderer, codec, source, &output, &captured_at, &mut rng) {
                Ok(photo) => {
                    let summary = RenderSummary::from(&photo);
                    let output_rel = output
                        .strip_prefix(output_dir)
                        .unwrap_or(&output)
                        .to_string_lossy()
                        .into_owned();
                    if let Some(tx) = &events {
                        tx.send(ProcessEvent::PhotoRendered {
                            index,
                            source: relative.clone(),
                            output: output_rel.clone(),
                            dimensions: summary.dimensions,
                            degraded: summary.degraded.clone(),
                        })
                        .ok();
                    }
                    ManifestEntry {
                        source: relative,
                        output: Some(output_rel),
                        captured_at,
                        render: Some(summary),
                        error: None,
                    }
                }
                Err(e) => {
                    warn!(source = %relative, error = %e, "photo failed");
                    if let Some(tx) = &events {
                        tx.send(ProcessEvent::PhotoFailed {
                            index,
                            source: relative.clone(),
                            error: e.to_string(),
                        })
                        .ok();
                    }
                    ManifestEntry {
                        source: relative,
                        output: None,
                        captured_at,
                        render: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        })
        .collect();

    let failed = photos.iter().filter(|p| p.error.is_some()).count();
    let manifest = BatchManifest {
        version: env!("CARGO_PKG_VERSION").to_string(),
        format,
        seed: options.seed,
        rendered: photos.len() - failed,
        failed,
        photos,
    };
    let json = serde_json::to_string_pretty(&manifest)?;
    fs::write(output_dir.join(MANIFEST_FILE), json)?;
    info!(
        rendered = manifest.rendered,
        failed = manifest.failed,
        "batch finished"
    );
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;
    use crate::imaging::backend::tests::{MockCodec, RecordedOp};
    use crate::test_helpers::{encode_test_jpeg, fixed_instant, uniform_buffer};
    use tempfile::TempDir;

    fn small_renderer() -> Renderer {
        let mut config = RenderConfig::default();
        config.output.width = 100;
        config.effects.grain.enabled = false;
        Renderer::new(config).unwrap()
    }

    fn touch(path: &Path, contents: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    // =========================================================================
    // Discovery and naming
    // =========================================================================

    #[test]
    fn find_sources_filters_and_sorts() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("b.jpg"), b"x");
        touch(&tmp.path().join("a.PNG"), b"x");
        touch(&tmp.path().join("notes.txt"), b"x");
        touch(&tmp.path().join("trip/c.jpeg"), b"x");

        let found = find_sources(tmp.path(), None).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(tmp.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.PNG"),
                PathBuf::from("b.jpg"),
                PathBuf::from("trip/c.jpeg"),
            ]
        );
    }

    #[test]
    fn find_sources_skips_excluded_dir() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("a.jpg"), b"x");
        touch(&tmp.path().join("out/a-retro.jpg"), b"x");
        let found = find_sources(tmp.path(), Some(&tmp.path().join("out"))).unwrap();
        assert_eq!(found, vec![tmp.path().join("a.jpg")]);
    }

    #[test]
    fn find_sources_missing_dir() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            find_sources(&tmp.path().join("nope"), None),
            Err(ProcessError::SourceNotFound(_))
        ));
    }

    #[test]
    fn find_sources_on_a_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.jpg");
        touch(&file, b"x");
        assert!(matches!(
            find_sources(&file, None),
            Err(ProcessError::NotADirectory(_))
        ));
    }

    #[test]
    fn output_path_mirrors_subdirs() {
        let out = output_path(
            Path::new("/in"),
            Path::new("/out"),
            Path::new("/in/trip/IMG_1.HEIC.jpg"),
            OutputFormat::Jpeg,
        );
        assert_eq!(out, PathBuf::from("/out/trip/IMG_1.HEIC-retro.jpg"));

        let out = output_path(
            Path::new("/in"),
            Path::new("/out"),
            Path::new("/in/a.png"),
            OutputFormat::Webp,
        );
        assert_eq!(out, PathBuf::from("/out/a-retro.webp"));
    }

    #[test]
    fn capture_time_reads_mtime() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.jpg");
        touch(&file, b"x");
        assert!(capture_time(&file).is_some());
        assert!(capture_time(&tmp.path().join("missing.jpg")).is_none());
    }

    #[test]
    fn parse_capture_time_accepts_common_forms() {
        let expected = fixed_instant();
        assert_eq!(parse_capture_time("2024-03-05T14:07:33"), Some(expected));
        assert_eq!(parse_capture_time(" 2024-03-05 14:07:33 "), Some(expected));
        assert_eq!(
            parse_capture_time("2024-03-05 14:07").map(|t| t.to_string()),
            Some("2024-03-05 14:07:00".to_string())
        );
        assert_eq!(parse_capture_time("05/03/24 14:07"), None);
    }

    // =========================================================================
    // Batch with mock codec
    // =========================================================================

    #[test]
    fn process_with_mock_renders_every_source() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let out = tmp.path().join("out");
        touch(&src.join("a.jpg"), b"aaaa");
        touch(&src.join("b.jpg"), b"bbbb");

        let codec = MockCodec::with_buffers(vec![
            uniform_buffer(50, 40, 128),
            uniform_buffer(50, 40, 128),
        ]);
        let options = BatchOptions {
            seed: Some(7),
            captured_at: Some(fixed_instant()),
        };
        let manifest =
            process_dir(&small_renderer(), &codec, &src, &out, &options, None).unwrap();

        assert_eq!(manifest.rendered, 2);
        assert_eq!(manifest.failed, 0);
        assert_eq!(manifest.seed, Some(7));
        assert!(out.join("a-retro.jpg").exists());
        assert!(out.join("b-retro.jpg").exists());
        assert!(out.join(MANIFEST_FILE).exists());

        let ops = codec.get_operations();
        let encodes = ops
            .iter()
            .filter(|op| matches!(op, RecordedOp::Encode { width: 100, height: 80, .. }))
            .count();
        assert_eq!(encodes, 2);
    }

    #[test]
    fn failed_photo_does_not_abort_batch() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let out = tmp.path().join("out");
        touch(&src.join("a.jpg"), b"aaaa");
        touch(&src.join("b.jpg"), b"bbbb");

        // Only one decodable buffer: the other photo fails to decode
        let codec = MockCodec::with_buffers(vec![uniform_buffer(50, 40, 128)]);
        let (tx, rx) = std::sync::mpsc::channel();
        let manifest = process_dir(
            &small_renderer(),
            &codec,
            &src,
            &out,
            &BatchOptions::default(),
            Some(tx),
        )
        .unwrap();

        assert_eq!(manifest.rendered, 1);
        assert_eq!(manifest.failed, 1);
        let failed = manifest.photos.iter().find(|p| p.error.is_some()).unwrap();
        assert!(failed.output.is_none());

        let events: Vec<ProcessEvent> = rx.iter().collect();
        assert!(matches!(events[0], ProcessEvent::Started { total: 2 }));
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, ProcessEvent::PhotoFailed { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn manifest_is_valid_json_in_source_order() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let out = tmp.path().join("out");
        for name in ["c.jpg", "a.jpg", "b.jpg"] {
            touch(&src.join(name), b"x");
        }
        let codec = MockCodec::with_buffers(vec![uniform_buffer(40, 50, 90); 3]);
        process_dir(
            &small_renderer(),
            &codec,
            &src,
            &out,
            &BatchOptions::default(),
            None,
        )
        .unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join(MANIFEST_FILE)).unwrap()).unwrap();
        let sources: Vec<&str> = json["photos"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["source"].as_str().unwrap())
            .collect();
        assert_eq!(sources, vec!["a.jpg", "b.jpg", "c.jpg"]);
        assert_eq!(json["photos"][0]["render"]["dimensions"]["height"], 125);
        assert_eq!(json["format"], "jpeg");
    }

    // =========================================================================
    // Real codec
    // =========================================================================

    #[test]
    fn render_file_writes_decodable_jpeg() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in.jpg");
        let output = tmp.path().join("nested/out.jpg");
        fs::write(&input, encode_test_jpeg(160, 120)).unwrap();

        let photo = render_file(
            &small_renderer(),
            &RustCodec::new(),
            &input,
            &output,
            &fixed_instant(),
            &mut Rng64::new(1),
        )
        .unwrap();

        assert_eq!(photo.dimensions, Dimensions { width: 100, height: 80 });
        let written = fs::read(&output).unwrap();
        assert_eq!(&written[..2], &[0xFF, 0xD8]);
        let (w, h) = image::image_dimensions(&output).unwrap();
        assert_eq!((w, h), (100, 80));
    }

    #[test]
    fn render_file_missing_source() {
        let tmp = TempDir::new().unwrap();
        let err = render_file(
            &small_renderer(),
            &RustCodec::new(),
            &tmp.path().join("missing.jpg"),
            &tmp.path().join("out.jpg"),
            &fixed_instant(),
            &mut Rng64::new(1),
        )
        .unwrap_err();
        assert!(matches!(err, ProcessError::SourceNotFound(_)));
    }

    #[test]
    fn render_file_garbage_is_render_error() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("broken.jpg");
        fs::write(&input, b"not a jpeg").unwrap();
        let err = render_file(
            &small_renderer(),
            &RustCodec::new(),
            &input,
            &tmp.path().join("out.jpg"),
            &fixed_instant(),
            &mut Rng64::new(1),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ProcessError::Render {
                source: RenderError::Decode { .. },
                ..
            }
        ));
    }
}
