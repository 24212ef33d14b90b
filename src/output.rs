//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Render
//!
//! ```text
//! IMG_0001.jpg → IMG_0001-retro.jpg
//!     Crop: 2000x1600 at (0, 0) → 1200x960 landscape
//!     Stamp: 05/03/24 14:07 (28px)
//!     Encoded: jpeg, 412803 bytes
//! ```
//!
//! Skipped stages show up as extra `Degraded:` lines.
//!
//! ## Batch
//!
//! ```text
//! Rendering 3 photos
//!     001 IMG_0001.jpg → IMG_0001-retro.jpg (1200x960)
//!     003 trip/IMG_0042.jpg → trip/IMG_0042-retro.jpg (1200x1500)
//!     002 broken.jpg FAILED
//!         Error: could not decode 10-byte source: ...
//!
//! Rendered 2 photos, 1 failed
//! ```
//!
//! ## Stages
//!
//! ```text
//! 001 exposure_contrast
//! 002 temperature_tint
//! ...
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::effects::{Pipeline, StageDegradation};
use crate::imaging::RenderedPhoto;
use crate::process::{BatchManifest, ProcessEvent};
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn degradation_lines(degraded: &[StageDegradation], depth: usize) -> Vec<String> {
    degraded
        .iter()
        .map(|d| format!("{}Degraded: {}", indent(depth), d))
        .collect()
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

// ============================================================================
// Single render
// ============================================================================

/// Describe one finished render: paths first, then how it was produced.
pub fn format_render_summary(photo: &RenderedPhoto, source: &Path, output: &Path) -> Vec<String> {
    let g = &photo.geometry;
    let mut lines = vec![
        format!("{} → {}", source.display(), output.display()),
        format!(
            "{}Crop: {}x{} at ({}, {}) → {}x{} {}",
            indent(1),
            g.crop_width,
            g.crop_height,
            g.origin_x,
            g.origin_y,
            g.output_width,
            g.output_height,
            g.orientation
        ),
    ];
    if let Some(stamp) = &photo.timestamp {
        lines.push(format!(
            "{}Stamp: {} ({}px)",
            indent(1),
            stamp.text,
            stamp.font_size
        ));
    }
    lines.extend(degradation_lines(&photo.report.degraded, 1));
    lines.push(format!(
        "{}Encoded: {}, {} bytes",
        indent(1),
        photo.format,
        photo.bytes.len()
    ));
    lines
}

pub fn print_render_summary(photo: &RenderedPhoto, source: &Path, output: &Path) {
    for line in format_render_summary(photo, source, output) {
        println!("{}", line);
    }
}

// ============================================================================
// Batch
// ============================================================================

/// Format a single batch progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::Started { total } => {
            vec![format!("Rendering {}", plural(*total, "photo", "photos"))]
        }
        ProcessEvent::PhotoRendered {
            index,
            source,
            output,
            dimensions,
            degraded,
        } => {
            let mut lines = vec![format!(
                "{}{} {} → {} ({}x{})",
                indent(1),
                format_index(*index),
                source,
                output,
                dimensions.width,
                dimensions.height
            )];
            lines.extend(degradation_lines(degraded, 2));
            lines
        }
        ProcessEvent::PhotoFailed {
            index,
            source,
            error,
        } => vec![
            format!("{}{} {} FAILED", indent(1), format_index(*index), source),
            format!("{}Error: {}", indent(2), error),
        ],
    }
}

/// Closing line after all events have been printed.
pub fn format_batch_summary(manifest: &BatchManifest) -> Vec<String> {
    let mut line = format!(
        "Rendered {}",
        plural(manifest.rendered, "photo", "photos")
    );
    if manifest.failed > 0 {
        line.push_str(&format!(", {} failed", manifest.failed));
    }
    vec![String::new(), line]
}

pub fn print_batch_summary(manifest: &BatchManifest) {
    for line in format_batch_summary(manifest) {
        println!("{}", line);
    }
}

// ============================================================================
// Stages
// ============================================================================

/// The effective stage order, one per line.
pub fn format_stages(pipeline: &Pipeline) -> Vec<String> {
    pipeline
        .stage_names()
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{} {}", format_index(i + 1), name))
        .collect()
}

pub fn print_stages(pipeline: &Pipeline) {
    for line in format_stages(pipeline) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
