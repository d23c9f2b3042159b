// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for Tickstrip: page geometry, embedded images, pipeline
// events and the job snapshot handed to a background run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Suffix appended to the input stem for the cleaned document.
pub const REMOVED_SUFFIX: &str = "_removed_ticks_and_crosses";

/// Suffix appended to the cleaned document's stem for the monochrome copy.
pub const BW_SUFFIX: &str = "_BW";

// -- Geometry -----------------------------------------------------------------

/// A point in page space (origin top-left, y increasing downward).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in page space. `y0` is the top edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Smallest rectangle containing both `self` and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// Device RGB colour with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

// -- Embedded images ----------------------------------------------------------

/// Opaque reference to an image object inside a document.
///
/// Mirrors a PDF indirect reference (object number, generation) without
/// tying this crate to a particular PDF library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImageRef {
    pub object: u32,
    pub generation: u16,
}

impl ImageRef {
    pub fn new(object: u32, generation: u16) -> Self {
        Self { object, generation }
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.object, self.generation)
    }
}

/// A raster image placed on a page, with its resolved pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedImage {
    pub id: ImageRef,
    pub width: u32,
    pub height: u32,
}

impl EmbeddedImage {
    /// Exact dimension match; there is no tolerance.
    pub fn has_size(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }
}

// -- Pipeline events ----------------------------------------------------------

/// Notification sent from a background run to the interactive context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// Percentage of pages processed (0..=100).
    Progress { percent: u8 },
    /// Free-text status line for the user.
    Status { text: String },
    /// The cleaned document was written to `path`.
    Completed { path: PathBuf },
}

/// Snapshot of everything a background run needs, taken at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionJob {
    pub input: PathBuf,
    pub output_folder: PathBuf,
}

impl ConversionJob {
    pub fn new(input: impl Into<PathBuf>, output_folder: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_folder: output_folder.into(),
        }
    }

    /// `<output_folder>/<input stem>_removed_ticks_and_crosses.pdf`
    pub fn output_path(&self) -> PathBuf {
        suffixed_pdf_path(&self.input, &self.output_folder, REMOVED_SUFFIX)
    }
}

/// `<folder>/<stem of source><suffix>.pdf`
pub fn suffixed_pdf_path(source: &Path, folder: &Path, suffix: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".into());
    folder.join(format!("{stem}{suffix}.pdf"))
}

/// Progress after `done` of `total` pages, rounded down.
pub fn progress_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) * 100) / total) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_uses_input_stem() {
        let job = ConversionJob::new("/exams/paper 1.pdf", "/tmp/out");
        assert_eq!(
            job.output_path(),
            PathBuf::from("/tmp/out/paper 1_removed_ticks_and_crosses.pdf")
        );
    }

    #[test]
    fn bw_path_chains_from_cleaned_stem() {
        let cleaned = PathBuf::from("/tmp/out/paper_removed_ticks_and_crosses.pdf");
        let bw = suffixed_pdf_path(&cleaned, Path::new("/tmp/out"), BW_SUFFIX);
        assert_eq!(
            bw,
            PathBuf::from("/tmp/out/paper_removed_ticks_and_crosses_BW.pdf")
        );
    }

    #[test]
    fn progress_rounds_down() {
        let seq: Vec<u8> = (1..=3).map(|done| progress_percent(done, 3)).collect();
        assert_eq!(seq, vec![33, 66, 100]);
    }

    #[test]
    fn progress_avoids_float_drift() {
        // 29/100 * 100 is 28.999... in floating point.
        assert_eq!(progress_percent(29, 100), 29);
    }

    #[test]
    fn size_match_is_exact() {
        let image = |w, h| EmbeddedImage {
            id: ImageRef::new(5, 0),
            width: w,
            height: h,
        };
        assert!(image(16, 16).has_size(16, 16));
        assert!(!image(15, 16).has_size(16, 16));
        assert!(!image(16, 15).has_size(16, 16));
        assert!(!image(17, 17).has_size(16, 16));
    }

    #[test]
    fn rect_union_grows_to_cover_both() {
        let a = Rect::new(10.0, 20.0, 30.0, 40.0);
        let b = Rect::new(25.0, 15.0, 50.0, 35.0);
        assert_eq!(a.union(&b), Rect::new(10.0, 15.0, 50.0, 40.0));
    }
}
