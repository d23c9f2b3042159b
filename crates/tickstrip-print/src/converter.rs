// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The monochrome converter seam.

use std::path::Path;

use tickstrip_core::error::Result;

/// Something that turns a PDF into a black-and-white PDF.
///
/// Implementations are synchronous; callers run them on a blocking thread.
pub trait MonochromeConverter: Send + Sync {
    /// Human-readable name, used in status messages.
    fn name(&self) -> &str;

    /// Whether the converter can run right now.
    fn available(&self) -> bool;

    /// Try to make the converter available. Best effort; callers re-check
    /// [`MonochromeConverter::available`] afterwards.
    fn install(&self);

    /// Convert `input` into `output` and return the exit code (0 = success).
    ///
    /// An `Err` means the conversion could not be started at all.
    fn convert(&self, input: &Path, output: &Path) -> Result<i32>;

    /// Status line shown after a successful conversion.
    fn success_message(&self, output: &Path) -> String {
        format!("Black and white copy saved to {}", output.display())
    }
}
