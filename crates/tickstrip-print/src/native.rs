// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process converter: rewrites colour operators and images to grey
// without any external driver.

use std::path::Path;

use tickstrip_core::error::Result;
use tickstrip_document::GreyscaleRewriter;
use tracing::info;

use crate::converter::MonochromeConverter;

/// Always-available converter built on [`GreyscaleRewriter`].
#[derive(Debug, Clone, Default)]
pub struct NativeGreyscaleConverter {
    rewriter: GreyscaleRewriter,
}

impl NativeGreyscaleConverter {
    pub fn new(rewriter: GreyscaleRewriter) -> Self {
        Self { rewriter }
    }
}

impl MonochromeConverter for NativeGreyscaleConverter {
    fn name(&self) -> &str {
        "Native greyscale"
    }

    fn available(&self) -> bool {
        true
    }

    fn install(&self) {}

    fn convert(&self, input: &Path, output: &Path) -> Result<i32> {
        let report = self.rewriter.convert_file(input, output)?;
        info!(
            colour_operators = report.colour_operators,
            images_converted = report.images_converted,
            images_skipped = report.images_skipped,
            "Native greyscale conversion finished"
        );
        Ok(0)
    }
}
