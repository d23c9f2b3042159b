// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Conversion chain: check, install, re-check, convert.
//
// Runs after the cleaned document is saved. The cleaned file is an input
// only; it is left in place whatever happens here.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tickstrip_core::config::{AppConfig, ConverterKind};
use tickstrip_core::error::{Result, TickstripError};
use tickstrip_core::types::{BW_SUFFIX, suffixed_pdf_path};
use tracing::{info, instrument, warn};

use crate::converter::MonochromeConverter;
use crate::native::NativeGreyscaleConverter;
use crate::print_driver::PrintDriverConverter;

/// Status line when a conversion returns non-zero or cannot start.
pub const CONVERSION_FAILED_MESSAGE: &str = "Failed to convert the PDF to black and white.";

/// Drives one [`MonochromeConverter`] through a conversion.
#[derive(Clone)]
pub struct ConversionChain {
    converter: Arc<dyn MonochromeConverter>,
}

impl ConversionChain {
    pub fn new(converter: Arc<dyn MonochromeConverter>) -> Self {
        Self { converter }
    }

    /// The chain for the configured converter, or `None` when conversion is
    /// switched off. Fails when the print-driver overrides are unusable.
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>> {
        let converter: Arc<dyn MonochromeConverter> = match config.converter {
            ConverterKind::PrintDriver => Arc::new(PrintDriverConverter::from_settings(&config.print_driver)?),
            ConverterKind::Native => Arc::new(NativeGreyscaleConverter::default()),
            ConverterKind::None => return Ok(None),
        };
        Ok(Some(Self::new(converter)))
    }

    pub fn converter_name(&self) -> &str {
        self.converter.name()
    }

    /// Convert `cleaned` into `<output_folder>/<cleaned stem>_BW.pdf`.
    ///
    /// Every user-facing step is reported through `status`. Errors are
    /// returned after their status line has been emitted.
    #[instrument(skip_all, fields(converter = %self.converter.name(), input = %cleaned.display()))]
    pub fn run(&self, cleaned: &Path, output_folder: &Path, mut status: impl FnMut(&str)) -> Result<PathBuf> {
        let name = self.converter.name();

        if !self.converter.available() {
            status(&format!("{name} is not installed. Attempting to install..."));
            self.converter.install();
            if !self.converter.available() {
                warn!("Converter still unavailable after install attempt");
                status(&format!("Failed to install {name}. Please install it manually."));
                return Err(TickstripError::ConverterUnavailable(name.to_string()));
            }
            info!("Converter installed");
        }

        let output = suffixed_pdf_path(cleaned, output_folder, BW_SUFFIX);
        let code = match self.converter.convert(cleaned, &output) {
            Ok(code) => code,
            Err(err) => {
                status(CONVERSION_FAILED_MESSAGE);
                return Err(err);
            }
        };
        if code != 0 {
            status(CONVERSION_FAILED_MESSAGE);
            return Err(TickstripError::ConverterFailed { code });
        }

        info!(output = %output.display(), "Black and white copy written");
        status(&self.converter.success_message(&output));
        Ok(output)
    }
}
