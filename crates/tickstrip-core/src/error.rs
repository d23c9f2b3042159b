// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Tickstrip.

use thiserror::Error;

/// Top-level error type for all Tickstrip operations.
#[derive(Debug, Error)]
pub enum TickstripError {
    // -- Document errors --
    #[error("cannot open document: {0}")]
    Open(String),

    /// `page` is the zero-based page index; messages count from one.
    #[error("page {} could not be processed: {detail}", .page + 1)]
    Page { page: usize, detail: String },

    #[error("PDF operation failed: {0}")]
    Pdf(String),

    #[error("image processing failed: {0}")]
    Image(String),

    #[error("cannot save document: {0}")]
    Save(String),

    // -- Run control --
    #[error("a conversion is already running")]
    RunInProgress,

    // -- Monochrome conversion --
    #[error("monochrome converter unavailable: {0}")]
    ConverterUnavailable(String),

    #[error("monochrome conversion exited with code {code}")]
    ConverterFailed { code: i32 },

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TickstripError {
    /// Attach a page number to a lower-level failure.
    ///
    /// Errors that already carry a page, or that describe the whole document,
    /// are returned unchanged.
    pub fn on_page(self, page: usize) -> Self {
        match self {
            Self::Page { .. } | Self::Open(_) | Self::Save(_) | Self::RunInProgress => self,
            other => Self::Page {
                page,
                detail: other.to_string(),
            },
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TickstripError>;
