// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages.
//
// Status text is the only error surface the user sees, so every technical
// error is turned into a line of plain English plus a suggestion.

use crate::error::TickstripError;

/// Whether the user can fix the problem themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// User must do something (pick another file, free disk space, install a driver).
    ActionRequired,
    /// The input itself is unusable.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HumanError {
    /// Plain English summary.
    pub message: String,
    /// What the user should try.
    pub suggestion: String,
    /// Drives how loudly the front end reports it.
    pub severity: Severity,
}

/// The status line emitted when a run fails: `Error: <description>`.
pub fn status_message(err: &TickstripError) -> String {
    format!("Error: {err}")
}

/// Terminal report for a failed run: the status line, then the plain
/// English message and what to try, one per line.
pub fn failure_report(err: &TickstripError) -> String {
    let human = humanize_error(err);
    format!("{}\n{}\n{}", status_message(err), human.message, human.suggestion)
}

/// Convert a `TickstripError` into a `HumanError`.
pub fn humanize_error(err: &TickstripError) -> HumanError {
    match err {
        TickstripError::Open(_) => HumanError {
            message: "This file couldn't be opened as a PDF.".into(),
            suggestion: "Check that the file is a PDF and opens in a PDF viewer, then try again.".into(),
            severity: Severity::Permanent,
        },

        TickstripError::Page { page, .. } => HumanError {
            message: format!("Page {} of this PDF couldn't be processed.", page + 1),
            suggestion: "The file may be damaged. Nothing was saved; try re-exporting the PDF and run it again.".into(),
            severity: Severity::Permanent,
        },

        TickstripError::Pdf(_) | TickstripError::Image(_) => HumanError {
            message: "There's a problem with this PDF file.".into(),
            suggestion: "The file may be damaged. Try a different copy of the document.".into(),
            severity: Severity::Permanent,
        },

        TickstripError::Save(_) => HumanError {
            message: "The cleaned PDF couldn't be saved.".into(),
            suggestion: "Make sure the output folder exists, is writable and has free space.".into(),
            severity: Severity::ActionRequired,
        },

        TickstripError::RunInProgress => HumanError {
            message: "A file is already being processed.".into(),
            suggestion: "Wait for the current file to finish, then pick the next one.".into(),
            severity: Severity::ActionRequired,
        },

        TickstripError::ConverterUnavailable(_) => HumanError {
            message: "The black and white converter isn't installed.".into(),
            suggestion: "Install it manually. The cleaned PDF has been kept in the output folder.".into(),
            severity: Severity::ActionRequired,
        },

        TickstripError::ConverterFailed { .. } => HumanError {
            message: "Failed to convert the PDF to black and white.".into(),
            suggestion: "The cleaned PDF has been kept in the output folder; you can print it in black and white yourself.".into(),
            severity: Severity::ActionRequired,
        },

        TickstripError::Io(io) => HumanError {
            message: "A file couldn't be read or written.".into(),
            suggestion: format!("Check the file and folder permissions. ({io})"),
            severity: Severity::ActionRequired,
        },

        TickstripError::Serialization(_) => HumanError {
            message: "Settings couldn't be read.".into(),
            suggestion: "Check the command-line options and try again.".into(),
            severity: Severity::ActionRequired,
        },
    }
}
