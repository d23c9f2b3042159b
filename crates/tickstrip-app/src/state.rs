// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Interactive-side state, updated only from pipeline events.

use std::path::PathBuf;

use tickstrip_core::human_errors::HumanError;
use tickstrip_core::types::PipelineEvent;

/// Width of the rendered progress bar, in cells.
const BAR_CELLS: usize = 30;

/// What the user has been told about the current run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    /// Last reported page progress.
    pub percent: u8,
    /// Every status line, oldest first.
    pub statuses: Vec<String>,
    /// Cleaned document, once saved.
    pub cleaned: Option<PathBuf>,
    /// Black-and-white copy, once converted.
    pub monochrome: Option<PathBuf>,
    /// Why the black-and-white step failed, if it did.
    pub conversion_failure: Option<HumanError>,
}

impl RunState {
    pub fn apply(&mut self, event: &PipelineEvent) {
        match event {
            PipelineEvent::Progress { percent } => self.percent = (*percent).min(100),
            PipelineEvent::Status { text } => self.statuses.push(text.clone()),
            PipelineEvent::Completed { path } => self.cleaned = Some(path.clone()),
        }
    }

    /// Latest status line, if any.
    pub fn status(&self) -> Option<&str> {
        self.statuses.last().map(String::as_str)
    }

    /// The most finished output: the black-and-white copy if there is one.
    pub fn final_output(&self) -> Option<&PathBuf> {
        self.monochrome.as_ref().or(self.cleaned.as_ref())
    }

    /// `[=========>           ]  33%`
    pub fn progress_bar(&self) -> String {
        let filled = usize::from(self.percent) * BAR_CELLS / 100;
        let mut bar = "=".repeat(filled);
        if filled < BAR_CELLS {
            bar.push('>');
            bar.push_str(&" ".repeat(BAR_CELLS - filled - 1));
        }
        format!("[{bar}] {:>3}%", self.percent)
    }
}
