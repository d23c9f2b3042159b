// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Session: wires the background pipeline to the conversion chain.
//
// The pipeline runs on the blocking pool and reports over an event channel;
// this side folds the events into `RunState` and, once the cleaned file is
// saved, runs the configured monochrome converter on the blocking pool too.

use std::path::{Path, PathBuf};

use tickstrip_core::AppConfig;
use tickstrip_core::error::{Result, TickstripError};
use tickstrip_core::human_errors::humanize_error;
use tickstrip_core::types::{ConversionJob, PipelineEvent};
use tickstrip_document::{DocumentPipeline, PipelineRunner};
use tickstrip_print::ConversionChain;
use tokio::sync::mpsc::unbounded_channel;
use tracing::{info, warn};

use crate::state::RunState;

/// Shown once the cleaned file is in the output folder.
pub const SAVED_MESSAGE: &str = "✨ Tick & Cross removed from the file and saved to the selected folder.";

/// Everything needed to run conversions with one configuration.
#[derive(Clone)]
pub struct Session {
    config: AppConfig,
    runner: PipelineRunner,
    chain: Option<ConversionChain>,
}

impl Session {
    /// Fails when the configured converter cannot be set up.
    pub fn new(config: AppConfig) -> Result<Self> {
        let runner = PipelineRunner::new(DocumentPipeline::new(config.transform.clone()));
        let chain = ConversionChain::from_config(&config)?;
        Ok(Self { config, runner, chain })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Snapshot of what a run for `input` would use.
    pub fn job_for(&self, input: &Path) -> ConversionJob {
        ConversionJob::new(input, self.config.output_folder.clone())
    }

    /// Clean `input`, then convert the result to black and white.
    ///
    /// Every event is folded into `state` and then passed to `report`.
    /// Returns `Ok` once the run has finished, even if it ended with an error
    /// status; `Err` only when the run could not be started or joined.
    pub async fn run(
        &self,
        input: &Path,
        state: &mut RunState,
        mut report: impl FnMut(&RunState, &PipelineEvent),
    ) -> Result<()> {
        let job = self.job_for(input);
        let output_folder = job.output_folder.clone();
        let (tx, mut rx) = unbounded_channel();
        let handle = self.runner.dispatch(job, tx)?;

        while let Some(event) = rx.recv().await {
            state.apply(&event);
            report(&*state, &event);
        }

        let cleaned = handle
            .await
            .map_err(|err| TickstripError::Io(std::io::Error::other(format!("background run failed: {err}"))))?;
        let Some(cleaned) = cleaned else {
            return Ok(());
        };

        let saved = PipelineEvent::Status {
            text: SAVED_MESSAGE.to_string(),
        };
        state.apply(&saved);
        report(&*state, &saved);

        let Some(chain) = self.chain.clone() else {
            info!("Monochrome conversion disabled");
            return Ok(());
        };

        let (messages, converted) = convert_in_background(chain, cleaned, output_folder).await?;
        for text in messages {
            let event = PipelineEvent::Status { text };
            state.apply(&event);
            report(&*state, &event);
        }
        match converted {
            Ok(path) => state.monochrome = Some(path),
            Err(err) => {
                warn!(error = %err, "Monochrome conversion failed");
                state.conversion_failure = Some(humanize_error(&err));
            }
        }
        Ok(())
    }
}

/// Run the chain on the blocking pool, collecting its status lines.
async fn convert_in_background(
    chain: ConversionChain,
    cleaned: PathBuf,
    output_folder: PathBuf,
) -> Result<(Vec<String>, Result<PathBuf>)> {
    tokio::task::spawn_blocking(move || {
        let mut messages = Vec::new();
        let converted = chain.run(&cleaned, &output_folder, |text| messages.push(text.to_string()));
        (messages, converted)
    })
    .await
    .map_err(|err| TickstripError::Io(std::io::Error::other(format!("conversion task failed: {err}"))))
}
