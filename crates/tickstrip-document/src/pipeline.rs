// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document pipeline: open, transform every page in order, save, report.
//
// A run happens on a blocking worker; the only way out of it is the event
// channel. At most one run is active per `PipelineRunner`.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tickstrip_core::config::TransformSettings;
use tickstrip_core::error::{Result, TickstripError};
use tickstrip_core::human_errors::status_message;
use tickstrip_core::types::{ConversionJob, PipelineEvent, progress_percent};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::pdf::document::ExamDocument;
use crate::transform::{PageTransformer, TransformReport};

/// Status text sent after the cleaned document has been saved.
pub const COMPLETION_MESSAGE: &str = "✨ Tick & Cross removed from the file.";

/// Sending half of the event channel handed to a run.
pub type EventSender = UnboundedSender<PipelineEvent>;

/// Runs the page transformer across a whole document.
#[derive(Debug, Clone, Default)]
pub struct DocumentPipeline {
    transformer: PageTransformer,
}

impl DocumentPipeline {
    pub fn new(settings: TransformSettings) -> Self {
        Self {
            transformer: PageTransformer::new(settings),
        }
    }

    /// Process `job` start to finish and return the path written.
    ///
    /// Emits one progress event per page, then the completion status and the
    /// completion event. Nothing is saved if any page fails.
    #[instrument(skip_all, fields(input = %job.input.display()))]
    pub fn process(&self, job: &ConversionJob, events: &EventSender) -> Result<PathBuf> {
        let mut document = ExamDocument::open(&job.input)?;
        let total = document.page_count();
        info!(pages = total, "Processing document");

        let mut totals = TransformReport::default();
        for index in 0..total {
            let report = self
                .process_page(&mut document, index)
                .map_err(|err| err.on_page(index))?;
            totals.matches += report.matches;
            totals.lines_drawn += report.lines_drawn;
            totals.images_removed += report.images_removed;
            emit(
                events,
                PipelineEvent::Progress {
                    percent: progress_percent(index + 1, total),
                },
            );
        }

        let output = job.output_path();
        document.save(&output)?;
        document.close();
        info!(
            output = %output.display(),
            matches = totals.matches,
            lines = totals.lines_drawn,
            images_removed = totals.images_removed,
            "Document processed"
        );

        emit(
            events,
            PipelineEvent::Status {
                text: COMPLETION_MESSAGE.to_string(),
            },
        );
        emit(events, PipelineEvent::Completed { path: output.clone() });
        Ok(output)
    }

    fn process_page(&self, document: &mut ExamDocument, index: usize) -> Result<TransformReport> {
        let mut page = document.page(index)?;
        let report = self.transformer.transform(&mut page)?;
        if report.changed() {
            page.commit()?;
        }
        Ok(report)
    }

    /// Run boundary: like [`DocumentPipeline::process`], but a failure is
    /// reported as an `Error: ...` status event and no completion follows.
    pub fn run(&self, job: &ConversionJob, events: &EventSender) -> Option<PathBuf> {
        match self.process(job, events) {
            Ok(path) => Some(path),
            Err(err) => {
                error!(error = %err, input = %job.input.display(), "Run failed");
                emit(
                    events,
                    PipelineEvent::Status {
                        text: status_message(&err),
                    },
                );
                None
            }
        }
    }
}

fn emit(events: &EventSender, event: PipelineEvent) {
    if events.send(event).is_err() {
        debug!("Event receiver gone, dropping event");
    }
}

// -- Background runner --------------------------------------------------------

/// Dispatches pipeline runs onto tokio's blocking pool, one at a time.
#[derive(Debug, Clone, Default)]
pub struct PipelineRunner {
    pipeline: Arc<DocumentPipeline>,
    busy: Arc<AtomicBool>,
}

/// Holds the single-run lock; releases it when dropped.
#[derive(Debug)]
pub(crate) struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl PipelineRunner {
    pub fn new(pipeline: DocumentPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a run is in flight.
    pub fn is_running(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub(crate) fn try_lock(&self) -> Result<RunGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| RunGuard(Arc::clone(&self.busy)))
            .map_err(|_| TickstripError::RunInProgress)
    }

    /// Start a run for `job` in the background.
    ///
    /// The job is moved into the worker, so later configuration changes do
    /// not reach it. Fails with [`TickstripError::RunInProgress`] without
    /// starting anything if a run is already active. Must be called from
    /// within a tokio runtime.
    pub fn dispatch(&self, job: ConversionJob, events: EventSender) -> Result<JoinHandle<Option<PathBuf>>> {
        let guard = self.try_lock().inspect_err(|_| {
            warn!(input = %job.input.display(), "Run already in progress, ignoring request");
        })?;
        let pipeline = Arc::clone(&self.pipeline);
        info!(input = %job.input.display(), output_folder = %job.output_folder.display(), "Dispatching run");

        Ok(tokio::task::spawn_blocking(move || {
            let _guard = guard;
            pipeline.run(&job, &events)
        }))
    }
}
