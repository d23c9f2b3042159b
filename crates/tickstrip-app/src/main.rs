// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tickstrip: strips tick/cross marks from marked exam PDFs.
//
// Entry point. Initialises logging, resolves configuration, runs one
// conversion and reports its progress on the terminal.

mod cli;
mod services;
mod state;

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use tickstrip_core::human_errors::{Severity, failure_report, humanize_error};
use tickstrip_core::types::PipelineEvent;
use tickstrip_core::{AppConfig, TickstripError};

use cli::Cli;
use services::session::Session;
use services::viewer;
use state::RunState;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.apply(AppConfig::from_env());

    if cli.print_config {
        return match serde_json::to_string_pretty(&config) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(err) => fail(&err.into()),
        };
    }

    let Some(input) = cli.input.as_deref() else {
        eprintln!("No input PDF given.");
        return ExitCode::FAILURE;
    };

    let session = match Session::new(config) {
        Ok(session) => session,
        Err(err) => return fail(&err),
    };
    tracing::info!(
        output_folder = %session.config().output_folder.display(),
        converter = ?session.config().converter,
        "Tickstrip starting"
    );
    let mut state = RunState::default();
    if let Err(err) = session.run(input, &mut state, render).await {
        return fail(&err);
    }

    let Some(finished) = state.final_output() else {
        tracing::error!(status = state.status().unwrap_or_default(), "Run did not finish");
        return ExitCode::FAILURE;
    };
    if let Some(failure) = &state.conversion_failure {
        eprintln!("{}", failure.suggestion);
    }
    println!("{}", finished.display());

    if cli.open {
        if let Err(err) = viewer::open(finished) {
            tracing::warn!(error = %err, "Could not open the viewer");
        }
    }
    ExitCode::SUCCESS
}

/// Report `err` on the terminal and give up.
fn fail(err: &TickstripError) -> ExitCode {
    match humanize_error(err).severity {
        Severity::ActionRequired => tracing::warn!(error = %err, "Run stopped"),
        Severity::Permanent => tracing::error!(error = %err, "Run failed"),
    }
    eprintln!("{}", failure_report(err));
    ExitCode::FAILURE
}

/// Progress redraws one terminal line; status lines go below it.
fn render(state: &RunState, event: &PipelineEvent) {
    match event {
        PipelineEvent::Progress { percent } => {
            eprint!("\r{}", state.progress_bar());
            if *percent >= 100 {
                eprintln!();
            }
            let _ = std::io::stderr().flush();
        }
        PipelineEvent::Status { text } => eprintln!("{text}"),
        PipelineEvent::Completed { path } => {
            tracing::debug!(path = %path.display(), "Cleaned document ready");
        }
    }
}
