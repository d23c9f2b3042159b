// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line flags and how they override the environment-derived config.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tickstrip_core::{AppConfig, ConverterKind};

/// Remove tick and cross marks from a marked exam PDF, rule a double line
/// above every question header, then make a black-and-white copy.
#[derive(Parser, Debug)]
#[command(name = "tickstrip", version, about, long_about = None)]
pub struct Cli {
    /// Marked exam PDF to clean
    #[arg(required_unless_present = "print_config")]
    pub input: Option<PathBuf>,

    /// Folder for the cleaned and black-and-white PDFs [default: ~/Downloads]
    #[arg(short, long)]
    pub output_folder: Option<PathBuf>,

    /// Converter used for the black-and-white copy
    #[arg(short, long, value_enum)]
    pub converter: Option<ConverterArg>,

    /// Header text that gets ruled off
    #[arg(long)]
    pub marker: Option<String>,

    /// Printer used by the print-driver converter
    #[arg(long, value_name = "NAME")]
    pub printer: Option<String>,

    /// PowerShell script used by the print-driver converter
    #[arg(long, value_name = "PATH")]
    pub print_script: Option<PathBuf>,

    /// PowerShell executable used by the print-driver converter
    #[arg(long, value_name = "EXE")]
    pub shell: Option<String>,

    /// Open the finished file in the system PDF viewer
    #[arg(long)]
    pub open: bool,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    pub print_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConverterArg {
    PrintDriver,
    Native,
    None,
}

impl From<ConverterArg> for ConverterKind {
    fn from(arg: ConverterArg) -> Self {
        match arg {
            ConverterArg::PrintDriver => ConverterKind::PrintDriver,
            ConverterArg::Native => ConverterKind::Native,
            ConverterArg::None => ConverterKind::None,
        }
    }
}

impl Cli {
    /// Layer the flags over `config`.
    pub fn apply(&self, mut config: AppConfig) -> AppConfig {
        if let Some(folder) = &self.output_folder {
            config.output_folder = folder.clone();
        }
        if let Some(converter) = self.converter {
            config.converter = converter.into();
        }
        if let Some(marker) = &self.marker {
            config.transform.marker_text = marker.clone();
        }
        if let Some(printer) = &self.printer {
            config.print_driver.printer = Some(printer.clone());
        }
        if let Some(script) = &self.print_script {
            config.print_driver.script = Some(script.clone());
        }
        if let Some(shell) = &self.shell {
            config.print_driver.shell = Some(shell.clone());
        }
        config
    }
}
