// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.
//
// Settings are assembled from defaults, the environment, and command-line
// flags. Nothing is read from or written to a configuration file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::Rgb;

/// Environment variable overriding the default output folder.
pub const OUTPUT_DIR_ENV: &str = "TICKSTRIP_OUTPUT_DIR";

/// Which monochrome converter finishes the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConverterKind {
    /// OS print-to-PDF driver driven through PowerShell.
    PrintDriver,
    /// In-process greyscale rewrite of the PDF.
    Native,
    /// Stop after removing ticks and crosses.
    None,
}

/// Parameters of the per-page transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformSettings {
    /// Literal text that anchors a double-rule.
    pub marker_text: String,
    /// Distance from the top of the marker to the lower rule.
    pub rule_offset: f32,
    /// Distance between the two rules.
    pub rule_gap: f32,
    /// Stroke width of each rule.
    pub rule_width: f32,
    /// Stroke colour of each rule.
    pub rule_color: Rgb,
    /// Exact pixel width of a tick/cross image.
    pub mark_width: u32,
    /// Exact pixel height of a tick/cross image.
    pub mark_height: u32,
}

impl Default for TransformSettings {
    fn default() -> Self {
        Self {
            marker_text: "Question number".into(),
            rule_offset: 10.0,
            rule_gap: 2.0,
            rule_width: 1.5,
            rule_color: Rgb::BLACK,
            mark_width: 16,
            mark_height: 16,
        }
    }
}

/// Overrides for the print-driver converter. Unset fields keep the
/// converter's own defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintDriverSettings {
    /// Printer to target instead of "Microsoft Print to PDF".
    pub printer: Option<String>,
    /// Conversion script instead of the one next to the executable.
    pub script: Option<PathBuf>,
    /// PowerShell executable, e.g. `pwsh`.
    pub shell: Option<String>,
}

/// Runtime application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Folder that receives every output file.
    pub output_folder: PathBuf,
    /// Page transform parameters.
    pub transform: TransformSettings,
    /// Converter used for the black/white step.
    pub converter: ConverterKind,
    /// Print-driver overrides, used when `converter` is `PrintDriver`.
    #[serde(default)]
    pub print_driver: PrintDriverSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_folder: default_output_folder(|key| std::env::var(key).ok()),
            transform: TransformSettings::default(),
            converter: ConverterKind::PrintDriver,
            print_driver: PrintDriverSettings::default(),
        }
    }
}

impl AppConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] with an injectable variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let output_folder = match lookup(OUTPUT_DIR_ENV) {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => default_output_folder(&lookup),
        };
        Self {
            output_folder,
            ..Self::default()
        }
    }
}

/// `~/Downloads`, falling back to the working directory when no home is set.
fn default_output_folder(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    lookup("HOME")
        .or_else(|| lookup("USERPROFILE"))
        .map(|home| PathBuf::from(home).join("Downloads"))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_defaults() {
        let settings = TransformSettings::default();
        assert_eq!(settings.marker_text, "Question number");
        assert_eq!(settings.rule_offset, 10.0);
        assert_eq!(settings.rule_gap, 2.0);
        assert_eq!(settings.rule_width, 1.5);
        assert_eq!(settings.rule_color, Rgb::BLACK);
        assert_eq!((settings.mark_width, settings.mark_height), (16, 16));
    }

    #[test]
    fn output_folder_defaults_to_downloads() {
        let config = AppConfig::from_lookup(|key| match key {
            "HOME" => Some("/home/marker".into()),
            _ => None,
        });
        assert_eq!(config.output_folder, PathBuf::from("/home/marker/Downloads"));
    }

    #[test]
    fn env_override_wins() {
        let config = AppConfig::from_lookup(|key| match key {
            "HOME" => Some("/home/marker".into()),
            OUTPUT_DIR_ENV => Some("/srv/exams".into()),
            _ => None,
        });
        assert_eq!(config.output_folder, PathBuf::from("/srv/exams"));
    }

    #[test]
    fn no_home_falls_back_to_cwd() {
        let config = AppConfig::from_lookup(|_| None);
        assert_eq!(config.output_folder, PathBuf::from("."));
    }

    #[test]
    fn config_serialises_to_json() {
        let config = AppConfig::from_lookup(|_| None);
        let json = serde_json::to_string(&config).expect("serialise");
        assert!(json.contains("\"converter\":\"print-driver\""));
        let back: AppConfig = serde_json::from_str(&json).expect("deserialise");
        assert_eq!(back, config);
    }

    #[test]
    fn print_driver_section_is_optional() {
        let json = r#"{"output_folder":"/srv","transform":{"marker_text":"Question number","rule_offset":10.0,"rule_gap":2.0,"rule_width":1.5,"rule_color":{"r":0.0,"g":0.0,"b":0.0},"mark_width":16,"mark_height":16},"converter":"print-driver"}"#;
        let config: AppConfig = serde_json::from_str(json).expect("deserialise");
        assert_eq!(config.print_driver, PrintDriverSettings::default());
    }
}
