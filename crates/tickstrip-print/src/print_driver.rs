// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print-driver converter: drives the Windows "Microsoft Print to PDF"
// driver through PowerShell and a helper script shipped next to the binary.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tickstrip_core::config::PrintDriverSettings;
use tickstrip_core::error::{Result, TickstripError};
use tracing::{debug, info, instrument, warn};

use crate::converter::MonochromeConverter;

/// Printer the driver converter targets by default.
pub const DEFAULT_PRINTER: &str = "Microsoft Print to PDF";

/// Helper script expected beside the executable.
pub const SCRIPT_NAME: &str = "PrintToPDF.ps1";

/// Characters that would break out of the single-quoted PowerShell string.
const FORBIDDEN_PRINTER_CHARS: &[char] = &['\'', '"', '`', ';', '|', '&', '$', '\n', '\r'];

/// Monochrome converter backed by an OS print-to-PDF driver.
#[derive(Debug, Clone)]
pub struct PrintDriverConverter {
    printer: String,
    script: PathBuf,
    shell: String,
}

impl PrintDriverConverter {
    /// Target [`DEFAULT_PRINTER`] with the script next to the running binary.
    pub fn new() -> Self {
        Self {
            printer: DEFAULT_PRINTER.to_string(),
            script: default_script_path(),
            shell: "powershell".to_string(),
        }
    }

    /// Defaults with any configured overrides applied.
    pub fn from_settings(settings: &PrintDriverSettings) -> Result<Self> {
        let mut converter = Self::new();
        if let Some(printer) = &settings.printer {
            converter = converter.with_printer(printer.as_str())?;
        }
        if let Some(script) = &settings.script {
            converter = converter.with_script(script);
        }
        if let Some(shell) = &settings.shell {
            converter = converter.with_shell(shell.as_str());
        }
        debug!(
            printer = %converter.printer,
            script = %converter.script.display(),
            shell = %converter.shell,
            "Print driver configured"
        );
        Ok(converter)
    }

    /// Target a different printer. Names that could escape the PowerShell
    /// quoting are rejected.
    pub fn with_printer(mut self, printer: impl Into<String>) -> Result<Self> {
        let printer = printer.into();
        if printer.trim().is_empty() || printer.contains(FORBIDDEN_PRINTER_CHARS) {
            return Err(TickstripError::ConverterUnavailable(format!(
                "invalid printer name: {printer:?}"
            )));
        }
        self.printer = printer;
        Ok(self)
    }

    /// Use a different conversion script.
    pub fn with_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.script = script.into();
        self
    }

    /// Use a different PowerShell executable (e.g. `pwsh`).
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    // -- Commands -------------------------------------------------------------

    fn availability_command(&self) -> Command {
        let mut cmd = Command::new(&self.shell);
        cmd.args(["-NoProfile", "-Command"]).arg(format!(
            "& {{if (Get-Printer -Name '{}' -ErrorAction SilentlyContinue) {{ exit 0 }} else {{ exit 1 }}}}",
            self.printer
        ));
        cmd
    }

    fn install_command(&self) -> Command {
        let mut cmd = Command::new(&self.shell);
        cmd.args(["-NoProfile", "-Command"]).arg(format!(
            "Add-Printer -Name '{0}' -DriverName '{0}' -PortName 'PORTPROMPT:' -ErrorAction SilentlyContinue",
            self.printer
        ));
        cmd
    }

    fn convert_command(&self, input: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.shell);
        cmd.args(["-ExecutionPolicy", "Bypass", "-File"])
            .arg(&self.script)
            .arg("-inputPdf")
            .arg(input)
            .arg("-outputPdf")
            .arg(output);
        cmd
    }
}

impl Default for PrintDriverConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl MonochromeConverter for PrintDriverConverter {
    fn name(&self) -> &str {
        &self.printer
    }

    #[instrument(skip_all, fields(printer = %self.printer))]
    fn available(&self) -> bool {
        match self
            .availability_command()
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) => {
                debug!(success = status.success(), "Printer check finished");
                status.success()
            }
            Err(err) => {
                debug!("Printer check could not run: {}", err);
                false
            }
        }
    }

    #[instrument(skip_all, fields(printer = %self.printer))]
    fn install(&self) {
        match self.install_command().output() {
            Ok(output) => debug!(code = ?output.status.code(), "Printer install attempted"),
            Err(err) => warn!("Printer install could not run: {}", err),
        }
    }

    #[instrument(skip_all, fields(input = %input.display(), output = %output.display()))]
    fn convert(&self, input: &Path, output: &Path) -> Result<i32> {
        if !self.script.is_file() {
            return Err(TickstripError::ConverterUnavailable(format!(
                "conversion script not found at {}",
                self.script.display()
            )));
        }

        let result = self.convert_command(input, output).output().map_err(|err| {
            TickstripError::ConverterUnavailable(format!("failed to run {}: {}", self.shell, err))
        })?;

        let code = result.status.code().unwrap_or(-1);
        if code == 0 {
            info!("Print driver conversion finished");
        } else {
            warn!(
                code,
                stderr = %String::from_utf8_lossy(&result.stderr).trim(),
                "Print driver conversion failed"
            );
        }
        Ok(code)
    }

    fn success_message(&self, _output: &Path) -> String {
        "PDF has been successfully opened in Edge.".to_string()
    }
}

/// `<dir of current exe>/PrintToPDF.ps1`, or the bare name if the executable
/// path is unknown.
fn default_script_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(SCRIPT_NAME)))
        .unwrap_or_else(|| PathBuf::from(SCRIPT_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    fn args(cmd: &Command) -> Vec<String> {
        cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn defaults_target_microsoft_print_to_pdf() {
        let converter = PrintDriverConverter::new();
        assert_eq!(converter.name(), "Microsoft Print to PDF");
        assert_eq!(converter.script.file_name(), Some(OsStr::new(SCRIPT_NAME)));
    }

    #[test]
    fn convert_passes_input_and_output_to_script() {
        let converter = PrintDriverConverter::new().with_script("/opt/tickstrip/PrintToPDF.ps1");
        let cmd = converter.convert_command(Path::new("in.pdf"), Path::new("out_BW.pdf"));
        assert_eq!(cmd.get_program(), OsStr::new("powershell"));
        assert_eq!(
            args(&cmd),
            vec![
                "-ExecutionPolicy",
                "Bypass",
                "-File",
                "/opt/tickstrip/PrintToPDF.ps1",
                "-inputPdf",
                "in.pdf",
                "-outputPdf",
                "out_BW.pdf",
            ]
        );
    }

    #[test]
    fn availability_and_install_name_the_printer() {
        let converter = PrintDriverConverter::new();
        let check = args(&converter.availability_command());
        assert!(check[2].contains("Get-Printer -Name 'Microsoft Print to PDF'"));
        let install = args(&converter.install_command());
        assert!(install[2].contains("Add-Printer -Name 'Microsoft Print to PDF'"));
        assert!(install[2].contains("-PortName 'PORTPROMPT:'"));
    }

    #[test]
    fn printer_names_that_escape_quoting_are_rejected() {
        for bad in ["", "  ", "x' ; Remove-Item", "a|b", "$(evil)"] {
            assert!(PrintDriverConverter::new().with_printer(bad).is_err(), "{bad:?}");
        }
        let ok = PrintDriverConverter::new().with_printer("Office Laser").expect("valid");
        assert_eq!(ok.name(), "Office Laser");
    }

    #[test]
    fn settings_override_defaults() {
        let settings = PrintDriverSettings {
            printer: Some("Office Laser".into()),
            script: Some(PathBuf::from("/opt/tickstrip/Mono.ps1")),
            shell: Some("pwsh".into()),
        };
        let converter = PrintDriverConverter::from_settings(&settings).expect("valid settings");
        assert_eq!(converter.name(), "Office Laser");
        let cmd = converter.convert_command(Path::new("in.pdf"), Path::new("out.pdf"));
        assert_eq!(cmd.get_program(), OsStr::new("pwsh"));
        assert_eq!(args(&cmd)[3], "/opt/tickstrip/Mono.ps1");

        let unchanged = PrintDriverConverter::from_settings(&PrintDriverSettings::default()).expect("defaults");
        assert_eq!(unchanged.name(), DEFAULT_PRINTER);

        let hostile = PrintDriverSettings {
            printer: Some("x'; Remove-Item".into()),
            ..PrintDriverSettings::default()
        };
        assert!(PrintDriverConverter::from_settings(&hostile).is_err());
    }

    #[test]
    fn missing_shell_means_unavailable() {
        let converter = PrintDriverConverter::new().with_shell("tickstrip-no-such-shell");
        assert!(!converter.available());
        converter.install();
    }

    #[test]
    fn missing_script_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let converter = PrintDriverConverter::new().with_script(dir.path().join("absent.ps1"));
        let err = converter
            .convert(&dir.path().join("in.pdf"), &dir.path().join("out.pdf"))
            .err()
            .expect("fails");
        assert!(matches!(err, TickstripError::ConverterUnavailable(_)));
    }

    #[test]
    fn unspawnable_shell_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join(SCRIPT_NAME);
        std::fs::write(&script, "exit 0").expect("write script");
        let converter = PrintDriverConverter::new()
            .with_script(script)
            .with_shell("tickstrip-no-such-shell");
        let err = converter
            .convert(&dir.path().join("in.pdf"), &dir.path().join("out.pdf"))
            .err()
            .expect("fails");
        assert!(matches!(err, TickstripError::ConverterUnavailable(_)));
    }
}
