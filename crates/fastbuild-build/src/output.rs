//! Console output and progress reporting

use colored::Colorize;

/// Verbosity of console output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Errors and final status only.
    Quiet,
    /// Step banners, per-file additions, compile/link markers.
    #[default]
    Normal,
    /// Everything, including dependency trees and cache activity.
    Verbose,
}

impl OutputMode {
    pub fn is_quiet(&self) -> bool {
        matches!(self, Self::Quiet)
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Self::Verbose)
    }
}

/// Console writer honoring the configured output mode.
///
/// Cheap to clone so workers can carry their own handle; all methods write
/// whole lines, which keeps interleaved parallel output readable.
#[derive(Debug, Clone, Copy, Default)]
pub struct Console {
    mode: OutputMode,
}

impl Console {
    pub fn new(mode: OutputMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Print a numbered step banner.
    pub fn step(&self, message: &str) {
        if !self.mode.is_quiet() {
            println!("\n{}", message.bold());
        }
    }

    pub fn info(&self, message: &str) {
        if !self.mode.is_quiet() {
            println!("{message}");
        }
    }

    pub fn verbose(&self, message: &str) {
        if self.mode.is_verbose() {
            println!("{message}");
        }
    }

    /// Report a file entering the build list, tagged with the reason it was
    /// selected (`git`, `checksum`, `dependency`, `new object`).
    pub fn added_file(&self, path: &str, reason: &str) {
        if !self.mode.is_quiet() {
            println!("Adding file: {} [{}]", path.green(), reason);
        }
    }

    pub fn warn(&self, message: &str) {
        if !self.mode.is_quiet() {
            eprintln!("{} {}", "warning:".yellow().bold(), message);
        }
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "error:".red().bold(), message);
    }
}
