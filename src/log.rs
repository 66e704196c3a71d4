//! Terminal logging with colored module prefixes.
//!
//! stdout carries the JSON report, so every log line goes to stderr.
//! Verbosity is a property of the [`Logger`] value handed down from the
//! build configuration.

use owo_colors::{OwoColorize, Stream};
use std::fmt::Display;
use std::io::{stderr, Write};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Logger {
    verbose: bool,
    silent: bool,
}

impl Logger {
    pub fn new(verbose: bool) -> Self {
        Self { verbose, silent: false }
    }

    /// Discards everything; for tests and library callers.
    pub fn quiet() -> Self {
        Self { verbose: false, silent: true }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn log(&self, module: &str, message: impl Display) {
        if !self.silent {
            write_line(module, &message);
        }
    }

    /// Only shown in verbose mode.
    pub fn debug(&self, module: &str, message: impl Display) {
        if self.verbose && !self.silent {
            write_line(module, &message);
        }
    }

    pub fn warn(&self, message: impl Display) {
        if !self.silent {
            write_line("warn", &message);
        }
    }
}

fn write_line(module: &str, message: &dyn Display) {
    let prefix = format!("[{module}]");
    let prefix = match module {
        "collect" => prefix
            .if_supports_color(Stream::Stderr, |p| p.bright_blue().bold().to_string())
            .to_string(),
        "publish" => prefix
            .if_supports_color(Stream::Stderr, |p| p.bright_green().bold().to_string())
            .to_string(),
        "warn" | "error" => prefix
            .if_supports_color(Stream::Stderr, |p| p.bright_red().bold().to_string())
            .to_string(),
        _ => prefix
            .if_supports_color(Stream::Stderr, |p| p.bright_yellow().bold().to_string())
            .to_string(),
    };
    let mut err = stderr().lock();
    writeln!(err, "{prefix} {message}").ok();
}
