//! Terminal color constants and utilities for CLI output.

use std::io::{self, Write};

use aoc_dispatch_core::Severity;

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";
pub const RED: &str = "\x1b[31m";

/// Color for a status line.
pub fn for_severity(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => DIM,
        Severity::Success => GREEN,
        Severity::Warning => YELLOW,
        Severity::Error => RED,
    }
}

/// Flush stdout to ensure prompt output is visible immediately.
#[inline]
pub fn flush_stdout() {
    io::stdout().flush().ok();
}
