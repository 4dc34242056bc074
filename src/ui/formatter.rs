//! Pure formatting functions for UI output.
//!
//! Success and status lines are part of the observable contract: callers
//! and tests match on the message text, so the styling never touches it.
//! Output goes to any `Write` so commands can print to stdout while tests
//! capture a buffer.

use std::io::{self, Write};

use console::style;

use crate::boundary::BoundaryWarning;

/// Format and print an error message in red.
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red(), message);
}

/// Format and write a success message with green checkmark.
pub fn write_success<W: Write>(out: &mut W, message: &str) -> io::Result<()> {
    writeln!(out, "{} {}", style("✓").green(), message)
}

/// Format and write a status message with yellow arrow.
pub fn write_status<W: Write>(out: &mut W, message: &str) -> io::Result<()> {
    writeln!(out, "{} {}", style("→").yellow(), message)
}

/// Write a non-fatal warning.
pub fn write_boundary_warning<W: Write>(out: &mut W, warning: &BoundaryWarning) -> io::Result<()> {
    writeln!(out, "{} {}", style("⚠ Warning:").yellow(), warning)
}

/// Write a bare value with no decoration, e.g. the version report.
pub fn write_plain<W: Write>(out: &mut W, value: &str) -> io::Result<()> {
    writeln!(out, "{}", value)
}
