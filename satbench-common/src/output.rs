//! Unified routines to print data.

use ansi_term::{Colour, Style};
use atty::{self, Stream};
use libc::{self, signal};
use std::{
    fmt::Display,
    time::{Duration, Instant},
};

/// Write a solution line (`"s ..."`) to stdout.
pub fn print_solution(verdict: &str) {
    write_to_stdout!("s {}\n", verdict);
}

/// Write a key-value pair to stdout.
pub fn print_key_value(key: &str, value: impl Display) {
    requires!(key.len() < 35);
    comment!("{:<35} {:>15}", format!("{}:", key), value);
}

/// We handle SIGPIPE ourselves to avoid printing errors.
pub fn install_signal_handler() {
    // You can't disable assert! in Rust so this is fine.
    assert!(unsafe { signal(libc::SIGPIPE, libc::SIG_DFL) } != libc::SIG_ERR);
}

/// Warnings and errors go to stderr, so they are colored if that is a terminal.
fn stderr_is_a_tty() -> bool {
    atty::is(Stream::Stderr)
}

/// Style of the `Warning: ` prefix.
pub fn warning_style() -> Style {
    if stderr_is_a_tty() {
        Colour::Yellow.normal()
    } else {
        Style::default()
    }
}

/// Style of the `Error: ` prefix.
pub fn error_style() -> Style {
    if stderr_is_a_tty() {
        Colour::Red.normal()
    } else {
        Style::default()
    }
}

/// Format a duration as seconds with millisecond precision.
pub fn format_seconds(duration: Duration) -> String {
    format!("{}.{:03}", duration.as_secs(), duration.subsec_millis())
}

/// A RAII object that prints a timing message when it is destroyed.
pub struct Timer {
    /// The name of the stage that is being timed
    name: &'static str,
    /// The start time, set at construction time
    start: Instant,
    /// Whether this timer should be silenced
    pub disabled: bool,
}

impl Timer {
    /// Create a timer with a given name.
    pub fn name(name: &'static str) -> Timer {
        Timer {
            name,
            start: Instant::now(),
            disabled: false,
        }
    }
    /// Time since construction.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    /// Write the elapsed time as comment.
    fn drop(&mut self) {
        if self.disabled {
            return;
        }
        print_key_value(&format!("{} (s)", self.name), format_seconds(self.elapsed()));
    }
}
