//! Macros and other utility code.

/// This should be used for every write to stdout.
#[macro_export]
macro_rules! write_to_stdout {
    ($($arg:tt)*) => ({
        use std::io::Write;
        match write!(std::io::stdout(), $($arg)*) {
            Ok(()) => (),
            // Don't panic on SIGPIPE.
            Err(ref err) if err.kind() == std::io::ErrorKind::BrokenPipe =>  std::process::exit(141),
            Err(ref err) =>  panic!("{}", err),
        };
    })
}

/// Like `write_to_stdout`, for diagnostics that must not mix with the results on stdout.
#[macro_export]
macro_rules! write_to_stderr {
    ($($arg:tt)*) => ({
        use std::io::Write;
        match write!(std::io::stderr(), $($arg)*) {
            Ok(()) => (),
            Err(ref err) if err.kind() == std::io::ErrorKind::BrokenPipe => std::process::exit(141),
            Err(ref err) => panic!("{}", err),
        };
    })
}

/// Implementation of log.
#[macro_export]
macro_rules! _log {
    ($verbosity:expr, $level:expr, $($arg:tt)*) => {
        if $crate::config::ENABLE_LOGGING && $level <= $verbosity
        {
            $crate::write_to_stdout!($($arg)*);
            $crate::write_to_stdout!("\n");
        }
    }
}

/// Print a formatted message if the `verbosity` of the first argument is at least `$level`.
#[macro_export]
macro_rules! log {
    ($holder:expr, $level:expr, $($arg:tt)*) => {
        $crate::_log!($holder.verbosity, $level, $($arg)*)
    };
}

/// Print to stderr with yellow font color.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => ({
        let style = $crate::output::warning_style();
        $crate::write_to_stderr!("{}", style.paint("Warning: "));
        $crate::write_to_stderr!("{}\n", style.paint(&format!($($arg)*)));
    })
}

/// Report a fatal error on stderr and exit with code 2.
#[macro_export]
macro_rules! die {
    ($($arg:tt)*) => ({
        let style = $crate::output::error_style();
        $crate::write_to_stderr!("{}", style.paint("Error: "));
        $crate::write_to_stderr!("{}\n", style.paint(&format!($($arg)*)));
        std::process::exit(2);
    })
}

/// Native assertions cannot be disabled, that's why we prefer to use this
/// macro.
#[macro_export]
macro_rules! invariant {
    ($($arg:tt)*) => ({
        if $crate::config::CHECK_INVARIANTS {
            assert!($($arg)*);
        }
    })
}

/// Like invariant, but for preconditions.
#[macro_export]
macro_rules! requires {
    ($($arg:tt)*) => ({
        if $crate::config::CHECK_PRECONDITIONS {
            assert!($($arg)*);
        }
    })
}

/// Print to stdout, prefixed by "c ".
#[macro_export]
macro_rules! comment {
    ($($arg:tt)*) => ({
        $crate::write_to_stdout!("c ");
        $crate::write_to_stdout!($($arg)*);
        $crate::write_to_stdout!("\n");
    })
}

#[cfg(test)]
mod tests {
    #[test]
    fn diagnostics_are_written() {
        warn!("{} of {} runs have no result file", 1, 2);
        write_to_stderr!("{}\n", "done");
        assert!(crate::output::warning_style().paint("x").to_string().contains('x'));
    }
}
