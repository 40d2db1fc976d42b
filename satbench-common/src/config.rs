//! Compile-time constants

/// Enable the verbosity-gated `log!()` output.
pub const ENABLE_LOGGING: bool = true;
/// Check the `requires!()` assertions at runtime (cheap).
pub const CHECK_PRECONDITIONS: bool = true;
/// Check the `invariant!()` assertions at runtime (cheap).
pub const CHECK_INVARIANTS: bool = true;

/// Return code of a solver that found a model.
pub const SAT_CODE: i32 = 10;
/// Return code of a solver that proved unsatisfiability.
pub const UNSAT_CODE: i32 = 20;

/// Wall-clock budget per solver run, in seconds.
pub const DEFAULT_TIMEOUT: f64 = 1000.0;
/// Number of solver processes running at the same time.
pub const DEFAULT_THREADS: usize = 2;
/// Seconds between two scans of the running processes.
pub const DEFAULT_POLL_PERIOD: f64 = 1.0;

/// Name of the checkpoint file inside a results directory.
pub const CHECKPOINT_FILE: &str = "partial.json";
/// Name of the file recording the repetitions of a campaign.
pub const CAMPAIGN_MANIFEST: &str = "campaign.json";
/// The verification report repeats its header after this many rows.
pub const REPORT_HEADER_EVERY: usize = 20;
