//! Running a solver over a corpus
//!
//! A solver is invoked as
//! `<solver> <instance> <results>/<name>.result [args...] [-rnd-seed=<seed>]`
//! and writes its verdict to the result file. Standard output goes to
//! `<results>/<name>.stdout`; standard error is discarded unless kept in
//! `<results>/<name>.stderr`.

use crate::{
    batch::{Checkpoint, Job, ProgressLog, RunBatch},
    config::CHECKPOINT_FILE,
    error::{Error, Result},
    output::Timer,
    results::BatchSummary,
};
use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

/// Settings shared by every run of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOptions {
    pub timeout: Duration,
    pub threads: usize,
    pub poll_period: Duration,
    /// Passed to the solver as `-rnd-seed=<seed>`
    pub solver_seed: Option<u64>,
    /// Seeds the order in which the runs are started
    pub shuffle_seed: Option<u64>,
    pub solver_args: Vec<String>,
    /// Keep standard error next to standard output
    pub keep_stderr: bool,
    pub verbosity: u64,
}

/// True for the file names the corpus consists of.
pub fn is_instance_name(name: &str) -> bool {
    name.ends_with(".cnf") || name.ends_with(".cnf.gz")
}

/// The instances in a directory, sorted by name.
pub fn instances_in(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut instances = Vec::new();
    for entry in fs::read_dir(directory).map_err(|err| Error::file(directory, err))? {
        let entry = entry.map_err(|err| Error::file(directory, err))?;
        if entry.file_name().to_str().map_or(false, is_instance_name) {
            instances.push(entry.path());
        }
    }
    instances.sort();
    Ok(instances)
}

/// The file the solver writes its verdict for `instance` to.
pub fn result_path(results_dir: &Path, instance: &Path) -> PathBuf {
    results_dir.join(with_suffix(instance, ".result"))
}

/// The file receiving the solver's standard output for `instance`.
pub fn stdout_path(results_dir: &Path, instance: &Path) -> PathBuf {
    results_dir.join(with_suffix(instance, ".stdout"))
}

pub fn stderr_path(results_dir: &Path, instance: &Path) -> PathBuf {
    results_dir.join(with_suffix(instance, ".stderr"))
}

fn with_suffix(instance: &Path, suffix: &str) -> OsString {
    let mut name = instance.file_name().map_or_else(OsString::new, |name| name.to_owned());
    name.push(suffix);
    name
}

/// The job that solves `instance`.
pub fn solver_command(
    solver: &Path,
    instance: &Path,
    results_dir: &Path,
    args: &[String],
    seed: Option<u64>,
) -> Job {
    let mut command = vec![
        solver.to_string_lossy().into_owned(),
        instance.to_string_lossy().into_owned(),
        result_path(results_dir, instance).to_string_lossy().into_owned(),
    ];
    command.extend(args.iter().cloned());
    if let Some(seed) = seed {
        command.push(format!("-rnd-seed={}", seed));
    }
    Job::with_stdout(command, stdout_path(results_dir, instance))
}

/// Where [benchmark_batch](fn.benchmark_batch.html) writes the summary of
/// a completed batch: next to the results directory, as `<results_dir>.json`.
pub fn summary_path(results_dir: &Path) -> PathBuf {
    let mut path = results_dir.as_os_str().to_owned();
    path.push(".json");
    PathBuf::from(path)
}

/// Solve each instance once.
///
/// `results_dir` must not exist yet. While the batch runs, the finished runs
/// are kept in `<results_dir>/partial.json`; the final summary is written to
/// `<results_dir>.json`.
pub fn benchmark_batch(
    solver: &Path,
    instances: &[PathBuf],
    results_dir: &Path,
    options: &BatchOptions,
) -> Result<BatchSummary> {
    let mut timer = Timer::name("benchmark batch");
    timer.disabled = options.verbosity == 0;
    fs::create_dir(results_dir).map_err(|err| Error::file(results_dir, err))?;
    let jobs = instances
        .iter()
        .map(|instance| {
            let job = solver_command(
                solver,
                instance,
                results_dir,
                &options.solver_args,
                options.solver_seed,
            );
            if options.keep_stderr {
                job.with_stderr(stderr_path(results_dir, instance))
            } else {
                job
            }
        })
        .collect();
    let mut batch = RunBatch::new(
        jobs,
        options.timeout,
        options.threads,
        options.poll_period,
        options.shuffle_seed,
    );
    batch.add_observer(ProgressLog {
        verbosity: options.verbosity,
    });
    batch.add_observer(Checkpoint {
        path: results_dir.join(CHECKPOINT_FILE),
    });
    batch.run()?;
    let summary = batch.into_summary();
    summary.to_file(&summary_path(results_dir))?;
    _log!(
        options.verbosity,
        1,
        "Total time: {:.3}h",
        timer.elapsed().as_secs_f64() / 3600.0
    );
    Ok(summary)
}
