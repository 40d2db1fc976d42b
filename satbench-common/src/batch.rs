//! A batch of timed runs with a bounded number of concurrent processes

use crate::{
    error::Result,
    results::BatchSummary,
    timedrun::{ProcessRun, RunState},
};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::{
    path::PathBuf,
    thread,
    time::Duration,
};

/// A command to run, with optional files receiving its standard output and
/// standard error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub command: Vec<String>,
    pub stdout: Option<PathBuf>,
    pub stderr: Option<PathBuf>,
}

impl Job {
    pub fn new(command: Vec<String>) -> Job {
        Job {
            command,
            stdout: None,
            stderr: None,
        }
    }
    pub fn with_stdout(command: Vec<String>, stdout: impl Into<PathBuf>) -> Job {
        Job {
            command,
            stdout: Some(stdout.into()),
            stderr: None,
        }
    }
    pub fn with_stderr(mut self, stderr: impl Into<PathBuf>) -> Job {
        self.stderr = Some(stderr.into());
        self
    }
}

/// Receives the transitions of the runs of a batch.
pub trait BatchObserver {
    /// Called after a run was started.
    fn on_start(&mut self, _run: &ProcessRun) -> Result<()> {
        Ok(())
    }
    /// Called after a run reached a terminal state. `summary` holds every
    /// finished run so far, including this one.
    fn on_done(&mut self, run: &ProcessRun, summary: &BatchSummary, total: usize) -> Result<()>;
}

/// Prints a line for each finished run.
pub struct ProgressLog {
    pub verbosity: u64,
}

impl BatchObserver for ProgressLog {
    fn on_done(&mut self, run: &ProcessRun, summary: &BatchSummary, total: usize) -> Result<()> {
        let when = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let outcome = match run.return_code() {
            Some(code) if run.completed() => code.to_string(),
            _ => "TIMEOUT".to_string(),
        };
        log!(
            self,
            1,
            "{} {:<120} {:>7} in {:8.2} s. {:>3}/{:>3} done",
            when,
            run.tabname(160),
            outcome,
            run.elapsed().as_secs_f64(),
            summary.runs.len(),
            total
        );
        Ok(())
    }
}

/// Rewrites the summary of the finished runs to a file after each completion.
pub struct Checkpoint {
    pub path: PathBuf,
}

impl BatchObserver for Checkpoint {
    fn on_done(&mut self, _run: &ProcessRun, summary: &BatchSummary, _total: usize) -> Result<()> {
        summary.to_file(&self.path)
    }
}

/// Runs a list of jobs, at most `threads` at a time.
///
/// The jobs are shuffled once and then started in that order. Finished runs
/// are recorded in completion order.
pub struct RunBatch<'a> {
    jobs: Vec<Job>,
    timeout: Duration,
    threads: usize,
    poll_period: Duration,
    /// Index in `jobs` of the next job to start
    next: usize,
    underway: Vec<ProcessRun>,
    done: BatchSummary,
    observers: Vec<Box<dyn BatchObserver + 'a>>,
}

impl<'a> RunBatch<'a> {
    /// Create a batch; the order of `jobs` is randomized by `seed`, or by
    /// entropy if no seed is given.
    pub fn new(
        mut jobs: Vec<Job>,
        timeout: Duration,
        threads: usize,
        poll_period: Duration,
        seed: Option<u64>,
    ) -> RunBatch<'a> {
        requires!(threads > 0);
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        jobs.shuffle(&mut rng);
        RunBatch {
            jobs,
            timeout,
            threads,
            poll_period,
            next: 0,
            underway: Vec::new(),
            done: BatchSummary::new(timeout.as_secs_f64()),
            observers: Vec::new(),
        }
    }

    pub fn add_observer(&mut self, observer: impl BatchObserver + 'a) {
        self.observers.push(Box::new(observer));
    }

    /// The jobs, in the order they are started.
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn into_summary(self) -> BatchSummary {
        self.done
    }

    /// Run every job to completion or timeout.
    pub fn run(&mut self) -> Result<&BatchSummary> {
        while self.done.runs.len() != self.jobs.len() {
            self.collect_finished()?;
            self.start_available()?;
            if self.done.runs.len() == self.jobs.len() {
                break;
            }
            thread::sleep(self.poll_period);
        }
        invariant!(self.underway.is_empty());
        Ok(&self.done)
    }

    /// Move the runs that reached a terminal state to the finished runs.
    fn collect_finished(&mut self) -> Result<()> {
        let mut still_running = Vec::with_capacity(self.underway.len());
        for mut run in std::mem::replace(&mut self.underway, Vec::new()) {
            if run.check()? == RunState::Running {
                still_running.push(run);
                continue;
            }
            self.done.runs.push(run.record());
            for observer in &mut self.observers {
                observer.on_done(&run, &self.done, self.jobs.len())?;
            }
        }
        self.underway = still_running;
        Ok(())
    }

    /// Start jobs while there are free slots.
    fn start_available(&mut self) -> Result<()> {
        while self.underway.len() < self.threads && self.next < self.jobs.len() {
            let job = &self.jobs[self.next];
            let mut run = ProcessRun::new(job.command.clone(), self.timeout);
            if let Some(stdout) = &job.stdout {
                run = run.with_stdout(stdout);
            }
            if let Some(stderr) = &job.stderr {
                run = run.with_stderr(stderr);
            }
            run.start()?;
            self.next += 1;
            for observer in &mut self.observers {
                observer.on_start(&run)?;
            }
            self.underway.push(run);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{RunRecord, RunResult};
    use std::{cell::RefCell, collections::HashSet, rc::Rc};

    fn records_for<'s>(summary: &'s BatchSummary, command: &'s [String]) -> impl Iterator<Item = &'s RunRecord> {
        summary
            .runs
            .iter()
            .filter(move |record| record.command_line.as_slice() == command)
    }

    fn quick_jobs(count: usize) -> Vec<Job> {
        (0..count)
            .map(|i| {
                Job::new(vec![
                    "sh".to_string(),
                    "-c".to_string(),
                    "exit 10".to_string(),
                    format!("job{}", i),
                ])
            })
            .collect()
    }

    /// Tracks the largest number of runs observed in flight.
    struct Concurrency {
        running: usize,
        peak: Rc<RefCell<usize>>,
    }

    impl BatchObserver for Concurrency {
        fn on_start(&mut self, _run: &ProcessRun) -> Result<()> {
            self.running += 1;
            let mut peak = self.peak.borrow_mut();
            *peak = (*peak).max(self.running);
            Ok(())
        }
        fn on_done(&mut self, _run: &ProcessRun, _summary: &BatchSummary, _total: usize) -> Result<()> {
            self.running -= 1;
            Ok(())
        }
    }

    #[test]
    fn all_jobs_finish() {
        let jobs = quick_jobs(5);
        let mut batch = RunBatch::new(jobs.clone(), Duration::from_secs(10), 2, Duration::from_millis(10), Some(1));
        let peak = Rc::new(RefCell::new(0));
        batch.add_observer(Concurrency {
            running: 0,
            peak: Rc::clone(&peak),
        });
        let summary = batch.run().unwrap();
        assert_eq!(summary.runs.len(), 5);
        let commands: HashSet<&Vec<String>> = summary.runs.iter().map(|run| &run.command_line).collect();
        assert_eq!(commands.len(), 5);
        for job in &jobs {
            assert_eq!(records_for(summary, &job.command).count(), 1);
        }
        for run in &summary.runs {
            assert_eq!(run.result, RunResult::Ok);
            assert_eq!(run.return_code, Some(10));
        }
        assert!(*peak.borrow() <= 2);
        assert!(*peak.borrow() >= 1);
    }

    #[test]
    fn shuffle_is_seeded() {
        let order = |seed| {
            RunBatch::new(quick_jobs(8), Duration::from_secs(1), 1, Duration::from_millis(1), Some(seed))
                .jobs()
                .to_vec()
        };
        assert_eq!(order(7), order(7));
        let mut sorted = order(7);
        sorted.sort_by(|a, b| a.command.cmp(&b.command));
        assert_eq!(sorted, quick_jobs(8));
    }

    /// Reads the checkpoint back after each completion.
    struct CheckpointReader {
        path: PathBuf,
        reads: Rc<RefCell<usize>>,
    }

    impl BatchObserver for CheckpointReader {
        fn on_done(&mut self, _run: &ProcessRun, summary: &BatchSummary, _total: usize) -> Result<()> {
            let saved = BatchSummary::from_file(&self.path)?;
            assert_eq!(saved.runs.len(), summary.runs.len());
            assert_eq!(&saved, summary);
            *self.reads.borrow_mut() += 1;
            Ok(())
        }
    }

    #[test]
    fn checkpoints_and_timeouts() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = dir.path().join("partial.json");
        let mut jobs = quick_jobs(2);
        jobs.push(Job::with_stdout(
            vec!["sleep".to_string(), "10".to_string()],
            dir.path().join("sleep.stdout"),
        ));
        let mut batch = RunBatch::new(jobs, Duration::from_millis(500), 3, Duration::from_millis(20), None);
        batch.add_observer(Checkpoint {
            path: checkpoint.clone(),
        });
        let reads = Rc::new(RefCell::new(0));
        batch.add_observer(CheckpointReader {
            path: checkpoint.clone(),
            reads: Rc::clone(&reads),
        });
        batch.add_observer(ProgressLog { verbosity: 0 });
        let summary = batch.run().unwrap().clone();
        assert_eq!(*reads.borrow(), 3);
        // The sleeper is the last to finish.
        let last = summary.runs.last().unwrap();
        assert_eq!(last.command_line[0], "sleep");
        assert_eq!(last.result, RunResult::Timeout);
        assert_eq!(last.return_code, None);
        assert!(last.elapsed_time >= 0.5);
        assert!(dir.path().join("sleep.stdout").exists());
        let saved = BatchSummary::from_file(&checkpoint).unwrap();
        assert_eq!(saved, summary);
        assert_eq!(saved.timeout, 0.5);
    }

    #[test]
    fn spawn_errors_abort_the_batch() {
        let jobs = vec![Job::new(vec!["/nonexistent/solver".to_string()])];
        let mut batch = RunBatch::new(jobs, Duration::from_secs(1), 1, Duration::from_millis(1), Some(0));
        assert!(batch.run().is_err());
    }
}
