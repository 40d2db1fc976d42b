//! A run of an external process with a wall-clock budget
//!
//! ```ignore
//! let mut run = ProcessRun::new(command, Duration::from_secs(1000));
//! run.start()?;
//! while run.check()? == RunState::Running {
//!     thread::sleep(poll_period);
//! }
//! ```
//!
//! A watcher thread blocks until the child exits but leaves it unreaped,
//! so the owner can always kill the child by pid without racing a reuse of
//! that pid. Only the owner reaps.

use crate::{
    error::{Error, Result},
    results::{RunRecord, RunResult},
};
use std::{
    fs::File,
    io,
    os::unix::process::ExitStatusExt,
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
    sync::{Arc, Mutex, PoisonError},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

/// Lifecycle of a [ProcessRun](struct.ProcessRun.html).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running,
    /// The process exited by itself.
    Completed,
    /// The process was killed after exceeding its budget.
    TimedOut,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        self == RunState::Completed || self == RunState::TimedOut
    }
}

/// Set by the watcher thread to the instant the child exited.
type ExitSignal = Arc<Mutex<Option<Instant>>>;

/// One supervised invocation of an external command.
#[derive(Debug)]
pub struct ProcessRun {
    command: Vec<String>,
    /// Where standard output goes; discarded if absent
    stdout: Option<PathBuf>,
    stderr: Option<PathBuf>,
    timeout: Duration,
    state: RunState,
    started: Option<Instant>,
    finished: Option<Instant>,
    return_code: Option<i32>,
    pid: Option<u32>,
    /// Present while the process is started but not reaped
    child: Option<Child>,
    watcher: Option<JoinHandle<()>>,
    exited: ExitSignal,
}

impl ProcessRun {
    /// Create a pending run. `command[0]` is the executable.
    pub fn new(command: Vec<String>, timeout: Duration) -> ProcessRun {
        requires!(!command.is_empty());
        ProcessRun {
            command,
            stdout: None,
            stderr: None,
            timeout,
            state: RunState::Pending,
            started: None,
            finished: None,
            return_code: None,
            pid: None,
            child: None,
            watcher: None,
            exited: Arc::new(Mutex::new(None)),
        }
    }

    /// Redirect standard output to a file (created or truncated on start).
    pub fn with_stdout(mut self, path: impl Into<PathBuf>) -> ProcessRun {
        self.stdout = Some(path.into());
        self
    }

    /// Redirect standard error to a file, like standard output.
    pub fn with_stderr(mut self, path: impl Into<PathBuf>) -> ProcessRun {
        self.stderr = Some(path.into());
        self
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }
    pub fn state(&self) -> RunState {
        self.state
    }
    /// The exit code, or the negated signal number if a signal ended the process.
    pub fn return_code(&self) -> Option<i32> {
        self.return_code
    }
    /// The operating system identifier of the process once started.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }
    /// True iff the run completed without timing out.
    pub fn completed(&self) -> bool {
        self.state == RunState::Completed
    }

    /// Total running time so far.
    pub fn elapsed(&self) -> Duration {
        match (self.started, self.finished) {
            (Some(started), Some(finished)) => finished.saturating_duration_since(started),
            (Some(started), None) => started.elapsed(),
            (None, _) => Duration::from_secs(0),
        }
    }

    /// Launch the command and return without waiting for it.
    pub fn start(&mut self) -> Result<()> {
        requires!(self.state == RunState::Pending);
        let stdout = redirection(self.stdout.as_deref())?;
        let stderr = redirection(self.stderr.as_deref())?;
        self.started = Some(Instant::now());
        let child = Command::new(&self.command[0])
            .args(&self.command[1..])
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(|source| Error::Spawn {
                command: self.command_line(),
                source,
            })?;
        let pid = child.id();
        let exited = Arc::clone(&self.exited);
        self.pid = Some(pid);
        self.child = Some(child);
        self.watcher = Some(thread::spawn(move || watch_for_exit(pid, exited)));
        self.state = RunState::Running;
        Ok(())
    }

    /// Poll for completion or timeout without blocking.
    ///
    /// On timeout the process is killed and reaped before this returns.
    pub fn check(&mut self) -> Result<RunState> {
        if self.state != RunState::Running {
            return Ok(self.state);
        }
        let exited = *self.exited.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(exited) = exited {
            let status = self.reap()?;
            self.finished = Some(exited);
            self.return_code = exit_code(status);
            self.state = RunState::Completed;
        } else if self.elapsed() > self.timeout {
            self.stop()?;
            self.finished = Some(Instant::now());
            self.state = RunState::TimedOut;
        }
        Ok(self.state)
    }

    /// Kill the process and wait for it.
    fn stop(&mut self) -> io::Result<ExitStatus> {
        if let Some(child) = self.child.as_mut() {
            match child.kill() {
                Ok(()) => (),
                // Already reaped.
                Err(ref err) if err.kind() == io::ErrorKind::InvalidInput => (),
                Err(err) => return Err(err),
            }
        }
        self.reap()
    }

    /// Collect the exit status of the process and join the watcher.
    fn reap(&mut self) -> io::Result<ExitStatus> {
        let status = match self.child.as_mut() {
            Some(child) => child.wait()?,
            None => return Err(io::Error::new(io::ErrorKind::Other, "process was not started")),
        };
        self.child = None;
        if let Some(watcher) = self.watcher.take() {
            let _ = watcher.join();
        }
        Ok(status)
    }

    /// The command strung together.
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }

    /// A table-appropriate description: solver, instance, output directory and extra arguments.
    pub fn tabname(&self, limit: usize) -> String {
        let word = |index: usize| self.command.get(index).map_or("", String::as_str);
        let solver = basename(word(0));
        let target: String = basename(word(1)).chars().take(40).collect();
        let outdir: String = Path::new(word(2))
            .parent()
            .map_or(String::new(), |dir| dir.to_string_lossy().chars().take(40).collect());
        let args = self.command.get(3..).map_or(String::new(), |args| args.join(" "));
        format!("{} {:<40} -> {:<30} | {}", solver, target, outdir, args)
            .chars()
            .take(limit)
            .collect()
    }

    /// The serializable outcome of this run.
    pub fn record(&self) -> RunRecord {
        RunRecord {
            command_line: self.command.clone(),
            elapsed_time: self.elapsed().as_secs_f64(),
            return_code: self.return_code,
            result: if self.completed() {
                RunResult::Ok
            } else {
                RunResult::Timeout
            },
        }
    }
}

impl Drop for ProcessRun {
    /// A run that is abandoned while its process is alive kills and reaps it.
    fn drop(&mut self) {
        if self.child.is_some() {
            let _ = self.stop();
        }
    }
}

fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map_or_else(|| path.to_string(), |name| name.to_string_lossy().into_owned())
}

/// A file created or truncated for an output stream, or nothing.
fn redirection(path: Option<&Path>) -> Result<Stdio> {
    match path {
        Some(path) => Ok(Stdio::from(File::create(path).map_err(|err| Error::file(path, err))?)),
        None => Ok(Stdio::null()),
    }
}

fn exit_code(status: ExitStatus) -> Option<i32> {
    status.code().or_else(|| status.signal().map(|signal| -signal))
}

/// Block until the child exits, without reaping it, and record when.
fn watch_for_exit(pid: u32, exited: ExitSignal) {
    loop {
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        let result = unsafe {
            libc::waitid(
                libc::P_PID,
                pid as libc::id_t,
                &mut info,
                libc::WEXITED | libc::WNOWAIT,
            )
        };
        if result == 0 {
            break;
        }
        if io::Error::last_os_error().kind() != io::ErrorKind::Interrupted {
            // The owner reaped it already.
            return;
        }
    }
    *exited.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
}
