//! Workloads whose execution the orchestrator samples around.
//!
//! Every variant implements [`Workload`]: start it, poll it without
//! blocking, and drain it once it has exited. Process-backed workloads
//! capture stdout/stderr into anonymous temp files so a chatty child can
//! never stall on a full pipe while the control thread is sleeping.

pub mod command;
pub mod compute;
pub mod pinned;

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};

use crate::error::{Error, Result};

pub use command::ShellCommand;
pub use compute::{ComputeOutcome, MatrixMultiply, PERF_SCHEMA};
pub use pinned::{LivenessPolicy, PinnedConfig, PinnedSet, Pinning};

/// Thread-count variables set on every spawned benchmark process.
pub const THREAD_ENV_VARS: &[&str] = &["OMP_NUM_THREADS", "OPENBLAS_NUM_THREADS", "MKL_NUM_THREADS"];

/// Result of a non-blocking liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Running,
    Exited(i32),
}

/// Exit status and captured output of one finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub label: String,
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// A unit of work whose duration and thermal impact are measured.
pub trait Workload {
    /// Live state of one launch.
    type Handle;

    /// Human-readable description for logs and failure reports.
    fn describe(&self) -> String;

    /// How many times one repetition starts the workload.
    fn launches_per_repetition(&self) -> u64 {
        1
    }

    fn start(&mut self) -> Result<Self::Handle>;

    /// Non-blocking liveness check.
    fn poll(&mut self, handle: &mut Self::Handle) -> Result<Liveness>;

    /// Wait for every process of the launch and collect its output.
    fn drain(&mut self, handle: Self::Handle) -> Result<Vec<ProcessOutput>>;

    /// Called after a successful drain, before the next launch.
    fn finalize(&mut self) -> Result<()> {
        Ok(())
    }

    /// Tear down a launch that is still live.
    fn abort(&mut self, handle: Self::Handle) -> Result<()>;
}

/// Environment pairs pinning a child's math libraries to `threads` threads.
pub fn thread_env(threads: usize) -> Vec<(String, String)> {
    THREAD_ENV_VARS
        .iter()
        .map(|k| (k.to_string(), threads.to_string()))
        .collect()
}

// ---------------------------------------------------------------------------
// Captured child processes
// ---------------------------------------------------------------------------

/// A spawned child whose stdout/stderr go to unlinked temp files.
pub struct CapturedChild {
    label: String,
    child: Child,
    stdout: File,
    stderr: File,
    status: Option<i32>,
}

impl CapturedChild {
    pub(crate) fn spawn(mut command: Command, label: String) -> Result<Self> {
        let stdout = tempfile::tempfile()?;
        let stderr = tempfile::tempfile()?;
        command
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout.try_clone()?))
            .stderr(Stdio::from(stderr.try_clone()?));

        let child = command.spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::unavailable(PathBuf::from(command.get_program())),
            _ => Error::Io(e),
        })?;
        log::debug!("spawned pid {}: {label}", child.id());

        Ok(Self {
            label,
            child,
            stdout,
            stderr,
            status: None,
        })
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    /// `Some(code)` once the child has exited.
    pub(crate) fn try_exit(&mut self) -> Result<Option<i32>> {
        if self.status.is_none() {
            self.status = self.child.try_wait()?.map(exit_code);
        }
        Ok(self.status)
    }

    /// Block until exit and collect everything the child printed.
    pub(crate) fn wait_output(mut self) -> Result<ProcessOutput> {
        let code = match self.status {
            Some(code) => code,
            None => exit_code(self.child.wait()?),
        };
        Ok(ProcessOutput {
            code,
            stdout: read_back(&mut self.stdout)?,
            stderr: read_back(&mut self.stderr)?,
            label: self.label,
        })
    }

    /// Kill and reap. A child that already exited is only reaped.
    pub(crate) fn kill(mut self) -> Result<()> {
        if self.try_exit()?.is_none() {
            log::warn!("killing pid {}: {}", self.child.id(), self.label);
            match self.child.kill() {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::InvalidInput => {}
                Err(e) => return Err(e.into()),
            }
            self.child.wait()?;
        }
        Ok(())
    }
}

fn read_back(file: &mut File) -> Result<String> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Exit code, or `128 + signal` for a child killed by a signal.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
