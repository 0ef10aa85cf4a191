//! Error taxonomy shared by samplers, recorders, workloads and the orchestrator.
//!
//! Every failure is terminal for the current run: nothing in this crate
//! retries. [`Error::exit_code`] tells the CLI which status to exit with.

use std::path::PathBuf;

/// Errors produced while sampling, recording or driving a workload.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A sensor path, result file or workload executable does not exist.
    #[error("source unavailable: {}", path.display())]
    SourceUnavailable { path: PathBuf },

    /// A sensor file did not hold exactly one integer line.
    #[error("malformed source {}: {reason}", path.display())]
    MalformedSource { path: PathBuf, reason: String },

    /// The same core id was assigned twice in a pinned workload.
    #[error("core {core} is assigned more than once")]
    DuplicateAssignment { core: u32 },

    /// A workload process exited with a non-zero status.
    #[error("workload `{workload}` failed with exit status {code}")]
    WorkloadFailure { workload: String, code: i32 },

    /// The operator asked the run to stop.
    #[error("interrupted by user")]
    UserInterrupt,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn unavailable(path: impl Into<PathBuf>) -> Self {
        Self::SourceUnavailable { path: path.into() }
    }

    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedSource {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Process exit status that mirrors this failure.
    ///
    /// A failing workload propagates its own exit code; an interrupt is a
    /// clean shutdown.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::WorkloadFailure { code, .. } => *code,
            Self::UserInterrupt => 0,
            _ => 1,
        }
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
