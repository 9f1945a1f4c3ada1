//! Error taxonomy for one job.
//!
//! Everything except `ShareError` ends the job in `JobState::Error`. Job errors
//! are `Clone` so they can travel inside published snapshots.

use std::fmt;
use std::path::PathBuf;

/// Discriminant carried by `JobState::Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed URL, caught before any network activity.
    Validation,
    /// Connection-level failure (DNS, refused, reset, ...).
    Network,
    /// Backend answered with a non-success status or broke the response contract.
    Server,
    /// No complete response within the configured deadline.
    Timeout,
    /// Local write of the artifact failed.
    Persistence,
}

impl ErrorKind {
    /// Kinds that can end the request phase (Requesting / Downloading).
    pub fn is_request_phase(self) -> bool {
        matches!(
            self,
            ErrorKind::Network | ErrorKind::Server | ErrorKind::Timeout
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Network => "network",
            ErrorKind::Server => "server",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Persistence => "persistence",
        };
        f.write_str(s)
    }
}

/// Failure of the conversion request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server returned HTTP {status}{}", .message.as_deref().map(|m| format!(": {}", m)).unwrap_or_default())]
    Server { status: u32, message: Option<String> },
    #[error("request timed out: {0}")]
    Timeout(String),
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::Network(_) => ErrorKind::Network,
            DispatchError::Server { .. } => ErrorKind::Server,
            DispatchError::Timeout(_) => ErrorKind::Timeout,
        }
    }
}

/// Failure to write the artifact to its canonical path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not write {}: {message}", .path.display())]
pub struct PersistenceError {
    pub path: PathBuf,
    pub io_kind: std::io::ErrorKind,
    pub message: String,
}

impl PersistenceError {
    pub fn from_io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self {
            path: path.into(),
            io_kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Terminal failure of a job.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("invalid URL {url:?}: {reason}")]
    Validation { url: String, reason: String },
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl JobError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            JobError::Validation { .. } => ErrorKind::Validation,
            JobError::Dispatch(e) => e.kind(),
            JobError::Persistence(_) => ErrorKind::Persistence,
        }
    }
}

/// Hand-off to the platform share facility failed. Logged and absorbed.
#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    #[error("could not launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}")]
    Exit { program: String, status: String },
    #[error("no share command configured for this platform")]
    Unsupported,
}

/// A submission that never became a job.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("a job is already in progress")]
    Busy,
    #[error("session is shut down")]
    SessionClosed,
}

/// Attempted a state change the lifecycle does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: crate::job::JobState,
    pub to: crate::job::JobState,
}
