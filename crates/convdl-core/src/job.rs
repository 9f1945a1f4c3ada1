//! Job data model: output format, job identity, lifecycle states and the
//! snapshot published to the presentation layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ErrorKind, JobError};
use crate::progress::Progress;
use crate::storage::Artifact;

/// Output container requested from the conversion backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    #[default]
    Mp3,
    Mp4,
}

impl MediaFormat {
    /// Wire value and file extension (they are the same string).
    pub fn as_str(self) -> &'static str {
        match self {
            MediaFormat::Mp3 => "mp3",
            MediaFormat::Mp4 => "mp4",
        }
    }

    pub fn extension(self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown format {0:?} (expected mp3 or mp4)")]
pub struct UnknownFormat(pub String);

impl FromStr for MediaFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp3" => Ok(MediaFormat::Mp3),
            "mp4" => Ok(MediaFormat::Mp4),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

/// Identity of one submission. Allocated by the state machine; carried by the
/// request, transfer samples and the resulting artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of the single live job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
    #[default]
    Idle,
    Validating,
    Requesting,
    Downloading,
    Writing,
    Success,
    Error(ErrorKind),
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Success | JobState::Error(_))
    }

    /// Whether a new submission may start from this state.
    pub fn accepts_submission(self) -> bool {
        self == JobState::Idle || self.is_terminal()
    }

    /// The transition table. Terminal states only go back to `Idle`, and only
    /// on the next submission.
    pub fn can_advance_to(self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (Idle, Validating) => true,
            (Validating, Requesting) => true,
            (Validating, Error(ErrorKind::Validation)) => true,
            (Requesting, Downloading) => true,
            (Requesting | Downloading, Error(kind)) => kind.is_request_phase(),
            (Downloading, Writing) => true,
            (Writing, Success) => true,
            (Writing, Error(ErrorKind::Persistence)) => true,
            (Success | Error(_), Idle) => true,
            _ => false,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            JobState::Idle => "idle",
            JobState::Validating => "validating",
            JobState::Requesting => "requesting",
            JobState::Downloading => "downloading",
            JobState::Writing => "writing",
            JobState::Success => "success",
            JobState::Error(_) => "error",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Error(kind) => write!(f, "error ({})", kind),
            other => f.write_str(other.label()),
        }
    }
}

/// The one live job.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadJob {
    pub id: JobId,
    pub url: String,
    pub format: MediaFormat,
    pub state: JobState,
    pub progress: Progress,
    pub last_error: Option<JobError>,
}

impl DownloadJob {
    pub fn new(id: JobId, url: impl Into<String>, format: MediaFormat) -> Self {
        Self {
            id,
            url: url.into(),
            format,
            state: JobState::Idle,
            progress: Progress::Indeterminate,
            last_error: None,
        }
    }
}

/// What the presentation layer sees after every change.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobSnapshot {
    pub job: Option<JobId>,
    pub url: Option<String>,
    pub format: Option<MediaFormat>,
    pub state: JobState,
    pub progress: Progress,
    pub last_error: Option<JobError>,
    pub artifact: Option<Artifact>,
}

impl JobSnapshot {
    /// Busy while a job is between submission and a terminal state.
    pub fn is_busy(&self) -> bool {
        !self.state.accepts_submission()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parse_and_display() {
        assert_eq!("mp3".parse::<MediaFormat>().unwrap(), MediaFormat::Mp3);
        assert_eq!(" MP4 ".parse::<MediaFormat>().unwrap(), MediaFormat::Mp4);
        assert!("wav".parse::<MediaFormat>().is_err());
        assert_eq!(MediaFormat::Mp4.to_string(), "mp4");
        assert_eq!(MediaFormat::Mp3.extension(), "mp3");
    }

    #[test]
    fn format_serializes_lowercase() {
        let s = serde_json::to_string(&MediaFormat::Mp4).unwrap();
        assert_eq!(s, "\"mp4\"");
        let f: MediaFormat = serde_json::from_str("\"mp3\"").unwrap();
        assert_eq!(f, MediaFormat::Mp3);
    }

    #[test]
    fn happy_path_transitions_are_legal() {
        let path = [
            JobState::Idle,
            JobState::Validating,
            JobState::Requesting,
            JobState::Downloading,
            JobState::Writing,
            JobState::Success,
            JobState::Idle,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn skipped_transitions_are_illegal() {
        assert!(!JobState::Idle.can_advance_to(JobState::Requesting));
        assert!(!JobState::Validating.can_advance_to(JobState::Downloading));
        assert!(!JobState::Requesting.can_advance_to(JobState::Writing));
        assert!(!JobState::Downloading.can_advance_to(JobState::Success));
        assert!(!JobState::Success.can_advance_to(JobState::Validating));
        assert!(!JobState::Error(ErrorKind::Server).can_advance_to(JobState::Requesting));
    }

    #[test]
    fn error_kinds_match_phase() {
        assert!(JobState::Validating.can_advance_to(JobState::Error(ErrorKind::Validation)));
        assert!(!JobState::Validating.can_advance_to(JobState::Error(ErrorKind::Network)));
        assert!(JobState::Requesting.can_advance_to(JobState::Error(ErrorKind::Timeout)));
        assert!(JobState::Downloading.can_advance_to(JobState::Error(ErrorKind::Server)));
        assert!(!JobState::Downloading.can_advance_to(JobState::Error(ErrorKind::Persistence)));
        assert!(JobState::Writing.can_advance_to(JobState::Error(ErrorKind::Persistence)));
        assert!(!JobState::Writing.can_advance_to(JobState::Error(ErrorKind::Network)));
    }

    #[test]
    fn submission_gate() {
        assert!(JobState::Idle.accepts_submission());
        assert!(JobState::Success.accepts_submission());
        assert!(JobState::Error(ErrorKind::Timeout).accepts_submission());
        assert!(!JobState::Validating.accepts_submission());
        assert!(!JobState::Downloading.accepts_submission());
        assert!(!JobState::Writing.accepts_submission());
    }
}
