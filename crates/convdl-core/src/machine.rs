//! Lifecycle of the single live job.
//!
//! Pure bookkeeping: no I/O and no async. The session loop drives it and
//! publishes its snapshots.

use crate::error::{InvalidTransition, JobError, SubmitError};
use crate::job::{DownloadJob, JobId, JobSnapshot, JobState, MediaFormat};
use crate::progress::Progress;
use crate::storage::Artifact;

#[derive(Debug, Default)]
pub struct DownloadStateMachine {
    next_id: u64,
    job: Option<DownloadJob>,
    artifact: Option<Artifact>,
}

impl DownloadStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> JobState {
        self.job.as_ref().map_or(JobState::Idle, |j| j.state)
    }

    pub fn job(&self) -> Option<&DownloadJob> {
        self.job.as_ref()
    }

    /// Start a new job in `Validating`. Rejected while the current job is not
    /// terminal; a terminal job passes through `Idle` first.
    pub fn submit(&mut self, url: &str, format: MediaFormat) -> Result<JobId, SubmitError> {
        let state = self.state();
        if !state.accepts_submission() {
            return Err(SubmitError::Busy);
        }
        if state.is_terminal() {
            tracing::debug!(from = %state, "job state -> idle");
        }
        self.next_id += 1;
        let id = JobId(self.next_id);
        let mut job = DownloadJob::new(id, url, format);
        job.state = JobState::Validating;
        self.job = Some(job);
        self.artifact = None;
        tracing::debug!(job = %id, "job state idle -> validating");
        Ok(id)
    }

    /// Move the current job to `to`.
    pub fn advance(&mut self, to: JobState) -> Result<(), InvalidTransition> {
        let from = self.state();
        let job = match self.job.as_mut() {
            Some(j) if from.can_advance_to(to) => j,
            _ => return Err(InvalidTransition { from, to }),
        };
        job.state = to;
        if to.is_terminal() {
            job.progress = Progress::Indeterminate;
        }
        tracing::debug!(job = %job.id, %from, %to, "job state change");
        Ok(())
    }

    /// End the current job with `err`.
    pub fn fail(&mut self, err: JobError) -> Result<(), InvalidTransition> {
        self.advance(JobState::Error(err.kind()))?;
        if let Some(job) = self.job.as_mut() {
            job.last_error = Some(err);
        }
        Ok(())
    }

    /// End the current job successfully with its persisted artifact.
    pub fn succeed(&mut self, artifact: Artifact) -> Result<(), InvalidTransition> {
        self.advance(JobState::Success)?;
        self.artifact = Some(artifact);
        Ok(())
    }

    /// Update displayed progress. Ignored outside the active phases.
    pub fn set_progress(&mut self, progress: Progress) {
        if let Some(job) = self.job.as_mut() {
            if !job.state.is_terminal() {
                job.progress = progress;
            }
        }
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        match &self.job {
            None => JobSnapshot::default(),
            Some(job) => JobSnapshot {
                job: Some(job.id),
                url: Some(job.url.clone()),
                format: Some(job.format),
                state: job.state,
                progress: job.progress,
                last_error: job.last_error.clone(),
                artifact: self.artifact.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DispatchError, ErrorKind};
    use std::path::PathBuf;

    fn artifact(job: JobId) -> Artifact {
        Artifact {
            job,
            path: PathBuf::from("/tmp/downloaded-file.mp4"),
            format: MediaFormat::Mp4,
            byte_size: 3,
        }
    }

    #[test]
    fn full_success_cycle() {
        let mut m = DownloadStateMachine::new();
        assert_eq!(m.state(), JobState::Idle);
        let id = m.submit("https://youtu.be/abc123", MediaFormat::Mp4).unwrap();
        assert_eq!(m.state(), JobState::Validating);
        m.advance(JobState::Requesting).unwrap();
        m.advance(JobState::Downloading).unwrap();
        m.set_progress(Progress::Fraction(0.5));
        assert_eq!(m.snapshot().progress, Progress::Fraction(0.5));
        m.advance(JobState::Writing).unwrap();
        m.succeed(artifact(id)).unwrap();
        let snap = m.snapshot();
        assert_eq!(snap.state, JobState::Success);
        assert_eq!(snap.progress, Progress::Indeterminate);
        assert_eq!(snap.artifact.unwrap().job, id);
    }

    #[test]
    fn second_submission_rejected_while_active() {
        let mut m = DownloadStateMachine::new();
        m.submit("https://a.example/x", MediaFormat::Mp3).unwrap();
        m.advance(JobState::Requesting).unwrap();
        assert_eq!(
            m.submit("https://b.example/y", MediaFormat::Mp3),
            Err(SubmitError::Busy)
        );
        assert_eq!(m.job().unwrap().url, "https://a.example/x");
    }

    #[test]
    fn terminal_job_allows_resubmission_with_fresh_id() {
        let mut m = DownloadStateMachine::new();
        let first = m.submit("https://a.example/x", MediaFormat::Mp3).unwrap();
        m.advance(JobState::Requesting).unwrap();
        m.fail(DispatchError::Network("refused".into()).into()).unwrap();
        assert_eq!(m.state(), JobState::Error(ErrorKind::Network));
        let second = m.submit("https://a.example/x", MediaFormat::Mp3).unwrap();
        assert!(second > first);
        assert_eq!(m.state(), JobState::Validating);
        assert!(m.job().unwrap().last_error.is_none());
    }

    #[test]
    fn failure_records_error_and_resets_progress() {
        let mut m = DownloadStateMachine::new();
        m.submit("https://youtu.be/abc123", MediaFormat::Mp3).unwrap();
        m.advance(JobState::Requesting).unwrap();
        m.advance(JobState::Downloading).unwrap();
        m.set_progress(Progress::Fraction(0.7));
        let err: JobError = DispatchError::Server {
            status: 500,
            message: None,
        }
        .into();
        m.fail(err.clone()).unwrap();
        let snap = m.snapshot();
        assert_eq!(snap.state, JobState::Error(ErrorKind::Server));
        assert_eq!(snap.progress.value(), 0.0);
        assert_eq!(snap.last_error, Some(err));
        assert!(snap.artifact.is_none());
    }

    #[test]
    fn skipping_a_state_is_rejected() {
        let mut m = DownloadStateMachine::new();
        assert!(m.advance(JobState::Validating).is_err());
        m.submit("https://youtu.be/abc123", MediaFormat::Mp3).unwrap();
        let err = m.advance(JobState::Writing).unwrap_err();
        assert_eq!(err.from, JobState::Validating);
        assert_eq!(err.to, JobState::Writing);
        assert!(m
            .fail(DispatchError::Timeout("slow".into()).into())
            .is_err());
        assert_eq!(m.state(), JobState::Validating);
    }

    #[test]
    fn progress_ignored_after_terminal() {
        let mut m = DownloadStateMachine::new();
        m.submit("nope", MediaFormat::Mp3).unwrap();
        m.fail(JobError::Validation {
            url: "nope".into(),
            reason: "relative URL".into(),
        })
        .unwrap();
        m.set_progress(Progress::Fraction(0.4));
        assert_eq!(m.snapshot().progress, Progress::Indeterminate);
    }
}
