//! The orchestrator: one tokio task that owns the state machine, the
//! aggregator and the push channel, and runs submitted jobs one at a time.
//!
//! All job state changes happen on that task. Transfer samples (from the
//! dispatcher on the blocking pool), channel samples (from the push worker)
//! and submissions (from any `Submitter`) are queued to it and handled in
//! arrival order.

mod run;

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::channel::{ChannelOptions, ProgressChannel};
use crate::config::ConvdlConfig;
use crate::dispatch::{CurlDispatcher, Dispatch};
use crate::error::{JobError, SubmitError};
use crate::job::{JobId, JobSnapshot, JobState, MediaFormat};
use crate::machine::DownloadStateMachine;
use crate::progress::{ProgressAggregator, SampleSink};
use crate::share::{NoShare, ShareHandoff, SystemShare};
use crate::storage::{Artifact, ArtifactWriter};

use self::run::SessionLoop;

const SAMPLE_QUEUE: usize = 256;
const COMMAND_QUEUE: usize = 8;

/// Final result of one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub job: JobId,
    pub outcome: Result<Artifact, JobError>,
}

impl JobReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Terminal state the job ended in.
    pub fn state(&self) -> JobState {
        match &self.outcome {
            Ok(_) => JobState::Success,
            Err(e) => JobState::Error(e.kind()),
        }
    }
}

enum Command {
    Submit {
        url: String,
        format: MediaFormat,
        reply: oneshot::Sender<Result<JobReport, SubmitError>>,
    },
    Shutdown,
}

/// Cloneable submission handle.
#[derive(Clone)]
pub struct Submitter {
    commands: mpsc::Sender<Command>,
}

impl Submitter {
    /// Submit a job and wait for it to finish. Rejected with `Busy` while
    /// another job is between submission and a terminal state.
    pub async fn submit(
        &self,
        url: impl Into<String>,
        format: MediaFormat,
    ) -> Result<JobReport, SubmitError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Submit {
                url: url.into(),
                format,
                reply,
            })
            .await
            .map_err(|_| SubmitError::SessionClosed)?;
        rx.await.map_err(|_| SubmitError::SessionClosed)?
    }
}

/// Owner's handle on a running session.
pub struct SessionHandle {
    submitter: Submitter,
    status: watch::Receiver<JobSnapshot>,
    feed: SampleSink,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub async fn submit(
        &self,
        url: impl Into<String>,
        format: MediaFormat,
    ) -> Result<JobReport, SubmitError> {
        self.submitter.submit(url, format).await
    }

    pub fn submitter(&self) -> Submitter {
        self.submitter.clone()
    }

    /// Follow job snapshots; a new value is published after every change.
    pub fn subscribe(&self) -> watch::Receiver<JobSnapshot> {
        self.status.clone()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.status.borrow().clone()
    }

    /// Sink for channel-sourced samples, the same queue the push channel feeds.
    pub fn channel_feed(&self) -> SampleSink {
        self.feed.clone()
    }

    /// Let the current job (if any) finish, release the push channel and stop.
    pub async fn shutdown(self) {
        let _ = self.submitter.commands.send(Command::Shutdown).await;
        if let Err(e) = self.task.await {
            tracing::warn!("session task ended abnormally: {}", e);
        }
    }
}

/// Wires collaborators into a session.
pub struct SessionBuilder {
    dispatcher: Arc<dyn Dispatch>,
    share: Arc<dyn ShareHandoff>,
    writer: ArtifactWriter,
    channel: Option<ChannelOptions>,
}

impl SessionBuilder {
    /// Minimal session: the given dispatcher, artifacts under `artifact_dir`,
    /// no sharing and no push channel.
    pub fn new(dispatcher: impl Dispatch, artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            share: Arc::new(NoShare),
            writer: ArtifactWriter::new(artifact_dir),
            channel: None,
        }
    }

    /// Production wiring from config: curl dispatcher, XDG artifact dir,
    /// system share and push channel as enabled.
    pub fn from_config(cfg: &ConvdlConfig) -> anyhow::Result<Self> {
        let mut b = Self::new(CurlDispatcher::from_config(cfg), cfg.resolve_artifact_dir()?);
        if cfg.share.enabled {
            b = b.share(SystemShare::from_config(&cfg.share));
        }
        if cfg.progress_channel.enabled {
            b = b.progress_channel(Some(ChannelOptions::from_config(cfg)));
        }
        Ok(b)
    }

    pub fn dispatcher(mut self, dispatcher: impl Dispatch) -> Self {
        self.dispatcher = Arc::new(dispatcher);
        self
    }

    pub fn share(mut self, share: impl ShareHandoff) -> Self {
        self.share = Arc::new(share);
        self
    }

    pub fn artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.writer = ArtifactWriter::new(dir);
        self
    }

    pub fn progress_channel(mut self, options: Option<ChannelOptions>) -> Self {
        self.channel = options;
        self
    }

    /// Open the push channel and start the session task. Must be called from
    /// within a tokio runtime.
    pub fn spawn(self) -> std::io::Result<SessionHandle> {
        let (sample_tx, samples) = mpsc::channel(SAMPLE_QUEUE);
        let sink = SampleSink::new(sample_tx);
        let channel = match self.channel {
            Some(opts) => Some(ProgressChannel::open(opts, sink.clone())?),
            None => None,
        };
        let (commands_tx, commands) = mpsc::channel(COMMAND_QUEUE);
        let (status_tx, status) = watch::channel(JobSnapshot::default());

        let session = SessionLoop {
            machine: DownloadStateMachine::new(),
            aggregator: ProgressAggregator::new(),
            dispatcher: self.dispatcher,
            share: self.share,
            writer: self.writer,
            commands,
            samples,
            sink: sink.clone(),
            status: status_tx,
            channel,
            shutdown_requested: false,
        };
        let task = tokio::spawn(session.run());
        tracing::debug!("session started");

        Ok(SessionHandle {
            submitter: Submitter {
                commands: commands_tx,
            },
            status,
            feed: sink,
            task,
        })
    }
}
