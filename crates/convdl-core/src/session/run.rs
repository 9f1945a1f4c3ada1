use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn, Instrument};

use super::{Command, JobReport};
use crate::channel::ProgressChannel;
use crate::dispatch::{Dispatch, DownloadRequest, TransferProgress};
use crate::error::{DispatchError, JobError, PersistenceError, SubmitError};
use crate::job::{JobId, JobSnapshot, JobState, MediaFormat};
use crate::machine::DownloadStateMachine;
use crate::progress::{ProgressAggregator, ProgressSample, SampleSink};
use crate::share::ShareHandoff;
use crate::storage::{Artifact, ArtifactWriter};
use crate::url_model;

pub(super) struct SessionLoop {
    pub(super) machine: DownloadStateMachine,
    pub(super) aggregator: ProgressAggregator,
    pub(super) dispatcher: Arc<dyn Dispatch>,
    pub(super) share: Arc<dyn ShareHandoff>,
    pub(super) writer: ArtifactWriter,
    pub(super) commands: mpsc::Receiver<Command>,
    pub(super) samples: mpsc::Receiver<ProgressSample>,
    pub(super) sink: SampleSink,
    pub(super) status: watch::Sender<JobSnapshot>,
    pub(super) channel: Option<ProgressChannel>,
    pub(super) shutdown_requested: bool,
}

impl SessionLoop {
    pub(super) async fn run(mut self) {
        while !self.shutdown_requested {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Submit { url, format, reply }) => {
                        let report = self.run_job(url, format).await;
                        let _ = reply.send(report);
                    }
                    Some(Command::Shutdown) | None => break,
                },
                Some(_) = self.samples.recv() => {
                    // No job is active: the sample belongs to nothing.
                    tracing::trace!("out-of-band progress sample dropped");
                }
            }
        }
        if let Some(channel) = self.channel.take() {
            channel.close().await;
        }
        debug!("session stopped");
    }

    fn publish(&self) {
        self.status.send_replace(self.machine.snapshot());
    }

    fn advance(&mut self, to: JobState) {
        match self.machine.advance(to) {
            Ok(()) => self.publish(),
            Err(e) => error!("{}", e),
        }
    }

    fn observe(&mut self, sample: ProgressSample) {
        if self.aggregator.observe(sample) {
            self.machine.set_progress(self.aggregator.current());
            self.publish();
        }
    }

    fn refuse(&mut self, cmd: Command) {
        match cmd {
            Command::Submit { url, reply, .. } => {
                debug!(%url, "submission refused: job in progress");
                let _ = reply.send(Err(SubmitError::Busy));
            }
            Command::Shutdown => {
                debug!("shutdown requested; finishing current job first");
                self.shutdown_requested = true;
            }
        }
    }

    /// Wait for blocking work while still routing samples to the aggregator
    /// and refusing new submissions.
    async fn while_busy<T>(&mut self, mut work: JoinHandle<T>) -> Result<T, JoinError> {
        loop {
            tokio::select! {
                res = &mut work => return res,
                Some(sample) = self.samples.recv() => self.observe(sample),
                Some(cmd) = self.commands.recv() => self.refuse(cmd),
            }
        }
    }

    async fn run_job(&mut self, url: String, format: MediaFormat) -> Result<JobReport, SubmitError> {
        let job = self.machine.submit(&url, format)?;
        // Anything still queued arrived while no job was active.
        let mut stale = 0usize;
        while self.samples.try_recv().is_ok() {
            stale += 1;
        }
        if stale > 0 {
            debug!(job = %job, stale, "dropped out-of-band progress samples");
        }
        self.aggregator.reset(Some(job));
        self.publish();

        let span = tracing::info_span!("job", id = %job, format = %format);
        let outcome = self.drive(job, &url, format).instrument(span.clone()).await;

        let settled = match &outcome {
            Ok(artifact) => self.machine.succeed(artifact.clone()),
            Err(err) => self.machine.fail(err.clone()),
        };
        if let Err(e) = settled {
            error!("{}", e);
        }
        self.aggregator.reset(None);
        self.publish();

        match &outcome {
            Ok(artifact) => {
                info!(job = %job, path = %artifact.path.display(), bytes = artifact.byte_size, "download complete");
                self.offer(artifact).instrument(span).await;
            }
            Err(err @ JobError::Validation { .. }) => info!(job = %job, "rejected: {}", err),
            Err(err) => warn!(job = %job, kind = %err.kind(), "download failed: {}", err),
        }
        Ok(JobReport { job, outcome })
    }

    async fn drive(&mut self, job: JobId, url: &str, format: MediaFormat) -> Result<Artifact, JobError> {
        let url = url_model::validate(url)?;
        self.advance(JobState::Requesting);
        debug!(%url, "sending conversion request");

        let request = DownloadRequest { job, url, format };
        let dispatcher = Arc::clone(&self.dispatcher);
        let progress = TransferProgress::new(job, self.sink.clone());
        let call = tokio::task::spawn_blocking(move || dispatcher.dispatch(&request, &progress));
        self.advance(JobState::Downloading);

        let payload = match self.while_busy(call).await {
            Ok(res) => res?,
            Err(e) => {
                error!("dispatcher task failed: {}", e);
                return Err(DispatchError::Network(format!("dispatcher task failed: {}", e)).into());
            }
        };
        // Samples the transfer queued just before returning still count.
        while let Ok(sample) = self.samples.try_recv() {
            self.observe(sample);
        }
        debug!(bytes = payload.len(), content_type = ?payload.content_type, "response received");

        self.advance(JobState::Writing);
        let writer = self.writer.clone();
        let write = tokio::task::spawn_blocking(move || writer.persist(job, &payload.bytes, format));
        match self.while_busy(write).await {
            Ok(res) => Ok(res?),
            Err(e) => {
                let path = self.writer.canonical_path(format);
                error!(path = %path.display(), "writer task failed: {}", e);
                let io = std::io::Error::new(std::io::ErrorKind::Other, e.to_string());
                Err(PersistenceError::from_io(path, &io).into())
            }
        }
    }

    /// Offer the artifact to the share facility. Failures never affect the job.
    async fn offer(&self, artifact: &Artifact) {
        let share = Arc::clone(&self.share);
        let path = artifact.path.clone();
        match tokio::task::spawn_blocking(move || share.offer(&path)).await {
            Ok(Ok(())) => debug!("artifact handed to share"),
            Ok(Err(e)) => warn!("share hand-off failed: {}", e),
            Err(e) => warn!("share task failed: {}", e),
        }
    }
}
