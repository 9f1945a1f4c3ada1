//! Progress samples and their merge into one displayed fraction.
//!
//! Two sources report completion independently: the byte transfer of the
//! conversion request and the backend's push channel. Both produce
//! `ProgressSample`s that flow into a single `ProgressAggregator` owned by the
//! session loop.

mod aggregator;

pub use aggregator::ProgressAggregator;

use std::fmt;
use std::time::Instant;
use tokio::sync::mpsc;

use crate::job::JobId;

/// Where a sample came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleSource {
    /// bytes received / bytes expected of the conversion request.
    Transfer,
    /// `progress` event from the push channel.
    Channel,
}

/// One observed completion fraction. Consumed by the aggregator and discarded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    pub source: SampleSource,
    pub value: f64,
    /// Job the sample belongs to. Transfer samples always carry one; the push
    /// channel does not know about jobs.
    pub job: Option<JobId>,
    pub received_at: Instant,
}

impl ProgressSample {
    pub fn transfer(job: JobId, value: f64) -> Self {
        Self {
            source: SampleSource::Transfer,
            value,
            job: Some(job),
            received_at: Instant::now(),
        }
    }

    pub fn channel(value: f64) -> Self {
        Self {
            source: SampleSource::Channel,
            value,
            job: None,
            received_at: Instant::now(),
        }
    }
}

/// Displayed progress of the current job.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Progress {
    /// No sample yet; rendered as "preparing", not "0%".
    #[default]
    Indeterminate,
    Fraction(f64),
}

impl Progress {
    /// Fraction in [0, 1]; 0 when indeterminate.
    pub fn value(self) -> f64 {
        match self {
            Progress::Indeterminate => 0.0,
            Progress::Fraction(v) => v,
        }
    }

    /// Whole percent, rounded.
    pub fn percent(self) -> Option<u8> {
        match self {
            Progress::Indeterminate => None,
            Progress::Fraction(v) => Some((v * 100.0).round().clamp(0.0, 100.0) as u8),
        }
    }

    pub fn is_indeterminate(self) -> bool {
        matches!(self, Progress::Indeterminate)
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.percent() {
            None => f.write_str("preparing"),
            Some(p) => write!(f, "{}%", p),
        }
    }
}

/// Sending half of the session's sample queue, for channel-sourced samples.
///
/// Sends never block: when the queue is full the sample is dropped, since a
/// later one supersedes it anyway.
#[derive(Debug, Clone)]
pub struct SampleSink {
    tx: mpsc::Sender<ProgressSample>,
}

impl SampleSink {
    pub(crate) fn new(tx: mpsc::Sender<ProgressSample>) -> Self {
        Self { tx }
    }

    /// Emit a push-channel progress value.
    pub fn emit(&self, value: f64) {
        self.send(ProgressSample::channel(value));
    }

    pub(crate) fn send(&self, sample: ProgressSample) {
        if let Err(e) = self.tx.try_send(sample) {
            tracing::trace!("progress sample dropped: {}", e);
        }
    }

    /// True once the session loop has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
