//! Max-merge of transfer and channel samples into a monotone fraction.

use std::time::Instant;

use super::{Progress, ProgressSample, SampleSource};
use crate::job::JobId;

/// Keeps the latest value per source for the current job and reports the
/// larger of the two. The reported value never goes down until `reset`.
#[derive(Debug, Default)]
pub struct ProgressAggregator {
    job: Option<JobId>,
    /// Samples received before this instant predate the job and are dropped.
    started: Option<Instant>,
    transfer: Option<f64>,
    channel: Option<f64>,
    high_water: Option<f64>,
}

impl ProgressAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every retained sample and bind to `job` (None = between jobs).
    pub fn reset(&mut self, job: Option<JobId>) {
        *self = Self {
            job,
            started: Some(Instant::now()),
            ..Self::default()
        };
    }

    /// Record a sample. Returns true when the displayed value changed.
    pub fn observe(&mut self, sample: ProgressSample) -> bool {
        if !sample.value.is_finite() {
            tracing::trace!(?sample.source, "non-finite progress sample ignored");
            return false;
        }
        if self.started.map_or(false, |t| sample.received_at < t) {
            tracing::trace!(?sample.source, "sample from before job start ignored");
            return false;
        }
        if let (Some(tagged), Some(current)) = (sample.job, self.job) {
            if tagged != current {
                tracing::trace!(%tagged, %current, "stale transfer sample ignored");
                return false;
            }
        }
        let value = sample.value.clamp(0.0, 1.0);
        match sample.source {
            SampleSource::Transfer => self.transfer = Some(value),
            SampleSource::Channel => self.channel = Some(value),
        }

        let before = self.high_water;
        let latest = match (self.transfer, self.channel) {
            (Some(a), Some(b)) => a.max(b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => return false,
        };
        self.high_water = Some(before.map_or(latest, |hw| hw.max(latest)));
        self.high_water != before
    }

    pub fn current(&self) -> Progress {
        match self.high_water {
            None => Progress::Indeterminate,
            Some(v) => Progress::Fraction(v),
        }
    }

    /// Latest raw value from one source, if any was seen since the last reset.
    pub fn latest(&self, source: SampleSource) -> Option<f64> {
        match source {
            SampleSource::Transfer => self.transfer,
            SampleSource::Channel => self.channel,
        }
    }
}
