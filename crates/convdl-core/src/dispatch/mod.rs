//! The conversion request: `POST /download {url, format}` → media bytes.
//!
//! `Dispatch` is the seam between the session loop and the transport. The
//! production implementation is `CurlDispatcher`; tests substitute their own.

mod classify;
mod http;

pub use self::classify::{classify_curl_error, classify_status};
pub use self::http::CurlDispatcher;

use std::cell::Cell;
use url::Url;

use crate::error::DispatchError;
use crate::job::{JobId, MediaFormat};
use crate::progress::{ProgressSample, SampleSink};

/// One conversion request, bound to the job that issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub job: JobId,
    pub url: Url,
    pub format: MediaFormat,
}

impl DownloadRequest {
    /// JSON body sent to the backend.
    pub fn body(&self) -> String {
        serde_json::json!({
            "url": self.url.as_str(),
            "format": self.format.as_str(),
        })
        .to_string()
    }
}

/// Response bytes of a successful request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl Payload {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Sends the conversion request and blocks until the whole body arrived.
///
/// Implementations run on the blocking pool. They report byte progress through
/// `progress` only when the response size is known.
pub trait Dispatch: Send + Sync + 'static {
    fn dispatch(
        &self,
        request: &DownloadRequest,
        progress: &TransferProgress,
    ) -> Result<Payload, DispatchError>;
}

/// Transfer-progress reporter handed to a dispatcher for one job.
pub struct TransferProgress {
    job: JobId,
    sink: Option<SampleSink>,
    last: Cell<Option<f64>>,
}

impl TransferProgress {
    pub(crate) fn new(job: JobId, sink: SampleSink) -> Self {
        Self {
            job,
            sink: Some(sink),
            last: Cell::new(None),
        }
    }

    /// Reporter that drops everything (for callers outside a session).
    pub fn detached(job: JobId) -> Self {
        Self {
            job,
            sink: None,
            last: Cell::new(None),
        }
    }

    pub fn job(&self) -> JobId {
        self.job
    }

    /// Report `received` of `total` bytes. Nothing is emitted when the total
    /// is unknown (0) or the fraction did not change.
    pub fn report(&self, received: u64, total: u64) {
        if total == 0 {
            return;
        }
        let fraction = (received as f64 / total as f64).min(1.0);
        if self.last.get() == Some(fraction) {
            return;
        }
        self.last.set(Some(fraction));
        if let Some(sink) = &self.sink {
            sink.send(ProgressSample::transfer(self.job, fraction));
        }
    }

    /// Last fraction reported, if any.
    pub fn last_reported(&self) -> Option<f64> {
        self.last.get()
    }
}
