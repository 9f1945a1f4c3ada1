//! Push channel: the backend's always-on `progress` event stream.
//!
//! The channel is opened once when a session starts, independent of any job,
//! and released when the session shuts down. It feeds channel samples into the
//! session's sample queue. Connection problems stay inside this module: they
//! are logged, the worker re-handshakes after the configured delay, and the
//! running job never sees them.

mod packet;
mod poll;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::ConvdlConfig;
use crate::progress::SampleSink;

/// Where and how to reach the push endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOptions {
    /// Full polling endpoint, e.g. `http://127.0.0.1:5000/socket.io/`.
    pub endpoint: String,
    pub connect_timeout: Duration,
    pub poll_timeout: Duration,
    /// `None` = do not reconnect after losing the link.
    pub reconnect_delay: Option<Duration>,
}

impl ChannelOptions {
    pub fn new(server_url: &str, path: &str) -> Self {
        let path = path.trim_start_matches('/');
        Self {
            endpoint: format!("{}/{}", server_url.trim_end_matches('/'), path),
            connect_timeout: Duration::from_secs(30),
            poll_timeout: Duration::from_secs(60),
            reconnect_delay: Some(Duration::from_secs(5)),
        }
    }

    pub fn from_config(cfg: &ConvdlConfig) -> Self {
        let pc = &cfg.progress_channel;
        Self {
            connect_timeout: cfg.connect_timeout(),
            poll_timeout: Duration::from_secs(pc.poll_timeout_secs.max(1)),
            reconnect_delay: (pc.reconnect_delay_secs > 0)
                .then(|| Duration::from_secs(pc.reconnect_delay_secs)),
            ..Self::new(&cfg.server_url, &pc.path)
        }
    }
}

/// Owned handle on the push connection. Dropping it requests the worker to
/// stop; `close` additionally waits for the worker to exit.
pub struct ProgressChannel {
    stop: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ProgressChannel {
    /// Start the push worker. Samples go to `sink`.
    pub fn open(options: ChannelOptions, sink: SampleSink) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let connected = Arc::new(AtomicBool::new(false));
        tracing::debug!(endpoint = %options.endpoint, "opening push channel");
        let worker = {
            let stop = Arc::clone(&stop);
            let connected = Arc::clone(&connected);
            std::thread::Builder::new()
                .name("convdl-push".to_string())
                .spawn(move || poll::run(options, sink, stop, connected))?
        };
        Ok(Self {
            stop,
            connected,
            worker: Some(worker),
        })
    }

    /// True while a Socket.IO session is established.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Stop the worker and wait for it to exit.
    pub async fn close(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            match tokio::task::spawn_blocking(move || worker.join()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => tracing::warn!("push channel worker panicked"),
                Err(e) => tracing::warn!("push channel join failed: {}", e),
            }
        }
        tracing::debug!("push channel closed");
    }
}

impl Drop for ProgressChannel {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}
