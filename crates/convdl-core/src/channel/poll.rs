//! Engine.IO long-polling over libcurl, run on a dedicated OS thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::packet::{decode_payload, decode_socket, progress_value, EnginePacket, Handshake, SocketPacket};
use super::ChannelOptions;
use crate::progress::SampleSink;

#[derive(Debug, thiserror::Error)]
pub(crate) enum TransportError {
    #[error("{0}")]
    Curl(#[from] curl::Error),
    #[error("HTTP {0}")]
    Http(u32),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("stopped")]
    Stopped,
}

/// One polling session's HTTP plumbing.
struct PollingTransport<'a> {
    opts: &'a ChannelOptions,
    stop: &'a AtomicBool,
    sid: Option<String>,
    counter: u64,
}

impl<'a> PollingTransport<'a> {
    fn new(opts: &'a ChannelOptions, stop: &'a AtomicBool) -> Self {
        Self {
            opts,
            stop,
            sid: None,
            counter: 0,
        }
    }

    fn url(&mut self) -> String {
        self.counter += 1;
        let mut u = format!(
            "{}?EIO=4&transport=polling&t={}",
            self.opts.endpoint, self.counter
        );
        if let Some(sid) = &self.sid {
            u.push_str("&sid=");
            u.push_str(sid);
        }
        u
    }

    fn request(&mut self, body: Option<&str>) -> Result<String, TransportError> {
        let url = self.url();
        let stop = self.stop;
        let mut data: Vec<u8> = Vec::new();

        let mut easy = curl::easy::Easy::new();
        easy.url(&url)?;
        easy.connect_timeout(self.opts.connect_timeout)?;
        easy.timeout(self.opts.poll_timeout)?;
        easy.progress(true)?;
        if let Some(b) = body {
            easy.post(true)?;
            easy.post_fields_copy(b.as_bytes())?;
            let mut list = curl::easy::List::new();
            list.append("Content-Type: text/plain;charset=UTF-8")?;
            easy.http_headers(list)?;
        }

        {
            let mut transfer = easy.transfer();
            transfer.write_function(|chunk| {
                data.extend_from_slice(chunk);
                Ok(chunk.len())
            })?;
            // Returning false aborts the transfer so `close` never waits on a long poll.
            transfer.progress_function(|_, _, _, _| !stop.load(Ordering::Relaxed))?;
            if let Err(e) = transfer.perform() {
                if e.is_aborted_by_callback() {
                    return Err(TransportError::Stopped);
                }
                return Err(e.into());
            }
        }

        let code = easy.response_code()?;
        if !(200..300).contains(&code) {
            return Err(TransportError::Http(code));
        }
        String::from_utf8(data).map_err(|e| TransportError::Protocol(format!("non-UTF-8 payload: {}", e)))
    }

    fn get(&mut self) -> Result<String, TransportError> {
        self.request(None)
    }

    fn post(&mut self, body: &str) -> Result<(), TransportError> {
        self.request(Some(body)).map(|_| ())
    }
}

/// Handshake, join the default namespace, then poll until the server closes
/// the session, the transport fails, or a stop is requested.
fn run_session(
    opts: &ChannelOptions,
    stop: &AtomicBool,
    connected: &AtomicBool,
    sink: &SampleSink,
) -> Result<(), TransportError> {
    let mut transport = PollingTransport::new(opts, stop);

    let open = transport.get()?;
    let handshake = decode_payload(&open)
        .into_iter()
        .find_map(|p| match p {
            EnginePacket::Open(json) => Handshake::parse(json),
            _ => None,
        })
        .ok_or_else(|| TransportError::Protocol(format!("expected open packet, got {:?}", open)))?;
    tracing::debug!(sid = %handshake.sid, ping_interval_ms = handshake.ping_interval, "push channel handshake");
    transport.sid = Some(handshake.sid);
    transport.post("40")?;

    loop {
        if stop.load(Ordering::Relaxed) || sink.is_closed() {
            return Err(TransportError::Stopped);
        }
        let body = transport.get()?;
        for packet in decode_payload(&body) {
            match packet {
                EnginePacket::Ping(data) => transport.post(&format!("3{}", data))?,
                EnginePacket::Close => return Ok(()),
                EnginePacket::Message(msg) => match decode_socket(msg) {
                    Some(SocketPacket::Connect) => {
                        connected.store(true, Ordering::Relaxed);
                        tracing::info!(endpoint = %opts.endpoint, "push channel connected");
                    }
                    Some(SocketPacket::Disconnect) => return Ok(()),
                    Some(SocketPacket::ConnectError(reason)) => {
                        return Err(TransportError::Protocol(format!("connect refused: {}", reason)))
                    }
                    Some(ref event @ SocketPacket::Event { .. }) => {
                        if let Some(v) = progress_value(event) {
                            tracing::trace!(value = v, "push progress");
                            sink.emit(v);
                        }
                    }
                    Some(SocketPacket::Other) | None => {}
                },
                EnginePacket::Open(_) | EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => {}
            }
        }
    }
}

/// Sleep up to `d`, waking early when a stop is requested.
fn pause(d: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + d;
    while !stop.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep((deadline - now).min(Duration::from_millis(100)));
    }
}

/// Worker body: keep a session alive until stopped. Failures are logged and
/// never reach the job.
pub(crate) fn run(opts: ChannelOptions, sink: SampleSink, stop: Arc<AtomicBool>, connected: Arc<AtomicBool>) {
    loop {
        let result = run_session(&opts, &stop, &connected, &sink);
        connected.store(false, Ordering::Relaxed);
        match result {
            Err(TransportError::Stopped) => break,
            Ok(()) => tracing::info!(endpoint = %opts.endpoint, "push channel closed by server"),
            Err(e) => tracing::warn!(endpoint = %opts.endpoint, "push channel lost: {}", e),
        }
        if stop.load(Ordering::Relaxed) || sink.is_closed() {
            break;
        }
        match opts.reconnect_delay {
            Some(d) => pause(d, &stop),
            None => {
                tracing::warn!("push channel reconnect disabled; progress falls back to transfer samples");
                break;
            }
        }
    }
    tracing::debug!("push channel worker exiting");
}
