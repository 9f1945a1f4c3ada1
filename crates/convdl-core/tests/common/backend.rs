//! Minimal conversion backend for integration tests.
//!
//! Serves `POST /download` with a canned response and the Engine.IO v4
//! long-polling endpoint under `/socket.io/`. Progress events configured in
//! `BackendOptions::progress` are queued on the push channel when a download
//! request arrives, before the response is written.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const SID: &str = "test-sid";

#[derive(Debug, Clone)]
pub struct BackendOptions {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    /// Wait this long before answering `/download`.
    pub delay: Duration,
    /// Values pushed as `progress` events when `/download` is hit.
    pub progress: Vec<f64>,
    /// Send `Content-Length` on `/download`; otherwise the body ends at close.
    pub content_length: bool,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            status: 200,
            content_type: "audio/mpeg",
            body: b"ID3\x04\x00fake mp3 payload".to_vec(),
            delay: Duration::ZERO,
            progress: Vec::new(),
            content_length: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
}

#[derive(Default)]
struct Shared {
    requests: Mutex<Vec<Recorded>>,
    outbox: Mutex<VecDeque<String>>,
    connected: AtomicBool,
}

/// Handle on a running backend. The server runs until the process exits.
pub struct Backend {
    pub url: String,
    shared: Arc<Shared>,
}

impl Backend {
    pub fn start(opts: BackendOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let shared = Arc::new(Shared::default());
        let opts = Arc::new(opts);
        {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                for stream in listener.incoming().flatten() {
                    let shared = Arc::clone(&shared);
                    let opts = Arc::clone(&opts);
                    thread::spawn(move || handle(stream, &opts, &shared));
                }
            });
        }
        Self {
            url: format!("http://127.0.0.1:{}", port),
            shared,
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.shared.requests.lock().unwrap().clone()
    }

    pub fn download_requests(&self) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == "/download")
            .collect()
    }

    /// Block until a client joined the Socket.IO namespace.
    pub fn wait_connected(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.shared.connected.load(Ordering::SeqCst) {
                return true;
            }
            thread::sleep(Duration::from_millis(20));
        }
        false
    }
}

/// URL that refuses connections: bind a port, then release it.
pub fn closed_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

fn handle(mut stream: TcpStream, opts: &BackendOptions, shared: &Shared) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some(req) = read_request(&mut stream) else {
        return;
    };
    shared.requests.lock().unwrap().push(req.clone());
    let (path, query) = req.path.split_once('?').unwrap_or((req.path.as_str(), ""));

    if path == "/download" && req.method == "POST" {
        {
            let mut outbox = shared.outbox.lock().unwrap();
            for v in &opts.progress {
                outbox.push_back(format!("42[\"progress\",{{\"progress\":{}}}]", v));
            }
        }
        thread::sleep(opts.delay);
        if opts.content_length {
            respond(&mut stream, opts.status, opts.content_type, &opts.body);
        } else {
            respond_until_close(&mut stream, opts.status, opts.content_type, &opts.body);
        }
        return;
    }

    if path == "/socket.io/" {
        let has_sid = query.split('&').any(|kv| kv.starts_with("sid="));
        match (req.method.as_str(), has_sid) {
            ("GET", false) => {
                let open = format!(
                    "0{{\"sid\":\"{}\",\"upgrades\":[],\"pingInterval\":25000,\"pingTimeout\":20000,\"maxPayload\":1000000}}",
                    SID
                );
                respond(&mut stream, 200, "text/plain; charset=UTF-8", open.as_bytes());
            }
            ("POST", true) => {
                if req.body.starts_with(b"40") {
                    shared
                        .outbox
                        .lock()
                        .unwrap()
                        .push_back(format!("40{{\"sid\":\"{}-socket\"}}", SID));
                    shared.connected.store(true, Ordering::SeqCst);
                }
                respond(&mut stream, 200, "text/html", b"ok");
            }
            ("GET", true) => {
                let deadline = Instant::now() + Duration::from_millis(300);
                let payload = loop {
                    let pending: Vec<String> = shared.outbox.lock().unwrap().drain(..).collect();
                    if !pending.is_empty() {
                        break pending.join("\u{1e}");
                    }
                    if Instant::now() >= deadline {
                        break "6".to_string();
                    }
                    thread::sleep(Duration::from_millis(20));
                };
                respond(&mut stream, 200, "text/plain; charset=UTF-8", payload.as_bytes());
            }
            _ => respond(&mut stream, 400, "text/plain", b"bad request"),
        }
        return;
    }

    respond(&mut stream, 404, "text/plain", b"not found");
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    }
}

fn respond(stream: &mut TcpStream, status: u16, content_type: &str, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        reason(status),
        content_type,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
    let _ = stream.flush();
}

/// No `Content-Length`: the client learns the size only when the socket closes.
fn respond_until_close(stream: &mut TcpStream, status: u16, content_type: &str, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nConnection: close\r\n\r\n",
        status,
        reason(status),
        content_type
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
    let _ = stream.flush();
    let _ = stream.shutdown(std::net::Shutdown::Write);
}

fn read_request(stream: &mut TcpStream) -> Option<Recorded> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return None,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };
    let head = std::str::from_utf8(&buf[..header_end]).ok()?.to_string();
    let mut lines = head.lines();
    let mut parts = lines.next()?.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();
    let content_length = lines
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[header_end..].to_vec();
    while body.len() < content_length {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => body.extend_from_slice(&chunk[..n]),
        }
    }
    body.truncate(content_length);
    Some(Recorded { method, path, body })
}
