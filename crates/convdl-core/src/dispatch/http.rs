//! libcurl-backed dispatcher.

use std::str;
use std::time::Duration;

use super::classify::{classify_curl_error, classify_status, error_message, is_json};
use super::{Dispatch, DownloadRequest, Payload, TransferProgress};
use crate::config::ConvdlConfig;
use crate::error::DispatchError;

/// Sends `POST {server}/download` with a JSON body and buffers the binary response.
#[derive(Debug, Clone)]
pub struct CurlDispatcher {
    endpoint: String,
    connect_timeout: Duration,
    timeout: Option<Duration>,
}

impl CurlDispatcher {
    pub fn new(server_url: &str) -> Self {
        Self {
            endpoint: format!("{}/download", server_url.trim_end_matches('/')),
            connect_timeout: Duration::from_secs(30),
            timeout: None,
        }
    }

    pub fn from_config(cfg: &ConvdlConfig) -> Self {
        Self::new(&cfg.server_url)
            .with_connect_timeout(cfg.connect_timeout())
            .with_timeout(cfg.request_timeout())
    }

    pub fn with_connect_timeout(mut self, d: Duration) -> Self {
        self.connect_timeout = d;
        self
    }

    /// Deadline for the whole request; `None` leaves it to the transport (no limit).
    pub fn with_timeout(mut self, d: Option<Duration>) -> Self {
        self.timeout = d;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn curl_err(e: curl::Error) -> DispatchError {
    classify_curl_error(&e)
}

impl Dispatch for CurlDispatcher {
    fn dispatch(
        &self,
        request: &DownloadRequest,
        progress: &TransferProgress,
    ) -> Result<Payload, DispatchError> {
        let body = request.body();
        let mut data: Vec<u8> = Vec::new();
        let mut content_type: Option<String> = None;

        let mut easy = curl::easy::Easy::new();
        easy.url(&self.endpoint).map_err(curl_err)?;
        easy.post(true).map_err(curl_err)?;
        easy.post_fields_copy(body.as_bytes()).map_err(curl_err)?;
        easy.follow_location(true).map_err(curl_err)?;
        easy.connect_timeout(self.connect_timeout).map_err(curl_err)?;
        if let Some(t) = self.timeout {
            easy.timeout(t).map_err(curl_err)?;
        }
        easy.progress(true).map_err(curl_err)?;

        let mut list = curl::easy::List::new();
        list.append("Content-Type: application/json").map_err(curl_err)?;
        list.append("Accept: application/octet-stream, */*").map_err(curl_err)?;
        easy.http_headers(list).map_err(curl_err)?;

        tracing::debug!(job = %request.job, endpoint = %self.endpoint, format = %request.format, "sending conversion request");
        {
            let mut transfer = easy.transfer();
            transfer
                .header_function(|line| {
                    if let Ok(s) = str::from_utf8(line) {
                        if let Some((name, value)) = s.split_once(':') {
                            if name.trim().eq_ignore_ascii_case("content-type") {
                                content_type = Some(value.trim().to_string());
                            }
                        }
                    }
                    true
                })
                .map_err(curl_err)?;
            transfer
                .write_function(|chunk| {
                    data.extend_from_slice(chunk);
                    Ok(chunk.len())
                })
                .map_err(curl_err)?;
            transfer
                .progress_function(|dltotal, dlnow, _, _| {
                    if dltotal > 0.0 {
                        progress.report(dlnow as u64, dltotal as u64);
                    }
                    true
                })
                .map_err(curl_err)?;
            transfer.perform().map_err(curl_err)?;
        }

        let code = easy.response_code().map_err(curl_err)?;
        classify_status(code, &data)?;

        if let Some(ct) = content_type.as_deref().filter(|ct| is_json(ct)) {
            tracing::warn!(job = %request.job, content_type = ct, "backend answered with a status document instead of media");
            return Err(DispatchError::Server {
                status: code,
                message: Some(match error_message(&data) {
                    Some(m) => format!("expected {} media, got status document: {}", request.format, m),
                    None => format!("expected {} media, got {}", request.format, ct),
                }),
            });
        }

        tracing::debug!(job = %request.job, status = code, bytes = data.len(), "conversion response received");
        Ok(Payload {
            bytes: data,
            content_type,
        })
    }
}
