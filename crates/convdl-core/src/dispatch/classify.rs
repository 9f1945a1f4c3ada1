//! Map curl failures and HTTP statuses onto `DispatchError`.

use crate::error::DispatchError;

/// Classify a curl error: a timeout is a `Timeout`, anything else the
/// transport reports (DNS, refused, reset, TLS, ...) is a `Network` error.
pub fn classify_curl_error(e: &curl::Error) -> DispatchError {
    if e.is_operation_timedout() {
        return DispatchError::Timeout(e.to_string());
    }
    tracing::debug!(code = e.code(), "curl transfer failed: {}", e);
    DispatchError::Network(e.to_string())
}

/// Classify a finished response. 2xx is fine, every other status is a
/// `Server` error carrying the backend's `{"error": ...}` text when present.
pub fn classify_status(code: u32, body: &[u8]) -> Result<(), DispatchError> {
    if (200..300).contains(&code) {
        return Ok(());
    }
    Err(DispatchError::Server {
        status: code,
        message: error_message(body),
    })
}

/// Extract `error` (or `message`) from a JSON status document.
pub(super) fn error_message(body: &[u8]) -> Option<String> {
    let v: serde_json::Value = serde_json::from_slice(body).ok()?;
    ["error", "message"]
        .iter()
        .find_map(|k| v.get(*k).and_then(|m| m.as_str()))
        .map(|s| s.to_string())
}

/// True for `application/json` and `+json` media types.
pub(super) fn is_json(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}
