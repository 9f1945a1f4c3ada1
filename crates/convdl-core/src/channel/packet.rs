//! Engine.IO v4 and Socket.IO v5 packet decoding for the polling transport.
//!
//! A polling response carries one or more Engine.IO packets separated by the
//! record separator (0x1e). Each packet starts with a one-digit type. Message
//! packets (`4`) wrap a Socket.IO packet, e.g. `42["progress",{"progress":0.5}]`.

use serde::Deserialize;
use serde_json::Value;

/// Separator between packets in one polling payload.
pub(crate) const RECORD_SEPARATOR: char = '\u{1e}';

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EnginePacket<'a> {
    Open(&'a str),
    Close,
    Ping(&'a str),
    Pong(&'a str),
    Message(&'a str),
    Upgrade,
    Noop,
}

/// Split a polling payload into packets. Unknown or empty packets are skipped.
pub(crate) fn decode_payload(body: &str) -> Vec<EnginePacket<'_>> {
    body.split(RECORD_SEPARATOR)
        .filter_map(|p| {
            let decoded = decode_packet(p);
            if decoded.is_none() && !p.is_empty() {
                tracing::trace!(packet = p, "unrecognised engine.io packet");
            }
            decoded
        })
        .collect()
}

fn decode_packet(p: &str) -> Option<EnginePacket<'_>> {
    let mut chars = p.chars();
    let kind = chars.next()?;
    let rest = chars.as_str();
    Some(match kind {
        '0' => EnginePacket::Open(rest),
        '1' => EnginePacket::Close,
        '2' => EnginePacket::Ping(rest),
        '3' => EnginePacket::Pong(rest),
        '4' => EnginePacket::Message(rest),
        '5' => EnginePacket::Upgrade,
        '6' => EnginePacket::Noop,
        _ => return None,
    })
}

/// Payload of the Engine.IO open packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
}

impl Handshake {
    pub(crate) fn parse(open: &str) -> Option<Self> {
        serde_json::from_str(open).ok()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SocketPacket {
    Connect,
    Disconnect,
    Event { name: String, args: Vec<Value> },
    ConnectError(String),
    Other,
}

/// Decode a Socket.IO packet: `<type>[/namespace,][ack id][json]`.
pub(crate) fn decode_socket(msg: &str) -> Option<SocketPacket> {
    let mut chars = msg.chars();
    let kind = chars.next()?;
    let mut rest = chars.as_str();
    if rest.starts_with('/') {
        rest = rest.split_once(',').map_or("", |(_, r)| r);
    }
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());
    Some(match kind {
        '0' => SocketPacket::Connect,
        '1' => SocketPacket::Disconnect,
        '2' => {
            let mut items = match serde_json::from_str::<Value>(rest).ok()? {
                Value::Array(items) => items,
                _ => return None,
            };
            if items.is_empty() {
                return None;
            }
            let name = items.remove(0).as_str()?.to_string();
            SocketPacket::Event { name, args: items }
        }
        '4' => {
            let reason = serde_json::from_str::<Value>(rest)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
                .unwrap_or_else(|| rest.to_string());
            SocketPacket::ConnectError(reason)
        }
        '3' | '5' | '6' => SocketPacket::Other,
        _ => return None,
    })
}

/// Name of the backend's progress event.
pub(crate) const PROGRESS_EVENT: &str = "progress";

/// Value of a `progress` event: `["progress", {"progress": 0.42}]`.
pub(crate) fn progress_value(packet: &SocketPacket) -> Option<f64> {
    match packet {
        SocketPacket::Event { name, args } if name == PROGRESS_EVENT => {
            args.first()?.get("progress")?.as_f64()
        }
        _ => None,
    }
}
