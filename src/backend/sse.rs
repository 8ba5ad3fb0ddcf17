//! Server-sent events as emitted by the hosted database's streaming REST
//! endpoint, and how each event changes the locally held snapshot.

use serde::Deserialize;
use serde_json::Value;

use super::{BackendError, BackendResult, segments, tree};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental line decoder; chunks may split lines and UTF-8 sequences.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: String,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            let line = line.strip_suffix('\r').unwrap_or(&line);

            if line.is_empty() {
                if !self.event.is_empty() || !self.data.is_empty() {
                    events.push(SseEvent {
                        event: std::mem::take(&mut self.event),
                        data: std::mem::take(&mut self.data).join("\n"),
                    });
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => self.event = value.to_string(),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }
        events
    }
}

#[derive(Debug, PartialEq)]
pub enum StreamUpdate {
    Changed,
    Ignored,
    Closed(String),
}

#[derive(Debug, Deserialize)]
struct Payload {
    path: String,
    data: Value,
}

pub fn apply_event(snapshot: &mut Value, event: &SseEvent) -> BackendResult<StreamUpdate> {
    match event.event.as_str() {
        "put" => {
            let payload: Payload = serde_json::from_str(&event.data)?;
            tree::write(snapshot, &segments(&payload.path)?, payload.data);
            Ok(StreamUpdate::Changed)
        }
        "patch" => {
            let payload: Payload = serde_json::from_str(&event.data)?;
            let Value::Object(fields) = payload.data else {
                return Err(BackendError::Provider(format!(
                    "patch event without an object body at {}",
                    payload.path
                )));
            };
            tree::merge(snapshot, &segments(&payload.path)?, fields)?;
            Ok(StreamUpdate::Changed)
        }
        "cancel" | "auth_revoked" => Ok(StreamUpdate::Closed(event.event.clone())),
        _ => Ok(StreamUpdate::Ignored),
    }
}
