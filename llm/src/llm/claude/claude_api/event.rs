#![allow(dead_code)]
/// this module holds types related to API responses. I don't want warnings
/// just cause the fields are unused
use serde::Deserialize;

use super::ClaudeApiError;
use crate::llm::sse_parser::RawEvent;

#[derive(Debug)]
pub enum Event {
    MessageStart(MessageStart),
    ContentBlockStart(ContentBlockStart),
    ContentBlockDelta(ContentBlockDelta),
    ContentBlockStop(ContentBlockStop),
    MessageDelta(MessageDelta),
    MessageStop,
    Ping,
    Error(ClaudeApiError),
    Unknown(RawEvent),
}

#[derive(Debug, Deserialize)]
pub struct MessageStart {
    pub message: MessageInfo,
}

#[derive(Debug, Deserialize)]
pub struct MessageInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub role: String,
    // will always be empty according to doc
    #[serde(default)]
    pub content: Vec<serde_json::Value>,
    pub model: String,
    pub stop_reason: Option<String>,
    pub stop_sequence: Option<String>,
    #[serde(default)]
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlockStart {
    pub index: usize,
    pub content_block: ContentBlock,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlockDelta {
    pub index: usize,
    pub delta: Delta,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Delta {
    TextDelta { text: String },
    ThinkingDelta { thinking: String },
    SignatureDelta { signature: String },
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlockStop {
    pub index: usize,
}

#[derive(Debug, Deserialize)]
pub struct MessageDelta {
    pub delta: MessageDeltaInner,
    #[serde(default)]
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct MessageDeltaInner {
    pub stop_reason: Option<String>,
    pub stop_sequence: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, Default)]
pub struct Usage {
    pub input_tokens: Option<usize>,
    pub output_tokens: Option<usize>,
    pub cache_creation_input_tokens: Option<usize>,
    pub cache_read_input_tokens: Option<usize>,
}

/// Body of an `error` event, and of non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ErrorEvent {
    pub error: InnerError,
}

#[derive(Debug, Deserialize)]
pub struct InnerError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

impl From<ErrorEvent> for ClaudeApiError {
    fn from(ev: ErrorEvent) -> Self {
        ClaudeApiError::from_type(&ev.error.error_type, ev.error.message)
    }
}

impl Event {
    pub fn from_raw_event(raw: RawEvent) -> Self {
        (|| -> Option<Event> {
            match raw.event_type.as_deref()? {
                "message_start" => Some(Event::MessageStart(serde_json::from_str(&raw.data).ok()?)),
                "content_block_start" => Some(Event::ContentBlockStart(
                    serde_json::from_str(&raw.data).ok()?,
                )),
                "content_block_delta" => Some(Event::ContentBlockDelta(
                    serde_json::from_str(&raw.data).ok()?,
                )),
                "content_block_stop" => Some(Event::ContentBlockStop(
                    serde_json::from_str(&raw.data).ok()?,
                )),
                "message_delta" => Some(Event::MessageDelta(serde_json::from_str(&raw.data).ok()?)),
                "message_stop" => Some(Event::MessageStop),
                "ping" => Some(Event::Ping),
                "error" => {
                    let err_event: ErrorEvent = serde_json::from_str(&raw.data).ok()?;
                    Some(Event::Error(err_event.into()))
                }
                _ => None,
            }
        })()
        .unwrap_or(Event::Unknown(raw))
    }
}
