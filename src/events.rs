//! Wire events pushed to real-time observers.
//!
//! Every state change is one JSON object per WebSocket text frame, no
//! batching: `{"type":"message","message":{...}}` for chat traffic and
//! `{"type":"toolCall","toolCall":{...}}` for execution records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dispatcher::ToolCall;

/// A single chat exchange record. Opaque to the hub; passed through
/// unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    /// "user" or "assistant".
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: role.into(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// An event fanned out by the broadcast hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BroadcastEvent {
    Message {
        message: Message,
    },
    ToolCall {
        #[serde(rename = "toolCall")]
        tool_call: ToolCall,
    },
}

impl BroadcastEvent {
    pub fn message(message: Message) -> Self {
        Self::Message { message }
    }

    pub fn tool_call(tool_call: ToolCall) -> Self {
        Self::ToolCall { tool_call }
    }
}
