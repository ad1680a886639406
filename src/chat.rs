//! Chat boundary: history, runtime chat configuration, and the backend
//! interface.
//!
//! The model that actually produces replies lives outside this crate; the
//! gateway only needs something that maps a history to an assistant
//! message. `EchoBackend` keeps the wiring exercisable offline.

use async_trait::async_trait;
use std::sync::RwLock;

use crate::config::{ChatConfig, ChatConfigPatch};
use crate::error::ChatError;
use crate::events::Message;

/// Produces an assistant reply for the current conversation.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn reply(&self, history: &[Message], config: &ChatConfig) -> Result<Message, ChatError>;
}

/// Offline backend that mirrors the newest user message back.
pub struct EchoBackend;

#[async_trait]
impl ChatBackend for EchoBackend {
    async fn reply(&self, history: &[Message], _config: &ChatConfig) -> Result<Message, ChatError> {
        let last = history
            .iter()
            .rev()
            .find(|message| message.role == "user")
            .ok_or_else(|| ChatError("no user message to reply to".into()))?;
        Ok(Message::new("assistant", format!("echo: {}", last.content)))
    }
}

/// Conversation state owned by the gateway: message history plus the
/// mutable chat configuration.
pub struct ChatState {
    history: RwLock<Vec<Message>>,
    config: RwLock<ChatConfig>,
}

impl ChatState {
    pub fn new(config: ChatConfig) -> Self {
        Self {
            history: RwLock::new(Vec::new()),
            config: RwLock::new(config),
        }
    }

    pub fn push(&self, message: Message) {
        self.history
            .write()
            .expect("chat lock poisoned")
            .push(message);
    }

    pub fn history(&self) -> Vec<Message> {
        self.history.read().expect("chat lock poisoned").clone()
    }

    pub fn config(&self) -> ChatConfig {
        self.config.read().expect("chat lock poisoned").clone()
    }

    /// Merge a partial update and return the resulting configuration.
    pub fn patch_config(&self, patch: ChatConfigPatch) -> ChatConfig {
        let mut config = self.config.write().expect("chat lock poisoned");
        config.apply(patch);
        config.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_backend_mirrors_last_user_message() {
        let state = ChatState::new(ChatConfig::default());
        state.push(Message::new("user", "first"));
        state.push(Message::new("assistant", "echo: first"));
        state.push(Message::new("user", "second"));

        let reply = EchoBackend
            .reply(&state.history(), &state.config())
            .await
            .unwrap();
        assert_eq!(reply.role, "assistant");
        assert_eq!(reply.content, "echo: second");
    }

    #[tokio::test]
    async fn echo_backend_needs_a_user_message() {
        let err = EchoBackend
            .reply(&[], &ChatConfig::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no user message"));
    }

    #[test]
    fn patch_config_returns_updated_view() {
        let state = ChatState::new(ChatConfig::default());
        let updated = state.patch_config(ChatConfigPatch {
            max_tokens: Some(512),
            ..Default::default()
        });
        assert_eq!(updated.max_tokens, 512);
        assert_eq!(state.config().max_tokens, 512);
    }
}
