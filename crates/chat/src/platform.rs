// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! The chat platform capability.
//!
//! One implementation per concrete platform; the connector only sees
//! this trait. Conversation keys are opaque platform-stable strings
//! (channel id, thread id, or DM peer id).

use async_trait::async_trait;
use thiserror::Error;

/// Errors from platform operations
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("already connected")]
    AlreadyConnected,
    #[error("invalid bot token")]
    InvalidToken,
    #[error("bot token env var {0} is not set")]
    MissingToken(String),
    #[error("rate limited")]
    RateLimited,
    #[error("send failed: {0}")]
    SendFailed(String),
}

impl ChatError {
    /// Stable machine-readable identifier.
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::ConnectionFailed(_) => "CHAT_CONNECTION_FAILED",
            ChatError::AlreadyConnected => "CHAT_ALREADY_CONNECTED",
            ChatError::InvalidToken => "CHAT_INVALID_TOKEN",
            ChatError::MissingToken(_) => "CHAT_MISSING_TOKEN",
            ChatError::RateLimited => "CHAT_RATE_LIMITED",
            ChatError::SendFailed(_) => "CHAT_SEND_FAILED",
        }
    }
}

/// A platform user (or bot) identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatUser {
    pub id: String,
    pub is_bot: bool,
}

impl ChatUser {
    pub fn person(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_bot: false,
        }
    }

    pub fn bot(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_bot: true,
        }
    }
}

/// An inbound platform event, already normalized by the platform layer.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub conversation_key: String,
    pub author: ChatUser,
    pub text: String,
    pub timestamp_ms: u64,
    /// Direct-message conversations default to `auto` mode.
    pub is_direct: bool,
    /// The bot was addressed directly.
    pub mentions_bot: bool,
    /// A group the bot belongs to was mentioned.
    pub mentions_bot_group: bool,
}

/// One message of fetched conversation history.
#[derive(Debug, Clone)]
pub struct HistoryMessage {
    pub author: ChatUser,
    pub text: String,
    pub timestamp_ms: u64,
}

/// A concrete chat platform connection (one bot identity).
#[async_trait]
pub trait ChatPlatform: Send + Sync + 'static {
    /// Platform key used for session-store paths ("discord", "slack", …).
    fn name(&self) -> &str;

    /// The connector's own identity, for sender filtering.
    fn identity(&self) -> ChatUser;

    async fn connect(&self) -> Result<(), ChatError>;

    async fn disconnect(&self);

    /// Write into the originating conversation (the reply path).
    async fn send(&self, conversation_key: &str, text: &str) -> Result<(), ChatError>;

    /// Fetch up to `limit` prior messages, most recent last.
    async fn history(
        &self,
        conversation_key: &str,
        limit: usize,
    ) -> Result<Vec<HistoryMessage>, ChatError>;

    /// Toggle the platform's "the bot is working" indicator.
    async fn set_typing(&self, conversation_key: &str, active: bool);

    /// Strip addressing artefacts (mention sigils) from message text.
    ///
    /// The default removes `<@id>` sigils for the bot's own id and a
    /// leading `@id` token; platforms with richer mention syntax
    /// override this.
    fn strip_addressing(&self, text: &str) -> String {
        let id = self.identity().id;
        let mut cleaned = text.replace(&format!("<@{id}>"), "");
        let at_name = format!("@{id}");
        if let Some(rest) = cleaned.trim_start().strip_prefix(&at_name) {
            cleaned = rest.to_string();
        }
        cleaned.trim().to_string()
    }
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub(crate) mod fake {
    use super::{ChatError, ChatPlatform, ChatUser, HistoryMessage};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Recording platform double.
    pub struct FakePlatform {
        name: String,
        identity: ChatUser,
        connect_error: Mutex<Option<ChatError>>,
        history: Mutex<HashMap<String, Vec<HistoryMessage>>>,
        sent: Mutex<Vec<(String, String)>>,
        typing: Mutex<Vec<(String, bool)>>,
        connected: Mutex<bool>,
    }

    impl FakePlatform {
        pub fn new(name: &str, bot_id: &str) -> Self {
            Self {
                name: name.to_string(),
                identity: ChatUser::bot(bot_id),
                connect_error: Mutex::new(None),
                history: Mutex::new(HashMap::new()),
                sent: Mutex::new(Vec::new()),
                typing: Mutex::new(Vec::new()),
                connected: Mutex::new(false),
            }
        }

        pub fn fail_next_connect(&self, error: ChatError) {
            *self.connect_error.lock() = Some(error);
        }

        pub fn seed_history(&self, key: &str, messages: Vec<HistoryMessage>) {
            self.history.lock().insert(key.to_string(), messages);
        }

        /// `(conversation_key, text)` pairs, oldest first.
        pub fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().clone()
        }

        pub fn typing_calls(&self) -> Vec<(String, bool)> {
            self.typing.lock().clone()
        }

        pub fn is_connected(&self) -> bool {
            *self.connected.lock()
        }
    }

    #[async_trait]
    impl ChatPlatform for FakePlatform {
        fn name(&self) -> &str {
            &self.name
        }

        fn identity(&self) -> ChatUser {
            self.identity.clone()
        }

        async fn connect(&self) -> Result<(), ChatError> {
            if let Some(error) = self.connect_error.lock().take() {
                return Err(error);
            }
            *self.connected.lock() = true;
            Ok(())
        }

        async fn disconnect(&self) {
            *self.connected.lock() = false;
        }

        async fn send(&self, conversation_key: &str, text: &str) -> Result<(), ChatError> {
            self.sent
                .lock()
                .push((conversation_key.to_string(), text.to_string()));
            Ok(())
        }

        async fn history(
            &self,
            conversation_key: &str,
            limit: usize,
        ) -> Result<Vec<HistoryMessage>, ChatError> {
            let history = self.history.lock();
            let messages = history.get(conversation_key).cloned().unwrap_or_default();
            let skip = messages.len().saturating_sub(limit);
            Ok(messages.into_iter().skip(skip).collect())
        }

        async fn set_typing(&self, conversation_key: &str, active: bool) {
            self.typing
                .lock()
                .push((conversation_key.to_string(), active));
        }
    }
}

#[cfg(test)]
#[path = "platform_tests.rs"]
mod tests;
