// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! Session record shapes persisted per conversation key.

use serde::{Deserialize, Serialize};

/// Current session file schema version.
pub const SESSION_FILE_VERSION: u32 = 1;

/// Last-observed token accounting for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub context_window: u64,
}

impl ContextUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Snapshot of the agent config a session was started under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfigSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mcp_server_names: Vec<String>,
}

/// One conversation's durable session state.
///
/// `session_id` is minted here but otherwise opaque: the backend may
/// replace it and whatever it supplies is stored verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub started_at_ms: u64,
    pub last_message_at_ms: u64,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_usage: Option<ContextUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_config: Option<AgentConfigSnapshot>,
}

impl SessionRecord {
    pub fn new(session_id: impl Into<String>, now_ms: u64) -> Self {
        Self {
            session_id: session_id.into(),
            started_at_ms: now_ms,
            last_message_at_ms: now_ms,
            message_count: 0,
            context_usage: None,
            agent_config: None,
        }
    }

    /// Expiry is relative to the last message, not to session start.
    pub fn is_expired(&self, now_ms: u64, expiry_hours: u64) -> bool {
        let expiry_ms = expiry_hours.saturating_mul(3_600_000);
        now_ms.saturating_sub(self.last_message_at_ms) > expiry_ms
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
