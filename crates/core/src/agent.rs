// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! Agent and fleet configuration types.
//!
//! These are config-derived and immutable for the daemon's lifetime.
//! Decoding happens at the daemon surface (serde over JSON); the core
//! only consumes the decoded shapes.

use crate::hook::HookSet;
use crate::schedule::Schedule;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Tool allow/deny lists for an agent's backend invocations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionPolicy {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub denied_tools: Vec<String>,
}

/// How a chat channel decides whether a message triggers the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelMode {
    /// Only when the bot is addressed (direct or group mention).
    Mention,
    /// Every non-bot message. Default for direct-message channels.
    Auto,
}

fn default_mode() -> ChannelMode {
    ChannelMode::Mention
}

fn default_context_messages() -> usize {
    10
}

fn default_true() -> bool {
    true
}

/// One chat-platform attachment of an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatAttachmentSpec {
    pub platform: String,
    /// Conversation keys routed to this agent.
    #[serde(default)]
    pub conversations: Vec<String>,
    #[serde(default = "default_mode")]
    pub mode: ChannelMode,
    /// How many prior messages feed the conversation context.
    #[serde(default = "default_context_messages")]
    pub context_messages: usize,
    #[serde(default = "default_true")]
    pub prioritize_user_messages: bool,
    #[serde(default)]
    pub include_bot_messages: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token_env: Option<String>,
}

impl ChatAttachmentSpec {
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            conversations: Vec::new(),
            mode: default_mode(),
            context_messages: default_context_messages(),
            prioritize_user_messages: true,
            include_bot_messages: false,
            bot_token_env: None,
        }
    }

    crate::setters! {
        set {
            conversations: Vec<String>,
            mode: ChannelMode,
            context_messages: usize,
            prioritize_user_messages: bool,
            include_bot_messages: bool,
        }
        option {
            bot_token_env: String,
        }
    }
}

fn default_max_concurrent() -> usize {
    1
}

fn default_session_timeout_ms() -> u64 {
    3_600_000
}

fn default_session_expiry_hours() -> u64 {
    24
}

/// A configured autonomous worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    /// Backend selection key, opaque to the core.
    #[serde(default)]
    pub backend: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub permissions: PermissionPolicy,
    #[serde(default)]
    pub workspace: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_prompt: Option<String>,
    #[serde(default)]
    pub schedules: Vec<Schedule>,
    #[serde(default)]
    pub hooks: HookSet,
    /// Path (inside the workspace) the backend writes job metadata to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_file: Option<PathBuf>,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,
    #[serde(default = "default_session_expiry_hours")]
    pub session_expiry_hours: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chat: Vec<ChatAttachmentSpec>,
}

impl AgentSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            backend: String::new(),
            display_name: None,
            model: None,
            permissions: PermissionPolicy::default(),
            workspace: PathBuf::new(),
            repo: None,
            default_prompt: None,
            schedules: Vec::new(),
            hooks: HookSet::default(),
            metadata_file: None,
            max_concurrent: default_max_concurrent(),
            session_timeout_ms: default_session_timeout_ms(),
            session_expiry_hours: default_session_expiry_hours(),
            chat: Vec::new(),
        }
    }

    crate::setters! {
        into {
            backend: String,
            workspace: PathBuf,
        }
        set {
            permissions: PermissionPolicy,
            schedules: Vec<Schedule>,
            hooks: HookSet,
            max_concurrent: usize,
            session_timeout_ms: u64,
            session_expiry_hours: u64,
            chat: Vec<ChatAttachmentSpec>,
        }
        option {
            display_name: String,
            model: String,
            repo: String,
            default_prompt: String,
            metadata_file: PathBuf,
        }
    }

    pub fn schedule(&self, name: &str) -> Option<&Schedule> {
        self.schedules.iter().find(|s| s.name == name)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    /// Prompt resolution: explicit override, then the schedule's prompt,
    /// then the agent default.
    pub fn resolve_prompt(
        &self,
        schedule: Option<&Schedule>,
        override_prompt: Option<&str>,
    ) -> Option<String> {
        override_prompt
            .map(str::to_string)
            .or_else(|| schedule.and_then(|s| s.prompt.clone()))
            .or_else(|| self.default_prompt.clone())
    }
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".herdctl")
}

fn default_check_interval_ms() -> u64 {
    1_000
}

fn default_shutdown_grace_ms() -> u64 {
    30_000
}

fn default_log_history_limit() -> usize {
    512
}

/// Top-level decoded fleet configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetConfig {
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default)]
    pub agents: Vec<AgentSpec>,
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
    #[serde(default = "default_log_history_limit")]
    pub log_history_limit: usize,
    /// Endpoint the built-in webhook poster delivers chat-notification
    /// hooks to. Platform bridges replace the poster instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_url: Option<String>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            agents: Vec::new(),
            check_interval_ms: default_check_interval_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            log_history_limit: default_log_history_limit(),
            notification_url: None,
        }
    }
}

impl FleetConfig {
    pub fn agent(&self, name: &str) -> Option<&AgentSpec> {
        self.agents.iter().find(|a| a.name == name)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
