// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! Triggers: ephemeral requests to start a job.

use serde::{Deserialize, Serialize};

/// Where a trigger came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOrigin {
    Scheduler,
    Manual,
    Chat,
    Webhook,
}

crate::simple_display! {
    TriggerOrigin {
        Scheduler => "scheduler",
        Manual => "manual",
        Chat => "chat",
        Webhook => "webhook",
    }
}

/// A materialized request to start a job.
///
/// Triggers either become jobs or are rejected at admission; they are
/// never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub agent: String,
    pub schedule: Option<String>,
    pub prompt: String,
    pub work_source: Option<String>,
    pub origin: TriggerOrigin,
    /// Backend session to resume (chat-originated triggers).
    pub session_id: Option<String>,
    /// Prior-conversation context prepared by a chat connector.
    pub conversation_context: Option<String>,
    /// Seed for the job's metadata tree, merged under the agent-written file.
    pub metadata_seed: Option<serde_json::Value>,
}

impl Trigger {
    pub fn new(agent: impl Into<String>, prompt: impl Into<String>, origin: TriggerOrigin) -> Self {
        Self {
            agent: agent.into(),
            schedule: None,
            prompt: prompt.into(),
            work_source: None,
            origin,
            session_id: None,
            conversation_context: None,
            metadata_seed: None,
        }
    }

    crate::setters! {
        option {
            schedule: String,
            work_source: String,
            session_id: String,
            conversation_context: String,
            metadata_seed: serde_json::Value,
        }
    }
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
