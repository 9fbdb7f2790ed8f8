// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! Hook configuration and the context payload delivered to every hook.
//!
//! Hooks are a tagged variant dispatched through a common runner trait in
//! the hooks crate; this module owns the config shape agents declare and
//! the immutable JSON context (wire shape: camelCase keys, ISO-8601
//! timestamps) written to subprocess stdin and HTTP bodies.

use crate::clock::epoch_ms_to_utc;
use crate::job::{JobOutcome, JobRecord};
use crate::metadata;
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Terminal event a hook can react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookEvent {
    Completed,
    Failed,
    Timeout,
    Cancelled,
}

crate::simple_display! {
    HookEvent {
        Completed => "completed",
        Failed => "failed",
        Timeout => "timeout",
        Cancelled => "cancelled",
    }
}

impl From<JobOutcome> for HookEvent {
    fn from(outcome: JobOutcome) -> Self {
        match outcome {
            JobOutcome::Completed => HookEvent::Completed,
            JobOutcome::Failed => HookEvent::Failed,
            JobOutcome::Timeout => HookEvent::Timeout,
            JobOutcome::Cancelled => HookEvent::Cancelled,
        }
    }
}

/// HTTP verb for http hooks. POST unless configured otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Post,
    Put,
    Patch,
}

crate::simple_display! {
    HttpMethod {
        Post => "POST",
        Put => "PUT",
        Patch => "PATCH",
    }
}

/// What a hook does, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HookAction {
    Subprocess {
        command: String,
    },
    Http {
        url: String,
        #[serde(default)]
        method: HttpMethod,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        headers: BTreeMap<String, String>,
    },
    ChatNotification {
        channel: String,
        bot_token_env: String,
    },
}

impl HookAction {
    pub fn kind(&self) -> &'static str {
        match self {
            HookAction::Subprocess { .. } => "subprocess",
            HookAction::Http { .. } => "http",
            HookAction::ChatNotification { .. } => "chat-notification",
        }
    }

    /// Default execution budget per kind.
    fn default_timeout(&self) -> Duration {
        match self {
            HookAction::Subprocess { .. } => Duration::from_secs(30),
            HookAction::Http { .. } | HookAction::ChatNotification { .. } => {
                Duration::from_secs(10)
            }
        }
    }
}

fn default_true() -> bool {
    true
}

/// One declared hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub action: HookAction,
    /// Narrow to a subset of terminal events; unset means all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_events: Option<Vec<HookEvent>>,
    /// Dot-path into the hook context; the hook runs iff it resolves truthy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    #[serde(default = "default_true")]
    pub continue_on_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl HookConfig {
    pub fn new(action: HookAction) -> Self {
        Self {
            name: None,
            action,
            on_events: None,
            when: None,
            continue_on_error: true,
            timeout_ms: None,
        }
    }

    crate::setters! {
        set {
            continue_on_error: bool,
            on_events: Option<Vec<HookEvent>>,
            timeout_ms: Option<u64>,
        }
        option {
            name: String,
            when: String,
        }
    }

    /// Display label: explicit name or the kind tag.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.action.kind())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.action.default_timeout())
    }

    /// `on_events` filter: unset means every event applies.
    pub fn applies_to(&self, event: HookEvent) -> bool {
        self.on_events
            .as_ref()
            .map(|events| events.contains(&event))
            .unwrap_or(true)
    }
}

/// Hooks keyed by lifecycle point.
///
/// `after_run` fires for every terminal event; `on_error` fires only for
/// `failed`, after `after_run`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HookSet {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after_run: Vec<HookConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_error: Vec<HookConfig>,
}

impl HookSet {
    pub fn is_empty(&self) -> bool {
        self.after_run.is_empty() && self.on_error.is_empty()
    }
}

/// Job block of the hook context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookJob {
    pub id: String,
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_name: Option<String>,
    pub started_at: String,
    pub completed_at: String,
    pub duration_ms: u64,
}

/// Result block of the hook context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookResultInfo {
    pub success: bool,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Agent block of the hook context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookAgent {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The immutable payload delivered to every hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookContext {
    pub event: HookEvent,
    pub job: HookJob,
    pub result: HookResultInfo,
    pub agent: HookAgent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

fn iso_ms(ms: u64) -> String {
    epoch_ms_to_utc(ms).to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl HookContext {
    /// Build the context for a terminal job.
    ///
    /// Callers must only pass terminal records; a non-terminal record
    /// yields a `cancelled`-shaped context with a zero duration rather
    /// than a panic.
    pub fn for_job(record: &JobRecord, display_name: Option<&str>) -> Self {
        let outcome = record.outcome().unwrap_or(crate::job::JobOutcome::Cancelled);
        let completed_at_ms = record.completed_at_ms.unwrap_or(record.started_at_ms);
        Self {
            event: outcome.into(),
            job: HookJob {
                id: record.id.as_str().to_string(),
                agent_id: record.agent.clone(),
                schedule_name: record.schedule.clone(),
                started_at: iso_ms(record.started_at_ms),
                completed_at: iso_ms(completed_at_ms),
                duration_ms: record.duration_ms().unwrap_or(0),
            },
            result: HookResultInfo {
                success: outcome.success(),
                output: record.output.clone(),
                error: record.error.clone(),
            },
            agent: HookAgent {
                id: record.agent.clone(),
                name: display_name.map(str::to_string),
            },
            metadata: record.metadata.clone(),
        }
    }

    /// Resolve a `when` dot-path against the full context.
    ///
    /// The root is the serialized context, so `metadata.shouldNotify`
    /// descends into the metadata tree. Missing paths are false.
    pub fn when_matches(&self, path: &str) -> bool {
        match serde_json::to_value(self) {
            Ok(root) => metadata::path_is_truthy(&root, path),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
#[path = "hook_tests.rs"]
mod tests;
