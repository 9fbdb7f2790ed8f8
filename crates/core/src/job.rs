// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! Job record and state machine.
//!
//! A job walks `created → starting → running` and settles on exactly one
//! terminal outcome. Once terminal the record is immutable: `finalize`
//! refuses a second transition, which is what makes hook dispatch
//! exactly-once safe to reason about.

use crate::id::JobId;
use crate::trigger::{Trigger, TriggerOrigin};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Created,
    Starting,
    Running,
    Completed,
    Failed,
    Timeout,
    Cancelled,
}

crate::simple_display! {
    JobState {
        Created => "created",
        Starting => "starting",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Timeout => "timeout",
        Cancelled => "cancelled",
    }
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        self.outcome().is_some()
    }

    pub fn outcome(&self) -> Option<JobOutcome> {
        match self {
            JobState::Completed => Some(JobOutcome::Completed),
            JobState::Failed => Some(JobOutcome::Failed),
            JobState::Timeout => Some(JobOutcome::Timeout),
            JobState::Cancelled => Some(JobOutcome::Cancelled),
            JobState::Created | JobState::Starting | JobState::Running => None,
        }
    }
}

/// Terminal outcome of a job. Set exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Completed,
    Failed,
    Timeout,
    Cancelled,
}

crate::simple_display! {
    JobOutcome {
        Completed => "completed",
        Failed => "failed",
        Timeout => "timeout",
        Cancelled => "cancelled",
    }
}

impl JobOutcome {
    pub fn success(&self) -> bool {
        matches!(self, JobOutcome::Completed)
    }

    pub fn state(&self) -> JobState {
        match self {
            JobOutcome::Completed => JobState::Completed,
            JobOutcome::Failed => JobState::Failed,
            JobOutcome::Timeout => JobState::Timeout,
            JobOutcome::Cancelled => JobState::Cancelled,
        }
    }
}

/// A concrete execution of an agent for one trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    pub origin: TriggerOrigin,
    pub prompt: String,
    pub state: JobState,
    pub started_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    #[serde(default)]
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Agent-written metadata tree, decoded from the metadata file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Backend-supplied session id, stored verbatim for the trigger
    /// source to persist (chat connectors feed it to the session store).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl JobRecord {
    pub fn new(id: JobId, trigger: &Trigger, started_at_ms: u64) -> Self {
        Self {
            id,
            agent: trigger.agent.clone(),
            schedule: trigger.schedule.clone(),
            origin: trigger.origin,
            prompt: trigger.prompt.clone(),
            state: JobState::Created,
            started_at_ms,
            completed_at_ms: None,
            output: String::new(),
            error: None,
            metadata: trigger.metadata_seed.clone(),
            session_id: trigger.session_id.clone(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn outcome(&self) -> Option<JobOutcome> {
        self.state.outcome()
    }

    /// `completed − started`, available once terminal.
    pub fn duration_ms(&self) -> Option<u64> {
        self.completed_at_ms
            .map(|done| done.saturating_sub(self.started_at_ms))
    }

    /// Move through the non-terminal phases. Ignored once terminal.
    pub fn advance(&mut self, state: JobState) {
        debug_assert!(!state.is_terminal(), "use finalize for terminal states");
        if !self.is_terminal() {
            self.state = state;
        }
    }

    /// Settle the terminal outcome. The first call wins; later calls are
    /// no-ops so a finished job can never change its story.
    pub fn finalize(&mut self, outcome: JobOutcome, now_ms: u64) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.state = outcome.state();
        self.completed_at_ms = Some(now_ms.max(self.started_at_ms));
        true
    }

    /// Capture backend output; whitespace-only output is treated as empty.
    pub fn set_output(&mut self, output: impl Into<String>) {
        let output = output.into();
        self.output = if output.trim().is_empty() {
            String::new()
        } else {
            output
        };
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
