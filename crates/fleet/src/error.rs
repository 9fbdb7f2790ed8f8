// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! Fleet-level error taxonomy.

use thiserror::Error;

/// Errors from trigger admission (scheduler, manual, chat, webhook paths
/// all share this taxonomy).
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("agent not found: {0}")]
    AgentNotFound(String),
    #[error("schedule not found: {agent}/{schedule}")]
    ScheduleNotFound { agent: String, schedule: String },
    #[error("agent {agent} is at its concurrency limit ({limit})")]
    ConcurrencyLimitReached { agent: String, limit: usize },
    #[error("fleet is not running")]
    NotRunning,
}

impl TriggerError {
    /// Stable machine-readable identifier.
    pub fn code(&self) -> &'static str {
        match self {
            TriggerError::AgentNotFound(_) => "AGENT_NOT_FOUND",
            TriggerError::ScheduleNotFound { .. } => "SCHEDULE_NOT_FOUND",
            TriggerError::ConcurrencyLimitReached { .. } => "CONCURRENCY_LIMIT_REACHED",
            TriggerError::NotRunning => "FLEET_NOT_RUNNING",
        }
    }
}

/// Errors from the fleet manager lifecycle.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("fleet is already initialized")]
    AlreadyInitialized,
    #[error("fleet is not initialized")]
    NotInitialized,
    #[error(transparent)]
    Scheduler(#[from] crate::scheduler::SchedulerError),
    #[error(transparent)]
    Trigger(#[from] TriggerError),
    #[error("failed to prepare state directory {path}: {source}")]
    StateDir {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FleetError {
    pub fn code(&self) -> &'static str {
        match self {
            FleetError::AlreadyInitialized => "ALREADY_INITIALIZED",
            FleetError::NotInitialized => "NOT_INITIALIZED",
            FleetError::Scheduler(_) => "SCHEDULER_ALREADY_RUNNING",
            FleetError::Trigger(e) => e.code(),
            FleetError::StateDir { .. } => "STATE_DIR_CREATE_FAILED",
        }
    }
}
