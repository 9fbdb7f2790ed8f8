// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! Read-only fleet and agent snapshots.

use herd_core::JobOutcome;
use serde::Serialize;

/// Fleet lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FleetState {
    Initializing,
    Running,
    Stopping,
    Stopped,
    Error,
}

herd_core::simple_display! {
    FleetState {
        Initializing => "initializing",
        Running => "running",
        Stopping => "stopping",
        Stopped => "stopped",
        Error => "error",
    }
}

/// Scheduler health block.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub check_count: u64,
    pub trigger_count: u64,
    pub skipped_due_to_concurrency: u64,
    pub last_check_at_ms: Option<u64>,
    pub check_interval_ms: u64,
}

/// Aggregated fleet snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct FleetStatus {
    pub state: FleetState,
    pub uptime_ms: u64,
    pub agents_total: usize,
    pub agents_idle: usize,
    pub agents_running: usize,
    pub agents_error: usize,
    pub schedules_total: usize,
    pub schedules_active: usize,
    pub jobs_running: usize,
    pub scheduler: SchedulerStatus,
    pub last_error: Option<String>,
}

/// One schedule in an agent snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleInfo {
    pub name: String,
    pub kind: &'static str,
    pub enabled: bool,
}

/// Per-agent snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct AgentInfo {
    pub name: String,
    pub running_jobs: usize,
    pub max_concurrent: usize,
    pub schedules: Vec<ScheduleInfo>,
    pub last_outcome: Option<JobOutcome>,
    pub chat_platforms: Vec<String>,
}
