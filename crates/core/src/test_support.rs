// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! Shared fixtures for other crates' tests.

use crate::agent::AgentSpec;
use crate::schedule::{Schedule, ScheduleSpec};
use std::time::Duration;

/// Minimal agent with one interval schedule.
pub fn interval_agent(name: &str, schedule: &str, every: Duration) -> AgentSpec {
    AgentSpec::new(name).schedules(vec![Schedule::new(
        schedule,
        ScheduleSpec::Interval { every },
    )])
}

/// Minimal agent with a chat placeholder schedule.
pub fn chat_agent(name: &str) -> AgentSpec {
    AgentSpec::new(name).schedules(vec![Schedule::new("chat", ScheduleSpec::Chat)])
}
