// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! herd-core: shared primitives for the herdctl fleet manager

pub mod macros;

pub mod agent;
pub mod clock;
pub mod hook;
pub mod id;
pub mod job;
pub mod logentry;
pub mod metadata;
pub mod schedule;
pub mod trigger;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use agent::{
    AgentSpec, ChannelMode, ChatAttachmentSpec, FleetConfig, PermissionPolicy,
};
pub use clock::{Clock, FakeClock, SystemClock};
pub use hook::{
    HookAction, HookAgent, HookConfig, HookContext, HookEvent, HookJob, HookResultInfo, HookSet,
    HttpMethod,
};
pub use id::JobId;
pub use job::{JobOutcome, JobRecord, JobState};
pub use logentry::{FleetLogger, LogEntry, LogLevel, NullLogger};
pub use metadata::{is_truthy, lookup_path, path_is_truthy};
pub use schedule::{
    parse_duration, CronExpr, NextFire, Schedule, ScheduleError, ScheduleSpec,
};
pub use trigger::{Trigger, TriggerOrigin};
