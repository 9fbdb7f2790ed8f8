// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! herd-fleet: the fleet runtime.
//!
//! Owns the job executor (trigger → backend → hooks → terminal outcome),
//! the scheduler (interval/cron evaluation with per-agent concurrency
//! caps), the broadcast log stream, and the [`FleetManager`] façade that
//! the daemon and connectors talk to.

mod backend;
mod error;
mod executor;
mod logstream;
mod manager;
mod scheduler;
mod status;

pub use backend::{AgentBackend, BackendError, BackendRequest, BackendResponse};
pub use error::{FleetError, TriggerError};
pub use executor::{JobExecutor, TriggerOptions, TriggerResult};
pub use logstream::{JobOutputStream, LogBroadcast, LogStream, StreamLogger};
pub use manager::{FleetManager, ManagedConnector, TriggerApi};
pub use scheduler::{Scheduler, SchedulerError};
pub use status::{AgentInfo, FleetState, FleetStatus, ScheduleInfo, SchedulerStatus};

#[cfg(any(test, feature = "test-support"))]
pub use backend::fake::{FakeBackend, FakeCall};
