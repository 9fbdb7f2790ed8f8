// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! herd-chat: the chat connector framework.
//!
//! A connector owns one platform connection and routes conversations to
//! agents: sender filtering, mention/auto channel modes, maintenance
//! commands, conversation-context assembly, durable session resolution,
//! and the reply path back into the originating conversation. Concrete
//! platform clients live behind the [`ChatPlatform`] trait.

mod classify;
mod commands;
mod connector;
mod context;
mod events;
mod platform;

pub use classify::classify_error_reply;
pub use commands::MaintenanceCommand;
pub use connector::{ChatConnector, ConnectorStatus, HandleOutcome};
pub use context::build_context;
pub use events::{ConnectorEvent, SessionEvent};
pub use platform::{ChatError, ChatPlatform, ChatUser, HistoryMessage, IncomingMessage};

#[cfg(any(test, feature = "test-support"))]
pub use platform::fake::FakePlatform;
