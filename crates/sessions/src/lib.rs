// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! herd-sessions: durable per-agent conversation-session store.
//!
//! One JSON file per `(platform, agent)` pair under
//! `<stateDir>/<platform>-sessions/<agent>.json`, holding a map from
//! conversation key to session record. All operations go through a
//! per-agent mutex; writes replace the whole file so a crash never leaves
//! a half-written state behind.

mod record;
mod store;

pub use record::{AgentConfigSnapshot, ContextUsage, SessionRecord, SESSION_FILE_VERSION};
pub use store::{GetOrCreate, SessionStore, SessionStoreError};
