// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! Lifecycle events a connector emits.

use herd_core::JobId;

/// Session lifecycle moments surfaced to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Created,
    Resumed,
    Expired,
    Cleared,
}

herd_core::simple_display! {
    SessionEvent {
        Created => "created",
        Resumed => "resumed",
        Expired => "expired",
        Cleared => "cleared",
    }
}

/// Connector lifecycle and activity events.
#[derive(Debug, Clone)]
pub enum ConnectorEvent {
    Ready,
    Disconnect {
        reason: String,
    },
    Reconnecting {
        attempt: u32,
    },
    Reconnected,
    Error {
        message: String,
    },
    Message {
        conversation_key: String,
        agent: String,
        job_id: JobId,
    },
    MessageIgnored {
        conversation_key: String,
        reason: &'static str,
    },
    CommandExecuted {
        command: String,
        user: String,
        conversation_key: String,
    },
    RateLimit {
        count: u64,
    },
    /// For `Expired` the reap happens per agent at connector start; the
    /// conversation key is empty in that case.
    SessionLifecycle {
        agent: String,
        conversation_key: String,
        event: SessionEvent,
    },
}
