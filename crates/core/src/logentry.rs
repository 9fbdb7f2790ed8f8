// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! Structured log entries and the logger capability.
//!
//! Components never log through a global: each one accepts a
//! [`FleetLogger`] handle, and the fleet provides one that fans entries
//! into the daemon-wide broadcast stream. `tracing` remains in use for
//! operator diagnostics; the entries here are the contract-bearing stream
//! surfaced by `streamLogs`/`streamJobOutput`.

use crate::id::JobId;
use serde::{Deserialize, Serialize};

/// Severity of a log entry. Ordered so consumers can filter by floor.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

crate::simple_display! {
    LogLevel {
        Debug => "debug",
        Info => "info",
        Warn => "warn",
        Error => "error",
    }
}

/// One entry on the fleet log stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp_ms: u64,
    pub level: LogLevel,
    /// Emitting component ("scheduler", "executor", "hooks", "chat", …).
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    pub message: String,
}

impl LogEntry {
    pub fn new(
        timestamp_ms: u64,
        level: LogLevel,
        source: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp_ms,
            level,
            source: source.into(),
            agent: None,
            job_id: None,
            message: message.into(),
        }
    }

    crate::setters! {
        option {
            agent: String,
            job_id: JobId,
        }
    }
}

/// Logger capability handed to every component.
///
/// The fleet's implementation fans entries into the broadcast log stream;
/// [`NullLogger`] discards them for tests and standalone use.
pub trait FleetLogger: Send + Sync {
    fn log(&self, entry: LogEntry);
}

/// A logger that drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullLogger;

impl FleetLogger for NullLogger {
    fn log(&self, _entry: LogEntry) {}
}

#[cfg(test)]
#[path = "logentry_tests.rs"]
mod tests;
