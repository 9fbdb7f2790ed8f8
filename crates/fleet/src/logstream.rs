// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! The daemon-wide broadcast log stream and per-job output channels.
//!
//! A single multi-producer/multi-consumer broadcast carries every
//! [`LogEntry`]; each consumer has a bounded buffer and a slow consumer
//! loses oldest entries instead of blocking producers. A bounded ring of
//! recent history supports `include_history` subscriptions, and each job
//! keeps a transient buffer so `streamJobOutput` can attach late.

use herd_core::{FleetLogger, LogEntry, LogLevel};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Per-consumer buffer size for the broadcast channel.
const CHANNEL_CAPACITY: usize = 1_024;

/// Fan-out hub for the fleet log stream.
pub struct LogBroadcast {
    sender: broadcast::Sender<LogEntry>,
    history: Mutex<VecDeque<LogEntry>>,
    history_limit: usize,
}

impl LogBroadcast {
    pub fn new(history_limit: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Arc::new(Self {
            sender,
            history: Mutex::new(VecDeque::with_capacity(history_limit.min(CHANNEL_CAPACITY))),
            history_limit,
        })
    }

    pub fn publish(&self, entry: LogEntry) {
        {
            let mut history = self.history.lock();
            if history.len() == self.history_limit {
                history.pop_front();
            }
            history.push_back(entry.clone());
        }
        // No subscribers is fine; entries still land in history.
        let _ = self.sender.send(entry);
    }

    /// Subscribe at a level floor, optionally replaying retained history.
    pub fn subscribe(&self, min_level: LogLevel, include_history: bool) -> LogStream {
        let backlog = if include_history {
            self.history
                .lock()
                .iter()
                .filter(|e| e.level >= min_level)
                .cloned()
                .collect()
        } else {
            VecDeque::new()
        };
        LogStream {
            backlog,
            receiver: Some(self.sender.subscribe()),
            min_level,
        }
    }
}

/// A lazy, finite sequence of log entries.
///
/// Ends (`None`) when every producer handle is gone, i.e. the fleet has
/// stopped. Entries dropped by a lagging consumer are skipped silently.
pub struct LogStream {
    backlog: VecDeque<LogEntry>,
    receiver: Option<broadcast::Receiver<LogEntry>>,
    min_level: LogLevel,
}

impl LogStream {
    pub async fn next(&mut self) -> Option<LogEntry> {
        if let Some(entry) = self.backlog.pop_front() {
            return Some(entry);
        }
        loop {
            match self.receiver.as_mut()?.recv().await {
                Ok(entry) if entry.level >= self.min_level => return Some(entry),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    self.receiver = None;
                    return None;
                }
            }
        }
    }

    /// Drain whatever is immediately available, without waiting.
    pub fn drain_ready(&mut self) -> Vec<LogEntry> {
        let mut out: Vec<LogEntry> = self.backlog.drain(..).collect();
        if let Some(receiver) = self.receiver.as_mut() {
            while let Ok(entry) = receiver.try_recv() {
                if entry.level >= self.min_level {
                    out.push(entry);
                }
            }
        }
        out
    }
}

/// The fleet's [`FleetLogger`]: fans entries into the broadcast.
pub struct StreamLogger(Arc<LogBroadcast>);

impl StreamLogger {
    pub fn new(broadcast: Arc<LogBroadcast>) -> Arc<Self> {
        Arc::new(Self(broadcast))
    }
}

impl FleetLogger for StreamLogger {
    fn log(&self, entry: LogEntry) {
        self.0.publish(entry);
    }
}

/// Transient per-job channel backing `streamJobOutput`.
///
/// Retains every entry so late subscribers replay from the beginning;
/// closing drops the sender so attached streams terminate. Buffer and
/// sender live behind one mutex so replay-then-live never duplicates or
/// drops an entry.
pub(crate) struct JobChannel {
    inner: Mutex<JobChannelInner>,
}

struct JobChannelInner {
    sender: Option<broadcast::Sender<LogEntry>>,
    buffer: Vec<LogEntry>,
}

impl JobChannel {
    pub fn new() -> Arc<Self> {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Arc::new(Self {
            inner: Mutex::new(JobChannelInner {
                sender: Some(sender),
                buffer: Vec::new(),
            }),
        })
    }

    pub fn publish(&self, entry: LogEntry) {
        let mut inner = self.inner.lock();
        inner.buffer.push(entry.clone());
        if let Some(sender) = inner.sender.as_ref() {
            let _ = sender.send(entry);
        }
    }

    /// Terminal transition: no further entries will arrive.
    pub fn close(&self) {
        self.inner.lock().sender.take();
    }

    pub fn subscribe(&self) -> JobOutputStream {
        let inner = self.inner.lock();
        JobOutputStream {
            backlog: inner.buffer.iter().cloned().collect(),
            receiver: inner.sender.as_ref().map(|s| s.subscribe()),
        }
    }
}

/// Lazy finite sequence of one job's log entries; ends at the terminal
/// transition.
pub struct JobOutputStream {
    backlog: VecDeque<LogEntry>,
    receiver: Option<broadcast::Receiver<LogEntry>>,
}

impl JobOutputStream {
    pub async fn next(&mut self) -> Option<LogEntry> {
        if let Some(entry) = self.backlog.pop_front() {
            return Some(entry);
        }
        loop {
            match self.receiver.as_mut()?.recv().await {
                Ok(entry) => return Some(entry),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    self.receiver = None;
                    return None;
                }
            }
        }
    }

    /// Collect the remainder of the stream.
    pub async fn collect(mut self) -> Vec<LogEntry> {
        let mut out = Vec::new();
        while let Some(entry) = self.next().await {
            out.push(entry);
        }
        out
    }
}

#[cfg(test)]
#[path = "logstream_tests.rs"]
mod tests;
