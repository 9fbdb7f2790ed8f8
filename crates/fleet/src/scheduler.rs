// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! The tick-driven schedule evaluator.
//!
//! One conceptual clock advances in fixed ticks (default 1 s). Each tick
//! walks the flattened `(agent, schedule)` list in configuration order,
//! fires whatever is due, and drops (never queues) triggers for agents
//! at their concurrency cap.

use crate::error::TriggerError;
use crate::executor::{JobExecutor, TriggerOptions};
use crate::status::SchedulerStatus;
use herd_core::{
    AgentSpec, Clock, FleetLogger, LogEntry, LogLevel, NextFire, Schedule, ScheduleSpec,
    TriggerOrigin,
};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler is already running")]
    AlreadyRunning,
}

struct ScheduleEntry {
    agent: String,
    schedule: Schedule,
}

struct SchedState {
    running: bool,
    /// First tick after (re)start computes the initial due times.
    armed: bool,
    check_count: u64,
    trigger_count: u64,
    skipped_due_to_concurrency: u64,
    last_check_at_ms: Option<u64>,
    last_error: Option<String>,
    /// Next due time per entry; `None` means never (passive or exhausted).
    next_due_ms: Vec<Option<u64>>,
    stop: Option<CancellationToken>,
}

/// Drives interval/cron schedules into the executor.
pub struct Scheduler<C: Clock> {
    executor: Arc<JobExecutor<C>>,
    entries: Vec<ScheduleEntry>,
    check_interval: Duration,
    clock: C,
    logger: Arc<dyn FleetLogger>,
    state: Mutex<SchedState>,
    /// Back-reference for spawning the tick loop from `&self`.
    self_ref: Weak<Self>,
}

impl<C: Clock> Scheduler<C> {
    /// Flattens the agents' scheduler-driven schedules in configuration
    /// order: agents as configured, then each agent's schedules in
    /// declaration order.
    pub fn new(
        executor: Arc<JobExecutor<C>>,
        agents: &[AgentSpec],
        check_interval: Duration,
        clock: C,
        logger: Arc<dyn FleetLogger>,
    ) -> Arc<Self> {
        let entries: Vec<ScheduleEntry> = agents
            .iter()
            .flat_map(|agent| {
                agent
                    .schedules
                    .iter()
                    .filter(|s| s.enabled && s.spec.fires_from_scheduler())
                    .map(|s| ScheduleEntry {
                        agent: agent.name.clone(),
                        schedule: s.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        let slots = entries.len();
        Arc::new_cyclic(|self_ref| Self {
            executor,
            entries,
            check_interval,
            clock,
            logger,
            self_ref: self_ref.clone(),
            state: Mutex::new(SchedState {
                running: false,
                armed: false,
                check_count: 0,
                trigger_count: 0,
                skipped_due_to_concurrency: 0,
                last_check_at_ms: None,
                last_error: None,
                next_due_ms: vec![None; slots],
                stop: None,
            }),
        })
    }

    /// Begin periodic evaluation. Fails only if already running.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let token = {
            let mut state = self.state.lock();
            if state.running {
                return Err(SchedulerError::AlreadyRunning);
            }
            state.running = true;
            state.armed = false;
            let token = CancellationToken::new();
            state.stop = Some(token.clone());
            token
        };

        if let Some(scheduler) = self.self_ref.upgrade() {
            tokio::spawn(async move {
                scheduler.run_loop(token).await;
            });
        }
        Ok(())
    }

    /// Halt evaluation. Idempotent; in-flight jobs are untouched.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.running = false;
        if let Some(token) = state.stop.take() {
            token.cancel();
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        let state = self.state.lock();
        SchedulerStatus {
            running: state.running,
            check_count: state.check_count,
            trigger_count: state.trigger_count,
            skipped_due_to_concurrency: state.skipped_due_to_concurrency,
            last_check_at_ms: state.last_check_at_ms,
            check_interval_ms: self.check_interval.as_millis() as u64,
        }
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.lock().last_error.clone()
    }

    /// Number of scheduler-driven schedule entries.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    async fn run_loop(self: Arc<Self>, stop: CancellationToken) {
        let mut ticker = tokio::time::interval(self.check_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => self.tick_once(),
            }
        }
    }

    /// Evaluate one tick. Exposed so tests and manual drains can step
    /// the scheduler deterministically.
    pub fn tick_once(&self) {
        let now = self.clock.epoch_ms();
        let mut state = self.state.lock();
        state.check_count += 1;
        state.last_check_at_ms = Some(now);

        if !state.armed {
            state.armed = true;
            for (idx, entry) in self.entries.iter().enumerate() {
                state.next_due_ms[idx] = match entry.schedule.spec.next_fire_at(now, None) {
                    NextFire::At(at) => Some(at),
                    NextFire::Never => None,
                };
            }
        }

        for (idx, entry) in self.entries.iter().enumerate() {
            let Some(due) = state.next_due_ms[idx] else {
                continue;
            };
            if due > now {
                continue;
            }
            // Due now; at most one fire per schedule per tick.
            match self.executor.trigger(
                &entry.agent,
                Some(&entry.schedule.name),
                TriggerOrigin::Scheduler,
                TriggerOptions::default(),
            ) {
                Ok(result) => {
                    state.trigger_count += 1;
                    state.next_due_ms[idx] = next_after_fire(&entry.schedule.spec, now);
                    self.logger.log(
                        LogEntry::new(
                            now,
                            LogLevel::Debug,
                            "scheduler",
                            format!("schedule '{}' fired", entry.schedule.name),
                        )
                        .agent(entry.agent.clone())
                        .job_id(result.job_id),
                    );
                }
                Err(TriggerError::ConcurrencyLimitReached { .. }) => {
                    // Dropped, never queued. Interval schedules stay due
                    // from their last fire; a missed cron occurrence is
                    // skipped outright.
                    state.skipped_due_to_concurrency += 1;
                    if matches!(entry.schedule.spec, ScheduleSpec::Cron { .. }) {
                        state.next_due_ms[idx] = next_after_fire(&entry.schedule.spec, now);
                    }
                    self.logger.log(
                        LogEntry::new(
                            now,
                            LogLevel::Debug,
                            "scheduler",
                            format!(
                                "schedule '{}' dropped: agent at concurrency cap",
                                entry.schedule.name
                            ),
                        )
                        .agent(entry.agent.clone()),
                    );
                }
                Err(e) => {
                    // A tick never aborts the loop.
                    state.last_error = Some(e.to_string());
                    state.next_due_ms[idx] = next_after_fire(&entry.schedule.spec, now);
                    tracing::error!(
                        agent = %entry.agent,
                        schedule = %entry.schedule.name,
                        error = %e,
                        "schedule trigger failed"
                    );
                    self.logger.log(
                        LogEntry::new(
                            now,
                            LogLevel::Error,
                            "scheduler",
                            format!("schedule '{}' failed: {e}", entry.schedule.name),
                        )
                        .agent(entry.agent.clone()),
                    );
                }
            }
        }
    }
}

fn next_after_fire(spec: &ScheduleSpec, now: u64) -> Option<u64> {
    match spec.next_fire_at(now, Some(now)) {
        NextFire::At(at) => Some(at),
        NextFire::Never => None,
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
