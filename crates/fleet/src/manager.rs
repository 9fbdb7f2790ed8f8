// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! The fleet manager: the public façade over executor, scheduler, log
//! stream, and attached connectors.

use crate::backend::AgentBackend;
use crate::error::{FleetError, TriggerError};
use crate::executor::{JobExecutor, TriggerOptions, TriggerResult};
use crate::logstream::{JobOutputStream, LogBroadcast, LogStream, StreamLogger};
use crate::scheduler::Scheduler;
use crate::status::{AgentInfo, FleetState, FleetStatus, ScheduleInfo};
use async_trait::async_trait;
use herd_core::{Clock, FleetConfig, JobId, LogLevel, TriggerOrigin};
use herd_hooks::{HookPipeline, RunnerSet};
use parking_lot::Mutex;
use std::sync::Arc;

/// The trigger entry point connectors borrow.
///
/// Connectors hold this as a `Weak` handle so the connector ↔ fleet
/// reference cycle never forms; only `trigger` crosses the boundary.
pub trait TriggerApi: Send + Sync {
    fn trigger(
        &self,
        agent: &str,
        schedule: Option<&str>,
        origin: TriggerOrigin,
        opts: TriggerOptions,
    ) -> Result<TriggerResult, TriggerError>;

    /// Current job record, for connectors awaiting a reply.
    fn job(&self, job_id: &JobId) -> Option<herd_core::JobRecord>;
}

/// A connector whose lifecycle the fleet owns.
///
/// The chat crate implements this; the daemon attaches instances before
/// `start`.
#[async_trait]
pub trait ManagedConnector: Send + Sync {
    fn platform(&self) -> &str;
    async fn start(&self) -> Result<(), String>;
    async fn stop(&self);
}

struct Runtime<C: Clock> {
    executor: Arc<JobExecutor<C>>,
    scheduler: Arc<Scheduler<C>>,
}

/// Owns all agents, the scheduler, the executor, and the log stream.
pub struct FleetManager<C: Clock> {
    config: FleetConfig,
    backend: Arc<dyn AgentBackend>,
    clock: C,
    broadcast: Arc<LogBroadcast>,
    runtime: Mutex<Option<Runtime<C>>>,
    connectors: Mutex<Vec<Arc<dyn ManagedConnector>>>,
    state: Mutex<FleetState>,
    started_at_ms: Mutex<Option<u64>>,
    last_error: Mutex<Option<String>>,
}

impl<C: Clock> FleetManager<C> {
    pub fn new(config: FleetConfig, backend: Arc<dyn AgentBackend>, clock: C) -> Arc<Self> {
        let broadcast = LogBroadcast::new(config.log_history_limit);
        Arc::new(Self {
            config,
            backend,
            clock,
            broadcast,
            runtime: Mutex::new(None),
            connectors: Mutex::new(Vec::new()),
            state: Mutex::new(FleetState::Initializing),
            started_at_ms: Mutex::new(None),
            last_error: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    /// Construct the executor and scheduler from the decoded config.
    /// Fails with `ALREADY_INITIALIZED` on a second call.
    pub fn initialize(&self) -> Result<(), FleetError> {
        let mut runtime = self.runtime.lock();
        if runtime.is_some() {
            return Err(FleetError::AlreadyInitialized);
        }

        let logger = StreamLogger::new(self.broadcast.clone());
        let mut runners = RunnerSet::new();
        if let Some(url) = &self.config.notification_url {
            runners = runners.with_notification_endpoint(url.clone());
        }
        let pipeline = HookPipeline::new(runners, self.clock.clone(), logger.clone());
        let executor = JobExecutor::new(
            &self.config.agents,
            self.backend.clone(),
            pipeline,
            self.clock.clone(),
            logger.clone(),
        );
        let scheduler = Scheduler::new(
            executor.clone(),
            &self.config.agents,
            self.config.check_interval(),
            self.clock.clone(),
            logger,
        );
        *runtime = Some(Runtime {
            executor,
            scheduler,
        });
        Ok(())
    }

    /// Attach a connector; its lifecycle now belongs to the fleet.
    pub fn attach_connector(&self, connector: Arc<dyn ManagedConnector>) {
        self.connectors.lock().push(connector);
    }

    /// Start the scheduler and all attached connectors, and prepare the
    /// state directory artefacts the core owns.
    pub async fn start(&self) -> Result<(), FleetError> {
        let scheduler = {
            let runtime = self.runtime.lock();
            let runtime = runtime.as_ref().ok_or(FleetError::NotInitialized)?;
            runtime.scheduler.clone()
        };

        std::fs::create_dir_all(self.config.state_dir.join("logs")).map_err(|e| {
            FleetError::StateDir {
                path: self.config.state_dir.clone(),
                source: e,
            }
        })?;

        scheduler.start()?;
        for connector in self.connectors.lock().iter().cloned().collect::<Vec<_>>() {
            if let Err(e) = connector.start().await {
                // A failing connector degrades only itself.
                self.record_error(format!("connector {} failed to start: {e}", connector.platform()));
            }
        }

        *self.state.lock() = FleetState::Running;
        *self.started_at_ms.lock() = Some(self.clock.epoch_ms());
        self.log(LogLevel::Info, "fleet", "fleet started");
        Ok(())
    }

    /// Graceful shutdown: scheduler first (no new triggers), drain jobs
    /// up to the grace window, cancel stragglers, then disconnect
    /// connectors.
    pub async fn stop(&self) {
        *self.state.lock() = FleetState::Stopping;
        self.log(LogLevel::Info, "fleet", "fleet stopping");

        let runtime_parts = {
            let runtime = self.runtime.lock();
            runtime
                .as_ref()
                .map(|r| (r.scheduler.clone(), r.executor.clone()))
        };

        if let Some((scheduler, executor)) = runtime_parts {
            scheduler.stop();

            let grace = self.config.shutdown_grace();
            let half = grace / 2;
            if !executor.wait_idle(half).await {
                self.log(
                    LogLevel::Warn,
                    "fleet",
                    "jobs still running, requesting cancellation",
                );
                executor.cancel_all();
                if !executor.wait_idle(grace - half).await {
                    self.log(
                        LogLevel::Warn,
                        "fleet",
                        "grace window elapsed, hard-stopping remaining jobs",
                    );
                    executor.hard_stop();
                }
            }
        }

        for connector in self.connectors.lock().iter().cloned().collect::<Vec<_>>() {
            connector.stop().await;
        }

        *self.state.lock() = FleetState::Stopped;
        self.log(LogLevel::Info, "fleet", "fleet stopped");
    }

    /// Manual trigger; same taxonomy as the executor's admission.
    pub fn trigger(
        &self,
        agent: &str,
        schedule: Option<&str>,
        opts: TriggerOptions,
    ) -> Result<TriggerResult, TriggerError> {
        self.trigger_with_origin(agent, schedule, TriggerOrigin::Manual, opts)
    }

    fn trigger_with_origin(
        &self,
        agent: &str,
        schedule: Option<&str>,
        origin: TriggerOrigin,
        opts: TriggerOptions,
    ) -> Result<TriggerResult, TriggerError> {
        let executor = {
            let runtime = self.runtime.lock();
            runtime
                .as_ref()
                .map(|r| r.executor.clone())
                .ok_or(TriggerError::NotRunning)?
        };
        executor.trigger(agent, schedule, origin, opts)
    }

    pub fn get_fleet_status(&self) -> FleetStatus {
        let state = *self.state.lock();
        let uptime_ms = self
            .started_at_ms
            .lock()
            .map(|started| self.clock.epoch_ms().saturating_sub(started))
            .unwrap_or(0);

        let runtime = self.runtime.lock();
        let (scheduler_status, executor) = match runtime.as_ref() {
            Some(r) => (r.scheduler.status(), Some(&r.executor)),
            None => (
                crate::status::SchedulerStatus {
                    running: false,
                    check_count: 0,
                    trigger_count: 0,
                    skipped_due_to_concurrency: 0,
                    last_check_at_ms: None,
                    check_interval_ms: self.config.check_interval_ms,
                },
                None,
            ),
        };

        let mut agents_running = 0;
        let mut agents_error = 0;
        if let Some(executor) = executor {
            for name in executor.agent_names() {
                if executor.running_count(name) > 0 {
                    agents_running += 1;
                } else if matches!(
                    executor.last_outcome(name),
                    Some(herd_core::JobOutcome::Failed) | Some(herd_core::JobOutcome::Timeout)
                ) {
                    agents_error += 1;
                }
            }
        }
        let agents_total = self.config.agents.len();
        let jobs_running = executor.map(|e| e.total_running()).unwrap_or(0);
        let schedules_total: usize = self.config.agents.iter().map(|a| a.schedules.len()).sum();
        let schedules_active: usize = self
            .config
            .agents
            .iter()
            .flat_map(|a| &a.schedules)
            .filter(|s| s.enabled && s.spec.fires_from_scheduler())
            .count();

        let last_error = runtime
            .as_ref()
            .and_then(|r| r.scheduler.last_error())
            .or_else(|| self.last_error.lock().clone());

        FleetStatus {
            state,
            uptime_ms,
            agents_total,
            agents_idle: agents_total.saturating_sub(agents_running + agents_error),
            agents_running,
            agents_error,
            schedules_total,
            schedules_active,
            jobs_running,
            scheduler: scheduler_status,
            last_error,
        }
    }

    pub fn get_agent_info(&self) -> Vec<AgentInfo> {
        self.config
            .agents
            .iter()
            .map(|agent| self.agent_info(agent))
            .collect()
    }

    pub fn get_agent_info_by_name(&self, name: &str) -> Result<AgentInfo, TriggerError> {
        self.config
            .agents
            .iter()
            .find(|a| a.name == name)
            .map(|agent| self.agent_info(agent))
            .ok_or_else(|| TriggerError::AgentNotFound(name.to_string()))
    }

    fn agent_info(&self, agent: &herd_core::AgentSpec) -> AgentInfo {
        let runtime = self.runtime.lock();
        let executor = runtime.as_ref().map(|r| &r.executor);
        AgentInfo {
            name: agent.name.clone(),
            running_jobs: executor
                .map(|e| e.running_count(&agent.name))
                .unwrap_or(0),
            max_concurrent: agent.max_concurrent,
            schedules: agent
                .schedules
                .iter()
                .map(|s| ScheduleInfo {
                    name: s.name.clone(),
                    kind: s.spec.kind(),
                    enabled: s.enabled,
                })
                .collect(),
            last_outcome: executor.and_then(|e| e.last_outcome(&agent.name)),
            chat_platforms: agent.chat.iter().map(|c| c.platform.clone()).collect(),
        }
    }

    /// Multiplex the daemon-wide log stream.
    pub fn stream_logs(&self, min_level: LogLevel, include_history: bool) -> LogStream {
        self.broadcast.subscribe(min_level, include_history)
    }

    pub fn stream_job_output(&self, job_id: &JobId) -> Option<JobOutputStream> {
        let runtime = self.runtime.lock();
        runtime
            .as_ref()
            .and_then(|r| r.executor.stream_job_output(job_id))
    }

    fn record_error(&self, message: String) {
        tracing::error!(%message);
        self.log(LogLevel::Error, "fleet", message.clone());
        *self.last_error.lock() = Some(message);
    }

    fn log(&self, level: LogLevel, source: &str, message: impl Into<String>) {
        self.broadcast.publish(herd_core::LogEntry::new(
            self.clock.epoch_ms(),
            level,
            source,
            message,
        ));
    }
}

impl<C: Clock> TriggerApi for FleetManager<C> {
    fn trigger(
        &self,
        agent: &str,
        schedule: Option<&str>,
        origin: TriggerOrigin,
        opts: TriggerOptions,
    ) -> Result<TriggerResult, TriggerError> {
        self.trigger_with_origin(agent, schedule, origin, opts)
    }

    fn job(&self, job_id: &JobId) -> Option<herd_core::JobRecord> {
        let runtime = self.runtime.lock();
        runtime.as_ref().and_then(|r| r.executor.job(job_id))
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
