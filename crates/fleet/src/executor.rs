// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! The job executor: trigger admission through terminal outcome.
//!
//! Admission is synchronous (agent/schedule lookup + concurrency gate);
//! everything after runs on a spawned task per job:
//!
//! ```text
//! created → starting → running → (completed | failed | timeout | cancelled)
//! ```
//!
//! Hooks dispatch exactly once per terminal job: `after_run` for every
//! event, then `on_error` when the final event is `failed`. A
//! `continue_on_error: false` hook failure downgrades a completed job to
//! failed before `on_error` is considered.

use crate::backend::{AgentBackend, BackendRequest};
use crate::error::TriggerError;
use crate::logstream::{JobChannel, JobOutputStream};
use herd_core::{
    AgentSpec, Clock, FleetLogger, HookContext, JobId, JobOutcome, JobRecord, JobState, LogEntry,
    LogLevel, Trigger, TriggerOrigin,
};
use herd_hooks::HookPipeline;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;

/// Handle returned by successful admission.
#[derive(Debug, Clone)]
pub struct TriggerResult {
    pub job_id: JobId,
    pub agent: String,
}

/// Caller-supplied trigger parameters.
#[derive(Debug, Clone, Default)]
pub struct TriggerOptions {
    pub prompt: Option<String>,
    pub metadata_seed: Option<Value>,
    pub session_id: Option<String>,
    pub conversation_context: Option<String>,
}

struct JobEntry {
    record: JobRecord,
    channel: Arc<JobChannel>,
}

/// Runs jobs for the fleet's agents.
pub struct JobExecutor<C: Clock> {
    agents: HashMap<String, Arc<AgentSpec>>,
    /// Agent names in configuration order (map iteration is unordered).
    agent_order: Vec<String>,
    backend: Arc<dyn AgentBackend>,
    pipeline: HookPipeline<C>,
    clock: C,
    logger: Arc<dyn FleetLogger>,
    running: Mutex<HashMap<String, usize>>,
    last_outcome: Mutex<HashMap<String, JobOutcome>>,
    jobs: Mutex<HashMap<JobId, JobEntry>>,
    /// Graceful cancellation: live jobs settle as `cancelled` and still
    /// dispatch their hooks.
    cancel: CancellationToken,
    /// Hard stop: past the shutdown grace window, hook dispatch is
    /// skipped for anything still in flight.
    hard_stop: CancellationToken,
    /// Back-reference for spawning job tasks from `&self` methods.
    self_ref: Weak<Self>,
}

impl<C: Clock> JobExecutor<C> {
    pub fn new(
        agents: &[AgentSpec],
        backend: Arc<dyn AgentBackend>,
        pipeline: HookPipeline<C>,
        clock: C,
        logger: Arc<dyn FleetLogger>,
    ) -> Arc<Self> {
        let agent_order: Vec<String> = agents.iter().map(|a| a.name.clone()).collect();
        let agents = agents
            .iter()
            .map(|a| (a.name.clone(), Arc::new(a.clone())))
            .collect();
        Arc::new_cyclic(|self_ref| Self {
            agents,
            agent_order,
            backend,
            pipeline,
            clock,
            logger,
            running: Mutex::new(HashMap::new()),
            last_outcome: Mutex::new(HashMap::new()),
            jobs: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
            hard_stop: CancellationToken::new(),
            self_ref: self_ref.clone(),
        })
    }

    pub fn agent(&self, name: &str) -> Option<&Arc<AgentSpec>> {
        self.agents.get(name)
    }

    /// Agent names in configuration order.
    pub fn agent_names(&self) -> &[String] {
        &self.agent_order
    }

    /// Jobs currently in flight for one agent.
    pub fn running_count(&self, agent: &str) -> usize {
        self.running.lock().get(agent).copied().unwrap_or(0)
    }

    /// Jobs currently in flight across the fleet.
    pub fn total_running(&self) -> usize {
        self.running.lock().values().sum()
    }

    pub fn last_outcome(&self, agent: &str) -> Option<JobOutcome> {
        self.last_outcome.lock().get(agent).copied()
    }

    /// Snapshot of a job record.
    pub fn job(&self, job_id: &JobId) -> Option<JobRecord> {
        self.jobs.lock().get(job_id).map(|e| e.record.clone())
    }

    /// Attach to a job's log stream; replays buffered entries and ends at
    /// the terminal transition. `None` for unknown jobs.
    pub fn stream_job_output(&self, job_id: &JobId) -> Option<JobOutputStream> {
        self.jobs.lock().get(job_id).map(|e| e.channel.subscribe())
    }

    /// Admit a trigger. Synchronous: resolves the agent and schedule,
    /// gates on the per-agent concurrency cap, and spawns the job task.
    pub fn trigger(
        &self,
        agent_name: &str,
        schedule_name: Option<&str>,
        origin: TriggerOrigin,
        opts: TriggerOptions,
    ) -> Result<TriggerResult, TriggerError> {
        let agent = self
            .agents
            .get(agent_name)
            .ok_or_else(|| TriggerError::AgentNotFound(agent_name.to_string()))?
            .clone();

        let schedule = match schedule_name {
            Some(name) => Some(agent.schedule(name).ok_or_else(|| {
                TriggerError::ScheduleNotFound {
                    agent: agent_name.to_string(),
                    schedule: name.to_string(),
                }
            })?),
            None => None,
        };

        // Admission gate: increment inside the lock so the cap holds
        // under concurrent triggers.
        {
            let mut running = self.running.lock();
            let count = running.entry(agent_name.to_string()).or_insert(0);
            if *count >= agent.max_concurrent {
                return Err(TriggerError::ConcurrencyLimitReached {
                    agent: agent_name.to_string(),
                    limit: agent.max_concurrent,
                });
            }
            *count += 1;
        }

        let prompt = agent
            .resolve_prompt(schedule, opts.prompt.as_deref())
            .unwrap_or_default();
        let mut trigger = Trigger::new(agent_name, prompt, origin);
        trigger.schedule = schedule_name.map(str::to_string);
        trigger.work_source = schedule.and_then(|s| s.work_source.clone());
        trigger.session_id = opts.session_id;
        trigger.conversation_context = opts.conversation_context;
        trigger.metadata_seed = opts.metadata_seed;

        let job_id = JobId::generate(&self.clock);
        let record = JobRecord::new(job_id.clone(), &trigger, self.clock.epoch_ms());
        let channel = JobChannel::new();
        self.jobs.lock().insert(
            job_id.clone(),
            JobEntry {
                record,
                channel: channel.clone(),
            },
        );

        self.log_job(
            LogLevel::Info,
            &channel,
            &job_id,
            agent_name,
            format!("job admitted ({origin})"),
        );

        // The executor always lives behind an Arc (see `new`), so the
        // upgrade only fails during teardown, when running the job is
        // moot anyway.
        if let Some(executor) = self.self_ref.upgrade() {
            let spawned_id = job_id.clone();
            tokio::spawn(async move {
                executor.run_job(spawned_id, agent, trigger, channel).await;
            });
        }

        Ok(TriggerResult {
            job_id,
            agent: agent_name.to_string(),
        })
    }

    /// Request graceful cancellation of every live job.
    pub fn cancel_all(&self) {
        self.cancel.cancel();
    }

    /// Past the shutdown deadline: skip hook dispatch for stragglers.
    pub fn hard_stop(&self) {
        self.hard_stop.cancel();
        self.cancel.cancel();
    }

    /// Wait for in-flight jobs to settle, up to `grace`. True if idle.
    pub async fn wait_idle(&self, grace: std::time::Duration) -> bool {
        let deadline = tokio::time::Instant::now() + grace;
        loop {
            if self.total_running() == 0 {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(std::time::Duration::from_millis(25)).await;
        }
    }

    async fn run_job(
        self: Arc<Self>,
        job_id: JobId,
        agent: Arc<AgentSpec>,
        trigger: Trigger,
        channel: Arc<JobChannel>,
    ) {
        let job_cancel = self.cancel.child_token();

        // created → starting: entered once workspace preparation
        // succeeds. The session (if any) was already resolved by the
        // trigger path.
        let workdir = agent.workspace.clone();
        if !workdir.as_os_str().is_empty() {
            if let Err(e) = std::fs::create_dir_all(&workdir) {
                self.log_job(
                    LogLevel::Error,
                    &channel,
                    &job_id,
                    &agent.name,
                    format!("failed to prepare workspace {}: {e}", workdir.display()),
                );
                self.settle(&job_id, &agent, &channel, JobOutcome::Failed, Some(e.to_string()))
                    .await;
                return;
            }
        }
        self.transition(&job_id, &agent.name, &channel, JobState::Starting);

        let metadata_path = agent
            .metadata_file
            .as_ref()
            .map(|file| workdir.join(file));
        let request = BackendRequest {
            agent: agent.name.clone(),
            backend: agent.backend.clone(),
            prompt: trigger.prompt.clone(),
            conversation_context: trigger.conversation_context.clone(),
            session_id: trigger.session_id.clone(),
            workdir,
            model: agent.model.clone(),
            allowed_tools: agent.permissions.allowed_tools.clone(),
            denied_tools: agent.permissions.denied_tools.clone(),
            metadata_path: metadata_path.clone(),
            work_source: trigger.work_source.clone(),
        };

        // starting → running: the backend accepted the prompt.
        self.transition(&job_id, &agent.name, &channel, JobState::Running);

        let invocation = self.backend.invoke(request, job_cancel.clone());
        let (outcome, output, error) = tokio::select! {
            // Cancellation wins over a simultaneously-completing backend
            // so fleet stop settles jobs as cancelled, not failed.
            biased;
            _ = job_cancel.cancelled() => {
                (JobOutcome::Cancelled, None, Some("cancelled".to_string()))
            }
            result = tokio::time::timeout(agent.session_timeout(), invocation) => {
                match result {
                    Ok(Ok(response)) => {
                        if response.session_id.is_some() {
                            if let Some(entry) = self.jobs.lock().get_mut(&job_id) {
                                entry.record.session_id = response.session_id.clone();
                            }
                        }
                        (JobOutcome::Completed, Some(response.text), None)
                    }
                    Ok(Err(e)) => {
                        self.log_job(
                            LogLevel::Error,
                            &channel,
                            &job_id,
                            &agent.name,
                            format!("{}: {e}", e.code()),
                        );
                        (JobOutcome::Failed, None, Some(e.to_string()))
                    }
                    Err(_) => {
                        job_cancel.cancel();
                        self.log_job(
                            LogLevel::Error,
                            &channel,
                            &job_id,
                            &agent.name,
                            format!(
                                "BACKEND_TIMEOUT: no completion within {:?}",
                                agent.session_timeout()
                            ),
                        );
                        (
                            JobOutcome::Timeout,
                            None,
                            Some(format!(
                                "session timeout after {:?}",
                                agent.session_timeout()
                            )),
                        )
                    }
                }
            }
        };

        if let Some(output) = output {
            if let Some(entry) = self.jobs.lock().get_mut(&job_id) {
                entry.record.set_output(output);
            }
        }
        if let Some(path) = metadata_path {
            self.attach_metadata(&job_id, &agent.name, &channel, &path);
        }

        self.settle(&job_id, &agent, &channel, outcome, error).await;
    }

    /// Decode the agent-written metadata file onto the job record.
    /// A decode failure logs a warning and leaves metadata empty; the
    /// job does not fail for it.
    fn attach_metadata(
        &self,
        job_id: &JobId,
        agent: &str,
        channel: &Arc<JobChannel>,
        path: &std::path::Path,
    ) {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                self.log_job(
                    LogLevel::Warn,
                    channel,
                    job_id,
                    agent,
                    format!("failed to read metadata file {}: {e}", path.display()),
                );
                return;
            }
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(tree) => {
                if let Some(entry) = self.jobs.lock().get_mut(job_id) {
                    entry.record.metadata = Some(merge_metadata(entry.record.metadata.take(), tree));
                }
            }
            Err(e) => {
                self.log_job(
                    LogLevel::Warn,
                    channel,
                    job_id,
                    agent,
                    format!("metadata file {} is not valid JSON: {e}", path.display()),
                );
            }
        }
    }

    /// Finalize the record and dispatch hooks exactly once.
    async fn settle(
        &self,
        job_id: &JobId,
        agent: &Arc<AgentSpec>,
        channel: &Arc<JobChannel>,
        outcome: JobOutcome,
        error: Option<String>,
    ) {
        let completed_at = self.clock.epoch_ms();

        if self.hard_stop.is_cancelled() {
            self.log_job(
                LogLevel::Warn,
                channel,
                job_id,
                &agent.name,
                "shutdown deadline elapsed, skipping hook dispatch".to_string(),
            );
            self.finalize_record(job_id, &agent.name, channel, outcome, error, completed_at);
            channel.close();
            return;
        }

        // Provisional view for after_run; the real record finalizes once
        // the escalation decision is known.
        let mut provisional = match self.jobs.lock().get(job_id) {
            Some(entry) => entry.record.clone(),
            None => return,
        };
        provisional.error = error.clone();
        provisional.finalize(outcome, completed_at);

        let mut final_outcome = outcome;
        let mut final_error = error;

        let ctx = HookContext::for_job(&provisional, agent.display_name.as_deref());
        let after = self.pipeline.run(&agent.hooks.after_run, &ctx).await;
        if after.should_fail_job && final_outcome == JobOutcome::Completed {
            let failing = after.results.iter().rev().find(|r| r.error.is_some());
            final_outcome = JobOutcome::Failed;
            final_error = Some(match failing {
                Some(result) => format!(
                    "hook '{}' failed: {}",
                    result.hook,
                    result.error.as_deref().unwrap_or("unknown")
                ),
                None => "hook failed".to_string(),
            });
            self.log_job(
                LogLevel::Error,
                channel,
                job_id,
                &agent.name,
                "job downgraded to failed by hook failure".to_string(),
            );
        }

        // Finalize before on_error so its context reflects the settled
        // outcome.
        self.finalize_record(
            job_id,
            &agent.name,
            channel,
            final_outcome,
            final_error,
            completed_at,
        );

        if final_outcome == JobOutcome::Failed {
            let failed_record = self.jobs.lock().get(job_id).map(|e| e.record.clone());
            if let Some(failed_record) = failed_record {
                let ctx = HookContext::for_job(&failed_record, agent.display_name.as_deref());
                let _ = self.pipeline.run(&agent.hooks.on_error, &ctx).await;
            }
        }
        channel.close();
    }

    fn finalize_record(
        &self,
        job_id: &JobId,
        agent: &str,
        channel: &Arc<JobChannel>,
        outcome: JobOutcome,
        error: Option<String>,
        completed_at: u64,
    ) {
        {
            let mut jobs = self.jobs.lock();
            if let Some(entry) = jobs.get_mut(job_id) {
                entry.record.error = error;
                entry.record.finalize(outcome, completed_at);
            }
        }
        {
            let mut running = self.running.lock();
            if let Some(count) = running.get_mut(agent) {
                *count = count.saturating_sub(1);
            }
        }
        self.last_outcome
            .lock()
            .insert(agent.to_string(), outcome);
        let level = if outcome.success() {
            LogLevel::Info
        } else {
            LogLevel::Error
        };
        self.log_job(
            level,
            channel,
            job_id,
            agent,
            format!("job {outcome}"),
        );
    }

    fn transition(
        &self,
        job_id: &JobId,
        agent: &str,
        channel: &Arc<JobChannel>,
        state: JobState,
    ) {
        if let Some(entry) = self.jobs.lock().get_mut(job_id) {
            entry.record.advance(state);
        }
        self.log_job(
            LogLevel::Debug,
            channel,
            job_id,
            agent,
            format!("job {state}"),
        );
    }

    fn log_job(
        &self,
        level: LogLevel,
        channel: &Arc<JobChannel>,
        job_id: &JobId,
        agent: &str,
        message: String,
    ) {
        tracing::debug!(job_id = %job_id, agent, %message);
        let entry = LogEntry::new(self.clock.epoch_ms(), level, "executor", message)
            .agent(agent)
            .job_id(job_id.clone());
        channel.publish(entry.clone());
        self.logger.log(entry);
    }
}

/// Shallow-merge the agent-written tree over the trigger seed.
fn merge_metadata(seed: Option<Value>, file_tree: Value) -> Value {
    match (seed, file_tree) {
        (Some(Value::Object(mut base)), Value::Object(written)) => {
            for (key, value) in written {
                base.insert(key, value);
            }
            Value::Object(base)
        }
        (_, written) => written,
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
