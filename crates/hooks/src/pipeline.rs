// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! Sequential hook execution with filtering and failure policy.

use crate::runner::RunnerSet;
use herd_core::{Clock, FleetLogger, HookConfig, HookContext, JobId, LogEntry, LogLevel};
use serde::Serialize;
use std::sync::Arc;

/// What happened to one hook in a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookStatus {
    Succeeded,
    Failed,
    Skipped,
}

herd_core::simple_display! {
    HookStatus {
        Succeeded => "succeeded",
        Failed => "failed",
        Skipped => "skipped",
    }
}

/// Per-hook result entry.
#[derive(Debug, Clone, Serialize)]
pub struct HookResultEntry {
    pub hook: String,
    pub kind: &'static str,
    pub status: HookStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<&'static str>,
    pub duration_ms: u64,
}

/// Outcome of one pipeline run over a hook list.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub success: bool,
    pub total_hooks: usize,
    pub successful_hooks: usize,
    pub failed_hooks: usize,
    pub skipped_hooks: usize,
    /// Set when a `continue_on_error: false` hook failed; the executor
    /// downgrades the job to `failed`.
    pub should_fail_job: bool,
    pub total_duration_ms: u64,
    pub results: Vec<HookResultEntry>,
}

impl PipelineReport {
    fn empty() -> Self {
        Self {
            success: true,
            total_hooks: 0,
            successful_hooks: 0,
            failed_hooks: 0,
            skipped_hooks: 0,
            should_fail_job: false,
            total_duration_ms: 0,
            results: Vec::new(),
        }
    }
}

/// Runs hook lists strictly in configuration order.
///
/// On a `failed` terminal event the executor dispatches `after_run`
/// first and `on_error` second; each list runs exactly once per
/// terminal job.
pub struct HookPipeline<C: Clock> {
    runners: RunnerSet,
    clock: C,
    logger: Arc<dyn FleetLogger>,
}

impl<C: Clock> HookPipeline<C> {
    pub fn new(runners: RunnerSet, clock: C, logger: Arc<dyn FleetLogger>) -> Self {
        Self {
            runners,
            clock,
            logger,
        }
    }

    /// Execute `hooks` against `ctx`, in order.
    ///
    /// Per hook: the `on_events` filter, then the `when` metadata gate,
    /// then execution under the hook's own timeout. A failing hook with
    /// `continue_on_error: false` sets `should_fail_job` and
    /// short-circuits the remainder.
    pub async fn run(&self, hooks: &[HookConfig], ctx: &HookContext) -> PipelineReport {
        let mut report = PipelineReport::empty();
        report.total_hooks = hooks.len();
        let started = self.clock.now();

        for hook in hooks {
            if !hook.applies_to(ctx.event) {
                report.skipped_hooks += 1;
                report.results.push(skipped(hook, "event_filter"));
                continue;
            }
            if let Some(when) = &hook.when {
                if !ctx.when_matches(when) {
                    report.skipped_hooks += 1;
                    report.results.push(skipped(hook, "when_condition"));
                    continue;
                }
            }

            let hook_started = self.clock.now();
            let outcome = tokio::time::timeout(
                hook.timeout(),
                self.runners.runner(&hook.action).execute(hook, ctx),
            )
            .await
            .unwrap_or(Err(crate::runner::HookError::Timeout(hook.timeout())));
            let duration_ms = (self.clock.now() - hook_started).as_millis() as u64;

            match outcome {
                Ok(output) => {
                    report.successful_hooks += 1;
                    report.results.push(HookResultEntry {
                        hook: hook.label().to_string(),
                        kind: hook.action.kind(),
                        status: HookStatus::Succeeded,
                        output: Some(output),
                        error: None,
                        error_code: None,
                        skip_reason: None,
                        duration_ms,
                    });
                }
                Err(error) => {
                    report.failed_hooks += 1;
                    self.log_failure(hook, ctx, &error);
                    report.results.push(HookResultEntry {
                        hook: hook.label().to_string(),
                        kind: hook.action.kind(),
                        status: HookStatus::Failed,
                        output: None,
                        error: Some(error.to_string()),
                        error_code: Some(error.code()),
                        skip_reason: None,
                        duration_ms,
                    });
                    if !hook.continue_on_error {
                        report.should_fail_job = true;
                        break;
                    }
                }
            }
        }

        report.total_duration_ms = (self.clock.now() - started).as_millis() as u64;
        report.success = report.failed_hooks == 0;
        report
    }

    fn log_failure(&self, hook: &HookConfig, ctx: &HookContext, error: &crate::runner::HookError) {
        tracing::warn!(
            hook = hook.label(),
            job_id = %ctx.job.id,
            code = %error.code(),
            error = %error,
            "hook failed"
        );
        self.logger.log(
            LogEntry::new(
                self.clock.epoch_ms(),
                LogLevel::Warn,
                "hooks",
                format!("hook '{}' failed: {error}", hook.label()),
            )
            .agent(ctx.agent.id.clone())
            .job_id(JobId::from_string(&ctx.job.id)),
        );
    }
}

fn skipped(hook: &HookConfig, reason: &'static str) -> HookResultEntry {
    HookResultEntry {
        hook: hook.label().to_string(),
        kind: hook.action.kind(),
        status: HookStatus::Skipped,
        output: None,
        error: None,
        error_code: None,
        skip_reason: Some(reason),
        duration_ms: 0,
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
