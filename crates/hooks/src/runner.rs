// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! The hook runner capability and the factory over hook kinds.

use crate::http::HttpRunner;
use crate::notify::{ChatNotificationRunner, WebhookPoster};
use crate::subprocess::SubprocessRunner;
use async_trait::async_trait;
use herd_core::{HookAction, HookConfig, HookContext};
use std::time::Duration;
use thiserror::Error;

/// Errors from hook execution
#[derive(Debug, Error)]
pub enum HookError {
    #[error("hook timed out after {0:?}")]
    Timeout(Duration),
    #[error("{}", exit_message(*code, stderr))]
    ExitNonZero { code: i32, stderr: String },
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("token env var {0} is not set")]
    TokenMissing(String),
    #[error("spawn failed: {0}")]
    Spawn(String),
    #[error("request failed: {0}")]
    Request(String),
}

fn exit_message(code: i32, stderr: &str) -> String {
    if stderr.is_empty() {
        format!("Exit code {code}")
    } else {
        format!("Exit code {code}: {stderr}")
    }
}

impl HookError {
    /// Stable machine-readable identifier.
    pub fn code(&self) -> String {
        match self {
            HookError::Timeout(_) => "HOOK_TIMEOUT".to_string(),
            HookError::ExitNonZero { .. } => "HOOK_EXIT_NONZERO".to_string(),
            HookError::HttpStatus { status, .. } => format!("HOOK_HTTP_{status}"),
            HookError::TokenMissing(_) => "HOOK_TOKEN_MISSING".to_string(),
            HookError::Spawn(_) => "HOOK_SPAWN_FAILED".to_string(),
            HookError::Request(_) => "HOOK_REQUEST_FAILED".to_string(),
        }
    }
}

/// Executes one hook kind. Returns captured output on success.
#[async_trait]
pub trait HookRunner: Send + Sync {
    async fn execute(&self, hook: &HookConfig, ctx: &HookContext) -> Result<String, HookError>;
}

/// The three runners, constructed once and dispatched by tag.
pub struct RunnerSet {
    subprocess: SubprocessRunner,
    http: HttpRunner,
    notify: ChatNotificationRunner,
}

impl RunnerSet {
    pub fn new() -> Self {
        let client = reqwest::Client::new();
        Self {
            subprocess: SubprocessRunner,
            http: HttpRunner::new(client.clone()),
            notify: ChatNotificationRunner::new(std::sync::Arc::new(WebhookPoster::new(client))),
        }
    }

    /// Point the built-in webhook poster at an endpoint.
    pub fn with_notification_endpoint(self, endpoint: impl Into<String>) -> Self {
        let poster = WebhookPoster::new(reqwest::Client::new()).with_endpoint(endpoint);
        self.with_notification_poster(std::sync::Arc::new(poster))
    }

    /// Swap the notification delivery capability (platform bridges).
    pub fn with_notification_poster(
        mut self,
        poster: std::sync::Arc<dyn crate::notify::NotificationPoster>,
    ) -> Self {
        self.notify = ChatNotificationRunner::new(poster);
        self
    }

    pub fn runner(&self, action: &HookAction) -> &dyn HookRunner {
        match action {
            HookAction::Subprocess { .. } => &self.subprocess,
            HookAction::Http { .. } => &self.http,
            HookAction::ChatNotification { .. } => &self.notify,
        }
    }
}

impl Default for RunnerSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
