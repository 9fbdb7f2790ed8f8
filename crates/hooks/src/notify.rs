// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! Chat-notification hooks: a colored notification for a named channel.
//!
//! The runner only produces the platform-neutral [`Notification`] shape
//! (title, color, agent/job/duration fields, truncated output, error,
//! footer tag) and hands delivery to a [`NotificationPoster`]. Concrete
//! platform wire formats live behind that capability, the same way
//! connector platforms live behind `ChatPlatform`; the built-in
//! [`WebhookPoster`] ships the neutral shape to a configured JSON
//! endpoint.

use crate::runner::{HookError, HookRunner};
use async_trait::async_trait;
use herd_core::{HookAction, HookConfig, HookContext, HookEvent};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// Fixed product tag shown in every notification footer.
pub const FOOTER_TAG: &str = "herdctl fleet manager";

/// Output beyond this many characters is truncated with an ellipsis.
pub const NOTIFY_OUTPUT_LIMIT: usize = 1_000;

fn event_color(event: HookEvent) -> u32 {
    match event {
        HookEvent::Completed => 0x2ECC71, // green
        HookEvent::Failed => 0xE74C3C,    // red
        HookEvent::Timeout => 0xF39C12,   // amber
        HookEvent::Cancelled => 0x95A5A6, // gray
    }
}

fn event_title(event: HookEvent) -> &'static str {
    match event {
        HookEvent::Completed => "Job Completed",
        HookEvent::Failed => "Job Failed",
        HookEvent::Timeout => "Job Timed Out",
        HookEvent::Cancelled => "Job Cancelled",
    }
}

fn format_duration_ms(ms: u64) -> String {
    if ms < 1_000 {
        format!("{ms}ms")
    } else {
        format!("{:.1}s", ms as f64 / 1_000.0)
    }
}

/// Char-boundary-safe truncation with a trailing ellipsis.
fn truncate_output(output: &str) -> String {
    if output.chars().count() <= NOTIFY_OUTPUT_LIMIT {
        return output.to_string();
    }
    let mut truncated: String = output.chars().take(NOTIFY_OUTPUT_LIMIT).collect();
    truncated.push('…');
    truncated
}

/// One name/value pair of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationField {
    pub name: &'static str,
    pub value: String,
}

/// The platform-neutral notification a terminal job produces.
///
/// Posters map this onto whatever embed/attachment shape their platform
/// speaks; nothing platform-specific appears here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub event: HookEvent,
    pub title: &'static str,
    /// RGB color keyed by the event (green/red/amber/gray).
    pub color: u32,
    pub fields: Vec<NotificationField>,
    pub footer: &'static str,
    /// ISO-8601 completion time of the job.
    pub timestamp: String,
}

impl Notification {
    /// Build the notification for a terminal-job event.
    ///
    /// Agent, job id, and duration always appear; output only when
    /// non-empty (truncated); the error only for non-completed events.
    pub fn for_context(ctx: &HookContext) -> Self {
        let mut fields = vec![
            NotificationField {
                name: "Agent",
                value: ctx
                    .agent
                    .name
                    .clone()
                    .unwrap_or_else(|| ctx.agent.id.clone()),
            },
            NotificationField {
                name: "Job ID",
                value: ctx.job.id.clone(),
            },
            NotificationField {
                name: "Duration",
                value: format_duration_ms(ctx.job.duration_ms),
            },
        ];
        if !ctx.result.output.is_empty() {
            fields.push(NotificationField {
                name: "Output",
                value: truncate_output(&ctx.result.output),
            });
        }
        if ctx.event != HookEvent::Completed {
            if let Some(error) = &ctx.result.error {
                fields.push(NotificationField {
                    name: "Error",
                    value: error.clone(),
                });
            }
        }

        Self {
            event: ctx.event,
            title: event_title(ctx.event),
            color: event_color(ctx.event),
            fields,
            footer: FOOTER_TAG,
            timestamp: ctx.job.completed_at.clone(),
        }
    }
}

/// Delivery capability for chat notifications.
///
/// One implementation per concrete platform (or gateway); the runner
/// never sees a platform wire format.
#[async_trait]
pub trait NotificationPoster: Send + Sync {
    async fn post(
        &self,
        channel: &str,
        token: &str,
        notification: &Notification,
    ) -> Result<(), HookError>;
}

/// Generic JSON-webhook poster: POSTs the neutral notification shape to
/// a configured endpoint with a bearer token. Platform bridges that need
/// a richer wire format implement [`NotificationPoster`] themselves.
pub struct WebhookPoster {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl WebhookPoster {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

#[async_trait]
impl NotificationPoster for WebhookPoster {
    async fn post(
        &self,
        channel: &str,
        token: &str,
        notification: &Notification,
    ) -> Result<(), HookError> {
        let Some(endpoint) = &self.endpoint else {
            return Err(HookError::Request(
                "notification endpoint not configured".to_string(),
            ));
        };

        let response = self
            .client
            .post(endpoint)
            .header("Authorization", format!("Bearer {token}"))
            .json(&json!({
                "channel": channel,
                "notification": notification,
            }))
            .send()
            .await
            .map_err(|e| HookError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(HookError::HttpStatus {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}

/// Resolves the bot token from the configured env var, builds the
/// neutral notification, and delegates delivery to the poster.
pub struct ChatNotificationRunner {
    poster: Arc<dyn NotificationPoster>,
}

impl ChatNotificationRunner {
    pub fn new(poster: Arc<dyn NotificationPoster>) -> Self {
        Self { poster }
    }
}

#[async_trait]
impl HookRunner for ChatNotificationRunner {
    async fn execute(&self, hook: &HookConfig, ctx: &HookContext) -> Result<String, HookError> {
        let HookAction::ChatNotification {
            channel,
            bot_token_env,
        } = &hook.action
        else {
            return Err(HookError::Request("not a chat-notification hook".to_string()));
        };

        let token = std::env::var(bot_token_env)
            .map_err(|_| HookError::TokenMissing(bot_token_env.clone()))?;

        let notification = Notification::for_context(ctx);
        self.poster.post(channel, &token, &notification).await?;
        Ok(String::new())
    }
}

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;
