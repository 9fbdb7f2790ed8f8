// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! herd-hooks: post-job hook runners and the sequential pipeline.
//!
//! Hooks are a tagged variant (`subprocess | http | chat-notification`)
//! dispatched through the [`HookRunner`] trait. The pipeline runs a
//! configured list in order, applying the `on_events` filter, the `when`
//! metadata gate, and each hook's `continue_on_error` policy.

mod http;
mod notify;
mod pipeline;
mod runner;
mod subprocess;

pub use http::{substitute_env_vars, HttpRunner};
pub use notify::{
    ChatNotificationRunner, Notification, NotificationField, NotificationPoster, WebhookPoster,
    FOOTER_TAG, NOTIFY_OUTPUT_LIMIT,
};
pub use pipeline::{HookPipeline, HookResultEntry, HookStatus, PipelineReport};
pub use runner::{HookError, HookRunner, RunnerSet};
pub use subprocess::SubprocessRunner;
