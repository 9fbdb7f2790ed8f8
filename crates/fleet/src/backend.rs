// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! The agent backend capability.
//!
//! The LLM substrate is opaque to the fleet: it receives a prompt plus
//! session/workspace/permission context and returns the final text and
//! the (possibly new) backend session id. SDK-vs-subprocess is a concern
//! of implementations, never of this crate.

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors from backend invocations
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend error: {0}")]
    Failed(String),
}

impl BackendError {
    pub fn code(&self) -> &'static str {
        "BACKEND_ERROR"
    }
}

/// Everything a backend needs for one invocation.
#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub agent: String,
    /// Backend selection key from the agent config, opaque to the fleet.
    pub backend: String,
    pub prompt: String,
    /// Prior-conversation context prepared by a chat connector.
    pub conversation_context: Option<String>,
    /// Opaque session to resume; the response may carry a replacement.
    pub session_id: Option<String>,
    pub workdir: PathBuf,
    pub model: Option<String>,
    pub allowed_tools: Vec<String>,
    pub denied_tools: Vec<String>,
    /// Absolute path the backend should write job metadata to.
    pub metadata_path: Option<PathBuf>,
    pub work_source: Option<String>,
}

/// What a backend hands back on normal end.
#[derive(Debug, Clone, Default)]
pub struct BackendResponse {
    pub text: String,
    pub session_id: Option<String>,
}

/// The LLM-invocation substrate.
///
/// Implementations must return promptly once `cancel` fires; the
/// executor separately bounds the call with the agent's session timeout.
#[async_trait]
pub trait AgentBackend: Send + Sync + 'static {
    async fn invoke(
        &self,
        request: BackendRequest,
        cancel: CancellationToken,
    ) -> Result<BackendResponse, BackendError>;
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub(crate) mod fake {
    use super::{AgentBackend, BackendError, BackendRequest, BackendResponse};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    /// Recorded invocation
    #[derive(Debug, Clone)]
    pub struct FakeCall {
        pub agent: String,
        pub prompt: String,
        pub session_id: Option<String>,
        pub conversation_context: Option<String>,
    }

    /// Scripted backend for tests.
    ///
    /// Unscripted calls succeed with `"ok"` and echo the request session
    /// id. A configured delay runs on the tokio clock so paused-time
    /// tests control it.
    #[derive(Default)]
    pub struct FakeBackend {
        delay: Mutex<Duration>,
        metadata_json: Mutex<Option<String>>,
        responses: Mutex<VecDeque<Result<BackendResponse, BackendError>>>,
        calls: Mutex<Vec<FakeCall>>,
    }

    impl FakeBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_delay(&self, delay: Duration) {
            *self.delay.lock() = delay;
        }

        /// Bytes written to the request's metadata path on each call.
        pub fn set_metadata_json(&self, raw: impl Into<String>) {
            *self.metadata_json.lock() = Some(raw.into());
        }

        pub fn push_response(&self, response: Result<BackendResponse, BackendError>) {
            self.responses.lock().push_back(response);
        }

        pub fn push_text(&self, text: impl Into<String>) {
            self.push_response(Ok(BackendResponse {
                text: text.into(),
                session_id: None,
            }));
        }

        pub fn push_error(&self, message: impl Into<String>) {
            self.push_response(Err(BackendError::Failed(message.into())));
        }

        pub fn calls(&self) -> Vec<FakeCall> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl AgentBackend for FakeBackend {
        async fn invoke(
            &self,
            request: BackendRequest,
            cancel: CancellationToken,
        ) -> Result<BackendResponse, BackendError> {
            self.calls.lock().push(FakeCall {
                agent: request.agent.clone(),
                prompt: request.prompt.clone(),
                session_id: request.session_id.clone(),
                conversation_context: request.conversation_context.clone(),
            });

            let delay = *self.delay.lock();
            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {
                        return Err(BackendError::Failed("cancelled".to_string()));
                    }
                }
            }

            if let (Some(raw), Some(path)) =
                (self.metadata_json.lock().clone(), &request.metadata_path)
            {
                if let Some(parent) = path.parent() {
                    let _ = std::fs::create_dir_all(parent);
                }
                let _ = std::fs::write(path, raw);
            }

            match self.responses.lock().pop_front() {
                Some(scripted) => scripted.map(|mut r| {
                    if r.session_id.is_none() {
                        r.session_id = request.session_id.clone();
                    }
                    r
                }),
                None => Ok(BackendResponse {
                    text: "ok".to_string(),
                    session_id: request.session_id.clone(),
                }),
            }
        }
    }
}
