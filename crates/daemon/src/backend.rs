// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! Subprocess backend surface.
//!
//! The real LLM substrate is external to the core; this adapter runs the
//! agent's configured backend command as a shell child, feeding the
//! prompt (with any conversation context prepended) on stdin and taking
//! stdout as the result text. Session ids pass through via the
//! `HERD_SESSION_ID` environment variable.

use async_trait::async_trait;
use herd_fleet::{AgentBackend, BackendError, BackendRequest, BackendResponse};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

const DEFAULT_COMMAND: &str = "cat";

/// Shell-command backend. The agent's `backend` field is the command;
/// empty falls back to an echoing default.
pub struct CommandBackend {
    default_command: String,
}

impl Default for CommandBackend {
    fn default() -> Self {
        Self {
            default_command: DEFAULT_COMMAND.to_string(),
        }
    }
}

#[async_trait]
impl AgentBackend for CommandBackend {
    async fn invoke(
        &self,
        request: BackendRequest,
        cancel: CancellationToken,
    ) -> Result<BackendResponse, BackendError> {
        let command = if request.backend.is_empty() {
            self.default_command.clone()
        } else {
            request.backend.clone()
        };

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .current_dir(if request.workdir.as_os_str().is_empty() {
                std::path::PathBuf::from(".")
            } else {
                request.workdir.clone()
            })
            .env(
                "HERD_SESSION_ID",
                request.session_id.clone().unwrap_or_default(),
            )
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BackendError::Failed(e.to_string()))?;

        let mut input = String::new();
        if let Some(context) = &request.conversation_context {
            input.push_str(context);
            input.push_str("\n\n");
        }
        input.push_str(&request.prompt);
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .await
                .map_err(|e| BackendError::Failed(e.to_string()))?;
            drop(stdin);
        }

        let output = tokio::select! {
            output = child.wait_with_output() => {
                output.map_err(|e| BackendError::Failed(e.to_string()))?
            }
            _ = cancel.cancelled() => {
                return Err(BackendError::Failed("cancelled".to_string()));
            }
        };

        if !output.status.success() {
            return Err(BackendError::Failed(format!(
                "backend command exited with {}: {}",
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(BackendResponse {
            text: String::from_utf8_lossy(&output.stdout).into_owned(),
            session_id: request.session_id.clone(),
        })
    }
}
