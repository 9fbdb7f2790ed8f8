// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! Subprocess hooks: shell command with the hook context on stdin.

use crate::runner::{HookError, HookRunner};
use async_trait::async_trait;
use herd_core::{HookAction, HookConfig, HookContext};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Runs `sh -c <command>`, writing the full `HookContext` as JSON to the
/// child's stdin. Exit code 0 captures stdout as the hook output;
/// non-zero surfaces stderr as the failure message.
pub struct SubprocessRunner;

#[async_trait]
impl HookRunner for SubprocessRunner {
    async fn execute(&self, hook: &HookConfig, ctx: &HookContext) -> Result<String, HookError> {
        let HookAction::Subprocess { command } = &hook.action else {
            return Err(HookError::Spawn("not a subprocess hook".to_string()));
        };

        let payload = serde_json::to_vec(ctx)
            .map_err(|e| HookError::Spawn(format!("failed to encode context: {e}")))?;

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // The pipeline enforces the timeout by dropping this future;
            // the child must not outlive it.
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| HookError::Spawn(e.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&payload)
                .await
                .map_err(|e| HookError::Spawn(format!("failed to write stdin: {e}")))?;
            // Close stdin so `cat`-style commands terminate.
            drop(stdin);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| HookError::Spawn(e.to_string()))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(HookError::ExitNonZero {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
