// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

use super::*;
use std::time::Duration;

#[yare::parameterized(
    timeout   = { HookError::Timeout(Duration::from_secs(10)), "HOOK_TIMEOUT" },
    exit      = { HookError::ExitNonZero { code: 2, stderr: String::new() }, "HOOK_EXIT_NONZERO" },
    http_404  = { HookError::HttpStatus { status: 404, body: String::new() }, "HOOK_HTTP_404" },
    http_503  = { HookError::HttpStatus { status: 503, body: String::new() }, "HOOK_HTTP_503" },
    token     = { HookError::TokenMissing("BOT_TOKEN".into()), "HOOK_TOKEN_MISSING" },
    spawn     = { HookError::Spawn("no shell".into()), "HOOK_SPAWN_FAILED" },
    request   = { HookError::Request("refused".into()), "HOOK_REQUEST_FAILED" },
)]
fn error_codes(error: HookError, expected: &str) {
    assert_eq!(error.code(), expected);
}

#[test]
fn exit_message_includes_stderr_when_present() {
    let bare = HookError::ExitNonZero {
        code: 3,
        stderr: String::new(),
    };
    assert_eq!(bare.to_string(), "Exit code 3");

    let with_stderr = HookError::ExitNonZero {
        code: 1,
        stderr: "boom".to_string(),
    };
    assert_eq!(with_stderr.to_string(), "Exit code 1: boom");
}

#[test]
fn runner_set_dispatches_by_tag() {
    let set = RunnerSet::new();
    // Each tag resolves to a runner without panicking; identity is
    // checked indirectly through the runner-specific tests.
    for action in [
        HookAction::Subprocess {
            command: "true".into(),
        },
        HookAction::Http {
            url: "https://example.test".into(),
            method: Default::default(),
            headers: Default::default(),
        },
        HookAction::ChatNotification {
            channel: "c".into(),
            bot_token_env: "T".into(),
        },
    ] {
        let _ = set.runner(&action);
    }
}
