// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

use super::*;

#[yare::parameterized(
    auth       = { "invalid auth header", "authentication problem" },
    token      = { "bot token rejected", "authentication problem" },
    forbidden  = { "HTTP 403 forbidden", "authentication problem" },
    rate       = { "rate limit exceeded", "rate limited" },
    http_429   = { "got 429 from service", "rate limited" },
    timeout    = { "request timed out", "connectivity problem" },
    network    = { "network unreachable", "connectivity problem" },
    api        = { "api returned 500", "upstream" },
    unknown    = { "something odd", "Something went wrong" },
)]
fn classification(error: &str, expected_fragment: &str) {
    let reply = classify_error_reply(error);
    assert!(
        reply.contains(expected_fragment),
        "{error:?} → {reply:?} missing {expected_fragment:?}"
    );
}
