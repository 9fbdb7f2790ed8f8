// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! User-facing classification of internal failures.
//!
//! Raw error text never reaches the conversation; it is mapped to one of
//! a handful of short replies.

/// Map an internal error message to a user-facing reply.
pub fn classify_error_reply(error: &str) -> &'static str {
    let lower = error.to_lowercase();
    if lower.contains("auth")
        || lower.contains("token")
        || lower.contains("401")
        || lower.contains("403")
        || lower.contains("forbidden")
    {
        "There's an authentication problem on my side. Please check the bot configuration."
    } else if lower.contains("rate") || lower.contains("429") {
        "I'm being rate limited right now. Please try again shortly."
    } else if lower.contains("network")
        || lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("connect")
    {
        "I hit a transient connectivity problem. Please try again."
    } else if lower.contains("api")
        || lower.contains("500")
        || lower.contains("502")
        || lower.contains("503")
        || lower.contains("upstream")
    {
        "The upstream service returned an error. Please try again later."
    } else {
        "Something went wrong while handling that. Please try again."
    }
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod tests;
