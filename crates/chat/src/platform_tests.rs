// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

use super::fake::FakePlatform;
use super::*;

#[yare::parameterized(
    connection = { ChatError::ConnectionFailed("refused".into()), "CHAT_CONNECTION_FAILED" },
    already    = { ChatError::AlreadyConnected, "CHAT_ALREADY_CONNECTED" },
    invalid    = { ChatError::InvalidToken, "CHAT_INVALID_TOKEN" },
    missing    = { ChatError::MissingToken("BOT_TOKEN".into()), "CHAT_MISSING_TOKEN" },
    rate       = { ChatError::RateLimited, "CHAT_RATE_LIMITED" },
    send       = { ChatError::SendFailed("boom".into()), "CHAT_SEND_FAILED" },
)]
fn error_codes(error: ChatError, expected: &str) {
    assert_eq!(error.code(), expected);
}

#[test]
fn default_strip_removes_mention_sigils() {
    let platform = FakePlatform::new("discord", "herd-bot");
    assert_eq!(
        platform.strip_addressing("<@herd-bot> check the price"),
        "check the price"
    );
    assert_eq!(
        platform.strip_addressing("@herd-bot check the price"),
        "check the price"
    );
    assert_eq!(platform.strip_addressing("  plain text "), "plain text");
    assert_eq!(platform.strip_addressing("<@herd-bot>"), "");
}

#[tokio::test]
async fn fake_history_honors_limit_most_recent() {
    let platform = FakePlatform::new("discord", "herd-bot");
    platform.seed_history(
        "chan-1",
        (0..5)
            .map(|i| HistoryMessage {
                author: ChatUser::person("u1"),
                text: format!("m{i}"),
                timestamp_ms: i,
            })
            .collect(),
    );
    let got = platform.history("chan-1", 2).await.unwrap();
    let texts: Vec<_> = got.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, ["m3", "m4"]);
}

#[tokio::test]
async fn fake_connect_tracks_state_and_scripted_failure() {
    let platform = FakePlatform::new("discord", "herd-bot");
    platform.fail_next_connect(ChatError::InvalidToken);
    assert!(platform.connect().await.is_err());
    assert!(!platform.is_connected());

    platform.connect().await.unwrap();
    assert!(platform.is_connected());
    platform.disconnect().await;
    assert!(!platform.is_connected());
}
