// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

use super::*;

fn entry(ts: u64, level: LogLevel, message: &str) -> LogEntry {
    LogEntry::new(ts, level, "test", message)
}

#[tokio::test]
async fn subscribers_receive_published_entries() {
    let broadcast = LogBroadcast::new(16);
    let mut stream = broadcast.subscribe(LogLevel::Debug, false);

    broadcast.publish(entry(1, LogLevel::Info, "one"));
    broadcast.publish(entry(2, LogLevel::Info, "two"));

    assert_eq!(stream.next().await.unwrap().message, "one");
    assert_eq!(stream.next().await.unwrap().message, "two");
}

#[tokio::test]
async fn level_floor_filters_entries() {
    let broadcast = LogBroadcast::new(16);
    let mut stream = broadcast.subscribe(LogLevel::Warn, false);

    broadcast.publish(entry(1, LogLevel::Debug, "noise"));
    broadcast.publish(entry(2, LogLevel::Error, "signal"));

    assert_eq!(stream.next().await.unwrap().message, "signal");
}

#[tokio::test]
async fn include_history_replays_retained_entries() {
    let broadcast = LogBroadcast::new(16);
    broadcast.publish(entry(1, LogLevel::Info, "before"));

    let mut with_history = broadcast.subscribe(LogLevel::Debug, true);
    let mut without = broadcast.subscribe(LogLevel::Debug, false);

    assert_eq!(with_history.next().await.unwrap().message, "before");
    assert!(without.drain_ready().is_empty());
}

#[test]
fn history_ring_is_bounded() {
    let broadcast = LogBroadcast::new(3);
    for i in 0..10 {
        broadcast.publish(entry(i, LogLevel::Info, &format!("m{i}")));
    }
    let mut stream = broadcast.subscribe(LogLevel::Debug, true);
    let replayed = stream.drain_ready();
    let messages: Vec<_> = replayed.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, ["m7", "m8", "m9"]);
}

#[tokio::test]
async fn job_channel_replays_then_follows() {
    let channel = JobChannel::new();
    channel.publish(entry(1, LogLevel::Info, "early"));

    let mut stream = channel.subscribe();
    channel.publish(entry(2, LogLevel::Info, "live"));
    channel.close();

    let all = stream.collect().await;
    let messages: Vec<_> = all.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, ["early", "live"]);
}

#[tokio::test]
async fn job_stream_after_close_replays_buffer_and_ends() {
    let channel = JobChannel::new();
    channel.publish(entry(1, LogLevel::Info, "only"));
    channel.close();

    let mut stream = channel.subscribe();
    assert_eq!(stream.next().await.unwrap().message, "only");
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn stream_ends_when_broadcast_dropped() {
    let broadcast = LogBroadcast::new(4);
    let mut stream = broadcast.subscribe(LogLevel::Debug, false);
    drop(broadcast);
    assert!(stream.next().await.is_none());
}
