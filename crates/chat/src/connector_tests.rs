// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

use super::*;
use crate::platform::fake::FakePlatform;
use crate::platform::HistoryMessage;
use herd_core::{ChatAttachmentSpec, FakeClock, NullLogger, Schedule};
use herd_fleet::{FakeBackend, FleetManager};
use tempfile::TempDir;

struct World {
    manager: Arc<FleetManager<FakeClock>>,
    backend: Arc<FakeBackend>,
    platform: Arc<FakePlatform>,
    connector: Arc<ChatConnector<FakePlatform, FakeClock>>,
    clock: FakeClock,
    _dir: TempDir,
}

fn chat_agent(name: &str, mode: ChannelMode) -> AgentSpec {
    AgentSpec::new(name)
        .schedules(vec![Schedule::new("chat", ScheduleSpec::Chat)])
        .chat(vec![ChatAttachmentSpec::new("discord")
            .conversations(vec!["chan-1".to_string()])
            .mode(mode)
            .context_messages(5)])
}

fn world(agents: Vec<AgentSpec>) -> World {
    let clock = FakeClock::new();
    clock.set_epoch_ms(1_705_312_800_000);
    let backend = Arc::new(FakeBackend::new());
    let dir = TempDir::new().unwrap();

    let config = herd_core::FleetConfig {
        agents: agents.clone(),
        state_dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    let manager = FleetManager::new(config, backend.clone(), clock.clone());
    manager.initialize().unwrap();

    let platform = Arc::new(FakePlatform::new("discord", "herd-bot"));
    let api: Arc<dyn TriggerApi> = manager.clone();
    let connector = ChatConnector::new(
        platform.clone(),
        &agents,
        dir.path(),
        Arc::downgrade(&api),
        clock.clone(),
        Arc::new(NullLogger),
    );
    World {
        manager,
        backend,
        platform,
        connector,
        clock,
        _dir: dir,
    }
}

fn user_msg(key: &str, text: &str) -> IncomingMessage {
    IncomingMessage {
        conversation_key: key.to_string(),
        author: crate::platform::ChatUser::person("u1"),
        text: text.to_string(),
        timestamp_ms: 1,
        is_direct: false,
        mentions_bot: false,
        mentions_bot_group: false,
    }
}

fn mention_msg(key: &str, text: &str) -> IncomingMessage {
    IncomingMessage {
        mentions_bot: true,
        ..user_msg(key, text)
    }
}

/// Drive (paused) time until every conversation watcher has released its
/// busy slot and sent the reply.
async fn settle(world: &World) {
    for _ in 0..200 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if world.connector.state.lock().busy.is_empty() {
            return;
        }
    }
}

#[tokio::test]
async fn bot_authors_are_filtered() {
    let w = world(vec![chat_agent("responder", ChannelMode::Auto)]);
    let mut msg = user_msg("chan-1", "hello");
    msg.author = crate::platform::ChatUser::bot("other-bot");
    assert_eq!(
        w.connector.handle_message(msg).await,
        HandleOutcome::Ignored("bot_author")
    );

    // Our own echo too.
    let mut msg = user_msg("chan-1", "hello");
    msg.author = crate::platform::ChatUser::bot("herd-bot");
    assert_eq!(
        w.connector.handle_message(msg).await,
        HandleOutcome::Ignored("bot_author")
    );
}

#[tokio::test]
async fn unrouted_conversation_is_ignored() {
    let w = world(vec![chat_agent("responder", ChannelMode::Auto)]);
    let mut events = w.connector.subscribe_events();
    assert_eq!(
        w.connector.handle_message(user_msg("chan-unknown", "hi")).await,
        HandleOutcome::Ignored("not_configured")
    );
    match events.try_recv().unwrap() {
        ConnectorEvent::MessageIgnored { reason, .. } => assert_eq!(reason, "not_configured"),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn mention_mode_requires_addressing() {
    let w = world(vec![chat_agent("responder", ChannelMode::Mention)]);
    assert_eq!(
        w.connector.handle_message(user_msg("chan-1", "hello")).await,
        HandleOutcome::Ignored("not_addressed")
    );

    // Addressed: triggers.
    let outcome = w
        .connector
        .handle_message(mention_msg("chan-1", "<@herd-bot> hello"))
        .await;
    assert!(matches!(outcome, HandleOutcome::Triggered { .. }));
}

#[tokio::test]
async fn direct_messages_default_to_auto() {
    let w = world(vec![chat_agent("responder", ChannelMode::Mention)]);
    let mut msg = user_msg("chan-1", "hello");
    msg.is_direct = true;
    assert!(matches!(
        w.connector.handle_message(msg).await,
        HandleOutcome::Triggered { .. }
    ));
}

#[tokio::test]
async fn empty_prompt_after_stripping_is_ignored() {
    let w = world(vec![chat_agent("responder", ChannelMode::Auto)]);
    assert_eq!(
        w.connector
            .handle_message(user_msg("chan-1", "<@herd-bot>  "))
            .await,
        HandleOutcome::Ignored("empty_prompt")
    );
}

#[tokio::test]
async fn help_command_replies_without_triggering() {
    let w = world(vec![chat_agent("responder", ChannelMode::Auto)]);
    let outcome = w.connector.handle_message(user_msg("chan-1", "!help")).await;
    assert_eq!(outcome, HandleOutcome::Command(MaintenanceCommand::Help));

    let sent = w.platform.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.contains("!reset"));
    assert!(w.backend.calls().is_empty(), "no job was triggered");
}

#[tokio::test]
async fn unknown_command_gets_a_hint() {
    let w = world(vec![chat_agent("responder", ChannelMode::Auto)]);
    let outcome = w
        .connector
        .handle_message(user_msg("chan-1", "!restart"))
        .await;
    assert_eq!(outcome, HandleOutcome::UnknownCommand("restart".to_string()));
    assert!(w.platform.sent()[0].1.contains("Try !help"));
}

#[tokio::test(start_paused = true)]
async fn message_triggers_job_and_replies_with_output() {
    let w = world(vec![chat_agent("responder", ChannelMode::Auto)]);
    w.backend.push_text("the price dropped to 42");

    let outcome = w
        .connector
        .handle_message(user_msg("chan-1", "any news?"))
        .await;
    let HandleOutcome::Triggered { agent, .. } = &outcome else {
        panic!("expected trigger, got {outcome:?}");
    };
    assert_eq!(agent, "responder");

    settle(&w).await;

    let sent = w.platform.sent();
    assert!(
        sent.iter().any(|(key, text)| key == "chan-1" && text == "the price dropped to 42"),
        "reply missing: {sent:?}"
    );
    // Typing indicator went on, then off.
    let typing = w.platform.typing_calls();
    assert!(typing.contains(&("chan-1".to_string(), true)));
    assert!(typing.contains(&("chan-1".to_string(), false)));

    // The backend saw the session and the prompt.
    let calls = w.backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].prompt, "any news?");
    assert!(calls[0].session_id.as_deref().unwrap().starts_with("discord-responder-"));
}

#[tokio::test(start_paused = true)]
async fn conversation_context_is_passed_to_the_backend() {
    let w = world(vec![chat_agent("responder", ChannelMode::Auto)]);
    w.platform.seed_history(
        "chan-1",
        vec![
            HistoryMessage {
                author: crate::platform::ChatUser::person("u1"),
                text: "earlier question".to_string(),
                timestamp_ms: 1,
            },
            HistoryMessage {
                author: crate::platform::ChatUser::bot("spam-bot"),
                text: "ignore me".to_string(),
                timestamp_ms: 2,
            },
        ],
    );

    w.connector
        .handle_message(user_msg("chan-1", "follow-up"))
        .await;
    settle(&w).await;

    let calls = w.backend.calls();
    let context = calls[0].conversation_context.as_deref().unwrap();
    assert!(context.contains("u1: earlier question"));
    assert!(!context.contains("spam-bot"));
}

#[tokio::test(start_paused = true)]
async fn busy_conversation_acks_and_drops() {
    let w = world(vec![chat_agent("responder", ChannelMode::Auto)]);
    w.backend.set_delay(std::time::Duration::from_secs(30));

    let first = w
        .connector
        .handle_message(user_msg("chan-1", "first"))
        .await;
    assert!(matches!(first, HandleOutcome::Triggered { .. }));

    let second = w
        .connector
        .handle_message(user_msg("chan-1", "second"))
        .await;
    assert_eq!(second, HandleOutcome::Busy);
    assert!(w
        .platform
        .sent()
        .iter()
        .any(|(_, text)| text.contains("Still working")));
    assert_eq!(w.backend.calls().len(), 1, "second message never triggered");

    settle(&w).await;
}

#[tokio::test(start_paused = true)]
async fn session_resumes_on_second_message() {
    let w = world(vec![chat_agent("responder", ChannelMode::Auto)]);
    let mut events = w.connector.subscribe_events();

    w.connector
        .handle_message(user_msg("chan-1", "first"))
        .await;
    settle(&w).await;
    w.connector
        .handle_message(user_msg("chan-1", "second"))
        .await;
    settle(&w).await;

    let calls = w.backend.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[0].session_id, calls[1].session_id,
        "same conversation resumes the same session"
    );

    let mut lifecycle = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let ConnectorEvent::SessionLifecycle { event, .. } = event {
            lifecycle.push(event);
        }
    }
    assert_eq!(lifecycle[0], SessionEvent::Created);
    assert!(lifecycle.contains(&SessionEvent::Resumed));
}

#[tokio::test(start_paused = true)]
async fn failed_job_replies_with_classified_message() {
    let w = world(vec![chat_agent("responder", ChannelMode::Auto)]);
    w.backend.push_error("api returned 503");

    w.connector
        .handle_message(user_msg("chan-1", "do it"))
        .await;
    settle(&w).await;

    assert!(w
        .platform
        .sent()
        .iter()
        .any(|(_, text)| text.contains("upstream")));
}

#[tokio::test]
async fn reset_command_clears_the_session() {
    let w = world(vec![chat_agent("responder", ChannelMode::Auto)]);

    // No session yet.
    w.connector
        .handle_message(user_msg("chan-1", "!reset"))
        .await;
    assert!(w.platform.sent()[0].1.contains("No active session"));

    // Create one directly through the store path used by the pipeline.
    let outcome = w
        .connector
        .handle_message(user_msg("chan-1", "start a session"))
        .await;
    assert!(matches!(outcome, HandleOutcome::Triggered { .. }));

    w.connector
        .handle_message(user_msg("chan-1", "!reset"))
        .await;
    let sent = w.platform.sent();
    assert!(sent.iter().any(|(_, text)| text.contains("Session cleared")));
}

#[tokio::test]
async fn status_command_reports_connector_state() {
    let w = world(vec![chat_agent("responder", ChannelMode::Auto)]);
    w.connector.start().await.unwrap();

    w.clock.advance(std::time::Duration::from_secs(90));
    w.connector
        .handle_message(user_msg("chan-1", "!status"))
        .await;

    let sent = w.platform.sent();
    let status_text = &sent[0].1;
    assert!(status_text.contains("Connection: connected"));
    assert!(status_text.contains("Bot: herd-bot"));
    assert!(status_text.contains("Uptime: 90s"));
}

#[tokio::test]
async fn start_twice_is_already_connected() {
    let w = world(vec![chat_agent("responder", ChannelMode::Auto)]);
    w.connector.start().await.unwrap();
    let err = w.connector.start().await.unwrap_err();
    assert_eq!(err.code(), "CHAT_ALREADY_CONNECTED");
    w.connector.stop().await;
    assert!(!w.platform.is_connected());
}

#[tokio::test]
async fn rate_limits_are_counted_not_throttled() {
    let w = world(vec![chat_agent("responder", ChannelMode::Auto)]);
    let mut events = w.connector.subscribe_events();

    w.connector
        .record_rate_limit(std::time::Duration::from_secs(5));
    assert!(w.connector.is_rate_limited());
    assert_eq!(
        w.connector.last_rate_limit_at_ms(),
        Some(w.clock.epoch_ms())
    );
    match events.try_recv().unwrap() {
        ConnectorEvent::RateLimit { count } => assert_eq!(count, 1),
        other => panic!("unexpected event {other:?}"),
    }

    w.clock.advance(std::time::Duration::from_secs(6));
    assert!(!w.connector.is_rate_limited());
}

#[tokio::test(start_paused = true)]
async fn at_capacity_agent_gets_busy_ack() {
    let w = world(vec![chat_agent("responder", ChannelMode::Auto)]);
    w.backend.set_delay(std::time::Duration::from_secs(30));

    // Saturate the agent outside the conversation.
    w.manager
        .trigger("responder", None, herd_fleet::TriggerOptions::default())
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let outcome = w
        .connector
        .handle_message(user_msg("chan-1", "hello"))
        .await;
    assert_eq!(outcome, HandleOutcome::Busy);
    assert!(w
        .platform
        .sent()
        .iter()
        .any(|(_, text)| text.contains("at capacity")));
}
