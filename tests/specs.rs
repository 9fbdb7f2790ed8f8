// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! Workspace-level scenario tests: the seed suite exercising the
//! subsystems together the way the daemon composes them.

use herd_chat::{ChatConnector, ChatUser, FakePlatform, HandleOutcome, IncomingMessage};
use herd_core::{
    AgentSpec, ChannelMode, ChatAttachmentSpec, Clock, FakeClock, FleetConfig, HookAction,
    HookConfig, HookSet, JobOutcome, NullLogger, Schedule, ScheduleSpec,
};
use herd_fleet::{
    FakeBackend, FleetManager, JobExecutor, Scheduler, TriggerApi, TriggerOptions,
};
use herd_hooks::{HookPipeline, RunnerSet};
use herd_sessions::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn fake_clock() -> FakeClock {
    let clock = FakeClock::new();
    clock.set_epoch_ms(1_705_312_800_000); // 2024-01-15T10:00:00Z
    clock
}

fn executor_and_scheduler(
    agents: Vec<AgentSpec>,
    clock: FakeClock,
    backend: Arc<FakeBackend>,
) -> (
    Arc<JobExecutor<FakeClock>>,
    Arc<Scheduler<FakeClock>>,
) {
    let logger: Arc<dyn herd_core::FleetLogger> = Arc::new(NullLogger);
    let pipeline = HookPipeline::new(RunnerSet::new(), clock.clone(), logger.clone());
    let executor = JobExecutor::new(&agents, backend, pipeline, clock.clone(), logger.clone());
    let scheduler = Scheduler::new(
        executor.clone(),
        &agents,
        Duration::from_secs(1),
        clock,
        logger,
    );
    (executor, scheduler)
}

// ── S1: interval schedule with concurrency cap ───────────────────────

#[tokio::test(start_paused = true)]
async fn s1_interval_schedule_with_concurrency_cap() {
    let agent = AgentSpec::new("a1").schedules(vec![Schedule::new(
        "every-second",
        ScheduleSpec::Interval {
            every: Duration::from_secs(1),
        },
    )]);
    let clock = fake_clock();
    let backend = Arc::new(FakeBackend::new());
    backend.set_delay(Duration::from_secs(3));
    let (executor, scheduler) = executor_and_scheduler(vec![agent], clock.clone(), backend);

    // t=0: admitted. t=1, t=2: at cap. t=3: admitted again. t=4: at cap.
    // The loop sleeps slightly longer than the schedule clock advances
    // so a backend finishing "at" a tick boundary has settled before the
    // next evaluation.
    for _ in 0..5 {
        scheduler.tick_once();
        clock.advance(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(1_100)).await;
    }

    let status = scheduler.status();
    assert_eq!(status.check_count, 5);
    assert_eq!(status.trigger_count, 2);
    assert_eq!(status.skipped_due_to_concurrency, 3);
    executor.cancel_all();
}

// ── S2: conditional chat notification ────────────────────────────────

/// One-shot HTTP sink: accepts a single request, returns 204, and hands
/// back the raw request bytes.
async fn http_sink() -> (String, tokio::task::JoinHandle<String>) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            raw.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&raw);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text
                    .lines()
                    .find_map(|l| l.to_lowercase().strip_prefix("content-length:").map(str::to_string))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if raw.len() >= header_end + 4 + content_length {
                    break;
                }
            }
            if n == 0 {
                break;
            }
        }
        socket
            .write_all(b"HTTP/1.1 204 No Content\r\ncontent-length: 0\r\n\r\n")
            .await
            .unwrap();
        String::from_utf8_lossy(&raw).into_owned()
    });
    (base, handle)
}

#[tokio::test]
async fn s2_conditional_chat_notification() {
    let (base, sink) = http_sink().await;
    std::env::set_var("S2_BOT_TOKEN", "token-123");

    let dir = TempDir::new().unwrap();
    let agent = AgentSpec::new("notifier")
        .workspace(dir.path().to_path_buf())
        .metadata_file("metadata.json")
        .hooks(HookSet {
            after_run: vec![HookConfig::new(HookAction::ChatNotification {
                channel: "alerts".to_string(),
                bot_token_env: "S2_BOT_TOKEN".to_string(),
            })
            .when("metadata.shouldNotify")],
            on_error: vec![],
        });

    let clock = fake_clock();
    let backend = Arc::new(FakeBackend::new());
    backend.set_metadata_json(r#"{"shouldNotify": true, "summary": "price dropped"}"#);
    backend.push_text("price dropped");

    let logger: Arc<dyn herd_core::FleetLogger> = Arc::new(NullLogger);
    let pipeline = HookPipeline::new(
        RunnerSet::new().with_notification_endpoint(base),
        clock.clone(),
        logger.clone(),
    );
    let executor = JobExecutor::new(&[agent], backend, pipeline, clock, logger);

    let result = executor
        .trigger("notifier", None, herd_core::TriggerOrigin::Manual, TriggerOptions::default())
        .unwrap();
    let _ = executor.stream_job_output(&result.job_id).unwrap().collect().await;

    let request = sink.await.unwrap();
    assert!(request.starts_with("POST /"));
    assert!(request.contains("Bearer token-123"));
    assert!(request.contains(r#""channel":"alerts""#));
    assert!(request.contains("Job Completed"));
    assert!(request.contains("price dropped"));
}

// ── S3: subprocess hook receives the hook context ────────────────────

#[tokio::test]
async fn s3_subprocess_hook_receives_hook_context() {
    let dir = TempDir::new().unwrap();
    let capture = dir.path().join("ctx.json");
    let agent = AgentSpec::new("capturer").hooks(HookSet {
        after_run: vec![HookConfig::new(HookAction::Subprocess {
            command: format!("cat > {}", capture.display()),
        })],
        on_error: vec![],
    });

    let clock = fake_clock();
    let backend = Arc::new(FakeBackend::new());
    let (executor, _) = executor_and_scheduler(vec![agent], clock, backend);

    let result = executor
        .trigger("capturer", None, herd_core::TriggerOrigin::Manual, TriggerOptions::default())
        .unwrap();
    let _ = executor.stream_job_output(&result.job_id).unwrap().collect().await;

    let captured: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&capture).unwrap()).unwrap();
    assert_eq!(captured["event"], "completed");
    assert_eq!(
        captured["job"]["id"].as_str().unwrap(),
        result.job_id.as_str()
    );
}

// ── S4: session resume across daemon restart ─────────────────────────

struct ChatWorld {
    manager: Arc<FleetManager<FakeClock>>,
    backend: Arc<FakeBackend>,
    platform: Arc<FakePlatform>,
    connector: Arc<ChatConnector<FakePlatform, FakeClock>>,
}

fn chat_world(state_dir: &std::path::Path, clock: FakeClock) -> ChatWorld {
    let agents = vec![AgentSpec::new("responder")
        .schedules(vec![Schedule::new("chat", ScheduleSpec::Chat)])
        .chat(vec![ChatAttachmentSpec::new("discord")
            .conversations(vec!["chan-K".to_string()])
            .mode(ChannelMode::Auto)])];
    let backend = Arc::new(FakeBackend::new());
    let config = FleetConfig {
        agents: agents.clone(),
        state_dir: state_dir.to_path_buf(),
        ..Default::default()
    };
    let manager = FleetManager::new(config, backend.clone(), clock.clone());
    manager.initialize().unwrap();
    let platform = Arc::new(FakePlatform::new("discord", "herd-bot"));
    let api: Arc<dyn TriggerApi> = manager.clone();
    let connector = ChatConnector::new(
        platform.clone(),
        &agents,
        state_dir,
        Arc::downgrade(&api),
        clock,
        Arc::new(NullLogger),
    );
    ChatWorld {
        manager,
        backend,
        platform,
        connector,
    }
}

fn user_msg(text: &str) -> IncomingMessage {
    IncomingMessage {
        conversation_key: "chan-K".to_string(),
        author: ChatUser::person("u1"),
        text: text.to_string(),
        timestamp_ms: 1,
        is_direct: false,
        mentions_bot: false,
        mentions_bot_group: false,
    }
}

async fn drain_conversation(world: &ChatWorld) {
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if world
            .platform
            .typing_calls()
            .iter()
            .filter(|(_, on)| !*on)
            .count()
            > 0
        {
            return;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn s4_session_resumes_across_daemon_restart() {
    let dir = TempDir::new().unwrap();
    let clock = fake_clock();

    // Daemon run #1.
    let first_session = {
        let world = chat_world(dir.path(), clock.clone());
        let outcome = world.connector.handle_message(user_msg("hello")).await;
        assert!(matches!(outcome, HandleOutcome::Triggered { .. }));
        drain_conversation(&world).await;
        world.manager.stop().await;
        world.backend.calls()[0].session_id.clone().unwrap()
    };

    // Daemon run #2 against the same state dir, within expiry.
    clock.advance(Duration::from_secs(3600));
    let world = chat_world(dir.path(), clock.clone());
    let outcome = world.connector.handle_message(user_msg("back again")).await;
    assert!(matches!(outcome, HandleOutcome::Triggered { .. }));
    drain_conversation(&world).await;

    let resumed = world.backend.calls()[0].session_id.clone().unwrap();
    assert_eq!(resumed, first_session, "conversation resumes the session");
}

// ── S5: corrupt session file recovery ────────────────────────────────

#[test]
fn s5_corrupt_session_file_is_quarantined() {
    let dir = TempDir::new().unwrap();
    let clock = fake_clock();
    let store = SessionStore::open(dir.path(), "discord", "a", 24, clock.clone());
    store.get_or_create("K").unwrap();
    let path = store.path().to_path_buf();
    drop(store);

    std::fs::write(&path, "invalid: {{").unwrap();

    let store = SessionStore::open(dir.path(), "discord", "a", 24, clock.clone());
    let fresh = store.get_or_create("K").unwrap();
    assert!(fresh.is_new, "corrupt state starts a fresh session");

    let side = path.with_extension(format!("json.corrupt-{}", clock.epoch_ms()));
    assert_eq!(
        std::fs::read_to_string(side).unwrap(),
        "invalid: {{",
        "original bytes preserved"
    );
}

// ── S6: after_run vs on_error dispatch ───────────────────────────────

fn marker(path: &std::path::Path, tag: &str) -> HookConfig {
    HookConfig::new(HookAction::Subprocess {
        command: format!("echo {tag} >> {}", path.display()),
    })
}

#[tokio::test]
async fn s6_after_run_and_on_error_dispatch_matrix() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("hooks.log");
    let agent = AgentSpec::new("a").hooks(HookSet {
        after_run: vec![marker(&log, "h1")],
        on_error: vec![marker(&log, "h2")],
    });

    let clock = fake_clock();
    let backend = Arc::new(FakeBackend::new());
    let (executor, _) = executor_and_scheduler(vec![agent], clock, backend.clone());

    // Completed: H1 only.
    let done = executor
        .trigger("a", None, herd_core::TriggerOrigin::Manual, TriggerOptions::default())
        .unwrap();
    let _ = executor.stream_job_output(&done.job_id).unwrap().collect().await;
    assert_eq!(std::fs::read_to_string(&log).unwrap(), "h1\n");
    assert_eq!(
        executor.job(&done.job_id).unwrap().outcome(),
        Some(JobOutcome::Completed)
    );

    // Failed: H1 then H2, in that order.
    backend.push_error("boom");
    let failed = executor
        .trigger("a", None, herd_core::TriggerOrigin::Manual, TriggerOptions::default())
        .unwrap();
    let _ = executor.stream_job_output(&failed.job_id).unwrap().collect().await;
    assert_eq!(std::fs::read_to_string(&log).unwrap(), "h1\nh1\nh2\n");
}
