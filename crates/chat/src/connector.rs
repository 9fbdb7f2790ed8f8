// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! The connector: routes platform conversations into the fleet.

use crate::classify::classify_error_reply;
use crate::commands::MaintenanceCommand;
use crate::context::build_context;
use crate::events::{ConnectorEvent, SessionEvent};
use crate::platform::{ChatError, ChatPlatform, IncomingMessage};
use herd_core::{
    AgentSpec, ChannelMode, Clock, FleetLogger, JobId, LogEntry, LogLevel, ScheduleSpec,
    TriggerOrigin,
};
use herd_fleet::{TriggerApi, TriggerError, TriggerOptions};
use herd_sessions::SessionStore;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;

/// How often a job watcher polls for the terminal outcome.
const JOB_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Events channel capacity; observers that lag lose oldest events.
const EVENT_CAPACITY: usize = 64;

/// Routing target for one conversation key. Immutable after start.
struct Route {
    agent: String,
    mode: ChannelMode,
    context_messages: usize,
    prioritize_user_messages: bool,
    include_bot_messages: bool,
    /// Name of the agent's `chat`-type schedule, for job attribution.
    chat_schedule: Option<String>,
}

struct ConnState {
    connected: bool,
    started_at_ms: Option<u64>,
    message_count: u64,
    rate_limit_count: u64,
    last_rate_limit_at_ms: Option<u64>,
    rate_limited_until_ms: Option<u64>,
    /// Conversations with a job in flight; extra messages get a busy ack.
    busy: HashSet<String>,
}

/// `/status` snapshot.
#[derive(Debug, Clone)]
pub struct ConnectorStatus {
    pub connected: bool,
    pub bot_identity: String,
    pub active_session_count: usize,
    pub message_count: u64,
    pub uptime_ms: u64,
}

/// What `handle_message` did, for callers and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    Ignored(&'static str),
    Command(MaintenanceCommand),
    UnknownCommand(String),
    Busy,
    Triggered { agent: String, job_id: JobId },
    Failed(String),
}

/// One platform connection serving one or more agents.
pub struct ChatConnector<P: ChatPlatform, C: Clock> {
    platform: Arc<P>,
    routes: HashMap<String, Route>,
    stores: HashMap<String, Arc<SessionStore<C>>>,
    trigger: Weak<dyn TriggerApi>,
    clock: C,
    logger: Arc<dyn FleetLogger>,
    events: broadcast::Sender<ConnectorEvent>,
    state: Mutex<ConnState>,
    /// Back-reference for spawning job watchers from `&self`.
    self_ref: Weak<Self>,
}

impl<P: ChatPlatform, C: Clock> ChatConnector<P, C> {
    /// Build routing and session stores from the agents attached to this
    /// platform. Conversation routing is immutable after start; changing
    /// it requires a reconnect.
    pub fn new(
        platform: Arc<P>,
        agents: &[AgentSpec],
        state_dir: &Path,
        trigger: Weak<dyn TriggerApi>,
        clock: C,
        logger: Arc<dyn FleetLogger>,
    ) -> Arc<Self> {
        let mut routes = HashMap::new();
        let mut stores: HashMap<String, Arc<SessionStore<C>>> = HashMap::new();

        for agent in agents {
            let chat_schedule = agent
                .schedules
                .iter()
                .find(|s| matches!(s.spec, ScheduleSpec::Chat))
                .map(|s| s.name.clone());
            for attachment in &agent.chat {
                if attachment.platform != platform.name() {
                    continue;
                }
                stores.entry(agent.name.clone()).or_insert_with(|| {
                    Arc::new(SessionStore::open(
                        state_dir,
                        platform.name(),
                        &agent.name,
                        agent.session_expiry_hours,
                        clock.clone(),
                    ))
                });
                for key in &attachment.conversations {
                    routes.insert(
                        key.clone(),
                        Route {
                            agent: agent.name.clone(),
                            mode: attachment.mode,
                            context_messages: attachment.context_messages,
                            prioritize_user_messages: attachment.prioritize_user_messages,
                            include_bot_messages: attachment.include_bot_messages,
                            chat_schedule: chat_schedule.clone(),
                        },
                    );
                }
            }
        }

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new_cyclic(|self_ref| Self {
            platform,
            routes,
            stores,
            trigger,
            clock,
            logger,
            events,
            self_ref: self_ref.clone(),
            state: Mutex::new(ConnState {
                connected: false,
                started_at_ms: None,
                message_count: 0,
                rate_limit_count: 0,
                last_rate_limit_at_ms: None,
                rate_limited_until_ms: None,
                busy: HashSet::new(),
            }),
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ConnectorEvent> {
        self.events.subscribe()
    }

    /// Connect the platform and reap expired sessions.
    pub async fn start(&self) -> Result<(), ChatError> {
        if self.state.lock().connected {
            return Err(ChatError::AlreadyConnected);
        }
        self.platform.connect().await?;

        for (agent, store) in &self.stores {
            match store.cleanup_expired() {
                Ok(0) => {}
                Ok(count) => {
                    self.log(
                        LogLevel::Info,
                        format!("reaped {count} expired session(s) for agent {agent}"),
                    );
                    self.emit(ConnectorEvent::SessionLifecycle {
                        agent: agent.clone(),
                        conversation_key: String::new(),
                        event: SessionEvent::Expired,
                    });
                }
                Err(e) => {
                    self.log(
                        LogLevel::Warn,
                        format!("session cleanup failed for agent {agent}: {e}"),
                    );
                }
            }
        }

        {
            let mut state = self.state.lock();
            state.connected = true;
            state.started_at_ms = Some(self.clock.epoch_ms());
        }
        self.emit(ConnectorEvent::Ready);
        self.log(LogLevel::Info, "connector ready".to_string());
        Ok(())
    }

    pub async fn stop(&self) {
        self.platform.disconnect().await;
        self.state.lock().connected = false;
        self.emit(ConnectorEvent::Disconnect {
            reason: "shutdown".to_string(),
        });
    }

    /// The incoming message pipeline.
    pub async fn handle_message(&self, msg: IncomingMessage) -> HandleOutcome {
        let identity = self.platform.identity();

        // Sender filter: other bots and our own echoes.
        if msg.author.is_bot || msg.author.id == identity.id {
            return HandleOutcome::Ignored("bot_author");
        }

        let key = msg.conversation_key.clone();
        let Some(route) = self.routes.get(&key) else {
            self.emit(ConnectorEvent::MessageIgnored {
                conversation_key: key,
                reason: "not_configured",
            });
            return HandleOutcome::Ignored("not_configured");
        };

        // Channel mode: DMs are always auto.
        let mode = if msg.is_direct {
            ChannelMode::Auto
        } else {
            route.mode
        };
        if mode == ChannelMode::Mention && !(msg.mentions_bot || msg.mentions_bot_group) {
            self.emit(ConnectorEvent::MessageIgnored {
                conversation_key: key,
                reason: "not_addressed",
            });
            return HandleOutcome::Ignored("not_addressed");
        }

        let text = self.platform.strip_addressing(&msg.text);
        if text.is_empty() {
            self.emit(ConnectorEvent::MessageIgnored {
                conversation_key: key,
                reason: "empty_prompt",
            });
            return HandleOutcome::Ignored("empty_prompt");
        }

        if let Some(parsed) = MaintenanceCommand::parse(&text) {
            return self.dispatch_command(parsed, &msg, route).await;
        }

        self.state.lock().message_count += 1;

        // One job per conversation; extra messages are acked and dropped.
        if self.state.lock().busy.contains(&key) {
            let _ = self
                .platform
                .send(&key, "Still working on the previous message, one moment.")
                .await;
            return HandleOutcome::Busy;
        }

        let context = match self
            .platform
            .history(&key, route.context_messages)
            .await
        {
            Ok(history) => build_context(
                &history,
                &identity,
                route.context_messages,
                route.prioritize_user_messages,
                route.include_bot_messages,
                |raw| self.platform.strip_addressing(raw),
            ),
            Err(e) => {
                self.log(
                    LogLevel::Warn,
                    format!("history fetch failed for {key}: {e}"),
                );
                None
            }
        };

        let store = match self.stores.get(&route.agent) {
            Some(store) => store.clone(),
            None => {
                return self.reply_failure(&key, "session store missing").await;
            }
        };
        let session = match store.get_or_create(&key) {
            Ok(session) => session,
            Err(e) => {
                self.log(
                    LogLevel::Error,
                    format!("{}: {e}", e.code()),
                );
                return self.reply_failure(&key, &e.to_string()).await;
            }
        };
        self.emit(ConnectorEvent::SessionLifecycle {
            agent: route.agent.clone(),
            conversation_key: key.clone(),
            event: if session.is_new {
                SessionEvent::Created
            } else {
                SessionEvent::Resumed
            },
        });
        if !session.is_new {
            let _ = store.touch(&key);
        }
        let _ = store.increment_message_count(&key);

        let Some(api) = self.trigger.upgrade() else {
            return self.reply_failure(&key, "fleet is gone").await;
        };

        match api.trigger(
            &route.agent,
            route.chat_schedule.as_deref(),
            TriggerOrigin::Chat,
            TriggerOptions {
                prompt: Some(text),
                metadata_seed: None,
                session_id: Some(session.session_id.clone()),
                conversation_context: context,
            },
        ) {
            Ok(result) => {
                self.state.lock().busy.insert(key.clone());
                self.platform.set_typing(&key, true).await;
                self.emit(ConnectorEvent::Message {
                    conversation_key: key.clone(),
                    agent: route.agent.clone(),
                    job_id: result.job_id.clone(),
                });
                // The connector always lives behind an Arc (see `new`).
                if let Some(connector) = self.self_ref.upgrade() {
                    let agent = route.agent.clone();
                    let job_id = result.job_id.clone();
                    let watch_key = key.clone();
                    tokio::spawn(async move {
                        connector.watch_job(watch_key, agent, job_id).await;
                    });
                }
                HandleOutcome::Triggered {
                    agent: route.agent.clone(),
                    job_id: result.job_id,
                }
            }
            Err(TriggerError::ConcurrencyLimitReached { .. }) => {
                let _ = self
                    .platform
                    .send(&key, "I'm at capacity right now, please try again shortly.")
                    .await;
                HandleOutcome::Busy
            }
            Err(e) => {
                self.emit(ConnectorEvent::Error {
                    message: e.to_string(),
                });
                self.reply_failure(&key, &e.to_string()).await
            }
        }
    }

    /// Follow a job to its terminal outcome, then reply and release the
    /// conversation.
    async fn watch_job(self: Arc<Self>, key: String, agent: String, job_id: JobId) {
        loop {
            tokio::time::sleep(JOB_POLL_INTERVAL).await;
            let Some(api) = self.trigger.upgrade() else {
                break;
            };
            let Some(record) = api.job(&job_id) else {
                break;
            };
            if !record.is_terminal() {
                continue;
            }

            // Persist whatever session id the backend settled on.
            if let Some(store) = self.stores.get(&agent) {
                match &record.session_id {
                    Some(session_id) => {
                        if let Err(e) = store.set(&key, session_id) {
                            self.log(
                                LogLevel::Error,
                                format!("failed to persist session for {key}: {e}"),
                            );
                        }
                    }
                    None => {
                        let _ = store.touch(&key);
                    }
                }
            }

            let reply = match record.outcome() {
                Some(outcome) if outcome.success() => {
                    if record.output.is_empty() {
                        "Done (no output).".to_string()
                    } else {
                        record.output.clone()
                    }
                }
                _ => classify_error_reply(record.error.as_deref().unwrap_or("unknown"))
                    .to_string(),
            };
            if let Err(e) = self.platform.send(&key, &reply).await {
                self.log(LogLevel::Warn, format!("reply to {key} failed: {e}"));
            }
            break;
        }

        self.platform.set_typing(&key, false).await;
        self.state.lock().busy.remove(&key);
    }

    async fn dispatch_command(
        &self,
        parsed: Result<MaintenanceCommand, String>,
        msg: &IncomingMessage,
        route: &Route,
    ) -> HandleOutcome {
        let key = &msg.conversation_key;
        let command = match parsed {
            Err(name) => {
                let _ = self
                    .platform
                    .send(key, &format!("Unknown command '{name}'. Try !help."))
                    .await;
                return HandleOutcome::UnknownCommand(name);
            }
            Ok(command) => command,
        };

        let reply = self.run_command(command, key, route);
        let _ = self.platform.send(key, &reply).await;
        self.emit(ConnectorEvent::CommandExecuted {
            command: command.to_string(),
            user: msg.author.id.clone(),
            conversation_key: key.clone(),
        });
        HandleOutcome::Command(command)
    }

    fn run_command(&self, command: MaintenanceCommand, key: &str, route: &Route) -> String {
        match command {
            MaintenanceCommand::Help => MaintenanceCommand::help_text().to_string(),
            MaintenanceCommand::Reset => match self.stores.get(&route.agent) {
                Some(store) => match store.clear(key) {
                    Ok(true) => {
                        self.emit(ConnectorEvent::SessionLifecycle {
                            agent: route.agent.clone(),
                            conversation_key: key.to_string(),
                            event: SessionEvent::Cleared,
                        });
                        "Session cleared. The next message starts fresh.".to_string()
                    }
                    Ok(false) => "No active session to clear.".to_string(),
                    Err(e) => classify_error_reply(&e.to_string()).to_string(),
                },
                None => "No session store for this agent.".to_string(),
            },
            MaintenanceCommand::Status => {
                let status = self.status();
                format!(
                    "Connection: {}\nBot: {}\nActive sessions: {}\nMessages handled: {}\nUptime: {}s",
                    if status.connected { "connected" } else { "disconnected" },
                    status.bot_identity,
                    status.active_session_count,
                    status.message_count,
                    status.uptime_ms / 1_000,
                )
            }
        }
    }

    /// Rate-limit signal from the platform layer: counted and logged,
    /// never throttled here (the platform client queues).
    pub fn record_rate_limit(&self, retry_after: Duration) {
        let now = self.clock.epoch_ms();
        let count = {
            let mut state = self.state.lock();
            state.rate_limit_count += 1;
            state.last_rate_limit_at_ms = Some(now);
            state.rate_limited_until_ms = Some(now + retry_after.as_millis() as u64);
            state.rate_limit_count
        };
        self.log(
            LogLevel::Warn,
            format!("rate limited (count {count}, retry after {retry_after:?})"),
        );
        self.emit(ConnectorEvent::RateLimit { count });
    }

    pub fn is_rate_limited(&self) -> bool {
        let state = self.state.lock();
        match state.rate_limited_until_ms {
            Some(until) => self.clock.epoch_ms() < until,
            None => false,
        }
    }

    pub fn last_rate_limit_at_ms(&self) -> Option<u64> {
        self.state.lock().last_rate_limit_at_ms
    }

    pub fn notify_reconnecting(&self, attempt: u32) {
        self.emit(ConnectorEvent::Reconnecting { attempt });
        self.log(LogLevel::Warn, format!("reconnecting (attempt {attempt})"));
    }

    pub fn notify_reconnected(&self) {
        self.emit(ConnectorEvent::Reconnected);
        self.log(LogLevel::Info, "reconnected".to_string());
    }

    pub fn status(&self) -> ConnectorStatus {
        let state = self.state.lock();
        let active_session_count = self
            .stores
            .values()
            .map(|s| s.active_count().unwrap_or(0))
            .sum();
        ConnectorStatus {
            connected: state.connected,
            bot_identity: self.platform.identity().id,
            active_session_count,
            message_count: state.message_count,
            uptime_ms: state
                .started_at_ms
                .map(|started| self.clock.epoch_ms().saturating_sub(started))
                .unwrap_or(0),
        }
    }

    async fn reply_failure(&self, key: &str, error: &str) -> HandleOutcome {
        let _ = self
            .platform
            .send(key, classify_error_reply(error))
            .await;
        HandleOutcome::Failed(error.to_string())
    }

    fn emit(&self, event: ConnectorEvent) {
        let _ = self.events.send(event);
    }

    fn log(&self, level: LogLevel, message: String) {
        tracing::debug!(platform = self.platform.name(), %message);
        self.logger.log(LogEntry::new(
            self.clock.epoch_ms(),
            level,
            "chat",
            message,
        ));
    }
}

#[async_trait::async_trait]
impl<P: ChatPlatform, C: Clock> herd_fleet::ManagedConnector for ChatConnector<P, C> {
    fn platform(&self) -> &str {
        self.platform.name()
    }

    async fn start(&self) -> Result<(), String> {
        ChatConnector::start(self).await.map_err(|e| e.to_string())
    }

    async fn stop(&self) {
        ChatConnector::stop(self).await;
    }
}

#[cfg(test)]
#[path = "connector_tests.rs"]
mod tests;
