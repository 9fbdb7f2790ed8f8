// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! The per-agent session store.

use crate::record::{AgentConfigSnapshot, ContextUsage, SessionRecord, SESSION_FILE_VERSION};
use herd_core::Clock;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Reap expired records after this many writes, so long-lived stores do
/// not accumulate dead conversations between connector restarts.
const WRITES_PER_CLEANUP: u32 = 64;

/// Errors from session store operations
#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("failed to read session state at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write session state at {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to create session directory {path}: {source}")]
    DirCreateFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SessionStoreError {
    /// Stable machine-readable identifier.
    pub fn code(&self) -> &'static str {
        match self {
            SessionStoreError::ReadFailed { .. } => "SESSION_STATE_READ_FAILED",
            SessionStoreError::WriteFailed { .. } => "SESSION_STATE_WRITE_FAILED",
            SessionStoreError::DirCreateFailed { .. } => "SESSION_DIR_CREATE_FAILED",
        }
    }
}

/// Result of [`SessionStore::get_or_create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetOrCreate {
    pub session_id: String,
    pub is_new: bool,
}

/// On-disk shape: schema version + agent name + key → record map.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionFile {
    version: u32,
    agent: String,
    #[serde(default)]
    sessions: BTreeMap<String, SessionRecord>,
}

impl SessionFile {
    fn empty(agent: &str) -> Self {
        Self {
            version: SESSION_FILE_VERSION,
            agent: agent.to_string(),
            sessions: BTreeMap::new(),
        }
    }
}

struct Inner {
    loaded: bool,
    file: SessionFile,
    writes_since_cleanup: u32,
}

/// Durable `(conversation key → session record)` map for one agent on
/// one chat platform.
///
/// All operations are mediated by the store's mutex; each mutation
/// rewrites the whole file.
pub struct SessionStore<C: Clock> {
    platform: String,
    agent: String,
    path: PathBuf,
    expiry_hours: u64,
    clock: C,
    inner: Mutex<Inner>,
}

impl<C: Clock> SessionStore<C> {
    /// Create a store rooted at `<state_dir>/<platform>-sessions/<agent>.json`.
    ///
    /// The file is loaded lazily on first use; call [`cleanup_expired`]
    /// on connector start to force the load and reap stale records.
    ///
    /// [`cleanup_expired`]: SessionStore::cleanup_expired
    pub fn open(
        state_dir: &Path,
        platform: impl Into<String>,
        agent: impl Into<String>,
        expiry_hours: u64,
        clock: C,
    ) -> Self {
        let platform = platform.into();
        let agent = agent.into();
        let path = state_dir
            .join(format!("{platform}-sessions"))
            .join(format!("{agent}.json"));
        Self {
            inner: Mutex::new(Inner {
                loaded: false,
                file: SessionFile::empty(&agent),
                writes_since_cleanup: 0,
            }),
            platform,
            agent,
            path,
            expiry_hours,
            clock,
        }
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the existing non-expired session for `key`, or mint a
    /// fresh opaque id, persist it, and return it with `is_new = true`.
    pub fn get_or_create(&self, key: &str) -> Result<GetOrCreate, SessionStoreError> {
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        self.ensure_loaded(&mut inner)?;

        if let Some(record) = inner.file.sessions.get(key) {
            if !record.is_expired(now, self.expiry_hours) {
                return Ok(GetOrCreate {
                    session_id: record.session_id.clone(),
                    is_new: false,
                });
            }
            inner.file.sessions.remove(key);
        }

        let session_id = format!("{}-{}-{}", self.platform, self.agent, uuid::Uuid::new_v4());
        inner
            .file
            .sessions
            .insert(key.to_string(), SessionRecord::new(&session_id, now));
        self.persist(&mut inner)?;
        Ok(GetOrCreate {
            session_id,
            is_new: true,
        })
    }

    /// Fetch a record; missing and expired both read as `None`.
    pub fn get(&self, key: &str) -> Result<Option<SessionRecord>, SessionStoreError> {
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        self.ensure_loaded(&mut inner)?;
        Ok(inner
            .file
            .sessions
            .get(key)
            .filter(|r| !r.is_expired(now, self.expiry_hours))
            .cloned())
    }

    /// Upsert the backend-supplied session id and touch the record.
    pub fn set(&self, key: &str, session_id: &str) -> Result<(), SessionStoreError> {
        let now = self.clock.epoch_ms();
        self.mutate(|sessions| {
            match sessions.get_mut(key) {
                Some(record) => {
                    record.session_id = session_id.to_string();
                    record.last_message_at_ms = now;
                }
                None => {
                    sessions.insert(key.to_string(), SessionRecord::new(session_id, now));
                }
            }
            true
        })
    }

    /// Update `last_message_at`; no-op if the key is absent.
    pub fn touch(&self, key: &str) -> Result<(), SessionStoreError> {
        let now = self.clock.epoch_ms();
        self.mutate(|sessions| match sessions.get_mut(key) {
            Some(record) => {
                record.last_message_at_ms = now;
                true
            }
            None => false,
        })
    }

    /// Bump the message counter; no-op if the key is absent.
    pub fn increment_message_count(&self, key: &str) -> Result<(), SessionStoreError> {
        self.mutate(|sessions| match sessions.get_mut(key) {
            Some(record) => {
                record.message_count += 1;
                true
            }
            None => false,
        })
    }

    /// Store last-observed token accounting; no-op if the key is absent.
    pub fn update_context_usage(
        &self,
        key: &str,
        usage: ContextUsage,
    ) -> Result<(), SessionStoreError> {
        self.mutate(|sessions| match sessions.get_mut(key) {
            Some(record) => {
                record.context_usage = Some(usage);
                true
            }
            None => false,
        })
    }

    /// Snapshot the agent config the session runs under; no-op if absent.
    pub fn set_agent_config(
        &self,
        key: &str,
        config: AgentConfigSnapshot,
    ) -> Result<(), SessionStoreError> {
        self.mutate(|sessions| match sessions.get_mut(key) {
            Some(record) => {
                record.agent_config = Some(config);
                true
            }
            None => false,
        })
    }

    /// Delete a record. Returns whether it was present.
    pub fn clear(&self, key: &str) -> Result<bool, SessionStoreError> {
        let mut present = false;
        self.mutate(|sessions| {
            present = sessions.remove(key).is_some();
            present
        })?;
        Ok(present)
    }

    /// Reap all expired records. Returns the number removed.
    pub fn cleanup_expired(&self) -> Result<usize, SessionStoreError> {
        let now = self.clock.epoch_ms();
        let expiry_hours = self.expiry_hours;
        let mut inner = self.inner.lock();
        self.ensure_loaded(&mut inner)?;

        let before = inner.file.sessions.len();
        inner
            .file
            .sessions
            .retain(|_, record| !record.is_expired(now, expiry_hours));
        let removed = before - inner.file.sessions.len();
        if removed > 0 {
            self.persist(&mut inner)?;
        }
        inner.writes_since_cleanup = 0;
        Ok(removed)
    }

    /// Number of live (non-expired) sessions.
    pub fn active_count(&self) -> Result<usize, SessionStoreError> {
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        self.ensure_loaded(&mut inner)?;
        Ok(inner
            .file
            .sessions
            .values()
            .filter(|r| !r.is_expired(now, self.expiry_hours))
            .count())
    }

    fn mutate(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, SessionRecord>) -> bool,
    ) -> Result<(), SessionStoreError> {
        let mut inner = self.inner.lock();
        self.ensure_loaded(&mut inner)?;
        if f(&mut inner.file.sessions) {
            self.persist(&mut inner)?;
            if inner.writes_since_cleanup >= WRITES_PER_CLEANUP {
                let now = self.clock.epoch_ms();
                let expiry_hours = self.expiry_hours;
                inner
                    .file
                    .sessions
                    .retain(|_, record| !record.is_expired(now, expiry_hours));
                inner.writes_since_cleanup = 0;
            }
        }
        Ok(())
    }

    fn ensure_loaded(&self, inner: &mut Inner) -> Result<(), SessionStoreError> {
        if inner.loaded {
            return Ok(());
        }

        match fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str::<SessionFile>(&raw) {
                Ok(file) if file.version <= SESSION_FILE_VERSION => {
                    let migrated = file.version < SESSION_FILE_VERSION;
                    inner.file = migrate(file);
                    inner.loaded = true;
                    if migrated {
                        // Rewrite once so the next load sees the current schema.
                        self.persist(inner)?;
                    }
                }
                Ok(file) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        version = file.version,
                        "session file has unknown schema version, starting fresh"
                    );
                    self.quarantine();
                    inner.file = SessionFile::empty(&self.agent);
                    inner.loaded = true;
                }
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "session file is corrupt, starting fresh"
                    );
                    self.quarantine();
                    inner.file = SessionFile::empty(&self.agent);
                    inner.loaded = true;
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                inner.file = SessionFile::empty(&self.agent);
                inner.loaded = true;
            }
            Err(e) => {
                return Err(SessionStoreError::ReadFailed {
                    path: self.path.clone(),
                    source: e,
                });
            }
        }
        Ok(())
    }

    /// Move a broken file aside, preserving the original bytes.
    fn quarantine(&self) {
        let side = self
            .path
            .with_extension(format!("json.corrupt-{}", self.clock.epoch_ms()));
        if let Err(e) = fs::rename(&self.path, &side) {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to quarantine corrupt session file"
            );
        }
    }

    fn persist(&self, inner: &mut Inner) -> Result<(), SessionStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| SessionStoreError::DirCreateFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let body = serde_json::to_string_pretty(&inner.file).map_err(|e| {
            SessionStoreError::WriteFailed {
                path: self.path.clone(),
                source: io::Error::new(io::ErrorKind::InvalidData, e),
            }
        })?;
        fs::write(&self.path, body).map_err(|e| SessionStoreError::WriteFailed {
            path: self.path.clone(),
            source: e,
        })?;
        inner.writes_since_cleanup += 1;
        Ok(())
    }
}

/// Forward-migrate older schema versions to the current one.
///
/// Version 0 predates the version field itself; records carry the same
/// shape, so the bump is just a rewrite under the current version.
fn migrate(mut file: SessionFile) -> SessionFile {
    file.version = SESSION_FILE_VERSION;
    file
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
