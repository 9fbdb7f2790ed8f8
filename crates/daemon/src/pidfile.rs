// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! PID-file handling with stale-file recovery.
//!
//! The file holds the daemon's PID as ASCII decimal with no trailing
//! content. A leftover file whose PID is no longer alive is removed on
//! the next start; a live PID refuses the second daemon.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PidFileError {
    #[error("another daemon is already running (pid {0})")]
    AlreadyRunning(u32),
    #[error("pid file error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Exclusive PID file; released and removed on drop.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
    // NOTE(lifetime): held to keep the exclusive lock until drop.
    #[allow(dead_code)]
    file: File,
}

fn pid_is_alive(pid: u32) -> bool {
    match nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        // No permission to signal it, but it exists.
        Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    }
}

impl PidFile {
    pub fn acquire(path: PathBuf) -> Result<Self, PidFileError> {
        let io_err = |source| PidFileError::Io {
            path: path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(io_err)?;

        if file.try_lock_exclusive().is_err() {
            let mut raw = String::new();
            let _ = file.read_to_string(&mut raw);
            let pid = raw.trim().parse::<u32>().unwrap_or(0);
            return Err(PidFileError::AlreadyRunning(pid));
        }

        // Locked, but the file may be a stale leftover from a crash.
        let mut raw = String::new();
        file.read_to_string(&mut raw).map_err(io_err)?;
        if let Ok(old_pid) = raw.trim().parse::<u32>() {
            if old_pid != std::process::id() && pid_is_alive(old_pid) {
                return Err(PidFileError::AlreadyRunning(old_pid));
            }
            if !raw.is_empty() {
                tracing::warn!(old_pid, "removing stale pid file");
            }
        }

        file.set_len(0).map_err(io_err)?;
        file.seek(SeekFrom::Start(0)).map_err(io_err)?;
        write!(file, "{}", std::process::id()).map_err(io_err)?;
        file.flush().map_err(io_err)?;

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
#[path = "pidfile_tests.rs"]
mod tests;
