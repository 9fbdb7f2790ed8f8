// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

use super::*;

#[test]
fn acquire_writes_ascii_pid_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("herdctl.pid");
    let pid_file = PidFile::acquire(path.clone()).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    assert_eq!(raw, std::process::id().to_string());
    drop(pid_file);
    assert!(!path.exists(), "pid file removed on drop");
}

#[test]
fn stale_pid_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("herdctl.pid");
    // A PID that cannot be alive (beyond pid_max on any sane system).
    std::fs::write(&path, "999999999").unwrap();

    let _pid_file = PidFile::acquire(path.clone()).unwrap();
    let raw = std::fs::read_to_string(&path).unwrap();
    assert_eq!(raw, std::process::id().to_string());
}

#[test]
fn live_pid_refuses_second_daemon() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("herdctl.pid");
    // PID 1 is always alive.
    std::fs::write(&path, "1").unwrap();

    match PidFile::acquire(path) {
        Err(PidFileError::AlreadyRunning(pid)) => assert_eq!(pid, 1),
        other => panic!("expected AlreadyRunning, got {other:?}"),
    }
}
