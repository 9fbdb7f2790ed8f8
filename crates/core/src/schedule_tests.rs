// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

use super::*;
use chrono::TimeZone;

// ── parse_duration ────────────────────────────────────────────────────

#[yare::parameterized(
    bare_number  = { "30",      Duration::from_secs(30) },
    seconds      = { "45s",     Duration::from_secs(45) },
    minutes      = { "5m",      Duration::from_secs(300) },
    hours        = { "2h",      Duration::from_secs(7200) },
    days         = { "1d",      Duration::from_secs(86400) },
    millis       = { "1500ms",  Duration::from_millis(1500) },
    padded       = { " 10s ",   Duration::from_secs(10) },
)]
fn parse_duration_valid(input: &str, expected: Duration) {
    assert_eq!(parse_duration(input).unwrap(), expected);
}

#[yare::parameterized(
    invalid_suffix = { "30x" },
    empty_string   = { "" },
    invalid_number = { "abcs" },
)]
fn parse_duration_invalid(input: &str) {
    assert!(parse_duration(input).is_err());
}

#[test]
fn duration_str_roundtrip() {
    #[derive(serde::Serialize, serde::Deserialize)]
    struct Wrap {
        #[serde(with = "duration_str")]
        every: Duration,
    }

    let json = serde_json::to_string(&Wrap {
        every: Duration::from_secs(90),
    })
    .unwrap();
    assert_eq!(json, r#"{"every":"90s"}"#);

    let back: Wrap = serde_json::from_str(r#"{"every":"1500ms"}"#).unwrap();
    assert_eq!(back.every, Duration::from_millis(1500));
}

// ── cron normalization ────────────────────────────────────────────────

#[yare::parameterized(
    hourly  = { "@hourly" },
    daily   = { "@daily" },
    weekly  = { "@weekly" },
    monthly = { "@monthly" },
    yearly  = { "@yearly" },
    five_field = { "*/5 * * * *" },
    weekday_range = { "0 9 * * 1-5" },
    sunday_zero   = { "0 0 * * 0" },
    sunday_seven  = { "0 0 * * 7" },
    named_days    = { "30 8 * * MON,WED,FRI" },
)]
fn cron_parse_valid(expr: &str) {
    CronExpr::parse(expr).unwrap();
}

#[yare::parameterized(
    six_fields     = { "0 0 0 * * *" },
    four_fields    = { "0 0 * *" },
    bad_shorthand  = { "@fortnightly" },
    garbage        = { "not a cron" },
)]
fn cron_parse_invalid(expr: &str) {
    assert!(CronExpr::parse(expr).is_err());
}

#[yare::parameterized(
    star          = { "*", "*" },
    sunday        = { "0", "SUN" },
    seven_sunday  = { "7", "SUN" },
    monday        = { "1", "MON" },
    range         = { "1-5", "MON-FRI" },
    list          = { "0,3", "SUN,WED" },
    step_kept     = { "*/2", "*/2" },
    range_step    = { "1-5/2", "MON-FRI/2" },
    name_passthru = { "SAT", "SAT" },
)]
fn dow_translation(input: &str, expected: &str) {
    assert_eq!(translate_dow(input), expected);
}

#[test]
fn cron_keeps_source_for_display() {
    let expr = CronExpr::parse("  0 9 * * 1-5 ").unwrap();
    assert_eq!(expr.source(), "0 9 * * 1-5");
    assert_eq!(serde_json::to_string(&expr).unwrap(), "\"0 9 * * 1-5\"");
}

#[test]
fn cron_next_after_finds_next_matching_minute() {
    // Every hour on the hour; basis 2024-01-15T10:30:00Z.
    let expr = CronExpr::parse("@hourly").unwrap();
    let basis = chrono::Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
    let next = expr.next_after(basis).unwrap();
    assert_eq!(
        next,
        chrono::Utc.with_ymd_and_hms(2024, 1, 15, 11, 0, 0).unwrap()
    );
}

#[test]
fn cron_weekday_semantics_match_crontab() {
    // "0 0 * * 0" is midnight Sunday. 2024-01-15 is a Monday.
    let expr = CronExpr::parse("0 0 * * 0").unwrap();
    let basis = chrono::Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
    let next = expr.next_after(basis).unwrap();
    assert_eq!(
        next,
        chrono::Utc.with_ymd_and_hms(2024, 1, 21, 0, 0, 0).unwrap()
    );
}

// ── next_fire_at ──────────────────────────────────────────────────────

#[test]
fn interval_first_evaluation_is_due_immediately() {
    let spec = ScheduleSpec::Interval {
        every: Duration::from_secs(60),
    };
    assert_eq!(spec.next_fire_at(5_000, None), NextFire::At(5_000));
}

#[test]
fn interval_next_fire_is_last_plus_cadence() {
    let spec = ScheduleSpec::Interval {
        every: Duration::from_secs(60),
    };
    assert_eq!(
        spec.next_fire_at(100_000, Some(70_000)),
        NextFire::At(130_000)
    );
}

#[test]
fn cron_next_fire_from_last_fired() {
    let spec = ScheduleSpec::Cron {
        expr: CronExpr::parse("@hourly").unwrap(),
    };
    // last fired 2024-01-15T10:00:00Z → next 11:00:00Z
    let last = chrono::Utc
        .with_ymd_and_hms(2024, 1, 15, 10, 0, 0)
        .unwrap()
        .timestamp_millis() as u64;
    let expected = chrono::Utc
        .with_ymd_and_hms(2024, 1, 15, 11, 0, 0)
        .unwrap()
        .timestamp_millis() as u64;
    assert_eq!(spec.next_fire_at(last + 1, Some(last)), NextFire::At(expected));
}

#[yare::parameterized(
    webhook = { ScheduleSpec::Webhook },
    chat    = { ScheduleSpec::Chat },
)]
fn passive_specs_never_fire(spec: ScheduleSpec) {
    assert!(!spec.fires_from_scheduler());
    assert_eq!(spec.next_fire_at(1_000, None), NextFire::Never);
}

// ── Schedule serde ────────────────────────────────────────────────────

#[test]
fn schedule_decodes_tagged_form() {
    let raw = r#"{
        "name": "nightly",
        "type": "cron",
        "expr": "@daily",
        "prompt": "summarize the day"
    }"#;
    let schedule: Schedule = serde_json::from_str(raw).unwrap();
    assert_eq!(schedule.name, "nightly");
    assert_eq!(schedule.spec.kind(), "cron");
    assert_eq!(schedule.prompt.as_deref(), Some("summarize the day"));
    assert!(schedule.enabled);
}

#[test]
fn schedule_interval_roundtrip() {
    let schedule = Schedule::new(
        "poll",
        ScheduleSpec::Interval {
            every: Duration::from_secs(30),
        },
    )
    .work_source("queue:alerts");
    let json = serde_json::to_string(&schedule).unwrap();
    let back: Schedule = serde_json::from_str(&json).unwrap();
    assert_eq!(back, schedule);
}

#[test]
fn schedule_disabled_flag() {
    let raw = r#"{"name":"off","type":"webhook","enabled":false}"#;
    let schedule: Schedule = serde_json::from_str(raw).unwrap();
    assert!(!schedule.enabled);
}
