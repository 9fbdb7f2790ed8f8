// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! Schedule variants and cadence evaluation.
//!
//! A schedule is a tagged variant: `interval` and `cron` fire from the
//! scheduler via [`ScheduleSpec::next_fire_at`]; `webhook` and `chat` are
//! passive placeholders that only declare prompts for external trigger
//! paths and report [`NextFire::Never`].
//!
//! Cron expressions are the classic five fields (minute hour day month
//! weekday, with `0` or `7` meaning Sunday) plus the `@hourly`/`@daily`/
//! `@weekly`/`@monthly`/`@yearly` shorthands. They are normalized to the
//! six-field form the `cron` crate evaluates.

use crate::clock::epoch_ms_to_utc;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },
    #[error("invalid duration: {0}")]
    InvalidDuration(String),
}

/// Parse a duration string like "30s", "5m", "1h" into a Duration.
/// A bare number is seconds.
pub fn parse_duration(s: &str) -> Result<Duration, ScheduleError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ScheduleError::InvalidDuration(
            "empty duration string".to_string(),
        ));
    }

    // Find the numeric prefix
    let (num_str, suffix) = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| (&s[..i], &s[i..]))
        .unwrap_or((s, ""));

    let num: u64 = num_str
        .parse()
        .map_err(|_| ScheduleError::InvalidDuration(format!("invalid number in '{s}'")))?;

    let multiplier = match suffix.trim() {
        "ms" | "millis" | "millisecond" | "milliseconds" => {
            return Ok(Duration::from_millis(num));
        }
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3600,
        "d" | "day" | "days" => 86400,
        other => {
            return Err(ScheduleError::InvalidDuration(format!(
                "unknown suffix '{other}'"
            )))
        }
    };

    Ok(Duration::from_secs(num * multiplier))
}

/// Serde adapter storing durations as "30s"/"1500ms"-style strings.
pub mod duration_str {
    use super::parse_duration;
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        let ms = d.as_millis();
        if ms % 1000 == 0 {
            ser.serialize_str(&format!("{}s", ms / 1000))
        } else {
            ser.serialize_str(&format!("{ms}ms"))
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(de)?;
        parse_duration(&raw).map_err(de::Error::custom)
    }
}

const DOW_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// Rewrite numeric day-of-week tokens to names.
///
/// Crontab numbering has 0 and 7 both meaning Sunday; the evaluation
/// library numbers days differently, so numbers are translated to the
/// unambiguous names. Step counts after `/` are left untouched.
fn translate_dow(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 8);
    let bytes = field.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            let token = &field[start..i];
            let after_slash = start > 0 && bytes[start - 1] == b'/';
            match token.parse::<u8>() {
                Ok(day) if !after_slash && day <= 7 => {
                    out.push_str(DOW_NAMES[(day % 7) as usize]);
                }
                _ => out.push_str(token),
            }
        } else {
            out.push(bytes[i] as char);
            i += 1;
        }
    }
    out
}

/// Expand shorthands and normalize five fields to the evaluator's six.
fn normalize(expr: &str) -> Result<String, ScheduleError> {
    let trimmed = expr.trim();
    let expanded = match trimmed {
        "@hourly" => "0 * * * *",
        "@daily" | "@midnight" => "0 0 * * *",
        "@weekly" => "0 0 * * 0",
        "@monthly" => "0 0 1 * *",
        "@yearly" | "@annually" => "0 0 1 1 *",
        other if other.starts_with('@') => {
            return Err(ScheduleError::InvalidCron {
                expr: expr.to_string(),
                reason: "unknown shorthand".to_string(),
            })
        }
        other => other,
    };

    let fields: Vec<&str> = expanded.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(ScheduleError::InvalidCron {
            expr: expr.to_string(),
            reason: format!(
                "expected 5 fields (minute hour day month weekday), got {}",
                fields.len()
            ),
        });
    }

    Ok(format!(
        "0 {} {} {} {} {}",
        fields[0],
        fields[1],
        fields[2],
        fields[3],
        translate_dow(fields[4])
    ))
}

/// A validated cron expression.
///
/// Keeps the operator-facing source string for display and serialization;
/// evaluation runs on the normalized form.
#[derive(Clone)]
pub struct CronExpr {
    source: String,
    schedule: cron::Schedule,
}

impl CronExpr {
    pub fn parse(expr: &str) -> Result<Self, ScheduleError> {
        let normalized = normalize(expr)?;
        let schedule =
            cron::Schedule::from_str(&normalized).map_err(|e| ScheduleError::InvalidCron {
                expr: expr.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            source: expr.trim().to_string(),
            schedule,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Next matching wall-clock time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }
}

impl std::fmt::Debug for CronExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CronExpr({:?})", self.source)
    }
}

impl PartialEq for CronExpr {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for CronExpr {}

impl Serialize for CronExpr {
    fn serialize<S: serde::Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for CronExpr {
    fn deserialize<D: serde::Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(de)?;
        CronExpr::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// When a schedule next fires, as seen from the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextFire {
    At(u64),
    /// Passive schedules never fire from the scheduler.
    Never,
}

/// Cadence variant of a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScheduleSpec {
    Interval {
        #[serde(with = "duration_str")]
        every: Duration,
    },
    Cron {
        expr: CronExpr,
    },
    Webhook,
    Chat,
}

impl ScheduleSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            ScheduleSpec::Interval { .. } => "interval",
            ScheduleSpec::Cron { .. } => "cron",
            ScheduleSpec::Webhook => "webhook",
            ScheduleSpec::Chat => "chat",
        }
    }

    /// True for the variants the scheduler drives.
    pub fn fires_from_scheduler(&self) -> bool {
        matches!(self, ScheduleSpec::Interval { .. } | ScheduleSpec::Cron { .. })
    }

    /// Compute the next fire time.
    ///
    /// An interval schedule that has never fired is due immediately; a
    /// cron schedule waits for the next matching wall-clock minute after
    /// its last fire (or after `now_ms` when it has never fired).
    pub fn next_fire_at(&self, now_ms: u64, last_fired_ms: Option<u64>) -> NextFire {
        match self {
            ScheduleSpec::Interval { every } => {
                let every_ms = every.as_millis() as u64;
                match last_fired_ms {
                    None => NextFire::At(now_ms),
                    Some(last) => NextFire::At(last.saturating_add(every_ms)),
                }
            }
            ScheduleSpec::Cron { expr } => {
                let basis = epoch_ms_to_utc(last_fired_ms.unwrap_or(now_ms));
                match expr.next_after(basis) {
                    Some(next) => NextFire::At(next.timestamp_millis().max(0) as u64),
                    None => NextFire::Never,
                }
            }
            ScheduleSpec::Webhook | ScheduleSpec::Chat => NextFire::Never,
        }
    }
}

fn default_true() -> bool {
    true
}

/// One declared schedule of an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub name: String,
    #[serde(flatten)]
    pub spec: ScheduleSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_source: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Schedule {
    pub fn new(name: impl Into<String>, spec: ScheduleSpec) -> Self {
        Self {
            name: name.into(),
            spec,
            prompt: None,
            work_source: None,
            enabled: true,
        }
    }

    crate::setters! {
        set {
            enabled: bool,
        }
        option {
            prompt: String,
            work_source: String,
        }
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
