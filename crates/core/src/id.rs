// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! Job identifier generation.
//!
//! Job ids carry their start-day bucket so operators can correlate a job
//! with log files at a glance: `job-YYYY-MM-DD-xxxxxx`. The random suffix
//! keeps ids collision-free within a day bucket with very high probability.

use crate::clock::Clock;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Alphabet for the random suffix: lowercase alphanumerics only.
const SUFFIX_ALPHABET: [char; 36] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

/// Length of the random suffix.
pub const SUFFIX_LEN: usize = 6;

/// Unique identifier for a job instance: `job-YYYY-MM-DD-xxxxxx`.
///
/// The date is the UTC day the job was admitted; the suffix is 6 random
/// lowercase alphanumerics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generate a fresh id day-bucketed by the clock's current UTC date.
    pub fn generate(clock: &impl Clock) -> Self {
        let date = clock.utc().format("%Y-%m-%d");
        let suffix = nanoid::nanoid!(SUFFIX_LEN, &SUFFIX_ALPHABET);
        Self(format!("job-{date}-{suffix}"))
    }

    /// Create an id from an existing string (for parsing/deserialization).
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `YYYY-MM-DD` day bucket, if the id is well-formed.
    pub fn day_bucket(&self) -> Option<&str> {
        self.parts().map(|(date, _)| date)
    }

    /// The random suffix, if the id is well-formed.
    pub fn suffix(&self) -> Option<&str> {
        self.parts().map(|(_, suffix)| suffix)
    }

    /// Check the `job-YYYY-MM-DD-xxxxxx` shape.
    pub fn is_well_formed(&self) -> bool {
        self.parts().is_some()
    }

    fn parts(&self) -> Option<(&str, &str)> {
        let rest = self.0.strip_prefix("job-")?;
        let (date, suffix) = rest.split_at_checked(10)?;
        let suffix = suffix.strip_prefix('-')?;
        let date_ok = date.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
        let suffix_ok = suffix.len() == SUFFIX_LEN
            && suffix
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
        (date_ok && suffix_ok).then_some((date, suffix))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self::from_string(s)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for JobId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for JobId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for JobId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
