// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! Conversation-context assembly for chat-originated triggers.

use crate::platform::{ChatUser, HistoryMessage};

/// Build the context block fed to the backend alongside the prompt.
///
/// Messages are stripped, empties dropped, and other bots' messages
/// dropped unless `include_bots`. With `prioritize_user` on, non-bot
/// messages claim slots first and bot messages fill the remainder; the
/// result is always re-sorted oldest-first. With it off, the most recent
/// `cap` messages win.
pub fn build_context(
    messages: &[HistoryMessage],
    bot: &ChatUser,
    cap: usize,
    prioritize_user: bool,
    include_bots: bool,
    strip: impl Fn(&str) -> String,
) -> Option<String> {
    if cap == 0 {
        return None;
    }

    let cleaned: Vec<(usize, &HistoryMessage, String)> = messages
        .iter()
        .enumerate()
        .filter(|(_, m)| include_bots || !m.author.is_bot || m.author.id == bot.id)
        .map(|(idx, m)| (idx, m, strip(&m.text)))
        .filter(|(_, _, text)| !text.is_empty())
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let mut picked: Vec<(usize, &HistoryMessage, String)> = if prioritize_user {
        // Non-bot messages first (most recent of them), then backfill
        // with bot messages up to the cap.
        let mut users: Vec<_> = cleaned.iter().filter(|(_, m, _)| !m.author.is_bot).collect();
        let mut bots: Vec<_> = cleaned.iter().filter(|(_, m, _)| m.author.is_bot).collect();
        if users.len() > cap {
            users.drain(..users.len() - cap);
        }
        let remaining = cap - users.len();
        if bots.len() > remaining {
            bots.drain(..bots.len() - remaining);
        }
        users
            .into_iter()
            .chain(bots)
            .map(|(idx, m, text)| (*idx, *m, text.clone()))
            .collect()
    } else {
        let skip = cleaned.len().saturating_sub(cap);
        cleaned.into_iter().skip(skip).collect()
    };

    // Chronological, oldest first.
    picked.sort_by_key(|(idx, _, _)| *idx);

    let lines: Vec<String> = picked
        .into_iter()
        .map(|(_, m, text)| format!("{}: {}", m.author.id, text))
        .collect();
    Some(lines.join("\n"))
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
