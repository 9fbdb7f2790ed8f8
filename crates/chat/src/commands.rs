// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! In-channel maintenance commands.
//!
//! Commands are platform-agnostic: `!help` / `/help` style, parsed from
//! already-stripped message text.

/// The registered maintenance commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceCommand {
    Help,
    Reset,
    Status,
}

herd_core::simple_display! {
    MaintenanceCommand {
        Help => "help",
        Reset => "reset",
        Status => "status",
    }
}

impl MaintenanceCommand {
    /// Parse command text. Accepts `!` and `/` prefixes; anything else
    /// is not a command.
    ///
    /// Returns `Some(Err(name))` for an unknown command name so callers
    /// can answer with a hint instead of triggering the agent.
    pub fn parse(text: &str) -> Option<Result<Self, String>> {
        let rest = text
            .strip_prefix('!')
            .or_else(|| text.strip_prefix('/'))?;
        let name = rest.split_whitespace().next().unwrap_or("");
        match name {
            "help" => Some(Ok(MaintenanceCommand::Help)),
            "reset" => Some(Ok(MaintenanceCommand::Reset)),
            "status" => Some(Ok(MaintenanceCommand::Status)),
            other => Some(Err(other.to_string())),
        }
    }

    pub fn help_text() -> &'static str {
        "Available commands:\n\
         !help - show this message\n\
         !reset - clear this conversation's session\n\
         !status - show connector status"
    }
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
