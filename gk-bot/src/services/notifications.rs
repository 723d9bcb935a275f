//! User-facing message texts

use chrono::{DateTime, Utc};
use gk_common::events::Snowflake;
use gk_common::time::{absolute_marker, relative_marker};

use crate::rank::RankId;

pub const COUNTED: &str = "This attempt will be counted!";
pub const WRONG_COMMAND: &str = "Wrong quiz command";

/// Timeout reasons shown in the platform's audit log
pub const INVALID_ATTEMPT_REASON: &str = "Invalid quiz attempt";
pub const WRONG_COMMAND_REASON: &str = WRONG_COMMAND;

pub fn cooldown_channel(expires_at: DateTime<Utc>) -> String {
    format!(
        "Please attempt again in {} at {}. Any attempts until then will not be counted.",
        relative_marker(expires_at),
        absolute_marker(expires_at)
    )
}

pub fn cooldown_direct(expires_at: DateTime<Utc>, command: &str) -> String {
    format!(
        "Please attempt again in {} at {}. Any attempts on ``{}`` until then will not be counted.",
        relative_marker(expires_at),
        absolute_marker(expires_at),
        command
    )
}

pub fn failure(reasons: &[String]) -> String {
    reasons.join("\n")
}

pub fn passed_direct(passed: RankId) -> String {
    format!("You passed the {} quiz! Your role is now updated.", passed.quiz_label())
}

pub fn announcement(member_id: Snowflake, passed: RankId, gained: RankId) -> String {
    format!(
        "<@{}> has passed the {} quiz and is now a {}!",
        member_id,
        passed.quiz_label(),
        gained.name()
    )
}
