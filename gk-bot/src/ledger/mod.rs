//! Attempt ledger
//!
//! Append-only record of quiz attempts. Cooldowns are derived from it, never
//! stored: the most recent attempt for (member, command), if FAILED, blocks
//! further counted attempts until its timestamp plus the cooldown.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use gk_common::events::Snowflake;
use gk_common::time;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

pub mod sqlite;

pub use sqlite::SqliteLedger;

/// Outcome of a recorded attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttemptOutcome {
    Passed,
    Failed,
}

impl AttemptOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            AttemptOutcome::Passed => "PASSED",
            AttemptOutcome::Failed => "FAILED",
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttemptOutcome {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PASSED" => Ok(AttemptOutcome::Passed),
            "FAILED" => Ok(AttemptOutcome::Failed),
            other => Err(Error::InvalidData(format!("unknown attempt outcome '{}'", other))),
        }
    }
}

/// One quiz attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub member_id: Snowflake,
    pub command: String,
    pub created_at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
}

impl AttemptRecord {
    pub fn new(
        member_id: Snowflake,
        command: impl Into<String>,
        created_at: DateTime<Utc>,
        outcome: AttemptOutcome,
    ) -> Self {
        Self {
            member_id,
            command: command.into(),
            created_at,
            outcome,
        }
    }

    /// PASSED and no older than `window` at `now`
    pub fn is_recent_pass(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.outcome == AttemptOutcome::Passed && now - self.created_at <= window
    }
}

/// Record/query contract for quiz attempts
#[async_trait]
pub trait AttemptLedger: Send + Sync {
    /// Append an attempt; records are never updated or deleted
    async fn record_attempt(&self, record: &AttemptRecord) -> Result<()>;

    /// Most recent attempt by a member, any command
    async fn last_attempt(&self, member_id: Snowflake) -> Result<Option<AttemptRecord>>;

    /// Most recent attempt by a member on one command
    async fn last_attempt_for(
        &self,
        member_id: Snowflake,
        command: &str,
    ) -> Result<Option<AttemptRecord>>;

    /// Audit a rank role granted to a member
    async fn record_role_grant(
        &self,
        member_id: Snowflake,
        role_name: &str,
        granted_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Cooldown applied after a failed attempt
    fn cooldown(&self) -> Duration;

    /// When the member may next attempt `command`
    ///
    /// `None` unless the latest attempt on that command failed.
    async fn cooldown_expiry(
        &self,
        member_id: Snowflake,
        command: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        let last = self.last_attempt_for(member_id, command).await?;
        Ok(last
            .filter(|record| record.outcome == AttemptOutcome::Failed)
            .map(|record| time::offset(record.created_at, self.cooldown())))
    }

    /// A failed attempt on `command` is still inside its cooldown at `now`
    async fn has_active_cooldown(
        &self,
        member_id: Snowflake,
        command: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        Ok(self
            .cooldown_expiry(member_id, command)
            .await?
            .map(|expiry| now < expiry)
            .unwrap_or(false))
    }
}
