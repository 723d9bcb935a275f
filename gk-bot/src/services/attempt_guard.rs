//! Attempt guard
//!
//! Classifies chat messages that look like quiz start commands and decides
//! what happens to them: counted, blocked by a cooldown, or punished as a
//! wrong command.

use chrono::{DateTime, Duration, Utc};
use gk_common::events::Snowflake;
use gk_common::time;
use std::sync::Arc;

use crate::error::Result;
use crate::ledger::{AttemptLedger, AttemptOutcome, AttemptRecord};
use crate::rank::{RankCatalog, RankId};

/// Substrings that mark a hand-written ranked quiz command
const MALFORMED_MARKERS: [&str; 2] = ["jpdb", "conquest"];

/// What a chat message is, as far as quiz commands go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageClass {
    Irrelevant,
    /// Exactly a rank's start command
    KnownCommand(RankId),
    /// Starts like a quiz on known decks but is not a rank's command
    UnknownCommand,
    /// Mentions the quiz prefix with ranked deck keywords
    MalformedCommand,
}

/// Penalties applied by the guard
#[derive(Debug, Clone)]
pub struct GuardSettings {
    pub invalid_attempt_timeout: Duration,
    pub wrong_command_timeout: Duration,
    /// Lock the channel after a wrong command, for this long
    pub channel_lock: Option<std::time::Duration>,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            invalid_attempt_timeout: Duration::minutes(2),
            wrong_command_timeout: Duration::minutes(5),
            channel_lock: Some(std::time::Duration::from_secs(300)),
        }
    }
}

/// Decision for one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Ignore,
    /// The attempt will be counted once its report arrives
    Counted { rank: RankId, command: String },
    /// A failed attempt on this command is still cooling down
    CooldownActive {
        rank: RankId,
        command: String,
        expires_at: DateTime<Utc>,
        timeout_until: DateTime<Utc>,
    },
    WrongCommand {
        timeout_until: DateTime<Utc>,
        lock: Option<std::time::Duration>,
    },
}

pub struct AttemptGuard {
    catalog: Arc<RankCatalog>,
    settings: GuardSettings,
}

impl AttemptGuard {
    pub fn new(catalog: Arc<RankCatalog>, settings: GuardSettings) -> Self {
        Self { catalog, settings }
    }

    pub fn classify(&self, content: &str) -> MessageClass {
        let prefixes = self.catalog.deck_prefixes();

        if prefixes.iter().any(|prefix| content.starts_with(prefix.as_str())) {
            if self.catalog.valid_commands().contains(content) {
                if let Some(definition) = self.catalog.by_command(content) {
                    return MessageClass::KnownCommand(definition.id);
                }
            }
            return MessageClass::UnknownCommand;
        }

        if content.contains(self.catalog.prefix())
            && MALFORMED_MARKERS.iter().all(|marker| content.contains(marker))
        {
            return MessageClass::MalformedCommand;
        }

        MessageClass::Irrelevant
    }

    /// Decide what to do with a message from `author`
    ///
    /// A known command repeated during an active cooldown is recorded as a
    /// FAILED attempt, which pushes the cooldown expiry forward.
    pub async fn evaluate(
        &self,
        author: Snowflake,
        content: &str,
        ledger: &dyn AttemptLedger,
        now: DateTime<Utc>,
    ) -> Result<GuardDecision> {
        let decision = match self.classify(content) {
            MessageClass::Irrelevant => GuardDecision::Ignore,

            MessageClass::KnownCommand(rank) => {
                if !ledger.has_active_cooldown(author, content, now).await? {
                    GuardDecision::Counted {
                        rank,
                        command: content.to_string(),
                    }
                } else {
                    ledger
                        .record_attempt(&AttemptRecord::new(
                            author,
                            content,
                            now,
                            AttemptOutcome::Failed,
                        ))
                        .await?;

                    let expires_at = ledger
                        .cooldown_expiry(author, content)
                        .await?
                        .unwrap_or_else(|| time::offset(now, ledger.cooldown()));

                    GuardDecision::CooldownActive {
                        rank,
                        command: content.to_string(),
                        expires_at,
                        timeout_until: time::offset(now, self.settings.invalid_attempt_timeout),
                    }
                }
            }

            MessageClass::UnknownCommand | MessageClass::MalformedCommand => {
                GuardDecision::WrongCommand {
                    timeout_until: time::offset(now, self.settings.wrong_command_timeout),
                    lock: self.settings.channel_lock,
                }
            }
        };

        if decision != GuardDecision::Ignore {
            tracing::debug!(
                member_id = %author,
                command = %content,
                decision = ?decision,
                "Guarded quiz command"
            );
        }

        Ok(decision)
    }
}
