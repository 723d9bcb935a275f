//! Rank transition engine
//!
//! Two phases. A scored report is judged into a pass or a failure; a pass
//! makes the pipeline add the rank role. The role-change event that follows
//! is then validated against the ledger, resolved through the double-rank
//! rules and turned into role edits plus an announcement decision.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use super::configuration_matcher::{MatchResult, Mismatch};
use super::pending_grants::PendingGrant;
use crate::error::{Error, Result};
use crate::ledger::{AttemptOutcome, AttemptRecord};
use crate::rank::{DoubleRankRules, RankCatalog, RankId, RankSet, RankTier};

/// Why a matched report does not count as a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportFailure {
    Configuration(Vec<Mismatch>),
    TooManyParticipants,
    ScoreMismatch { expected: u32, actual: u32 },
}

impl ReportFailure {
    /// Lines sent to the channel
    pub fn reasons(&self) -> Vec<String> {
        match self {
            ReportFailure::Configuration(mismatches) => {
                mismatches.iter().map(|m| m.message().to_string()).collect()
            }
            ReportFailure::TooManyParticipants => vec!["Too many participants.".to_string()],
            ReportFailure::ScoreMismatch { .. } => {
                vec!["Score and limit don't match.".to_string()]
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportVerdict {
    Pass {
        rank: RankId,
        command: String,
    },
    Fail {
        rank: RankId,
        command: String,
        failure: ReportFailure,
    },
}

impl ReportVerdict {
    pub fn rank(&self) -> RankId {
        match self {
            ReportVerdict::Pass { rank, .. } | ReportVerdict::Fail { rank, .. } => *rank,
        }
    }

    pub fn command(&self) -> &str {
        match self {
            ReportVerdict::Pass { command, .. } | ReportVerdict::Fail { command, .. } => command,
        }
    }

    pub fn outcome(&self) -> AttemptOutcome {
        match self {
            ReportVerdict::Pass { .. } => AttemptOutcome::Passed,
            ReportVerdict::Fail { .. } => AttemptOutcome::Failed,
        }
    }
}

/// Role edits to apply to a member
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolePlan {
    pub add: Vec<RankId>,
    pub remove: Vec<RankId>,
}

impl RolePlan {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleChangeOutcome {
    /// No rank role was added
    NoChange,
    /// A rank role was added that no recent pass accounts for
    Untracked { gained: RankId },
    /// Holding both halves of a track: collapse them into `target`
    ///
    /// Adding the target raises another role change, which is where the
    /// promotion is reported.
    Merge {
        passed: RankId,
        target: RankId,
        plan: RolePlan,
    },
    Promoted {
        passed: RankId,
        gained: RankId,
        plan: RolePlan,
        announce: bool,
    },
}

pub struct RankTransitionEngine {
    catalog: Arc<RankCatalog>,
    rules: DoubleRankRules,
    grant_window: Duration,
}

impl RankTransitionEngine {
    pub fn new(catalog: Arc<RankCatalog>, rules: DoubleRankRules, grant_window: Duration) -> Self {
        Self {
            catalog,
            rules,
            grant_window,
        }
    }

    /// Judge a matched report
    ///
    /// Checked in order: configuration, single participant, score equal to
    /// the rank's threshold.
    pub fn judge_report(
        &self,
        matched: &MatchResult,
        participants: usize,
        score: u32,
    ) -> ReportVerdict {
        let rank = matched.rank;
        let command = matched.command.clone();

        let failure = if !matched.is_accepted() {
            Some(ReportFailure::Configuration(matched.mismatches.clone()))
        } else if participants > 1 {
            Some(ReportFailure::TooManyParticipants)
        } else if score != matched.score_limit {
            Some(ReportFailure::ScoreMismatch {
                expected: matched.score_limit,
                actual: score,
            })
        } else {
            None
        };

        match failure {
            Some(failure) => ReportVerdict::Fail {
                rank,
                command,
                failure,
            },
            None => ReportVerdict::Pass { rank, command },
        }
    }

    /// Interpret a member's rank roles changing from `before` to `after`
    ///
    /// `pending` names the role the bot expects to see added; without it the
    /// gained role is found by diffing. The change only counts when the
    /// member's last attempt is a recent pass whose rank is the gained role
    /// or a trigger of it. A recent pass on a command the catalog does not
    /// know is an error.
    pub fn observe_role_change(
        &self,
        before: &RankSet,
        after: &RankSet,
        last_attempt: Option<&AttemptRecord>,
        pending: Option<&PendingGrant>,
        now: DateTime<Utc>,
    ) -> Result<RoleChangeOutcome> {
        let gained_roles: RankSet = after.difference(before).copied().collect();

        let gained = match pending.filter(|p| gained_roles.contains(&p.expected_role)) {
            Some(grant) => grant.expected_role,
            None => {
                if gained_roles.len() > 1 {
                    tracing::warn!(gained = ?gained_roles, "Several rank roles added at once");
                }
                match gained_roles.iter().next() {
                    Some(role) => *role,
                    None => return Ok(RoleChangeOutcome::NoChange),
                }
            }
        };

        let passed = match self.passed_rank(last_attempt, now)? {
            Some(passed) => passed,
            None => return Ok(RoleChangeOutcome::Untracked { gained }),
        };

        if gained != passed && !self.rules.is_reachable(gained, passed) {
            return Ok(RoleChangeOutcome::Untracked { gained });
        }

        if let Some(merge) = self.rules.resolve(after) {
            return Ok(RoleChangeOutcome::Merge {
                passed,
                target: merge.target,
                plan: RolePlan {
                    add: vec![merge.target],
                    remove: merge.remove,
                },
            });
        }

        // Marker roles stack; main and combined roles replace the old tier
        let replaces_tier = matches!(gained.tier(), RankTier::Main | RankTier::Combined);
        let remove = if replaces_tier {
            before
                .iter()
                .copied()
                .filter(|rank| *rank != gained && !rank.is_terminal())
                .collect()
        } else {
            Vec::new()
        };

        Ok(RoleChangeOutcome::Promoted {
            passed,
            gained,
            plan: RolePlan {
                add: Vec::new(),
                remove,
            },
            announce: replaces_tier,
        })
    }

    /// Rank of the last attempt when it is a pass inside the grant window
    fn passed_rank(
        &self,
        last_attempt: Option<&AttemptRecord>,
        now: DateTime<Utc>,
    ) -> Result<Option<RankId>> {
        let last = match last_attempt {
            Some(last) if last.is_recent_pass(now, self.grant_window) => last,
            _ => return Ok(None),
        };
        match self.catalog.by_command(&last.command) {
            Some(definition) => Ok(Some(definition.id)),
            None => Err(Error::UnknownRank(last.command.clone())),
        }
    }
}
