//! Event pipeline
//!
//! Turns inbound chat events into guard decisions, report verdicts and role
//! transitions, and carries them out through the gateway. Events are
//! handled one at a time by [`run_dispatcher`].

use gk_common::events::{ChatEvent, ChatMessage, MemberUpdate, Snowflake};
use gk_common::time;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};

use crate::config::BotSettings;
use crate::error::{Error, Result};
use crate::gateway::{ChatGateway, PermissionOverwrite};
use crate::ledger::{AttemptLedger, AttemptRecord};
use crate::rank::{rank_set, DoubleRankRules, RankCatalog, RankId, RankSet};
use crate::services::notifications;
use crate::services::report_client::report_id_from_field;
use crate::services::{
    AttemptGuard, ConfigurationMatcher, GuardDecision, MatchOutcome, PendingGrant, PendingGrants,
    RankTransitionEngine, ReportError, ReportSource, ReportVerdict, RoleChangeOutcome, RolePlan,
};

pub struct QuizPipeline {
    catalog: Arc<RankCatalog>,
    guard: AttemptGuard,
    matcher: ConfigurationMatcher,
    engine: RankTransitionEngine,
    pending: PendingGrants,
    ledger: Arc<dyn AttemptLedger>,
    gateway: Arc<dyn ChatGateway>,
    reports: Arc<dyn ReportSource>,
    quiz_bot_id: Snowflake,
    announcement_channel_id: Snowflake,
    announcement_channel_name: String,
}

impl QuizPipeline {
    pub fn new(
        settings: &BotSettings,
        ledger: Arc<dyn AttemptLedger>,
        gateway: Arc<dyn ChatGateway>,
        reports: Arc<dyn ReportSource>,
    ) -> Self {
        let catalog = Arc::new(RankCatalog::standard(&settings.command_prefix));

        Self {
            guard: AttemptGuard::new(catalog.clone(), settings.guard_settings()),
            matcher: ConfigurationMatcher::new(catalog.clone()),
            engine: RankTransitionEngine::new(
                catalog.clone(),
                DoubleRankRules::standard(),
                settings.grant_window(),
            ),
            pending: PendingGrants::new(settings.grant_window()),
            catalog,
            ledger,
            gateway,
            reports,
            quiz_bot_id: settings.quiz_bot_id,
            announcement_channel_id: settings.announcement_channel_id,
            announcement_channel_name: settings.announcement_channel_name.clone(),
        }
    }

    pub fn catalog(&self) -> &RankCatalog {
        &self.catalog
    }

    pub async fn handle(&self, event: &ChatEvent) -> Result<()> {
        match event {
            ChatEvent::MessageCreated(message) => self.handle_message(message).await,
            ChatEvent::MemberUpdated(update) => self.handle_member_update(update).await,
        }
    }

    async fn handle_message(&self, message: &ChatMessage) -> Result<()> {
        let decision = self
            .guard
            .evaluate(
                message.author_id,
                &message.content,
                self.ledger.as_ref(),
                time::now(),
            )
            .await?;

        if decision != GuardDecision::Ignore {
            return self.apply_guard_decision(message, decision).await;
        }

        if message.author_id != self.quiz_bot_id {
            return Ok(());
        }

        let report_id = match message.embed_field_values().find_map(report_id_from_field) {
            Some(id) => id.to_string(),
            None => return Ok(()),
        };

        if !self.has_rank_roles(message.guild_id).await? {
            return Ok(());
        }

        self.process_report(message, &report_id).await
    }

    async fn apply_guard_decision(
        &self,
        message: &ChatMessage,
        decision: GuardDecision,
    ) -> Result<()> {
        let channel = message.channel_id;
        let author = message.author_id;

        match decision {
            GuardDecision::Ignore => {}

            GuardDecision::Counted { rank, .. } => {
                info!(member_id = %author, rank = %rank, "Quiz attempt will be counted");
                self.gateway
                    .send_message(channel, notifications::COUNTED)
                    .await?;
            }

            GuardDecision::CooldownActive {
                rank,
                command,
                expires_at,
                timeout_until,
            } => {
                info!(
                    member_id = %author,
                    rank = %rank,
                    command = %command,
                    "Attempt during cooldown"
                );
                self.gateway
                    .send_message(channel, &notifications::cooldown_channel(expires_at))
                    .await?;
                self.notify_direct(author, &notifications::cooldown_direct(expires_at, &command))
                    .await;
                self.gateway
                    .timeout_member(
                        message.guild_id,
                        author,
                        timeout_until,
                        notifications::INVALID_ATTEMPT_REASON,
                    )
                    .await?;
            }

            GuardDecision::WrongCommand { timeout_until, lock } => {
                info!(member_id = %author, content = %message.content, "Wrong quiz command");
                self.gateway
                    .send_message(channel, notifications::WRONG_COMMAND)
                    .await?;
                self.gateway
                    .timeout_member(
                        message.guild_id,
                        author,
                        timeout_until,
                        notifications::WRONG_COMMAND_REASON,
                    )
                    .await?;

                if let Some(lock) = lock {
                    self.lock_channel(message.guild_id, channel, lock).await?;
                }
            }
        }

        Ok(())
    }

    /// Hide and mute a channel, restoring it after `duration`
    ///
    /// The restore runs detached; if the process stops first the channel
    /// stays locked.
    async fn lock_channel(
        &self,
        guild_id: Snowflake,
        channel_id: Snowflake,
        duration: std::time::Duration,
    ) -> Result<()> {
        self.gateway
            .set_default_permissions(guild_id, channel_id, PermissionOverwrite::LOCKED)
            .await?;
        info!(channel_id = %channel_id, secs = duration.as_secs(), "Channel locked");

        let gateway = self.gateway.clone();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            match gateway
                .set_default_permissions(guild_id, channel_id, PermissionOverwrite::RESTORED)
                .await
            {
                Ok(()) => info!(channel_id = %channel_id, "Channel restored"),
                Err(e) => error!(channel_id = %channel_id, "Failed to restore channel: {}", e),
            }
        });

        Ok(())
    }

    async fn process_report(&self, message: &ChatMessage, report_id: &str) -> Result<()> {
        let report = self.reports.fetch_report(report_id).await?;
        let observed = report.observed_configuration()?;

        let matched = match self.matcher.evaluate(&observed) {
            MatchOutcome::Matched(matched) => matched,
            MatchOutcome::Unranked => {
                debug!(
                    report_id = %report_id,
                    decks = %observed.decks.joined(),
                    "Unranked quiz report"
                );
                return Ok(());
            }
        };

        let member = match report.player() {
            Ok(member) => member,
            Err(ReportError::NoParticipants) => {
                warn!(report_id = %report_id, "Report without participants ignored");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let verdict = self
            .engine
            .judge_report(&matched, report.participant_count(), report.first_score());
        let now = time::now();

        self.ledger
            .record_attempt(&AttemptRecord::new(
                member,
                verdict.command(),
                now,
                verdict.outcome(),
            ))
            .await?;

        match verdict {
            ReportVerdict::Pass { rank, .. } => {
                info!(member_id = %member, rank = %rank, report_id = %report_id, "Quiz passed");
                self.pending
                    .record(
                        member,
                        PendingGrant {
                            passed: rank,
                            expected_role: rank,
                            recorded_at: now,
                        },
                    )
                    .await;
                self.gateway
                    .add_role(message.guild_id, member, rank.name())
                    .await?;
            }

            ReportVerdict::Fail {
                rank,
                command,
                failure,
            } => {
                info!(
                    member_id = %member,
                    rank = %rank,
                    report_id = %report_id,
                    failure = ?failure,
                    "Quiz failed"
                );
                self.gateway
                    .send_message(message.channel_id, &notifications::failure(&failure.reasons()))
                    .await?;

                let expires_at = self
                    .ledger
                    .cooldown_expiry(member, &command)
                    .await?
                    .unwrap_or_else(|| time::offset(now, self.ledger.cooldown()));
                self.gateway
                    .send_message(message.channel_id, &notifications::cooldown_channel(expires_at))
                    .await?;
                self.notify_direct(member, &notifications::cooldown_direct(expires_at, &command))
                    .await;
            }
        }

        Ok(())
    }

    async fn handle_member_update(&self, update: &MemberUpdate) -> Result<()> {
        let before = rank_set(&update.before_roles);
        let after = rank_set(&update.after_roles);
        let gained: RankSet = after.difference(&before).copied().collect();
        if gained.is_empty() {
            return Ok(());
        }

        if !self.has_rank_roles(update.guild_id).await? {
            return Ok(());
        }

        let member = update.member_id;
        let now = time::now();
        self.pending.prune(now).await;

        let pending = self.pending.take_matching(member, &gained, now).await;
        let last = self.ledger.last_attempt(member).await?;

        let outcome = self.engine.observe_role_change(
            &before,
            &after,
            last.as_ref(),
            pending.as_ref(),
            now,
        )?;

        match outcome {
            RoleChangeOutcome::NoChange => {
                debug!(member_id = %member, "No rank role gained");
            }

            RoleChangeOutcome::Untracked { gained } => {
                debug!(
                    member_id = %member,
                    rank = %gained,
                    "Rank role added without a recent pass"
                );
            }

            RoleChangeOutcome::Merge {
                passed,
                target,
                plan,
            } => {
                info!(member_id = %member, rank = %target, passed = %passed, "Double rank reached");
                self.pending
                    .record(
                        member,
                        PendingGrant {
                            passed,
                            expected_role: target,
                            recorded_at: now,
                        },
                    )
                    .await;
                self.apply_plan(update.guild_id, member, &plan).await?;
            }

            RoleChangeOutcome::Promoted {
                passed,
                gained,
                plan,
                announce,
            } => {
                info!(member_id = %member, rank = %gained, passed = %passed, "Rank role granted");
                self.ledger.record_role_grant(member, gained.name(), now).await?;
                self.notify_direct(member, &notifications::passed_direct(passed))
                    .await;
                self.apply_plan(update.guild_id, member, &plan).await?;

                if announce {
                    self.announce(
                        update.guild_id,
                        &notifications::announcement(member, passed, gained),
                    )
                    .await?;
                }
            }
        }

        Ok(())
    }

    async fn apply_plan(
        &self,
        guild_id: Snowflake,
        member: Snowflake,
        plan: &RolePlan,
    ) -> Result<()> {
        for rank in &plan.add {
            self.gateway.add_role(guild_id, member, rank.name()).await?;
        }

        if !plan.remove.is_empty() {
            let names: Vec<&str> = plan.remove.iter().map(|rank| rank.name()).collect();
            self.gateway.remove_roles(guild_id, member, &names).await?;
        }

        Ok(())
    }

    /// Post to the named announcement channel, else the configured id
    async fn announce(&self, guild_id: Snowflake, content: &str) -> Result<()> {
        let channel = match self
            .gateway
            .find_channel_by_name(guild_id, &self.announcement_channel_name)
            .await
        {
            Ok(Some(channel)) => channel,
            Ok(None) => self.announcement_channel_id,
            Err(e) => {
                warn!("Announcement channel lookup failed, using configured id: {}", e);
                self.announcement_channel_id
            }
        };

        self.gateway.send_message(channel, content).await?;
        Ok(())
    }

    /// Direct messages may be refused by the member; log and carry on
    async fn notify_direct(&self, member: Snowflake, content: &str) {
        if let Err(e) = self.gateway.send_direct(member, content).await {
            warn!(member_id = %member, "Direct message not delivered: {}", e);
        }
    }

    /// Guild carries a role for every rank
    async fn has_rank_roles(&self, guild_id: Snowflake) -> Result<bool> {
        let names = self.gateway.guild_role_names(guild_id).await?;
        let missing: Vec<&str> = RankId::ALL
            .iter()
            .map(|rank| rank.name())
            .filter(|name| !names.iter().any(|n| n == name))
            .collect();

        if missing.is_empty() {
            Ok(true)
        } else {
            warn!(
                guild_id = %guild_id,
                missing = ?missing,
                "Guild is missing rank roles; event ignored"
            );
            Ok(false)
        }
    }
}

/// Handle bus events serially until the bus closes
pub async fn run_dispatcher(pipeline: Arc<QuizPipeline>, mut rx: broadcast::Receiver<ChatEvent>) {
    info!("Event dispatcher started");

    loop {
        match rx.recv().await {
            Ok(event) => {
                if let Err(e) = pipeline.handle(&event).await {
                    match e {
                        Error::UnknownRank(_) => {
                            error!(event = event.kind(), "Rank not in catalog: {}", e)
                        }
                        _ => warn!(event = event.kind(), "Event handling failed: {}", e),
                    }
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Dispatcher lagged behind; events dropped");
            }
            Err(RecvError::Closed) => {
                info!("Event bus closed, dispatcher stopping");
                break;
            }
        }
    }
}
