//! Pipeline test fixtures
//!
//! Recording fakes for the chat gateway and the report service, plus
//! builders for settings, events and reports.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gk_bot::config::BotSettings;
use gk_bot::gateway::{ChatGateway, GatewayError, PermissionOverwrite};
use gk_bot::ledger::SqliteLedger;
use gk_bot::rank::{QuizConfiguration, RankId};
use gk_bot::services::{GameReport, ReportError, ReportSource};
use gk_bot::QuizPipeline;
use gk_common::db::init_memory_database;
use gk_common::events::{ChatEvent, ChatMessage, Embed, EmbedField, MemberUpdate, Snowflake};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const GUILD: Snowflake = Snowflake(1);
pub const QUIZ_CHANNEL: Snowflake = Snowflake(10);
pub const ANNOUNCEMENT_CHANNEL: Snowflake = Snowflake(20);
pub const NAMED_ANNOUNCEMENT_CHANNEL: Snowflake = Snowflake(21);
pub const QUIZ_BOT: Snowflake = Snowflake(251_239_170_058_616_833);
pub const MEMBER: Snowflake = Snowflake(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Message(Snowflake, String),
    Direct(Snowflake, String),
    AddRole(Snowflake, String),
    RemoveRoles(Snowflake, Vec<String>),
    Timeout(Snowflake, DateTime<Utc>, String),
    Permissions(Snowflake, PermissionOverwrite),
}

/// Gateway that records every outbound operation
pub struct RecordingGateway {
    role_names: Vec<String>,
    channels: HashMap<String, Snowflake>,
    refuse_direct: bool,
    calls: Mutex<Vec<Call>>,
}

impl RecordingGateway {
    /// Guild with every rank role and a named announcement channel
    pub fn new() -> Self {
        Self::with_roles(RankId::ALL.iter().map(|r| r.name().to_string()).collect())
    }

    pub fn with_roles(role_names: Vec<String>) -> Self {
        Self {
            role_names,
            channels: HashMap::from([("一般".to_string(), NAMED_ANNOUNCEMENT_CHANNEL)]),
            refuse_direct: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn without_named_channel(mut self) -> Self {
        self.channels.clear();
        self
    }

    /// Members have direct messages closed; every DM fails
    pub fn refusing_direct_messages(mut self) -> Self {
        self.refuse_direct = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ChatGateway for RecordingGateway {
    async fn send_message(
        &self,
        channel_id: Snowflake,
        content: &str,
    ) -> Result<(), GatewayError> {
        self.push(Call::Message(channel_id, content.to_string()));
        Ok(())
    }

    async fn send_direct(&self, user_id: Snowflake, content: &str) -> Result<(), GatewayError> {
        if self.refuse_direct {
            return Err(GatewayError::Api(
                403,
                "Cannot send messages to this user".to_string(),
            ));
        }
        self.push(Call::Direct(user_id, content.to_string()));
        Ok(())
    }

    async fn guild_role_names(&self, _guild_id: Snowflake) -> Result<Vec<String>, GatewayError> {
        Ok(self.role_names.clone())
    }

    async fn add_role(
        &self,
        _guild_id: Snowflake,
        member_id: Snowflake,
        role_name: &str,
    ) -> Result<(), GatewayError> {
        self.push(Call::AddRole(member_id, role_name.to_string()));
        Ok(())
    }

    async fn remove_roles(
        &self,
        _guild_id: Snowflake,
        member_id: Snowflake,
        role_names: &[&str],
    ) -> Result<(), GatewayError> {
        self.push(Call::RemoveRoles(
            member_id,
            role_names.iter().map(|n| n.to_string()).collect(),
        ));
        Ok(())
    }

    async fn timeout_member(
        &self,
        _guild_id: Snowflake,
        member_id: Snowflake,
        until: DateTime<Utc>,
        reason: &str,
    ) -> Result<(), GatewayError> {
        self.push(Call::Timeout(member_id, until, reason.to_string()));
        Ok(())
    }

    async fn set_default_permissions(
        &self,
        _guild_id: Snowflake,
        channel_id: Snowflake,
        overwrite: PermissionOverwrite,
    ) -> Result<(), GatewayError> {
        self.push(Call::Permissions(channel_id, overwrite));
        Ok(())
    }

    async fn find_channel_by_name(
        &self,
        _guild_id: Snowflake,
        name: &str,
    ) -> Result<Option<Snowflake>, GatewayError> {
        Ok(self.channels.get(name).copied())
    }
}

/// Report service backed by a map of prepared reports
#[derive(Default)]
pub struct StaticReports {
    reports: Mutex<HashMap<String, GameReport>>,
    fetched: Mutex<Vec<String>>,
}

impl StaticReports {
    pub fn insert(&self, id: &str, report: GameReport) {
        self.reports.lock().unwrap().insert(id.to_string(), report);
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReportSource for StaticReports {
    async fn fetch_report(&self, report_id: &str) -> Result<GameReport, ReportError> {
        self.fetched.lock().unwrap().push(report_id.to_string());
        self.reports
            .lock()
            .unwrap()
            .get(report_id)
            .cloned()
            .ok_or_else(|| ReportError::NotFound(report_id.to_string()))
    }
}

pub fn settings() -> BotSettings {
    BotSettings {
        quiz_bot_id: QUIZ_BOT,
        announcement_channel_id: ANNOUNCEMENT_CHANNEL,
        announcement_channel_name: "一般".to_string(),
        token: "test-token".to_string(),
        report_base_url: "http://127.0.0.1:9".to_string(),
        api_base_url: "http://127.0.0.1:9".to_string(),
        command_prefix: "k!".to_string(),
        cooldown_secs: 6 * 60 * 60,
        grant_window_secs: 120,
        invalid_attempt_timeout_secs: 120,
        wrong_command_timeout_secs: 300,
        channel_lock_secs: 0,
        lock_channel_on_wrong_command: true,
    }
}

pub struct Harness {
    pub pipeline: QuizPipeline,
    pub ledger: Arc<SqliteLedger>,
    pub gateway: Arc<RecordingGateway>,
    pub reports: Arc<StaticReports>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_gateway(RecordingGateway::new()).await
    }

    pub async fn with_gateway(gateway: RecordingGateway) -> Self {
        let settings = settings();
        let pool = init_memory_database().await.unwrap();
        let ledger = Arc::new(SqliteLedger::new(pool, settings.cooldown()));
        let gateway = Arc::new(gateway);
        let reports = Arc::new(StaticReports::default());

        let pipeline =
            QuizPipeline::new(&settings, ledger.clone(), gateway.clone(), reports.clone());

        Self {
            pipeline,
            ledger,
            gateway,
            reports,
        }
    }

    pub async fn send(&self, event: ChatEvent) {
        self.pipeline.handle(&event).await.unwrap();
    }

    /// Start command of a rank under the standard catalog
    pub fn command(&self, rank: RankId) -> String {
        self.pipeline.catalog().lookup(rank).unwrap().command.clone()
    }

    pub fn configuration(&self, rank: RankId) -> QuizConfiguration {
        self.pipeline.catalog().lookup(rank).unwrap().configuration.clone()
    }
}

pub fn user_message(author: Snowflake, content: &str) -> ChatEvent {
    ChatEvent::MessageCreated(ChatMessage {
        guild_id: GUILD,
        channel_id: QUIZ_CHANNEL,
        author_id: author,
        content: content.to_string(),
        embeds: vec![],
    })
}

/// End-of-game message from the quiz bot linking a report
pub fn report_message(author: Snowflake, report_id: &str) -> ChatEvent {
    ChatEvent::MessageCreated(ChatMessage {
        guild_id: GUILD,
        channel_id: QUIZ_CHANNEL,
        author_id: author,
        content: String::new(),
        embeds: vec![Embed {
            fields: vec![
                EmbedField {
                    name: "Scorers".to_string(),
                    value: "someone 25".to_string(),
                },
                EmbedField {
                    name: "Game Report".to_string(),
                    value: format!(
                        "[View a report for this game](https://kotobaweb.com/dashboard/game_reports/{})",
                        report_id
                    ),
                },
            ],
        }],
    })
}

pub fn role_update(member: Snowflake, before: &[&str], after: &[&str]) -> ChatEvent {
    ChatEvent::MemberUpdated(MemberUpdate {
        guild_id: GUILD,
        member_id: member,
        before_roles: before.iter().map(|r| r.to_string()).collect(),
        after_roles: after.iter().map(|r| r.to_string()).collect(),
    })
}

/// Report as the quiz service would return it for a game played with `config`
pub fn report_for(config: &QuizConfiguration, players: &[Snowflake], score: u32) -> GameReport {
    let decks: Vec<serde_json::Value> = config
        .decks
        .iter()
        .enumerate()
        .map(|(i, deck)| match (i, config.deck_range) {
            (0, Some(range)) => json!({
                "shortName": deck,
                "startIndex": range.start,
                "endIndex": range.end,
            }),
            _ => json!({ "shortName": deck }),
        })
        .collect();

    let mut settings = json!({
        "font": config.font,
        "fontSize": config.font_size,
        "fontColor": config.foreground,
        "answerTimeLimitInMs": config.time_limit_ms,
        "additionalAnswerWaitTimeInMs": config.bonus_time_ms,
        "scoreLimit": config.score_limit,
        "maxMissedQuestions": config.max_missed,
        "serverSettings": { "shuffle": config.shuffle },
    });
    if let Some(effect) = &config.effect {
        settings["effect"] = json!(effect);
    }

    let participants: Vec<serde_json::Value> = players
        .iter()
        .map(|id| json!({ "discordUser": { "id": id.to_string() } }))
        .collect();
    let scores: Vec<serde_json::Value> = players
        .iter()
        .map(|id| json!({ "user": id.to_string(), "score": score }))
        .collect();

    serde_json::from_value(json!({
        "decks": decks,
        "settings": settings,
        "participants": participants,
        "scores": scores,
    }))
    .unwrap()
}
