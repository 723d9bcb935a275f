//! Quiz report client
//!
//! Fetches finished-game reports from the quiz bot's web service and turns
//! their settings into a [`QuizConfiguration`] the matcher understands.

use async_trait::async_trait;
use gk_common::events::Snowflake;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::rank::{DeckRange, DeckSet, QuizConfiguration};

const USER_AGENT: &str = concat!("gatekeeper/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Marker text of the embed field carrying the report link
pub const REPORT_FIELD_MARKER: &str = "View a report";

static REPORT_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"game_reports/([^)]*)\)").expect("report link pattern is valid")
});

/// Report client errors
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Report not found: {0}")]
    NotFound(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Report is missing field: {0}")]
    MissingField(&'static str),

    #[error("Report has no participants")]
    NoParticipants,
}

/// Deck entry of a report
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDeck {
    pub short_name: String,
    pub start_index: Option<u32>,
    pub end_index: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerSettings {
    pub shuffle: Option<bool>,
}

/// Game settings of a report
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSettings {
    pub font: Option<String>,
    pub font_size: u32,
    pub font_color: Option<String>,
    pub background_color: Option<String>,
    pub effect: Option<String>,
    pub answer_time_limit_in_ms: u64,
    pub additional_answer_wait_time_in_ms: u64,
    pub score_limit: u32,
    pub max_missed_questions: u32,
    pub shuffle: Option<bool>,
    pub server_settings: Option<ServerSettings>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscordUser {
    pub id: Snowflake,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub discord_user: DiscordUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Score {
    pub score: u32,
}

/// Finished quiz game as reported by the quiz service
#[derive(Debug, Clone, Deserialize)]
pub struct GameReport {
    pub decks: Vec<ReportDeck>,
    pub settings: ReportSettings,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub scores: Vec<Score>,
}

impl GameReport {
    /// Member who played the game (first participant)
    pub fn player(&self) -> Result<Snowflake, ReportError> {
        self.participants
            .first()
            .map(|p| p.discord_user.id)
            .ok_or(ReportError::NoParticipants)
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Score of the first participant; zero when no score was recorded
    pub fn first_score(&self) -> u32 {
        self.scores.first().map(|s| s.score).unwrap_or(0)
    }

    /// Settings the game was played with
    ///
    /// The deck range is taken from the first deck that has both indices.
    /// Shuffle falls back to the server-level setting.
    pub fn observed_configuration(&self) -> Result<QuizConfiguration, ReportError> {
        let decks = DeckSet::new(self.decks.iter().map(|d| d.short_name.clone()))
            .ok_or(ReportError::MissingField("decks"))?;

        let deck_range = self.decks.iter().find_map(|d| match (d.start_index, d.end_index) {
            (Some(start), Some(end)) => Some(DeckRange { start, end }),
            _ => None,
        });

        let settings = &self.settings;
        let shuffle = settings
            .shuffle
            .or_else(|| settings.server_settings.as_ref().and_then(|s| s.shuffle))
            .ok_or(ReportError::MissingField("shuffle"))?;

        Ok(QuizConfiguration {
            font: settings.font.clone(),
            font_size: settings.font_size,
            foreground: settings.font_color.clone(),
            background: settings.background_color.clone(),
            effect: settings.effect.clone(),
            time_limit_ms: settings.answer_time_limit_in_ms,
            bonus_time_ms: settings.additional_answer_wait_time_in_ms,
            decks,
            deck_range,
            score_limit: settings.score_limit,
            max_missed: settings.max_missed_questions,
            shuffle,
        })
    }
}

/// Report id from an embed field value such as
/// `[View a report](https://kotobaweb.com/dashboard/game_reports/abc123)`
pub fn report_id_from_field(value: &str) -> Option<&str> {
    if !value.contains(REPORT_FIELD_MARKER) {
        return None;
    }
    REPORT_LINK
        .captures(value)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|id| !id.is_empty())
}

/// Source of game reports
#[async_trait]
pub trait ReportSource: Send + Sync {
    async fn fetch_report(&self, report_id: &str) -> Result<GameReport, ReportError>;
}

/// HTTP client for the quiz service's report API
pub struct KotobaReportClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl KotobaReportClient {
    pub fn new(base_url: &str) -> Result<Self, ReportError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ReportError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn report_url(&self, report_id: &str) -> String {
        format!("{}/api/game_reports/{}", self.base_url, report_id)
    }
}

#[async_trait]
impl ReportSource for KotobaReportClient {
    async fn fetch_report(&self, report_id: &str) -> Result<GameReport, ReportError> {
        let url = self.report_url(report_id);

        tracing::debug!(report_id = %report_id, url = %url, "Fetching game report");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| ReportError::Network(e.to_string()))?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ReportError::NotFound(report_id.to_string()));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ReportError::Api(status.as_u16(), error_text));
        }

        let report: GameReport = response
            .json()
            .await
            .map_err(|e| ReportError::Parse(e.to_string()))?;

        tracing::debug!(
            report_id = %report_id,
            decks = report.decks.len(),
            participants = report.participants.len(),
            "Retrieved game report"
        );

        Ok(report)
    }
}
