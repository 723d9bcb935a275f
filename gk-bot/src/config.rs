//! Bot settings resolution
//!
//! Identifiers come from the environment first, then the `[bot]` table of
//! the TOML config. Tunables come from the TOML table or compiled defaults.

use gk_common::config::{env_value, TomlConfig};
use gk_common::events::Snowflake;
use gk_common::time::secs_to_duration;
use serde::Deserialize;
use std::fmt;

use crate::error::{Error, Result};
use crate::rank::catalog::DEFAULT_COMMAND_PREFIX;
use crate::services::GuardSettings;

pub const ENV_QUIZ_BOT_ID: &str = "KOTOBA_ID";
pub const ENV_ANNOUNCEMENT_CHANNEL_ID: &str = "ANNOUNCEMENT_CHANNEL_ID";
pub const ENV_TOKEN: &str = "TOKEN";

const DEFAULT_ANNOUNCEMENT_CHANNEL_NAME: &str = "一般";
const DEFAULT_REPORT_BASE_URL: &str = "https://kotobaweb.com";
const DEFAULT_API_BASE_URL: &str = "https://discord.com/api/v10";
const DEFAULT_COOLDOWN_SECS: u64 = 6 * 60 * 60;
const DEFAULT_GRANT_WINDOW_SECS: u64 = 120;
const DEFAULT_INVALID_ATTEMPT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_WRONG_COMMAND_TIMEOUT_SECS: u64 = 300;
const DEFAULT_CHANNEL_LOCK_SECS: u64 = 300;

/// `[bot]` table as written in the TOML file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BotToml {
    pub quiz_bot_id: Option<Snowflake>,
    pub announcement_channel_id: Option<Snowflake>,
    pub announcement_channel_name: Option<String>,
    pub token: Option<String>,
    pub report_base_url: Option<String>,
    pub api_base_url: Option<String>,
    pub command_prefix: Option<String>,
    pub cooldown_secs: Option<u64>,
    pub grant_window_secs: Option<u64>,
    pub invalid_attempt_timeout_secs: Option<u64>,
    pub wrong_command_timeout_secs: Option<u64>,
    pub channel_lock_secs: Option<u64>,
    pub lock_channel_on_wrong_command: Option<bool>,
}

impl BotToml {
    pub fn from_config(config: &TomlConfig) -> Result<Self> {
        toml::Value::Table(config.bot.clone())
            .try_into()
            .map_err(|e| Error::Config(format!("Invalid [bot] table: {}", e)))
    }
}

/// Fully resolved bot settings
#[derive(Clone)]
pub struct BotSettings {
    pub quiz_bot_id: Snowflake,
    pub announcement_channel_id: Snowflake,
    pub announcement_channel_name: String,
    pub token: String,
    pub report_base_url: String,
    pub api_base_url: String,
    pub command_prefix: String,
    pub cooldown_secs: u64,
    pub grant_window_secs: u64,
    pub invalid_attempt_timeout_secs: u64,
    pub wrong_command_timeout_secs: u64,
    pub channel_lock_secs: u64,
    pub lock_channel_on_wrong_command: bool,
}

impl fmt::Debug for BotSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotSettings")
            .field("quiz_bot_id", &self.quiz_bot_id)
            .field("announcement_channel_id", &self.announcement_channel_id)
            .field("announcement_channel_name", &self.announcement_channel_name)
            .field("token", &"<redacted>")
            .field("report_base_url", &self.report_base_url)
            .field("api_base_url", &self.api_base_url)
            .field("command_prefix", &self.command_prefix)
            .field("cooldown_secs", &self.cooldown_secs)
            .field("grant_window_secs", &self.grant_window_secs)
            .field("invalid_attempt_timeout_secs", &self.invalid_attempt_timeout_secs)
            .field("wrong_command_timeout_secs", &self.wrong_command_timeout_secs)
            .field("channel_lock_secs", &self.channel_lock_secs)
            .field("lock_channel_on_wrong_command", &self.lock_channel_on_wrong_command)
            .finish()
    }
}

impl BotSettings {
    /// Resolve from the process environment and the TOML config
    pub fn resolve(config: &TomlConfig) -> Result<Self> {
        Self::resolve_with(config, env_value)
    }

    /// Resolve with an explicit environment lookup
    ///
    /// Every missing identifier is reported in a single error.
    pub fn resolve_with<F>(config: &TomlConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot = BotToml::from_config(config)?;
        let mut missing = Vec::new();

        let quiz_bot_id = id_setting(&env, ENV_QUIZ_BOT_ID, bot.quiz_bot_id, &mut missing)?;
        let announcement_channel_id = id_setting(
            &env,
            ENV_ANNOUNCEMENT_CHANNEL_ID,
            bot.announcement_channel_id,
            &mut missing,
        )?;

        let token = env(ENV_TOKEN).or(bot.token);
        if token.is_none() {
            missing.push(ENV_TOKEN);
        }

        let (quiz_bot_id, announcement_channel_id, token) =
            match (quiz_bot_id, announcement_channel_id, token) {
                (Some(quiz_bot_id), Some(channel_id), Some(token)) => {
                    (quiz_bot_id, channel_id, token)
                }
                _ => {
                    return Err(Error::Config(format!(
                        "Missing required settings: {}",
                        missing.join(", ")
                    )))
                }
            };

        Ok(Self {
            quiz_bot_id,
            announcement_channel_id,
            announcement_channel_name: bot
                .announcement_channel_name
                .unwrap_or_else(|| DEFAULT_ANNOUNCEMENT_CHANNEL_NAME.to_string()),
            token,
            report_base_url: bot
                .report_base_url
                .unwrap_or_else(|| DEFAULT_REPORT_BASE_URL.to_string()),
            api_base_url: bot
                .api_base_url
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            command_prefix: bot
                .command_prefix
                .unwrap_or_else(|| DEFAULT_COMMAND_PREFIX.to_string()),
            cooldown_secs: bot.cooldown_secs.unwrap_or(DEFAULT_COOLDOWN_SECS),
            grant_window_secs: bot.grant_window_secs.unwrap_or(DEFAULT_GRANT_WINDOW_SECS),
            invalid_attempt_timeout_secs: bot
                .invalid_attempt_timeout_secs
                .unwrap_or(DEFAULT_INVALID_ATTEMPT_TIMEOUT_SECS),
            wrong_command_timeout_secs: bot
                .wrong_command_timeout_secs
                .unwrap_or(DEFAULT_WRONG_COMMAND_TIMEOUT_SECS),
            channel_lock_secs: bot.channel_lock_secs.unwrap_or(DEFAULT_CHANNEL_LOCK_SECS),
            lock_channel_on_wrong_command: bot.lock_channel_on_wrong_command.unwrap_or(true),
        })
    }

    pub fn cooldown(&self) -> chrono::Duration {
        secs_to_duration(self.cooldown_secs)
    }

    pub fn grant_window(&self) -> chrono::Duration {
        secs_to_duration(self.grant_window_secs)
    }

    pub fn guard_settings(&self) -> GuardSettings {
        GuardSettings {
            invalid_attempt_timeout: secs_to_duration(self.invalid_attempt_timeout_secs),
            wrong_command_timeout: secs_to_duration(self.wrong_command_timeout_secs),
            channel_lock: self
                .lock_channel_on_wrong_command
                .then(|| std::time::Duration::from_secs(self.channel_lock_secs)),
        }
    }
}

/// Identifier from env (preferred) or TOML; unparsable env values are errors
fn id_setting<F>(
    env: &F,
    name: &'static str,
    toml_value: Option<Snowflake>,
    missing: &mut Vec<&'static str>,
) -> Result<Option<Snowflake>>
where
    F: Fn(&str) -> Option<String>,
{
    let value = match env(name) {
        Some(raw) => Some(
            raw.parse::<u64>()
                .map(Snowflake)
                .map_err(|e| {
                    Error::Config(format!("{} is not a valid id ({}): {}", name, raw, e))
                })?,
        ),
        None => toml_value,
    };

    if value.is_none() {
        missing.push(name);
    }
    Ok(value)
}
