//! Outbound chat operations
//!
//! The pipeline talks to the chat platform only through [`ChatGateway`].
//! Roles are addressed by name; implementations resolve names to ids.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gk_common::events::Snowflake;
use thiserror::Error;

pub mod rest;

pub use rest::RestGateway;

/// Gateway errors
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Unknown role: {0}")]
    UnknownRole(String),
}

/// Permission bits used on channel overwrites
pub mod permissions {
    pub const VIEW_CHANNEL: u64 = 1 << 10;
    pub const SEND_MESSAGES: u64 = 1 << 11;
    pub const READ_MESSAGE_HISTORY: u64 = 1 << 16;
}

/// Channel overwrite for the guild's default role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionOverwrite {
    pub allow: u64,
    pub deny: u64,
}

impl PermissionOverwrite {
    /// Channel hidden and muted
    pub const LOCKED: Self = Self {
        allow: 0,
        deny: permissions::VIEW_CHANNEL | permissions::SEND_MESSAGES,
    };

    /// Channel visible and open, history hidden from newcomers
    pub const RESTORED: Self = Self {
        allow: permissions::VIEW_CHANNEL | permissions::SEND_MESSAGES,
        deny: permissions::READ_MESSAGE_HISTORY,
    };
}

#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn send_message(&self, channel_id: Snowflake, content: &str) -> Result<(), GatewayError>;

    /// Direct message to a user
    async fn send_direct(&self, user_id: Snowflake, content: &str) -> Result<(), GatewayError>;

    /// Names of every role in the guild
    async fn guild_role_names(&self, guild_id: Snowflake) -> Result<Vec<String>, GatewayError>;

    async fn add_role(
        &self,
        guild_id: Snowflake,
        member_id: Snowflake,
        role_name: &str,
    ) -> Result<(), GatewayError>;

    async fn remove_roles(
        &self,
        guild_id: Snowflake,
        member_id: Snowflake,
        role_names: &[&str],
    ) -> Result<(), GatewayError>;

    /// Mute a member until `until`
    async fn timeout_member(
        &self,
        guild_id: Snowflake,
        member_id: Snowflake,
        until: DateTime<Utc>,
        reason: &str,
    ) -> Result<(), GatewayError>;

    /// Set the default role's overwrite on a channel
    async fn set_default_permissions(
        &self,
        guild_id: Snowflake,
        channel_id: Snowflake,
        overwrite: PermissionOverwrite,
    ) -> Result<(), GatewayError>;

    async fn find_channel_by_name(
        &self,
        guild_id: Snowflake,
        name: &str,
    ) -> Result<Option<Snowflake>, GatewayError>;
}
