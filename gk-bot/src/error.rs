//! Error types for gk-bot
//!
//! User-caused failures (bad quiz settings, wrong commands, cooldowns) are
//! outcomes, not errors. The variants here are infrastructure failures and
//! configuration-consistency bugs.

use thiserror::Error;

use crate::gateway::GatewayError;
use crate::services::report_client::ReportError;

/// Result type for gk-bot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for gk-bot
#[derive(Error, Debug)]
pub enum Error {
    /// Shared library error (config, database init)
    #[error("Common error: {0}")]
    Common(#[from] gk_common::Error),

    /// Ledger query or write failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Report could not be fetched or understood
    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    /// Outbound chat operation failed
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Rank name or command not present in the catalog
    ///
    /// A recorded pass whose command the catalog cannot resolve.
    #[error("Unknown rank: {0}")]
    UnknownRank(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Stored value could not be decoded
    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}
