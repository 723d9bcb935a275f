//! # Gatekeeper Common Library
//!
//! Shared code for the rank gatekeeper service:
//! - Error type and result alias
//! - Bootstrap configuration loading (TOML + environment)
//! - SQLite initialization for the attempt ledger
//! - Inbound chat event types and the event bus
//! - Timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
