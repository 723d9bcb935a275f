//! gk-bot library - quiz report rank gatekeeper
//!
//! Watches quiz reports posted by the quiz bot, checks them against the
//! rank catalog and moves members up the rank ladder.

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod pipeline;
pub mod rank;
pub mod services;

pub use api::{build_router, AppState};
pub use config::BotSettings;
pub use error::{Error, Result};
pub use pipeline::{run_dispatcher, QuizPipeline};
