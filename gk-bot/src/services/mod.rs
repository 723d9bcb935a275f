//! Decision services for quiz reports and rank roles

pub mod attempt_guard;
pub mod configuration_matcher;
pub mod notifications;
pub mod pending_grants;
pub mod rank_transition;
pub mod report_client;

pub use attempt_guard::{AttemptGuard, GuardDecision, GuardSettings, MessageClass};
pub use configuration_matcher::{ConfigurationMatcher, MatchOutcome, MatchResult, Mismatch};
pub use pending_grants::{PendingGrant, PendingGrants};
pub use rank_transition::{
    RankTransitionEngine, ReportFailure, ReportVerdict, RoleChangeOutcome, RolePlan,
};
pub use report_client::{GameReport, KotobaReportClient, ReportError, ReportSource};
