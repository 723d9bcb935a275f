//! Rank ladder: identifiers, quiz configurations, catalog, double-rank rules

pub mod catalog;
pub mod double_rank;
pub mod ids;
pub mod quiz_config;

pub use catalog::{RankCatalog, RankDefinition};
pub use double_rank::{DoubleRankRule, DoubleRankRules, RankMerge};
pub use ids::{rank_set, RankId, RankSet, RankTier};
pub use quiz_config::{DeckRange, DeckSet, QuizConfiguration};
