//! Configuration matcher
//!
//! Matches the settings observed in a quiz report against the catalog:
//! filter by exact deck set, score every candidate, pick the best.

use std::fmt;
use std::sync::Arc;

use crate::rank::{QuizConfiguration, RankCatalog, RankDefinition, RankId};

/// One reason an observed configuration falls short of a rank's expectation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mismatch {
    /// Colours, effect, deck set or shuffle differ from what the rank requires
    SettingsDiffer,
    DeckRangesDiffer,
    AnswerTimeTooLong,
    FontSizeTooBig,
    ScoreLimitTooLow,
    FontMismatch,
}

impl Mismatch {
    /// User-facing reason line
    pub fn message(self) -> &'static str {
        match self {
            Mismatch::SettingsDiffer => "Quiz settings are different",
            Mismatch::DeckRangesDiffer => "Deck ranges are different",
            Mismatch::AnswerTimeTooLong => "Answer time too long.",
            Mismatch::FontSizeTooBig => "Font size too big.",
            Mismatch::ScoreLimitTooLow => "Score limit too low.",
            Mismatch::FontMismatch => "Font doesn't match.",
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Compare an observed configuration against a rank's expectation
///
/// Every rule is evaluated independently and contributes at most one line,
/// in a fixed order. An empty list means the observed quiz is at least as
/// strict as the expectation.
pub fn similarity(expected: &QuizConfiguration, observed: &QuizConfiguration) -> Vec<Mismatch> {
    let mut mismatches = Vec::new();

    let differs = |want: &Option<String>, got: &Option<String>| want.is_some() && want != got;

    if differs(&expected.foreground, &observed.foreground)
        || differs(&expected.background, &observed.background)
        || differs(&expected.effect, &observed.effect)
        || expected.decks != observed.decks
        || expected.shuffle != observed.shuffle
    {
        mismatches.push(Mismatch::SettingsDiffer);
    }

    // No range expected means the whole deck must be used
    if expected.deck_range != observed.deck_range {
        mismatches.push(Mismatch::DeckRangesDiffer);
    }

    if observed.time_limit_ms > expected.time_limit_ms
        || observed.bonus_time_ms > expected.bonus_time_ms
    {
        mismatches.push(Mismatch::AnswerTimeTooLong);
    }

    if observed.font_size > expected.font_size {
        mismatches.push(Mismatch::FontSizeTooBig);
    }

    if observed.score_limit < expected.score_limit {
        mismatches.push(Mismatch::ScoreLimitTooLow);
    }

    if differs(&expected.font, &observed.font) {
        mismatches.push(Mismatch::FontMismatch);
    }

    mismatches
}

/// Best candidate for an observed configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub rank: RankId,
    pub command: String,
    pub score_limit: u32,
    pub mismatches: Vec<Mismatch>,
}

impl MatchResult {
    pub fn is_accepted(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Reason lines, one per mismatch
    pub fn reasons(&self) -> Vec<String> {
        self.mismatches.iter().map(|m| m.message().to_string()).collect()
    }
}

/// Result of matching a report against the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// No rank uses this deck set
    Unranked,
    Matched(MatchResult),
}

/// Catalog-backed matcher
#[derive(Debug, Clone)]
pub struct ConfigurationMatcher {
    catalog: Arc<RankCatalog>,
}

impl ConfigurationMatcher {
    pub fn new(catalog: Arc<RankCatalog>) -> Self {
        Self { catalog }
    }

    /// Ranks whose deck set equals the observed one
    pub fn candidates(&self, observed: &QuizConfiguration) -> Vec<&RankDefinition> {
        self.catalog.candidates_for(&observed.decks)
    }

    /// Select the best-matching rank for an observed configuration
    ///
    /// Fewest mismatches wins; among equal non-zero counts the first in
    /// catalog order wins. Zero-mismatch ties go to the highest score
    /// threshold, so a narrower lower rank never shadows the higher rank
    /// sharing its decks.
    pub fn evaluate(&self, observed: &QuizConfiguration) -> MatchOutcome {
        let scored: Vec<(&RankDefinition, Vec<Mismatch>)> = self
            .candidates(observed)
            .into_iter()
            .map(|definition| (definition, similarity(&definition.configuration, observed)))
            .collect();

        let fewest = match scored.iter().map(|(_, m)| m.len()).min() {
            Some(fewest) => fewest,
            None => return MatchOutcome::Unranked,
        };

        let mut tied = scored.into_iter().filter(|(_, m)| m.len() == fewest);

        let best = if fewest == 0 {
            tied.fold(None, |best: Option<(&RankDefinition, Vec<Mismatch>)>, candidate| match best {
                Some(current)
                    if current.0.configuration.score_limit
                        >= candidate.0.configuration.score_limit =>
                {
                    Some(current)
                }
                _ => Some(candidate),
            })
        } else {
            tied.next()
        };

        match best {
            Some((definition, mismatches)) => {
                tracing::debug!(
                    rank = %definition.id,
                    mismatches = mismatches.len(),
                    "Selected best matching rank"
                );
                MatchOutcome::Matched(MatchResult {
                    rank: definition.id,
                    command: definition.command.clone(),
                    score_limit: definition.configuration.score_limit,
                    mismatches,
                })
            }
            None => MatchOutcome::Unranked,
        }
    }
}
