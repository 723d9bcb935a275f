//! Double-rank merge rules
//!
//! Holding both roles of a trigger pair collapses them into a higher rank.
//! Rules are checked in priority order and at most one fires per event.

use std::collections::BTreeSet;

use super::ids::{RankId, RankSet, RankTier};

/// Target rank plus the pairs of prerequisite ranks that imply it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoubleRankRule {
    pub target: RankId,
    triggers: Vec<BTreeSet<RankId>>,
}

impl DoubleRankRule {
    pub fn new(target: RankId, triggers: &[[RankId; 2]]) -> Self {
        Self {
            target,
            triggers: triggers
                .iter()
                .map(|pair| pair.iter().copied().collect())
                .collect(),
        }
    }

    /// First trigger set fully contained in `held`
    pub fn first_match(&self, held: &RankSet) -> Option<&BTreeSet<RankId>> {
        self.triggers.iter().find(|trigger| trigger.is_subset(held))
    }
}

/// Merge decided for one member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankMerge {
    /// Rank to add
    pub target: RankId,
    /// Trigger set that fired
    pub trigger: BTreeSet<RankId>,
    /// Held roles to remove, canonical order
    pub remove: Vec<RankId>,
}

/// Ordered rule list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoubleRankRules {
    rules: Vec<DoubleRankRule>,
}

impl DoubleRankRules {
    pub fn new(rules: Vec<DoubleRankRule>) -> Self {
        Self { rules }
    }

    /// The community's standard merge rules
    pub fn standard() -> Self {
        Self::new(vec![
            DoubleRankRule::new(
                RankId::EternalIdol,
                &[
                    [RankId::EternalVocab, RankId::Gn1],
                    [RankId::DivineIdol, RankId::EternalVocab],
                ],
            ),
            DoubleRankRule::new(
                RankId::DivineIdol,
                &[
                    [RankId::DivineVocab, RankId::Gn1],
                    [RankId::EternalIdol, RankId::DivineVocab],
                ],
            ),
            DoubleRankRule::new(RankId::PrimaIdol, &[[RankId::PrimaVocab, RankId::Gn2]]),
        ])
    }

    pub fn iter(&self) -> impl Iterator<Item = &DoubleRankRule> {
        self.rules.iter()
    }

    /// Rule producing `target`, if any
    pub fn rule_for(&self, target: RankId) -> Option<&DoubleRankRule> {
        self.rules.iter().find(|rule| rule.target == target)
    }

    /// `target` is reachable from passing `passed` through a trigger set
    pub fn is_reachable(&self, target: RankId, passed: RankId) -> bool {
        self.rule_for(target)
            .map(|rule| rule.triggers.iter().any(|t| t.contains(&passed)))
            .unwrap_or(false)
    }

    /// Decide the merge for a member holding `held`
    ///
    /// Targets already held are skipped. The first target with a satisfied
    /// trigger set wins: its trigger roles and every vocab marker held are
    /// removed (terminal markers excepted) and the target is added.
    pub fn resolve(&self, held: &RankSet) -> Option<RankMerge> {
        self.rules
            .iter()
            .filter(|rule| !held.contains(&rule.target))
            .find_map(|rule| {
                let trigger = rule.first_match(held)?;

                let remove = held
                    .iter()
                    .copied()
                    .filter(|rank| trigger.contains(rank) || rank.tier() == RankTier::VocabMarker)
                    .filter(|rank| !rank.is_terminal())
                    .collect();

                Some(RankMerge {
                    target: rule.target,
                    trigger: trigger.clone(),
                    remove,
                })
            })
    }

    /// Role set after applying `resolve` once (unchanged if nothing fires)
    pub fn apply(&self, held: &RankSet) -> RankSet {
        match self.resolve(held) {
            Some(merge) => {
                let mut next: RankSet = held
                    .iter()
                    .copied()
                    .filter(|rank| !merge.remove.contains(rank))
                    .collect();
                next.insert(merge.target);
                next
            }
            None => held.clone(),
        }
    }
}
