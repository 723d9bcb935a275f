//! Rank identifiers and tiers

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Every rank in the ladder, in canonical order
///
/// `Ord` follows declaration order, so a `BTreeSet<RankId>` iterates in the
/// same order the guild role structure and announcements use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RankId {
    Student,
    Trainee,
    DebutIdol,
    MajorIdol,
    PrimaVocab,
    PrimaIdol,
    DivineVocab,
    DivineIdol,
    EternalVocab,
    EternalIdol,
    Gn1,
    Gn2,
}

/// Rank category, used for cleanup and announcement decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RankTier {
    /// Single-quiz ladder rank (Student .. Major Idol)
    Main,
    /// First half of a two-stage rank ("passed X vocab")
    VocabMarker,
    /// Granted only through a double-rank merge
    Combined,
    /// Grammar marker (GN1, GN2)
    Grammar,
}

/// Set of rank roles held by a member
pub type RankSet = BTreeSet<RankId>;

impl RankId {
    pub const ALL: [RankId; 12] = [
        RankId::Student,
        RankId::Trainee,
        RankId::DebutIdol,
        RankId::MajorIdol,
        RankId::PrimaVocab,
        RankId::PrimaIdol,
        RankId::DivineVocab,
        RankId::DivineIdol,
        RankId::EternalVocab,
        RankId::EternalIdol,
        RankId::Gn1,
        RankId::Gn2,
    ];

    /// Guild role name
    pub fn name(self) -> &'static str {
        match self {
            RankId::Student => "Student",
            RankId::Trainee => "Trainee",
            RankId::DebutIdol => "Debut Idol",
            RankId::MajorIdol => "Major Idol",
            RankId::PrimaVocab => "passed Prima vocab",
            RankId::PrimaIdol => "Prima Idol",
            RankId::DivineVocab => "passed Divine vocab",
            RankId::DivineIdol => "Divine Idol",
            RankId::EternalVocab => "passed Eternal vocab",
            RankId::EternalIdol => "Eternal Idol",
            RankId::Gn1 => "GN1",
            RankId::Gn2 => "GN2",
        }
    }

    pub fn tier(self) -> RankTier {
        match self {
            RankId::Student | RankId::Trainee | RankId::DebutIdol | RankId::MajorIdol => {
                RankTier::Main
            }
            RankId::PrimaVocab | RankId::DivineVocab | RankId::EternalVocab => {
                RankTier::VocabMarker
            }
            RankId::PrimaIdol | RankId::DivineIdol | RankId::EternalIdol => RankTier::Combined,
            RankId::Gn1 | RankId::Gn2 => RankTier::Grammar,
        }
    }

    /// Terminal markers survive merges and tier cleanup
    pub fn is_terminal(self) -> bool {
        self.tier() == RankTier::Grammar
    }

    /// Human label for the quiz that grants this rank
    ///
    /// "passed Eternal vocab" reads as "Eternal Idol vocab", grammar ranks
    /// as "GN1 grammar", everything else as "<name> vocab".
    pub fn quiz_label(self) -> String {
        match self.tier() {
            RankTier::VocabMarker => {
                let stage = self
                    .name()
                    .split(' ')
                    .nth(1)
                    .unwrap_or_else(|| self.name());
                format!("{} Idol vocab", stage)
            }
            RankTier::Grammar => format!("{} grammar", self.name()),
            RankTier::Main | RankTier::Combined => format!("{} vocab", self.name()),
        }
    }
}

impl fmt::Display for RankId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RankId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RankId::ALL
            .iter()
            .copied()
            .find(|rank| rank.name() == s)
            .ok_or_else(|| Error::UnknownRank(s.to_string()))
    }
}

/// Rank roles among a list of guild role names; other names are ignored
pub fn rank_set<S: AsRef<str>>(role_names: &[S]) -> RankSet {
    role_names
        .iter()
        .filter_map(|name| name.as_ref().parse::<RankId>().ok())
        .collect()
}
