//! Rank catalog
//!
//! Static table mapping each quiz-backed rank to its expected configuration
//! and start command. Built once at startup and shared read-only. The set of
//! valid commands and the deck-subset prefix table are derived lazily on
//! first use and cached for the life of the catalog.

use once_cell::sync::OnceCell;
use std::collections::{BTreeSet, HashSet};

use super::ids::RankId;
use super::quiz_config::{DeckRange, DeckSet, QuizConfiguration};
use crate::error::{Error, Result};

/// Default chat prefix of the quiz engine
pub const DEFAULT_COMMAND_PREFIX: &str = "k!";

/// Upper bound on distinct decks; the prefix table holds 2^n - 1 entries
pub const MAX_KNOWN_DECKS: usize = 16;

/// Rank paired with its expected configuration and start command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankDefinition {
    pub id: RankId,
    pub configuration: QuizConfiguration,
    pub command: String,
}

/// Catalog of quiz-backed ranks
#[derive(Debug)]
pub struct RankCatalog {
    prefix: String,
    definitions: Vec<RankDefinition>,
    valid_commands: OnceCell<HashSet<String>>,
    deck_prefixes: OnceCell<BTreeSet<String>>,
}

impl RankCatalog {
    /// Build a catalog from (rank, configuration) pairs
    ///
    /// Entries are stored in canonical rank order. Duplicate ranks,
    /// duplicate commands and more than [`MAX_KNOWN_DECKS`] distinct decks
    /// are rejected.
    pub fn new(prefix: &str, entries: Vec<(RankId, QuizConfiguration)>) -> Result<Self> {
        let mut definitions: Vec<RankDefinition> = entries
            .into_iter()
            .map(|(id, configuration)| RankDefinition {
                id,
                command: configuration.command(prefix),
                configuration,
            })
            .collect();
        definitions.sort_by_key(|d| d.id);

        let mut commands = HashSet::new();
        for pair in definitions.windows(2) {
            if pair[0].id == pair[1].id {
                return Err(Error::Config(format!("Duplicate catalog rank: {}", pair[0].id)));
            }
        }
        for definition in &definitions {
            if !commands.insert(definition.command.as_str()) {
                return Err(Error::Config(format!(
                    "Ranks share a start command: {}",
                    definition.command
                )));
            }
        }

        let decks: HashSet<&str> = definitions
            .iter()
            .flat_map(|d| d.configuration.decks.iter())
            .collect();
        if decks.len() > MAX_KNOWN_DECKS {
            return Err(Error::Config(format!(
                "Catalog uses {} distinct decks, at most {} supported",
                decks.len(),
                MAX_KNOWN_DECKS
            )));
        }

        Ok(Self::from_sorted(prefix, definitions))
    }

    /// The community's standard rank ladder
    pub fn standard(prefix: &str) -> Self {
        let mut definitions: Vec<RankDefinition> = standard_entries()
            .into_iter()
            .map(|(id, configuration)| RankDefinition {
                id,
                command: configuration.command(prefix),
                configuration,
            })
            .collect();
        definitions.sort_by_key(|d| d.id);

        Self::from_sorted(prefix, definitions)
    }

    fn from_sorted(prefix: &str, definitions: Vec<RankDefinition>) -> Self {
        Self {
            prefix: prefix.to_string(),
            definitions,
            valid_commands: OnceCell::new(),
            deck_prefixes: OnceCell::new(),
        }
    }

    /// Chat prefix used when deriving commands
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Quiz-engine invocation token, e.g. `k!quiz`
    pub fn quiz_invocation(&self) -> String {
        format!("{}quiz", self.prefix)
    }

    /// Look up a rank; combined ranks have no quiz and are absent
    pub fn lookup(&self, id: RankId) -> Result<&RankDefinition> {
        self.definitions
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| Error::UnknownRank(id.name().to_string()))
    }

    /// All definitions in canonical order
    pub fn all(&self) -> &[RankDefinition] {
        &self.definitions
    }

    /// Start command for a configuration under this catalog's prefix
    pub fn command_of(&self, configuration: &QuizConfiguration) -> String {
        configuration.command(&self.prefix)
    }

    /// Definition whose start command is exactly `command`
    pub fn by_command(&self, command: &str) -> Option<&RankDefinition> {
        self.definitions.iter().find(|d| d.command == command)
    }

    /// Definitions whose deck set equals `decks` (order ignored)
    pub fn candidates_for(&self, decks: &DeckSet) -> Vec<&RankDefinition> {
        self.definitions
            .iter()
            .filter(|d| &d.configuration.decks == decks)
            .collect()
    }

    /// Every syntactically valid start command
    pub fn valid_commands(&self) -> &HashSet<String> {
        self.valid_commands
            .get_or_init(|| self.definitions.iter().map(|d| d.command.clone()).collect())
    }

    /// Every known deck, first-seen order across the catalog
    pub fn known_decks(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.definitions
            .iter()
            .flat_map(|d| d.configuration.decks.iter())
            .filter(|deck| seen.insert(*deck))
            .collect()
    }

    /// `<invocation> <d1+d2+..>` for every non-empty subset of known decks
    ///
    /// Subsets keep the first-seen deck order. Any message starting with one
    /// of these is treated as a quiz start attempt.
    pub fn deck_prefixes(&self) -> &BTreeSet<String> {
        self.deck_prefixes.get_or_init(|| {
            let decks = self.known_decks();
            let invocation = self.quiz_invocation();
            let subset_count: u64 = (1u64 << decks.len()) - 1;

            (1..=subset_count)
                .map(|mask| {
                    let subset: Vec<&str> = decks
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| mask & (1 << i) != 0)
                        .map(|(_, deck)| *deck)
                        .collect();
                    format!("{} {}", invocation, subset.join("+"))
                })
                .collect()
        })
    }
}

fn vocab_rank(
    decks: &[&str],
    range: Option<(u32, u32)>,
    effect: Option<&str>,
    score: u32,
) -> QuizConfiguration {
    QuizConfiguration {
        font: Some("Eishiikaisho".to_string()),
        font_size: 100,
        foreground: Some("#f173ff".to_string()),
        background: None,
        effect: effect.map(str::to_string),
        time_limit_ms: 16_000,
        bonus_time_ms: 0,
        decks: deck_set(decks),
        deck_range: range.map(|(start, end)| DeckRange { start, end }),
        score_limit: score,
        max_missed: 10,
        shuffle: true,
    }
}

fn grammar_rank(deck: &str) -> QuizConfiguration {
    QuizConfiguration {
        font: Some("Eishiikaisho".to_string()),
        font_size: 200,
        foreground: None,
        background: None,
        effect: None,
        time_limit_ms: 16_000,
        bonus_time_ms: 0,
        decks: deck_set(&[deck]),
        deck_range: None,
        score_limit: 20,
        max_missed: 4,
        shuffle: true,
    }
}

fn deck_set(decks: &[&str]) -> DeckSet {
    DeckSet::declared(decks)
}

fn standard_entries() -> Vec<(RankId, QuizConfiguration)> {
    vec![
        (RankId::Student, vocab_rank(&["jpdb1k"], Some((1, 300)), None, 25)),
        (RankId::Trainee, vocab_rank(&["jpdb1k"], None, None, 50)),
        (RankId::DebutIdol, vocab_rank(&["jpdb2_5k", "jpdb5k"], None, Some("antiocr"), 50)),
        (RankId::MajorIdol, vocab_rank(&["jpdb5k", "jpdb10k"], None, Some("antiocr"), 50)),
        (RankId::PrimaVocab, vocab_rank(&["jpdb10k", "jpdb15k"], None, Some("antiocr"), 50)),
        (RankId::DivineVocab, vocab_rank(&["jpdb15k", "jpdb20k"], None, Some("antiocr"), 50)),
        (RankId::EternalVocab, vocab_rank(&["jpdb20k", "jpdb25k"], None, Some("antiocr"), 50)),
        (RankId::Gn2, grammar_rank("gn2")),
        (RankId::Gn1, grammar_rank("gn1")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> RankCatalog {
        RankCatalog::standard(DEFAULT_COMMAND_PREFIX)
    }

    #[test]
    fn test_standard_catalog_canonical_order() {
        let ids: Vec<RankId> = catalog().all().iter().map(|d| d.id).collect();
        assert_eq!(
            ids,
            vec![
                RankId::Student,
                RankId::Trainee,
                RankId::DebutIdol,
                RankId::MajorIdol,
                RankId::PrimaVocab,
                RankId::DivineVocab,
                RankId::EternalVocab,
                RankId::Gn1,
                RankId::Gn2,
            ]
        );
    }

    #[test]
    fn test_lookup_combined_rank_is_unknown() {
        let catalog = catalog();
        assert!(catalog.lookup(RankId::Trainee).is_ok());
        assert!(matches!(
            catalog.lookup(RankId::EternalIdol),
            Err(Error::UnknownRank(name)) if name == "Eternal Idol"
        ));
    }

    #[test]
    fn test_command_of_is_deterministic() {
        let catalog = catalog();
        for definition in catalog.all() {
            let first = catalog.command_of(&definition.configuration);
            let second = catalog.command_of(&definition.configuration);
            assert_eq!(first, second);
            assert_eq!(first, definition.command);
        }
    }

    #[test]
    fn test_standard_commands() {
        let catalog = catalog();
        assert_eq!(
            catalog.lookup(RankId::Student).unwrap().command,
            "k!quiz jpdb1k(1-300) 25 hardcore nd mmq=10 dauq=1 font=5 color=#f173ff size=100"
        );
        assert_eq!(
            catalog.lookup(RankId::DebutIdol).unwrap().command,
            "k!quiz jpdb2_5k+jpdb5k 50 hardcore nd mmq=10 dauq=1 font=5 color=#f173ff size=100 effect=antiocr"
        );
        assert_eq!(catalog.lookup(RankId::Gn1).unwrap().command, "k!quiz gn1 nd 20 mmq=4");
    }

    #[test]
    fn test_valid_commands_one_per_rank() {
        let catalog = catalog();
        assert_eq!(catalog.valid_commands().len(), catalog.all().len());
        for definition in catalog.all() {
            assert_eq!(catalog.by_command(&definition.command).unwrap().id, definition.id);
        }
    }

    #[test]
    fn test_deck_prefixes_cover_every_subset() {
        let catalog = catalog();
        let decks = catalog.known_decks();
        assert_eq!(decks.len(), 9);

        let prefixes = catalog.deck_prefixes();
        assert_eq!(prefixes.len(), 511);
        assert!(prefixes.contains("k!quiz jpdb1k"));
        assert!(prefixes.contains("k!quiz gn2"));
        assert!(prefixes.contains("k!quiz jpdb5k+jpdb10k"));

        // Same cached instance on every call
        assert!(std::ptr::eq(prefixes, catalog.deck_prefixes()));
    }

    #[test]
    fn test_every_valid_command_starts_with_a_prefix() {
        let catalog = catalog();
        for command in catalog.valid_commands() {
            assert!(
                catalog.deck_prefixes().iter().any(|p| command.starts_with(p.as_str())),
                "no prefix for {}",
                command
            );
        }
    }

    #[test]
    fn test_candidates_by_deck_set() {
        let catalog = catalog();
        let jpdb1k = DeckSet::new(["jpdb1k"]).unwrap();
        let ids: Vec<RankId> = catalog.candidates_for(&jpdb1k).iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![RankId::Student, RankId::Trainee]);

        let unranked = DeckSet::new(["jpdb1k", "gn1"]).unwrap();
        assert!(catalog.candidates_for(&unranked).is_empty());
    }

    #[test]
    fn test_standard_matches_validated_construction() {
        let validated = RankCatalog::new(DEFAULT_COMMAND_PREFIX, standard_entries()).unwrap();
        assert_eq!(validated.all(), catalog().all());
    }

    #[test]
    fn test_duplicate_rank_rejected() {
        let entries = vec![
            (RankId::Gn1, grammar_rank("gn1")),
            (RankId::Gn1, grammar_rank("gn2")),
        ];
        assert!(matches!(RankCatalog::new("k!", entries), Err(Error::Config(_))));
    }

    #[test]
    fn test_too_many_decks_rejected() {
        let mut wide = grammar_rank("gn1");
        wide.decks = DeckSet::new((0..=MAX_KNOWN_DECKS).map(|i| format!("deck{}", i))).unwrap();
        let entries = vec![(RankId::Gn1, wide), (RankId::Gn2, grammar_rank("gn2"))];

        assert!(matches!(RankCatalog::new("k!", entries), Err(Error::Config(_))));
    }

    #[test]
    fn test_deck_limit_is_inclusive() {
        let mut wide = grammar_rank("gn1");
        wide.decks = DeckSet::new((1..MAX_KNOWN_DECKS).map(|i| format!("deck{}", i))).unwrap();
        let entries = vec![(RankId::Gn1, wide), (RankId::Gn2, grammar_rank("gn2"))];

        let catalog = RankCatalog::new("k!", entries).unwrap();
        assert_eq!(catalog.known_decks().len(), MAX_KNOWN_DECKS);
        assert_eq!(catalog.deck_prefixes().len(), (1 << MAX_KNOWN_DECKS) - 1);
    }

    #[test]
    fn test_custom_prefix_flows_into_commands() {
        let catalog = RankCatalog::standard("q!");
        assert_eq!(catalog.lookup(RankId::Gn2).unwrap().command, "q!quiz gn2 nd 20 mmq=4");
        assert!(catalog.deck_prefixes().contains("q!quiz gn2"));
    }
}
