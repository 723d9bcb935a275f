//! Quiz configuration value type and command-string derivation

use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

/// Non-empty set of deck identifiers
///
/// Equality and hashing ignore order, but the declared order is kept so
/// derived command strings read the way they were configured.
#[derive(Debug, Clone)]
pub struct DeckSet {
    decks: Vec<String>,
}

impl DeckSet {
    /// Build from deck identifiers; duplicates are dropped, first one wins
    ///
    /// Returns `None` for an empty list.
    pub fn new<I, S>(decks: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = BTreeSet::new();
        let decks: Vec<String> = decks
            .into_iter()
            .map(Into::into)
            .filter(|deck| seen.insert(deck.clone()))
            .collect();

        if decks.is_empty() {
            None
        } else {
            Some(Self { decks })
        }
    }

    /// Build from a static, non-empty declaration
    pub(crate) fn declared(decks: &[&str]) -> Self {
        debug_assert!(!decks.is_empty(), "declared deck set must be non-empty");
        Self {
            decks: decks.iter().map(|d| d.to_string()).collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.decks.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.decks.len()
    }

    /// All decks are grammar decks ("gn" prefix)
    pub fn is_grammar(&self) -> bool {
        self.decks.iter().all(|deck| deck.starts_with("gn"))
    }

    /// Decks joined with '+', declared order
    pub fn joined(&self) -> String {
        self.decks.join("+")
    }

    fn sorted(&self) -> BTreeSet<&str> {
        self.decks.iter().map(String::as_str).collect()
    }
}

impl PartialEq for DeckSet {
    fn eq(&self, other: &Self) -> bool {
        self.sorted() == other.sorted()
    }
}

impl Eq for DeckSet {}

impl Hash for DeckSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for deck in self.sorted() {
            deck.hash(state);
        }
    }
}

/// Inclusive deck sub-range (question indices)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeckRange {
    pub start: u32,
    pub end: u32,
}

/// Full quiz configuration, compared structurally
///
/// Used both for catalog expectations and for settings observed in a
/// report. `None` in an expectation means "no requirement".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuizConfiguration {
    pub font: Option<String>,
    pub font_size: u32,
    pub foreground: Option<String>,
    pub background: Option<String>,
    pub effect: Option<String>,
    pub time_limit_ms: u64,
    pub bonus_time_ms: u64,
    pub decks: DeckSet,
    pub deck_range: Option<DeckRange>,
    pub score_limit: u32,
    pub max_missed: u32,
    pub shuffle: bool,
}

impl QuizConfiguration {
    /// Command that starts this quiz, e.g. `k!quiz gn1 nd 20 mmq=4`
    ///
    /// Grammar quizzes take no styling flags. Vocabulary quizzes carry the
    /// optional deck range, hardcore/no-duplicate/unique-answer flags, the
    /// styling and the optional effect.
    pub fn command(&self, prefix: &str) -> String {
        let decks = self.decks.joined();

        if self.decks.is_grammar() {
            return format!(
                "{}quiz {} nd {} mmq={}",
                prefix, decks, self.score_limit, self.max_missed
            );
        }

        let range = self
            .deck_range
            .map(|r| format!("({}-{})", r.start, r.end))
            .unwrap_or_default();

        let mut command = format!(
            "{}quiz {}{} {} hardcore nd mmq={} dauq=1 font=5 color={} size={}",
            prefix,
            decks,
            range,
            self.score_limit,
            self.max_missed,
            self.foreground.as_deref().unwrap_or(""),
            self.font_size
        );

        if let Some(effect) = &self.effect {
            command.push_str(" effect=");
            command.push_str(effect);
        }

        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn decks(names: &[&str]) -> DeckSet {
        DeckSet::new(names.iter().copied()).unwrap()
    }

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    fn vocab(deck_names: &[&str]) -> QuizConfiguration {
        QuizConfiguration {
            font: Some("Eishiikaisho".to_string()),
            font_size: 100,
            foreground: Some("#f173ff".to_string()),
            background: None,
            effect: Some("antiocr".to_string()),
            time_limit_ms: 16_000,
            bonus_time_ms: 0,
            decks: decks(deck_names),
            deck_range: None,
            score_limit: 50,
            max_missed: 10,
            shuffle: true,
        }
    }

    #[test]
    fn test_empty_deck_set_rejected() {
        assert!(DeckSet::new(Vec::<String>::new()).is_none());
    }

    #[test]
    fn test_deck_set_equality_ignores_order() {
        let a = decks(&["jpdb5k", "jpdb10k"]);
        let b = decks(&["jpdb10k", "jpdb5k"]);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(a, decks(&["jpdb5k"]));
    }

    #[test]
    fn test_deck_set_drops_duplicates_keeping_order() {
        let set = decks(&["jpdb5k", "jpdb10k", "jpdb5k"]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.joined(), "jpdb5k+jpdb10k");
    }

    #[test]
    fn test_grammar_requires_every_deck() {
        assert!(decks(&["gn1", "gn2"]).is_grammar());
        assert!(!decks(&["gn1", "jpdb1k"]).is_grammar());
    }

    #[test]
    fn test_vocab_command_with_effect() {
        let config = vocab(&["jpdb5k", "jpdb10k"]);
        assert_eq!(
            config.command("k!"),
            "k!quiz jpdb5k+jpdb10k 50 hardcore nd mmq=10 dauq=1 font=5 color=#f173ff size=100 effect=antiocr"
        );
    }

    #[test]
    fn test_vocab_command_with_range_and_no_effect() {
        let mut config = vocab(&["jpdb1k"]);
        config.deck_range = Some(DeckRange { start: 1, end: 300 });
        config.effect = None;
        config.score_limit = 25;

        assert_eq!(
            config.command("k!"),
            "k!quiz jpdb1k(1-300) 25 hardcore nd mmq=10 dauq=1 font=5 color=#f173ff size=100"
        );
    }

    #[test]
    fn test_grammar_command_omits_styling() {
        let mut config = vocab(&["gn2"]);
        config.score_limit = 20;
        config.max_missed = 4;
        config.font_size = 200;

        assert_eq!(config.command("k!"), "k!quiz gn2 nd 20 mmq=4");
    }

    #[test]
    fn test_configuration_usable_as_map_key() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(vocab(&["jpdb5k", "jpdb10k"]), "Major Idol");

        // Same settings with decks listed in another order hit the same entry
        assert_eq!(map.get(&vocab(&["jpdb10k", "jpdb5k"])), Some(&"Major Idol"));
    }
}
