//! Word-set classification of normalized transcript tokens
//!
//! Two configured token sets decide whether an utterance is a passive
//! acknowledgment or speech that must stop playback. Command words take
//! absolute precedence, and anything short of a unanimous backchannel
//! match falls through to an interrupting verdict.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::normalize::normalize;
use crate::error::ConfigError;

/// Lexical verdict for one utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// No tokens at all
    Empty,
    /// Every token is a backchannel word
    BackchannelOnly,
    /// At least one command word is present
    ContainsCommand,
    /// Tokens outside the backchannel set, with no command word
    Mixed,
}

impl Verdict {
    /// Whether this verdict should stop agent playback
    pub fn interrupts(self) -> bool {
        matches!(self, Verdict::ContainsCommand | Verdict::Mixed)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Empty => write!(f, "Empty"),
            Verdict::BackchannelOnly => write!(f, "BackchannelOnly"),
            Verdict::ContainsCommand => write!(f, "ContainsCommand"),
            Verdict::Mixed => write!(f, "Mixed"),
        }
    }
}

/// Immutable set of normalized words
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSet {
    tokens: HashSet<String>,
}

impl TokenSet {
    /// Build a set from configured words
    ///
    /// Each entry goes through the same normalization as transcript text,
    /// so "Uh-huh" and "uh-huh" are the same entry. Entries that normalize
    /// to nothing are skipped; multi-word entries are rejected since
    /// matching is per token.
    pub fn from_words<I, S>(words: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tokens = HashSet::new();

        for word in words {
            let word = word.as_ref();
            let mut normalized = normalize(word);
            match normalized.len() {
                0 => debug!(entry = word, "skipping empty word list entry"),
                1 => {
                    tokens.extend(normalized.pop());
                }
                n => {
                    return Err(ConfigError::MultiWordEntry {
                        entry: word.to_owned(),
                        tokens: n,
                    })
                }
            }
        }

        Ok(Self { tokens })
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    /// Tokens present in both sets, sorted
    pub fn intersection(&self, other: &TokenSet) -> Vec<String> {
        let mut shared: Vec<String> = self.tokens.intersection(&other.tokens).cloned().collect();
        shared.sort();
        shared
    }
}

/// Classify normalized tokens against the backchannel and command sets
pub fn classify<S: AsRef<str>>(tokens: &[S], backchannel: &TokenSet, command: &TokenSet) -> Verdict {
    if tokens.is_empty() {
        return Verdict::Empty;
    }

    if tokens.iter().any(|t| command.contains(t.as_ref())) {
        return Verdict::ContainsCommand;
    }

    if tokens.iter().all(|t| backchannel.contains(t.as_ref())) {
        Verdict::BackchannelOnly
    } else {
        Verdict::Mixed
    }
}

/// The backchannel and command sets for one locale or tenant
///
/// Read-only after construction; share it across sessions behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Lexicon {
    backchannel: TokenSet,
    command: TokenSet,
}

impl Lexicon {
    /// Create a lexicon, warning if the two sets share any token
    pub fn new(backchannel: TokenSet, command: TokenSet) -> Self {
        let lexicon = Self {
            backchannel,
            command,
        };

        let overlap = lexicon.overlap();
        if !overlap.is_empty() {
            warn!(
                ?overlap,
                "backchannel and command word sets overlap, command words take precedence"
            );
        }

        lexicon
    }

    /// Build a lexicon straight from word lists
    pub fn from_words<B, C, S>(backchannel: B, command: C) -> Result<Self, ConfigError>
    where
        B: IntoIterator<Item = S>,
        C: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self::new(
            TokenSet::from_words(backchannel)?,
            TokenSet::from_words(command)?,
        ))
    }

    pub fn backchannel(&self) -> &TokenSet {
        &self.backchannel
    }

    pub fn command(&self) -> &TokenSet {
        &self.command
    }

    /// Tokens configured as both backchannel and command
    pub fn overlap(&self) -> Vec<String> {
        self.backchannel.intersection(&self.command)
    }

    pub fn classify<S: AsRef<str>>(&self, tokens: &[S]) -> Verdict {
        classify(tokens, &self.backchannel, &self.command)
    }

    /// Normalize and classify raw transcript text
    pub fn classify_text(&self, text: &str) -> Verdict {
        self.classify(&normalize(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sets() -> (TokenSet, TokenSet) {
        (
            TokenSet::from_words(["yeah", "ok", "mhm"]).unwrap(),
            TokenSet::from_words(["wait", "stop"]).unwrap(),
        )
    }

    fn lexicon() -> Lexicon {
        let (backchannel, command) = sets();
        Lexicon::new(backchannel, command)
    }

    #[test]
    fn test_empty_tokens() {
        let (bc, cmd) = sets();
        let tokens: [&str; 0] = [];
        assert_eq!(classify(&tokens, &bc, &cmd), Verdict::Empty);
    }

    #[test]
    fn test_all_backchannel() {
        let (bc, cmd) = sets();
        for tokens in [
            vec!["yeah"],
            vec!["ok", "ok"],
            vec!["mhm", "yeah", "ok", "yeah"],
        ] {
            assert_eq!(classify(&tokens, &bc, &cmd), Verdict::BackchannelOnly);
        }
    }

    #[test]
    fn test_command_precedence() {
        let (bc, cmd) = sets();
        let mut tokens = vec!["yeah"; 50];
        tokens.push("stop");
        assert_eq!(classify(&tokens, &bc, &cmd), Verdict::ContainsCommand);

        let tokens = ["wait", "yeah", "ok", "unknown"];
        assert_eq!(classify(&tokens, &bc, &cmd), Verdict::ContainsCommand);
    }

    #[test]
    fn test_mixed_with_and_without_backchannel() {
        let (bc, cmd) = sets();
        assert_eq!(classify(&["yeah", "sure"], &bc, &cmd), Verdict::Mixed);
        assert_eq!(classify(&["sure", "thats", "great"], &bc, &cmd), Verdict::Mixed);
    }

    #[test]
    fn test_idempotent() {
        let lexicon = lexicon();
        let tokens = normalize("Yeah, ok. Wait!");
        let first = lexicon.classify(&tokens);
        let second = lexicon.classify(&tokens);
        assert_eq!(first, second);
        assert_eq!(first, Verdict::ContainsCommand);
    }

    #[test]
    fn test_concrete_scenario() {
        let lexicon = lexicon();
        assert_eq!(lexicon.classify_text("yeah yeah ok"), Verdict::BackchannelOnly);
        assert_eq!(lexicon.classify_text("ok but wait"), Verdict::ContainsCommand);
        assert_eq!(lexicon.classify_text(""), Verdict::Empty);

        let verdict = lexicon.classify_text("sure thats great");
        assert_eq!(verdict, Verdict::Mixed);
        assert!(verdict.interrupts());
    }

    #[test]
    fn test_interrupts() {
        assert!(!Verdict::Empty.interrupts());
        assert!(!Verdict::BackchannelOnly.interrupts());
        assert!(Verdict::ContainsCommand.interrupts());
        assert!(Verdict::Mixed.interrupts());
    }

    #[test]
    fn test_entries_are_normalized() {
        let set = TokenSet::from_words(["Yeah!", "Uh-Huh", "  ", "don't"]).unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.contains("yeah"));
        assert!(set.contains("uh-huh"));
        assert!(set.contains("dont"));

        let mut tokens: Vec<&str> = set.iter().collect();
        tokens.sort();
        assert_eq!(tokens, vec!["dont", "uh-huh", "yeah"]);
    }

    #[test]
    fn test_blank_entries_give_empty_set() {
        let set = TokenSet::from_words(["", " ,. ", "!"]).unwrap();
        assert!(set.is_empty());
        assert_eq!(classify(&["yeah"], &set, &set), Verdict::Mixed);
    }

    #[test]
    fn test_multi_word_entry_rejected() {
        let err = TokenSet::from_words(["hang on"]).unwrap_err();
        assert!(matches!(err, ConfigError::MultiWordEntry { tokens: 2, .. }));
    }

    #[test]
    fn test_overlap_gives_command_precedence() {
        let lexicon = Lexicon::from_words(["yeah", "no"], ["no", "stop"]).unwrap();
        assert_eq!(lexicon.overlap(), vec!["no".to_string()]);
        assert_eq!(lexicon.classify_text("no"), Verdict::ContainsCommand);
        assert_eq!(lexicon.classify_text("yeah"), Verdict::BackchannelOnly);
    }

    #[test]
    fn test_verdict_serialization() {
        let json = serde_json::to_string(&Verdict::BackchannelOnly).unwrap();
        assert_eq!(json, "\"backchannel_only\"");
    }
}
