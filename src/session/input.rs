//! Inputs a voice session feeds into its arbiter

use tokio::time::Instant;

/// A transcribed fragment of user speech
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// Raw transcript text, possibly empty
    pub text: String,
    /// Whether the transcriber considers this fragment final
    pub is_final: bool,
    /// When the fragment was observed
    pub timestamp: Instant,
}

impl Utterance {
    /// Create an utterance observed now
    pub fn new(text: impl Into<String>, is_final: bool) -> Self {
        Self {
            text: text.into(),
            is_final,
            timestamp: Instant::now(),
        }
    }
}

/// Everything that may mutate a session's arbiter, in one serialized stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInput {
    /// Partial or final transcript fragment
    Utterance(Utterance),
    /// Agent playback started, opening a new turn
    PlaybackStarted,
    /// Agent playback ran to completion
    PlaybackFinished,
    /// The utterance that caused the interrupt turned out to be non-actionable
    RevisedToNonActionable,
    /// Session is ending
    Teardown,
}

impl From<Utterance> for SessionInput {
    fn from(utterance: Utterance) -> Self {
        SessionInput::Utterance(utterance)
    }
}
