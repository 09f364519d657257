//! Lexical classification of user speech during agent playback
//!
//! Turns transcript fragments into tokens and matches them against the
//! configured backchannel and command word sets. Everything here is pure
//! and safe to call from any thread.

mod classify;
mod normalize;

pub use classify::{classify, Lexicon, TokenSet, Verdict};
pub use normalize::{normalize, STRIPPED_PUNCTUATION};
