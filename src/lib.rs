//! interrupt-arbiter: backchannel-aware interruption arbitration for voice agents
//!
//! While synthesized agent speech is playing, transcript fragments of the
//! user's speech are classified and the arbiter decides whether playback
//! continues or stops:
//! - Backchannels ("yeah", "mhm") are suppressed and playback continues
//! - Command words ("wait", "stop") and unknown content interrupt
//! - False interruptions resume playback after a bounded timeout
//!
//! Each voice session runs its own arbiter task behind a `SessionHandle`.
//! STT, VAD, LLM and TTS stay with the host.

pub mod config;
pub mod error;
pub mod events;
pub mod lexicon;
pub mod lifecycle;
pub mod replay;
pub mod session;
pub mod state;

pub use config::Config;
pub use error::{ArbiterError, ConfigError, Result};
pub use events::{ArbiterEvent, PlaybackCommand};
pub use lexicon::{classify, normalize, Lexicon, TokenSet, Verdict};
pub use session::{spawn_session, Session, SessionHandle, SessionInput, Utterance};
pub use state::{Arbiter, ArbiterState, ResumeSettings, ResumeTimer};
