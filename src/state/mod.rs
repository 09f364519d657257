//! State machine module for interruption arbitration
//!
//! Provides an explicit state machine with four states:
//! - Idle: Agent is not speaking
//! - AgentSpeaking: Playback in progress, backchannels are ignored
//! - Interrupted: Playback halted by user speech
//! - PendingResume: False interruption, resume timer armed

mod machine;
mod timer;

pub use machine::{Arbiter, ArbiterState, ResumeSettings};
pub use timer::{ResumeTimer, TimerFired, TimerHandle};
