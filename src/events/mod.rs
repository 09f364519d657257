//! Events module for arbiter decisions
//!
//! `PlaybackCommand` is what the host must act on; `ArbiterEvent` is the
//! observability stream describing why.

use serde::{Deserialize, Serialize};

use crate::lexicon::Verdict;
use crate::state::ArbiterState;

/// Commands the host session must execute against agent playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackCommand {
    /// Halt in-flight synthesized speech immediately
    Interrupt,
    /// Let playback continue after a false interruption
    Resume,
}

/// Events emitted by the arbiter for logging and metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArbiterEvent {
    /// Utterance was pure backchannel; interruption withheld
    Suppressed {
        text: String,
        is_final: bool,
    },

    /// State machine moved between states
    StateChanged {
        from: ArbiterState,
        to: ArbiterState,
        /// Time spent in the previous state
        duration_ms: u64,
    },

    /// Interrupt command issued for this utterance
    InterruptIssued {
        verdict: Verdict,
        text: String,
    },

    /// False interruption reported; resume timer armed
    ResumeScheduled {
        generation: u64,
        timeout_ms: u64,
    },

    /// Pending resume abandoned before its deadline
    ResumeCancelled {
        generation: u64,
    },

    /// Resume command issued after the timer fired
    ResumeIssued {
        generation: u64,
    },

    /// A timer firing that no longer matches the armed generation
    StaleTimerDiscarded {
        generation: u64,
    },
}

impl std::fmt::Display for ArbiterEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArbiterEvent::Suppressed { text, .. } => write!(f, "SUPPRESSED ({:?})", text),
            ArbiterEvent::StateChanged {
                from,
                to,
                duration_ms,
            } => write!(f, "STATE_CHANGED {} -> {} ({}ms)", from, to, duration_ms),
            ArbiterEvent::InterruptIssued { verdict, text } => {
                write!(f, "INTERRUPT_ISSUED {} ({:?})", verdict, text)
            }
            ArbiterEvent::ResumeScheduled {
                generation,
                timeout_ms,
            } => write!(f, "RESUME_SCHEDULED #{} in {}ms", generation, timeout_ms),
            ArbiterEvent::ResumeCancelled { generation } => {
                write!(f, "RESUME_CANCELLED #{}", generation)
            }
            ArbiterEvent::ResumeIssued { generation } => write!(f, "RESUME_ISSUED #{}", generation),
            ArbiterEvent::StaleTimerDiscarded { generation } => {
                write!(f, "STALE_TIMER_DISCARDED #{}", generation)
            }
        }
    }
}
