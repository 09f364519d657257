//! Core arbiter state machine
//!
//! Handles transitions between Idle, AgentSpeaking, Interrupted and
//! PendingResume based on classified utterances, playback lifecycle
//! notifications and resume timer firings.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::timer::{ResumeTimer, TimerFired, TimerHandle};
use crate::config::{Config, DEFAULT_RESUME_TIMEOUT};
use crate::events::{ArbiterEvent, PlaybackCommand};
use crate::lexicon::{Lexicon, Verdict};
use crate::session::{SessionInput, Utterance};

/// The four possible states of a session's playback arbitration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArbiterState {
    /// Agent is not speaking
    Idle,
    /// Synthesized speech is playing
    AgentSpeaking,
    /// Playback was halted by user speech
    Interrupted,
    /// Interruption turned out to be false; waiting to resume
    PendingResume,
}

impl Default for ArbiterState {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for ArbiterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArbiterState::Idle => write!(f, "Idle"),
            ArbiterState::AgentSpeaking => write!(f, "AgentSpeaking"),
            ArbiterState::Interrupted => write!(f, "Interrupted"),
            ArbiterState::PendingResume => write!(f, "PendingResume"),
        }
    }
}

/// False-interruption recovery settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeSettings {
    /// Delay between a false interruption and the resume command
    pub timeout: Duration,
    /// When false, false interruptions leave playback halted
    pub enabled: bool,
}

impl Default for ResumeSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_RESUME_TIMEOUT,
            enabled: true,
        }
    }
}

impl From<&Config> for ResumeSettings {
    fn from(config: &Config) -> Self {
        Self {
            timeout: config.resume_timeout,
            enabled: config.resume_false_interruption,
        }
    }
}

/// Single-writer state machine for one voice session
pub struct Arbiter {
    /// Session this arbiter belongs to, for logs
    session_id: String,
    /// Current state
    state: ArbiterState,
    /// Time when current non-Idle state was entered
    state_entered_at: Option<Instant>,
    lexicon: Arc<Lexicon>,
    resume: ResumeSettings,
    timer: ResumeTimer,
    /// Arming that will resume playback, while in PendingResume
    pending: Option<TimerHandle>,
    /// Taken by `run`
    timer_rx: Option<mpsc::UnboundedReceiver<TimerFired>>,
    torn_down: bool,
    command_tx: mpsc::UnboundedSender<PlaybackCommand>,
    event_tx: broadcast::Sender<ArbiterEvent>,
    state_tx: watch::Sender<ArbiterState>,
}

impl Arbiter {
    /// Create a new arbiter in the Idle state
    pub fn new(
        session_id: impl Into<String>,
        lexicon: Arc<Lexicon>,
        resume: ResumeSettings,
        command_tx: mpsc::UnboundedSender<PlaybackCommand>,
        event_tx: broadcast::Sender<ArbiterEvent>,
    ) -> Self {
        let (timer, timer_rx) = ResumeTimer::channel();
        let (state_tx, _) = watch::channel(ArbiterState::Idle);

        Self {
            session_id: session_id.into(),
            state: ArbiterState::Idle,
            state_entered_at: None,
            lexicon,
            resume,
            timer,
            pending: None,
            timer_rx: Some(timer_rx),
            torn_down: false,
            command_tx,
            event_tx,
            state_tx,
        }
    }

    /// Get the current state
    pub fn state(&self) -> ArbiterState {
        self.state
    }

    /// Follow state changes from outside the session task
    pub fn watch_state(&self) -> watch::Receiver<ArbiterState> {
        self.state_tx.subscribe()
    }

    /// Whether a teardown has been processed
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Generation of the most recent resume timer arming
    pub fn resume_generation(&self) -> u64 {
        self.timer.generation()
    }

    /// Run the arbiter, processing session inputs and timer firings
    ///
    /// Inputs already queued are always handled before a timer firing,
    /// so an utterance arriving with the deadline keeps playback halted.
    /// Returns after a teardown or once every input sender is dropped.
    pub async fn run(&mut self, mut input_rx: mpsc::Receiver<SessionInput>) {
        let Some(mut timer_rx) = self.timer_rx.take() else {
            warn!(session = %self.session_id, "arbiter run called twice");
            return;
        };

        info!(session = %self.session_id, "arbiter started in Idle state");

        while !self.torn_down {
            tokio::select! {
                biased;

                input = input_rx.recv() => match input {
                    Some(input) => self.handle_input(input),
                    None => break,
                },

                Some(fired) = timer_rx.recv() => self.handle_timer(fired),
            }
        }

        if self.state != ArbiterState::Idle {
            self.transition_to(ArbiterState::Idle);
        }

        info!(session = %self.session_id, "arbiter stopped");
    }

    /// Apply one session input
    ///
    /// Must be called from within a tokio runtime, since a revision in
    /// `Interrupted` arms the resume timer.
    pub fn handle_input(&mut self, input: SessionInput) {
        match input {
            SessionInput::Utterance(utterance) => self.handle_utterance(utterance),
            SessionInput::PlaybackStarted => self.handle_playback_started(),
            SessionInput::PlaybackFinished => self.handle_playback_finished(),
            SessionInput::RevisedToNonActionable => self.handle_revised(),
            SessionInput::Teardown => self.handle_teardown(),
        }
    }

    /// Handle a transcript fragment
    fn handle_utterance(&mut self, utterance: Utterance) {
        let verdict = self.lexicon.classify_text(&utterance.text);

        debug!(
            session = %self.session_id,
            text = %utterance.text,
            is_final = utterance.is_final,
            %verdict,
            state = %self.state,
            "utterance classified"
        );

        if verdict == Verdict::Empty {
            return;
        }

        match self.state {
            ArbiterState::Idle => {
                debug!(session = %self.session_id, "agent not speaking, nothing to arbitrate");
            }
            ArbiterState::AgentSpeaking if verdict.interrupts() => {
                self.send_command(PlaybackCommand::Interrupt);
                info!(
                    session = %self.session_id,
                    %verdict,
                    latency_us = utterance.timestamp.elapsed().as_micros() as u64,
                    "interrupting playback"
                );
                self.emit(ArbiterEvent::InterruptIssued {
                    verdict,
                    text: utterance.text,
                });
                self.transition_to(ArbiterState::Interrupted);
            }
            ArbiterState::AgentSpeaking => {
                info!(
                    session = %self.session_id,
                    text = %utterance.text,
                    "backchannel suppressed, playback continues"
                );
                self.emit(ArbiterEvent::Suppressed {
                    text: utterance.text,
                    is_final: utterance.is_final,
                });
            }
            ArbiterState::Interrupted => {
                debug!(session = %self.session_id, "playback already halted");
            }
            ArbiterState::PendingResume => {
                // User is still talking; stay halted
                self.transition_to(ArbiterState::Interrupted);
            }
        }
    }

    /// Handle playback start, which also opens a new turn
    fn handle_playback_started(&mut self) {
        match self.state {
            ArbiterState::Idle => self.transition_to(ArbiterState::AgentSpeaking),
            ArbiterState::AgentSpeaking => {
                debug!(session = %self.session_id, "playback already started");
            }
            ArbiterState::Interrupted | ArbiterState::PendingResume => {
                self.transition_to(ArbiterState::Idle);
                self.transition_to(ArbiterState::AgentSpeaking);
            }
        }
    }

    fn handle_playback_finished(&mut self) {
        if self.state == ArbiterState::AgentSpeaking {
            self.transition_to(ArbiterState::Idle);
        } else {
            debug!(
                session = %self.session_id,
                state = %self.state,
                "ignoring playback finished outside AgentSpeaking"
            );
        }
    }

    /// Handle a false interruption report
    fn handle_revised(&mut self) {
        match self.state {
            ArbiterState::Interrupted if !self.resume.enabled => {
                info!(
                    session = %self.session_id,
                    "false interruption reported, resume disabled"
                );
            }
            ArbiterState::Interrupted => {
                self.transition_to(ArbiterState::PendingResume);
                self.schedule_resume();
            }
            ArbiterState::PendingResume => {
                // Restart the countdown; the previous arming becomes stale
                self.schedule_resume();
            }
            ArbiterState::Idle | ArbiterState::AgentSpeaking => {
                debug!(
                    session = %self.session_id,
                    state = %self.state,
                    "ignoring false interruption report outside Interrupted"
                );
            }
        }
    }

    fn handle_teardown(&mut self) {
        info!(session = %self.session_id, state = %self.state, "session teardown");
        self.transition_to(ArbiterState::Idle);
        self.torn_down = true;
    }

    /// Handle a resume timer firing
    pub fn handle_timer(&mut self, fired: TimerFired) {
        if self.state != ArbiterState::PendingResume || !self.timer.accept(fired) {
            debug!(
                session = %self.session_id,
                generation = fired.generation,
                current = self.timer.generation(),
                "discarding stale resume timer"
            );
            self.emit(ArbiterEvent::StaleTimerDiscarded {
                generation: fired.generation,
            });
            return;
        }

        self.pending = None;
        self.send_command(PlaybackCommand::Resume);
        info!(
            session = %self.session_id,
            generation = fired.generation,
            "resuming playback after false interruption"
        );
        self.emit(ArbiterEvent::ResumeIssued {
            generation: fired.generation,
        });
        self.transition_to(ArbiterState::AgentSpeaking);
    }

    fn schedule_resume(&mut self) {
        let handle = self.timer.start(self.resume.timeout);
        self.pending = Some(handle);
        self.emit(ArbiterEvent::ResumeScheduled {
            generation: handle.generation(),
            timeout_ms: self.resume.timeout.as_millis() as u64,
        });
    }

    fn cancel_pending_resume(&mut self) {
        if let Some(handle) = self.pending.take() {
            if self.timer.cancel(handle) {
                self.emit(ArbiterEvent::ResumeCancelled {
                    generation: handle.generation(),
                });
            }
        }
    }

    /// Perform a state transition
    fn transition_to(&mut self, new_state: ArbiterState) {
        let old_state = self.state;
        if new_state == old_state {
            return;
        }

        if old_state == ArbiterState::PendingResume {
            self.cancel_pending_resume();
        }

        let duration_ms = self
            .state_entered_at
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);

        info!(
            session = %self.session_id,
            from = %old_state,
            to = %new_state,
            duration_ms = duration_ms,
            "state transition"
        );

        self.state = new_state;
        self.state_entered_at = if new_state != ArbiterState::Idle {
            Some(Instant::now())
        } else {
            None
        };
        self.state_tx.send_replace(new_state);

        self.emit(ArbiterEvent::StateChanged {
            from: old_state,
            to: new_state,
            duration_ms,
        });
    }

    fn send_command(&self, command: PlaybackCommand) {
        if self.command_tx.send(command).is_err() {
            warn!(session = %self.session_id, ?command, "playback command receiver dropped");
        }
    }

    fn emit(&self, event: ArbiterEvent) {
        debug!(session = %self.session_id, %event, "emitting arbiter event");
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }
}
