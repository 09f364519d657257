//! Per-session arbiter task and the handle used to drive it
//!
//! Each session gets its own tokio task owning an `Arbiter`. Hosts never
//! touch the arbiter directly; every input goes through the session's
//! queue, which keeps the state machine single-writer.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, Instrument};

use super::input::{SessionInput, Utterance};
use crate::error::{ArbiterError, Result};
use crate::events::{ArbiterEvent, PlaybackCommand};
use crate::lexicon::Lexicon;
use crate::state::{Arbiter, ArbiterState, ResumeSettings};

/// Capacity of the per-session input queue
pub const INPUT_QUEUE_CAPACITY: usize = 64;

/// Capacity of the per-session observability channel
pub const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Cloneable handle for feeding a running session
#[derive(Clone)]
pub struct SessionHandle {
    id: String,
    input_tx: mpsc::Sender<SessionInput>,
    state_rx: watch::Receiver<ArbiterState>,
    event_tx: broadcast::Sender<ArbiterEvent>,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Queue an input for the arbiter
    pub async fn send(&self, input: SessionInput) -> Result<()> {
        self.input_tx
            .send(input)
            .await
            .map_err(|_| ArbiterError::SessionClosed(self.id.clone()))
    }

    /// Report a transcript fragment observed now
    pub async fn utterance(&self, text: impl Into<String>, is_final: bool) -> Result<()> {
        self.send(Utterance::new(text, is_final).into()).await
    }

    pub async fn playback_started(&self) -> Result<()> {
        self.send(SessionInput::PlaybackStarted).await
    }

    pub async fn playback_finished(&self) -> Result<()> {
        self.send(SessionInput::PlaybackFinished).await
    }

    pub async fn revised_to_non_actionable(&self) -> Result<()> {
        self.send(SessionInput::RevisedToNonActionable).await
    }

    pub async fn teardown(&self) -> Result<()> {
        self.send(SessionInput::Teardown).await
    }

    /// Latest state published by the arbiter
    pub fn state(&self) -> ArbiterState {
        *self.state_rx.borrow()
    }

    /// Subscribe to observability events from this point on
    pub fn subscribe(&self) -> broadcast::Receiver<ArbiterEvent> {
        self.event_tx.subscribe()
    }

    /// Whether the session task has exited
    pub fn is_closed(&self) -> bool {
        self.input_tx.is_closed()
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

/// A spawned session: its handle, the playback commands it issues, and its task
pub struct Session {
    pub handle: SessionHandle,
    pub commands: mpsc::UnboundedReceiver<PlaybackCommand>,
    pub task: JoinHandle<()>,
}

/// Spawn an arbiter task for one voice session
///
/// Must be called from within a tokio runtime.
pub fn spawn_session(
    id: impl Into<String>,
    lexicon: Arc<Lexicon>,
    resume: ResumeSettings,
) -> Session {
    let id = id.into();
    let (input_tx, input_rx) = mpsc::channel(INPUT_QUEUE_CAPACITY);
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    let mut arbiter = Arbiter::new(id.clone(), lexicon, resume, command_tx, event_tx.clone());
    let state_rx = arbiter.watch_state();

    let span = tracing::info_span!("session", id = %id);
    let task = tokio::spawn(
        async move {
            arbiter.run(input_rx).await;
            debug!("session task exiting");
        }
        .instrument(span),
    );

    Session {
        handle: SessionHandle {
            id,
            input_tx,
            state_rx,
            event_tx,
        },
        commands: command_rx,
        task,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use tokio_test::assert_err;

    const TIMEOUT: Duration = Duration::from_millis(1000);

    fn spawn(id: &str) -> Session {
        let lexicon =
            Arc::new(Lexicon::from_words(["yeah", "ok", "mhm"], ["wait", "stop"]).unwrap());
        spawn_session(
            id,
            lexicon,
            ResumeSettings {
                timeout: TIMEOUT,
                enabled: true,
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_backchannel_keeps_speaking() {
        let mut session = spawn("a");
        let mut events = session.handle.subscribe();

        session.handle.playback_started().await.unwrap();
        session.handle.utterance("Yeah, ok.", false).await.unwrap();
        session.handle.teardown().await.unwrap();
        session.task.await.unwrap();

        assert_err!(session.commands.try_recv());

        let mut suppressed = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let ArbiterEvent::Suppressed { text, is_final } = event {
                suppressed.push((text, is_final));
            }
        }
        assert_eq!(suppressed, vec![("Yeah, ok.".to_string(), false)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_false_interruption_resumes_once() {
        let mut session = spawn("a");
        let handle = session.handle.clone();

        handle.playback_started().await.unwrap();
        handle.utterance("wait", false).await.unwrap();
        assert_eq!(session.commands.recv().await, Some(PlaybackCommand::Interrupt));
        assert_eq!(handle.state(), ArbiterState::Interrupted);

        let revised_at = tokio::time::Instant::now();
        handle.revised_to_non_actionable().await.unwrap();
        assert_eq!(session.commands.recv().await, Some(PlaybackCommand::Resume));
        assert!(revised_at.elapsed() >= TIMEOUT);
        assert_eq!(handle.state(), ArbiterState::AgentSpeaking);

        tokio::time::sleep(TIMEOUT * 5).await;
        assert_err!(session.commands.try_recv());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_speech_cancels_resume() {
        let mut session = spawn("a");
        let handle = session.handle.clone();

        handle.playback_started().await.unwrap();
        handle.utterance("stop", true).await.unwrap();
        handle.revised_to_non_actionable().await.unwrap();
        handle.utterance("well actually", false).await.unwrap();

        tokio::time::sleep(TIMEOUT * 5).await;
        assert_eq!(session.commands.try_recv(), Ok(PlaybackCommand::Interrupt));
        assert_err!(session.commands.try_recv());
        assert_eq!(handle.state(), ArbiterState::Interrupted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_restart_resumes_final_generation() {
        let mut session = spawn("a");
        let handle = session.handle.clone();
        let mut events = handle.subscribe();

        handle.playback_started().await.unwrap();
        handle.utterance("stop", true).await.unwrap();
        handle.revised_to_non_actionable().await.unwrap();
        handle.revised_to_non_actionable().await.unwrap();

        tokio::time::sleep(TIMEOUT * 5).await;
        assert_eq!(session.commands.try_recv(), Ok(PlaybackCommand::Interrupt));
        assert_eq!(session.commands.try_recv(), Ok(PlaybackCommand::Resume));
        assert_err!(session.commands.try_recv());

        let mut resumed = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let ArbiterEvent::ResumeIssued { generation } = event {
                resumed.push(generation);
            }
        }
        assert_eq!(resumed, vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_closes_session() {
        let session = spawn("a");
        let handle = session.handle.clone();

        handle.playback_started().await.unwrap();
        handle.teardown().await.unwrap();
        session.task.await.unwrap();

        assert!(handle.is_closed());
        assert_eq!(handle.state(), ArbiterState::Idle);
        let err = handle.utterance("stop", true).await.unwrap_err();
        assert!(matches!(err, ArbiterError::SessionClosed(id) if id == "a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sessions_are_independent() {
        let mut a = spawn("a");
        let mut b = spawn("b");

        a.handle.playback_started().await.unwrap();
        b.handle.playback_started().await.unwrap();
        a.handle.utterance("stop", true).await.unwrap();
        b.handle.utterance("mhm", true).await.unwrap();

        assert_eq!(a.commands.recv().await, Some(PlaybackCommand::Interrupt));
        tokio::time::sleep(TIMEOUT).await;

        assert_eq!(a.handle.state(), ArbiterState::Interrupted);
        assert_eq!(b.handle.state(), ArbiterState::AgentSpeaking);
        assert_err!(b.commands.try_recv());
    }
}
