//! Cancellable resume countdown
//!
//! Each start spawns a sleeping task that posts a `TimerFired` into the
//! owning session's timer queue. The generation counter lets the session
//! reject firings from a timer that was restarted or cancelled after its
//! message was already queued.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Message posted when a timer reaches its deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub generation: u64,
}

/// Identifies one arming of the timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle {
    generation: u64,
    deadline: Instant,
}

impl TimerHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

/// Restartable countdown used to re-arm playback after a false interruption
pub struct ResumeTimer {
    generation: u64,
    deadline: Option<Instant>,
    task: Option<JoinHandle<()>>,
    fired_tx: mpsc::UnboundedSender<TimerFired>,
}

impl ResumeTimer {
    /// Create a timer that posts firings into `fired_tx`
    pub fn new(fired_tx: mpsc::UnboundedSender<TimerFired>) -> Self {
        Self {
            generation: 0,
            deadline: None,
            task: None,
            fired_tx,
        }
    }

    /// Create a timer along with the receiving end of its queue
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Generation of the most recent start
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Arm the timer, superseding any previous arming
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, timeout: Duration) -> TimerHandle {
        self.disarm();
        self.generation += 1;

        let generation = self.generation;
        let deadline = Instant::now() + timeout;
        let fired_tx = self.fired_tx.clone();

        self.task = Some(tokio::spawn(async move {
            sleep_until(deadline).await;
            // Receiver is gone once the session has exited
            let _ = fired_tx.send(TimerFired { generation });
        }));
        self.deadline = Some(deadline);

        debug!(generation, timeout_ms = timeout.as_millis() as u64, "resume timer armed");

        TimerHandle {
            generation,
            deadline,
        }
    }

    /// Cancel the arming identified by `handle`
    ///
    /// Returns false, doing nothing, if the handle is stale or the timer
    /// already fired.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        if handle.generation != self.generation || !self.is_armed() {
            debug!(
                generation = handle.generation,
                current = self.generation,
                "ignoring cancel of inactive resume timer"
            );
            return false;
        }

        self.disarm();
        debug!(generation = handle.generation, "resume timer cancelled");
        true
    }

    /// Consume a firing, returning true only for the live arming
    ///
    /// A given generation is accepted at most once.
    pub fn accept(&mut self, fired: TimerFired) -> bool {
        if self.is_armed() && fired.generation == self.generation {
            self.deadline = None;
            self.task = None;
            true
        } else {
            false
        }
    }

    fn disarm(&mut self) {
        self.deadline = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ResumeTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}
