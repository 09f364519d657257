//! Newline-delimited JSON replay driver
//!
//! Reads input records, routes them to per-session arbiter tasks, and
//! writes every playback command and observability event back out.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::protocol::{Action, InputRecord, OutputRecord};
use crate::error::{ArbiterError, Result};
use crate::events::{ArbiterEvent, PlaybackCommand};
use crate::lexicon::Lexicon;
use crate::session::{spawn_session, SessionHandle};
use crate::state::ResumeSettings;

/// Counters reported when a replay finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Non-blank lines read
    pub lines: usize,
    /// Lines that failed to parse
    pub skipped: usize,
    /// Sessions spawned over the whole replay
    pub sessions: usize,
}

/// Routes replay records to sessions, spawning them on first use
pub struct Replay {
    lexicon: Arc<Lexicon>,
    resume: ResumeSettings,
    sessions: HashMap<String, SessionHandle>,
    /// Session and forwarder tasks, awaited on shutdown
    tasks: Vec<JoinHandle<()>>,
    out_tx: mpsc::UnboundedSender<OutputRecord>,
    stats: ReplayStats,
}

impl Replay {
    pub fn new(
        lexicon: Arc<Lexicon>,
        resume: ResumeSettings,
        out_tx: mpsc::UnboundedSender<OutputRecord>,
    ) -> Self {
        Self {
            lexicon,
            resume,
            sessions: HashMap::new(),
            tasks: Vec::new(),
            out_tx,
            stats: ReplayStats::default(),
        }
    }

    pub fn stats(&self) -> ReplayStats {
        self.stats
    }

    /// Parse and apply one input line
    pub async fn handle_line(&mut self, line: &str) -> Result<()> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }
        self.stats.lines += 1;

        let record: InputRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, line, "skipping malformed replay line");
                self.stats.skipped += 1;
                return Ok(());
            }
        };

        debug!(?record, "replay record");
        self.dispatch(record).await
    }

    async fn dispatch(&mut self, record: InputRecord) -> Result<()> {
        let InputRecord { session, action } = record;

        if let Action::Wait { ms } = action {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            return Ok(());
        }

        let is_teardown = action == Action::Teardown;
        if is_teardown && !self.sessions.contains_key(&session) {
            debug!(session = %session, "teardown for unknown session, ignoring");
            return Ok(());
        }

        let Some(input) = action.into_input() else {
            return Ok(());
        };

        let result = self.session(&session).send(input).await;
        if is_teardown {
            self.sessions.remove(&session);
        }

        match result {
            Err(ArbiterError::SessionClosed(id)) => {
                warn!(session = %id, "session already closed, dropping input");
                self.sessions.remove(&session);
                Ok(())
            }
            other => other,
        }
    }

    /// Get a session's handle, spawning the session if needed
    fn session(&mut self, id: &str) -> &SessionHandle {
        if !self.sessions.contains_key(id) {
            let session = spawn_session(id, Arc::clone(&self.lexicon), self.resume);
            let events = session.handle.subscribe();
            let forwarder = tokio::spawn(forward(
                id.to_string(),
                session.commands,
                events,
                self.out_tx.clone(),
            ));

            info!(session = id, "session spawned");
            self.stats.sessions += 1;
            self.tasks.push(session.task);
            self.tasks.push(forwarder);
            self.sessions.insert(id.to_string(), session.handle);
        }

        &self.sessions[id]
    }

    /// Tear down every open session and wait for all output to be queued
    pub async fn shutdown(mut self) -> ReplayStats {
        for (id, handle) in self.sessions.drain() {
            if let Err(e) = handle.teardown().await {
                debug!(session = %id, error = %e, "session already closed");
            }
        }

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(?e, "replay task failed");
            }
        }

        info!(
            lines = self.stats.lines,
            skipped = self.stats.skipped,
            sessions = self.stats.sessions,
            "replay shutdown complete"
        );
        self.stats
    }
}

/// Forward one session's commands and events to the output queue
///
/// Events are drained ahead of commands. The forwarder keeps running until
/// both channels are closed, so a command still queued when the session
/// exits is written after the session's last events.
async fn forward(
    session: String,
    mut commands: mpsc::UnboundedReceiver<PlaybackCommand>,
    mut events: broadcast::Receiver<ArbiterEvent>,
    out_tx: mpsc::UnboundedSender<OutputRecord>,
) {
    let mut events_open = true;
    let mut commands_open = true;

    while events_open || commands_open {
        let record = tokio::select! {
            biased;

            event = events.recv(), if events_open => match event {
                Ok(event) => OutputRecord::Event {
                    session: session.clone(),
                    event,
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(session = %session, skipped = n, "event forwarder lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    events_open = false;
                    continue;
                }
            },

            command = commands.recv(), if commands_open => match command {
                Some(command) => OutputRecord::Command {
                    session: session.clone(),
                    command,
                },
                None => {
                    commands_open = false;
                    continue;
                }
            },
        };

        if out_tx.send(record).is_err() {
            break;
        }
    }

    debug!(session = %session, "forwarder exited");
}

/// Write output records as JSON lines until the queue closes
pub async fn write_records<W>(
    mut writer: W,
    mut out_rx: mpsc::UnboundedReceiver<OutputRecord>,
) -> Result<W>
where
    W: AsyncWrite + Unpin,
{
    while let Some(record) = out_rx.recv().await {
        let mut line = match serde_json::to_vec(&record) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "failed to encode output record");
                continue;
            }
        };
        line.push(b'\n');

        writer.write_all(&line).await?;
        writer.flush().await?;
    }

    Ok(writer)
}

/// Replay every line from `reader`, writing decisions to `writer`
pub async fn replay<R, W>(
    reader: R,
    writer: W,
    lexicon: Arc<Lexicon>,
    resume: ResumeSettings,
) -> Result<(ReplayStats, W)>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(write_records(writer, out_rx));

    let mut replay = Replay::new(lexicon, resume, out_tx);
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        replay.handle_line(&line).await?;
    }

    // Dropping the driver closes the output queue once forwarders finish
    let stats = replay.shutdown().await;

    let writer = writer_task
        .await
        .map_err(|e| ArbiterError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;

    Ok((stats, writer))
}
