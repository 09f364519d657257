//! Session runtime around the arbiter
//!
//! One spawned task per voice session, fed through a single queue.

mod handle;
mod input;

pub use handle::{spawn_session, Session, SessionHandle, EVENT_CHANNEL_CAPACITY, INPUT_QUEUE_CAPACITY};
pub use input::{SessionInput, Utterance};
