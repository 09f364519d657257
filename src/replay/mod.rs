//! Replay host for driving sessions from recorded event streams

mod driver;
mod protocol;

pub use driver::{replay, write_records, Replay, ReplayStats};
pub use protocol::{Action, InputRecord, OutputRecord, DEFAULT_SESSION};
