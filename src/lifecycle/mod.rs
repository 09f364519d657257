//! Process lifecycle helpers for the replay host

mod shutdown;

pub use shutdown::ShutdownSignal;
