//! AT Server Module
//!
//! The [`AtServer`] session ties the protocol layer to a byte stream: it
//! reads into the line buffer, echoes input, dispatches complete lines and
//! writes responses back. [`ServerStats`] collects counters across sessions.

pub mod session;
pub mod stats;

pub use session::AtServer;
pub use stats::{ServerStats, StatsSnapshot};
