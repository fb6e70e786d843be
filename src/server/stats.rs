//! Server Statistics
//!
//! Lock-free counters shared by every session of a process. Sessions bump
//! them with relaxed atomics; readers take a [`StatsSnapshot`] for a
//! consistent-enough view when logging.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for AT sessions.
#[derive(Debug, Default)]
pub struct ServerStats {
    /// Total number of sessions started
    pub sessions_opened: AtomicU64,
    /// Currently running sessions
    pub active_sessions: AtomicU64,
    /// Command lines dispatched (bare `AT` included)
    pub lines_processed: AtomicU64,
    /// Handlers that returned an error or panicked
    pub handler_failures: AtomicU64,
    /// Lines no handler matched
    pub unmatched_commands: AtomicU64,
    /// Noise bytes dropped in front of the `AT` marker
    pub garbage_bytes: AtomicU64,
    /// Lines dropped because they overflowed the buffer
    pub line_overflows: AtomicU64,
    /// Total bytes read in command mode
    pub bytes_read: AtomicU64,
    /// Total bytes written in command mode (echo included)
    pub bytes_written: AtomicU64,
    /// Bytes looped back while in data mode
    pub data_mode_bytes: AtomicU64,
}

/// Point-in-time copy of [`ServerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub sessions_opened: u64,
    pub active_sessions: u64,
    pub lines_processed: u64,
    pub handler_failures: u64,
    pub unmatched_commands: u64,
    pub garbage_bytes: u64,
    pub line_overflows: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub data_mode_bytes: u64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_closed(&self) {
        self.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn line_processed(&self) {
        self.lines_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handler_failed(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_unmatched(&self) {
        self.unmatched_commands.fetch_add(1, Ordering::Relaxed);
    }

    pub fn garbage_dropped(&self, count: usize) {
        if count > 0 {
            self.garbage_bytes.fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub fn line_overflowed(&self) {
        self.line_overflows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn data_mode_bytes(&self, count: usize) {
        self.data_mode_bytes
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
            lines_processed: self.lines_processed.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            unmatched_commands: self.unmatched_commands.load(Ordering::Relaxed),
            garbage_bytes: self.garbage_bytes.load(Ordering::Relaxed),
            line_overflows: self.line_overflows.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            data_mode_bytes: self.data_mode_bytes.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_counters() {
        let stats = ServerStats::new();
        stats.session_opened();
        stats.session_opened();
        stats.session_closed();

        let snap = stats.snapshot();
        assert_eq!(snap.sessions_opened, 2);
        assert_eq!(snap.active_sessions, 1);
    }

    #[test]
    fn test_byte_counters() {
        let stats = ServerStats::new();
        stats.bytes_read(10);
        stats.bytes_written(4);
        stats.garbage_dropped(0);
        stats.garbage_dropped(3);
        stats.data_mode_bytes(7);

        let snap = stats.snapshot();
        assert_eq!(snap.bytes_read, 10);
        assert_eq!(snap.bytes_written, 4);
        assert_eq!(snap.garbage_bytes, 3);
        assert_eq!(snap.data_mode_bytes, 7);
    }
}
