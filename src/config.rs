//! Server Configuration
//!
//! [`AtServerConfig`] is a plain value copied into the server when it is
//! created. All options have defaults, so the usual pattern is:
//!
//! ```
//! use hayes::config::AtServerConfig;
//! use hayes::protocol::CommandTerminator;
//! use std::time::Duration;
//!
//! let config = AtServerConfig::new()
//!     .command_terminator(CommandTerminator::Cr)
//!     .stream_timeout(Duration::from_millis(100))
//!     .echo_enabled(false);
//!
//! assert_eq!(config.get_command_terminator(), CommandTerminator::Cr);
//! assert!(config.validate().is_ok());
//! ```

use crate::error::{AtError, AtResult};
use crate::protocol::buffer::DEFAULT_BUFFER_CAPACITY;
use crate::protocol::CommandTerminator;
use std::time::Duration;

/// Default stream timeout
pub const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default state of the echo handling
pub const DEFAULT_ECHO_ENABLED: bool = true;

/// Default state of the logging
pub const DEFAULT_LOG_ENABLED: bool = true;

/// Default category attached to command/response log lines
pub const DEFAULT_LOG_CATEGORY: &str = "ncp.at";

/// Smallest buffer that can hold a bare `AT` plus terminator
const MIN_BUFFER_CAPACITY: usize = 3;

/// AT server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtServerConfig {
    command_terminator: CommandTerminator,
    stream_timeout: Duration,
    echo_enabled: bool,
    log_enabled: bool,
    log_category: String,
    buffer_capacity: usize,
}

impl Default for AtServerConfig {
    fn default() -> Self {
        Self {
            command_terminator: CommandTerminator::default(),
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
            echo_enabled: DEFAULT_ECHO_ENABLED,
            log_enabled: DEFAULT_LOG_ENABLED,
            log_category: DEFAULT_LOG_CATEGORY.to_string(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

impl AtServerConfig {
    /// Creates a settings object with all parameters set to their defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the terminator written before and after every response line.
    pub fn command_terminator(mut self, terminator: CommandTerminator) -> Self {
        self.command_terminator = terminator;
        self
    }

    /// Sets how long `process()` keeps reading after the last drain, and
    /// the maximum time a write may wait for the stream.
    pub fn stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    /// Enables or disables echoing received bytes back to the DTE.
    pub fn echo_enabled(mut self, enabled: bool) -> Self {
        self.echo_enabled = enabled;
        self
    }

    /// Enables or disables TRACE logging of command and response lines.
    pub fn log_enabled(mut self, enabled: bool) -> Self {
        self.log_enabled = enabled;
        self
    }

    /// Sets the category attached to command and response log lines.
    pub fn log_category(mut self, category: impl Into<String>) -> Self {
        self.log_category = category.into();
        self
    }

    /// Sets the capacity of the request buffer, i.e. the longest accepted
    /// command line including its terminator.
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn get_command_terminator(&self) -> CommandTerminator {
        self.command_terminator
    }

    pub fn get_stream_timeout(&self) -> Duration {
        self.stream_timeout
    }

    pub fn is_echo_enabled(&self) -> bool {
        self.echo_enabled
    }

    pub fn is_log_enabled(&self) -> bool {
        self.log_enabled
    }

    pub fn get_log_category(&self) -> &str {
        &self.log_category
    }

    pub fn get_buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    /// Checks that the settings can drive a server.
    pub fn validate(&self) -> AtResult<()> {
        if self.buffer_capacity < MIN_BUFFER_CAPACITY {
            return Err(AtError::InvalidArgument(format!(
                "buffer capacity must be at least {} bytes, got {}",
                MIN_BUFFER_CAPACITY, self.buffer_capacity
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AtServerConfig::default();
        assert_eq!(config.get_command_terminator(), CommandTerminator::CrLf);
        assert_eq!(config.get_stream_timeout(), Duration::from_millis(5000));
        assert!(config.is_echo_enabled());
        assert!(config.is_log_enabled());
        assert_eq!(config.get_log_category(), "ncp.at");
        assert_eq!(config.get_buffer_capacity(), 512);
    }

    #[test]
    fn test_builder_overrides() {
        let config = AtServerConfig::new()
            .command_terminator(CommandTerminator::Lf)
            .stream_timeout(Duration::from_millis(10))
            .echo_enabled(false)
            .log_enabled(false)
            .log_category("modem")
            .buffer_capacity(64);
        assert_eq!(config.get_command_terminator(), CommandTerminator::Lf);
        assert_eq!(config.get_stream_timeout(), Duration::from_millis(10));
        assert!(!config.is_echo_enabled());
        assert!(!config.is_log_enabled());
        assert_eq!(config.get_log_category(), "modem");
        assert_eq!(config.get_buffer_capacity(), 64);
    }

    #[test]
    fn test_validate_rejects_tiny_buffer() {
        let config = AtServerConfig::new().buffer_capacity(2);
        assert!(matches!(config.validate(), Err(AtError::InvalidArgument(_))));
    }
}
