//! Connection Handler Module
//!
//! Runs one [`AtServer`] per TCP client. Each client gets its own task that
//! alternates between command mode and data mode.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Command Mode            │
//!    │                              │
//!    │  AtServer::process()         │
//!    │    read / echo / dispatch    │
//!    │              │               │
//!    │              │ handler       │
//!    │              │ suspends      │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Data Mode (loopback)    │ │
//!    │  │ until "+++"             │ │
//!    │  └───────────┬─────────────┘ │
//!    │              │ OK, resume    │
//!    │              ▼               │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. Client disconnects / error
//!        │
//!        ▼
//! 5. Handler task ends
//! ```
//!
//! ## Data Mode
//!
//! Data mode stands in for the protocol a real modem would switch to after
//! `CONNECT`. Every byte is looped back to the client unchanged, the escape
//! sequence included. Bytes that follow the escape sequence in the same
//! read are handed back to the AT server.

use crate::commands::HandlerRegistry;
use crate::config::AtServerConfig;
use crate::error::AtError;
use crate::protocol::FinalResponse;
use crate::server::session::write_with_timeout;
use crate::server::{AtServer, ServerStats};
use bytes::{BufMut, BytesMut};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Sequence that switches from data mode back to command mode
pub const ESCAPE_SEQUENCE: &[u8] = b"+++";

/// Read size in data mode
const DATA_BUFFER_SIZE: usize = 1024;

/// Finds the escape sequence in a byte stream delivered in chunks.
#[derive(Debug, Default, Clone, Copy)]
pub struct EscapeDetector {
    matched: usize,
}

impl EscapeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk, returning the offset just past the escape sequence
    /// if it completes within `chunk`.
    pub fn scan(&mut self, chunk: &[u8]) -> Option<usize> {
        for (i, &byte) in chunk.iter().enumerate() {
            if byte == ESCAPE_SEQUENCE[self.matched] {
                self.matched += 1;
                if self.matched == ESCAPE_SEQUENCE.len() {
                    self.matched = 0;
                    return Some(i + 1);
                }
            } else {
                self.matched = usize::from(byte == ESCAPE_SEQUENCE[0]);
            }
        }
        None
    }
}

/// Handles a single client connection.
pub struct ConnectionHandler {
    /// The AT server driving this connection
    server: AtServer<TcpStream>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Shared statistics
    stats: Arc<ServerStats>,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The TCP stream for this connection
    /// * `addr` - The client's socket address
    /// * `config` - Settings for the session's AT server
    /// * `registry` - Command handlers, usually shared by all connections
    /// * `stats` - Shared statistics
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        config: AtServerConfig,
        registry: HandlerRegistry,
        stats: Arc<ServerStats>,
    ) -> Result<Self, ConnectionError> {
        let server = AtServer::with_stream(config, stream)?
            .with_registry(registry)
            .with_stats(Arc::clone(&stats));
        stats.session_opened();

        Ok(Self {
            server,
            addr,
            stats,
        })
    }

    /// Runs the connection until the client disconnects or an error occurs.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected gracefully"),
            Err(ConnectionError::ClientDisconnected) => {
                info!(client = %self.addr, "Client disconnected")
            }
            Err(e) if e.is_connection_reset() => {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection error"),
        }

        self.stats.session_closed();
        result
    }

    /// Alternates between AT processing and data mode.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            match self.server.process().await {
                Ok(()) => {}
                Err(AtError::LineTooLong { capacity }) => {
                    debug!(client = %self.addr, capacity, "Dropped overlong command line");
                }
                Err(AtError::StreamClosed) => return Err(ConnectionError::ClientDisconnected),
                Err(e) => return Err(e.into()),
            }

            if self.server.is_suspended() {
                self.data_mode().await?;
            }
        }
    }

    /// Loops data back to the client until the escape sequence arrives,
    /// then resumes the AT server.
    async fn data_mode(&mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Entering data mode");

        let terminator = self.server.config().get_command_terminator();
        let timeout = self.server.config().get_stream_timeout();
        let stream = self
            .server
            .stream_mut()
            .ok_or(AtError::InvalidState("no stream attached"))?;

        let mut detector = EscapeDetector::new();
        let mut buf = [0u8; DATA_BUFFER_SIZE];
        let (read, escape_end) = loop {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                return Err(ConnectionError::ClientDisconnected);
            }
            self.stats.data_mode_bytes(n);

            let escape_end = detector.scan(&buf[..n]);
            let echoed = escape_end.unwrap_or(n);
            write_with_timeout(stream, &buf[..echoed], timeout).await?;
            trace!(client = %self.addr, bytes = echoed, "Looped back data");

            if let Some(end) = escape_end {
                break (n, end);
            }
        };

        let mut ok = BytesMut::with_capacity(16);
        ok.put_slice(terminator.as_bytes());
        ok.put_slice(FinalResponse::Ok.as_str().as_bytes());
        ok.put_slice(terminator.as_bytes());
        write_with_timeout(stream, &ok, timeout).await?;

        info!(client = %self.addr, "Escape sequence received, back in command mode");
        self.server.resume();

        let leftover = &buf[escape_end..read];
        if !leftover.is_empty() {
            if let Err(e) = self.server.feed(leftover) {
                warn!(client = %self.addr, error = %e, "Dropped input following escape sequence");
            }
        }
        Ok(())
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The AT server failed
    #[error("AT server error: {0}")]
    At(#[from] AtError),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,
}

impl ConnectionError {
    fn is_connection_reset(&self) -> bool {
        let io_err = match self {
            ConnectionError::IoError(e) | ConnectionError::At(AtError::Io(e)) => e,
            _ => return false,
        };
        io_err.kind() == std::io::ErrorKind::ConnectionReset
    }
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    config: AtServerConfig,
    registry: HandlerRegistry,
    stats: Arc<ServerStats>,
) {
    let handler = match ConnectionHandler::new(stream, addr, config, registry, stats) {
        Ok(handler) => handler,
        Err(e) => {
            warn!(client = %addr, error = %e, "Failed to start AT session");
            return;
        }
    };

    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ref e if e.is_connection_reset() => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandHandler;
    use crate::protocol::CommandType;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    fn test_registry() -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        registry
            .add(CommandHandler::new(CommandType::Exec, "+CSQ", |req, _, _| {
                req.send_response(format_args!("+CSQ: {},{}", 20, 5))?;
                Ok(())
            }))
            .unwrap();
        registry
            .add(CommandHandler::new(CommandType::Wildcard, "D", |req, _, _| {
                req.set_final_response(FinalResponse::Connect);
                req.suspend();
                Ok(())
            }))
            .unwrap();
        registry
    }

    async fn create_test_server(config: AtServerConfig) -> (SocketAddr, Arc<ServerStats>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stats = Arc::new(ServerStats::new());
        let registry = test_registry();

        let stats_clone = Arc::clone(&stats);
        tokio::spawn(async move {
            while let Ok((stream, client_addr)) = listener.accept().await {
                let stats = Arc::clone(&stats_clone);
                tokio::spawn(handle_connection(
                    stream,
                    client_addr,
                    config.clone(),
                    registry.clone(),
                    stats,
                ));
            }
        });

        (addr, stats)
    }

    fn test_config() -> AtServerConfig {
        AtServerConfig::new()
            .stream_timeout(Duration::from_millis(50))
            .echo_enabled(false)
            .log_enabled(false)
    }

    /// Reads until the received bytes end with `expected` or two seconds pass.
    async fn read_until(client: &mut TcpStream, expected: &str) -> String {
        let mut received = Vec::new();
        let mut buf = [0u8; 256];
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);

        while !received.ends_with(expected.as_bytes()) && tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(100), client.read(&mut buf)).await {
                Ok(Ok(n)) if n > 0 => received.extend_from_slice(&buf[..n]),
                Ok(_) => break,
                Err(_) => {}
            }
        }
        String::from_utf8_lossy(&received).into_owned()
    }

    #[test]
    fn test_escape_detector_single_chunk() {
        let mut detector = EscapeDetector::new();
        assert_eq!(detector.scan(b"hello"), None);
        assert_eq!(detector.scan(b"ab+++AT\r"), Some(5));
    }

    #[test]
    fn test_escape_detector_across_chunks() {
        let mut detector = EscapeDetector::new();
        assert_eq!(detector.scan(b"x+"), None);
        assert_eq!(detector.scan(b"+"), None);
        assert_eq!(detector.scan(b"+tail"), Some(1));
    }

    #[test]
    fn test_escape_detector_reset_by_other_bytes() {
        let mut detector = EscapeDetector::new();
        assert_eq!(detector.scan(b"++a+"), None);
        assert_eq!(detector.scan(b"+"), None);
        assert_eq!(detector.scan(b"+"), Some(1));
        assert_eq!(detector.scan(b"++++"), Some(3));
    }

    #[tokio::test]
    async fn test_command_over_tcp() {
        let (addr, _) = create_test_server(test_config()).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"AT+CSQ\r\n").await.unwrap();
        let expected = "\r\n+CSQ: 20,5\r\n\r\nOK\r\n";
        assert_eq!(read_until(&mut client, expected).await, expected);

        client.write_all(b"ATZZZ\r\n").await.unwrap();
        assert_eq!(read_until(&mut client, "\r\nERROR\r\n").await, "\r\nERROR\r\n");
    }

    #[tokio::test]
    async fn test_echo_over_tcp() {
        let (addr, _) = create_test_server(test_config().echo_enabled(true)).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"AT\r").await.unwrap();
        assert_eq!(read_until(&mut client, "\r\nOK\r\n").await, "AT\r\r\nOK\r\n");
    }

    #[tokio::test]
    async fn test_data_mode_handoff() {
        let (addr, stats) = create_test_server(test_config()).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"ATD5551234\r").await.unwrap();
        assert_eq!(read_until(&mut client, "\r\nCONNECT\r\n").await, "\r\nCONNECT\r\n");

        // Looped back, not parsed as a command
        client.write_all(b"AT+CSQ\r").await.unwrap();
        assert_eq!(read_until(&mut client, "AT+CSQ\r").await, "AT+CSQ\r");

        // Escape, then a command in the same segment
        client.write_all(b"+++AT+CSQ\r").await.unwrap();
        let expected = "+++\r\nOK\r\n\r\n+CSQ: 20,5\r\n\r\nOK\r\n";
        assert_eq!(read_until(&mut client, expected).await, expected);

        assert!(stats.data_mode_bytes.load(Ordering::Relaxed) >= 10);
    }

    #[tokio::test]
    async fn test_overlong_line_keeps_connection() {
        let (addr, stats) = create_test_server(test_config().buffer_capacity(16)).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"AT+XXXXXXXXXXXXXXXXXXXX").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        client.write_all(b"\rAT\r").await.unwrap();
        assert_eq!(read_until(&mut client, "\r\nOK\r\n").await, "\r\nOK\r\n");
        assert_eq!(stats.line_overflows.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let (addr, stats) = create_test_server(test_config()).await;

        assert_eq!(stats.active_sessions.load(Ordering::Relaxed), 0);

        let mut client = TcpStream::connect(addr).await.unwrap();

        // Give the server time to accept the connection
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(stats.sessions_opened.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_sessions.load(Ordering::Relaxed), 1);

        client.write_all(b"AT\r\n").await.unwrap();
        read_until(&mut client, "\r\nOK\r\n").await;

        assert!(stats.lines_processed.load(Ordering::Relaxed) >= 1);
        assert!(stats.bytes_read.load(Ordering::Relaxed) > 0);
        assert!(stats.bytes_written.load(Ordering::Relaxed) > 0);

        drop(client);

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(stats.active_sessions.load(Ordering::Relaxed), 0);
    }
}
