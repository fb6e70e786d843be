//! AT Server Session
//!
//! [`AtServer`] owns one line buffer, one handler registry and (usually) one
//! stream. Each call to [`process`](AtServer::process) handles whatever
//! complete lines are buffered, then keeps reading for up to the configured
//! stream timeout, dispatching lines as they complete.
//!
//! ## States
//!
//! ```text
//!            suspend()                       resume()
//!   Active ───────────────> Suspended ───────────────> Active
//!     │                        │
//!     │ process(): read,       │ process(): returns Ok(()) at once,
//!     │ echo, dispatch         │ buffered bytes are kept
//! ```
//!
//! While suspended the owner is free to use the stream for another protocol
//! through [`stream_mut`](AtServer::stream_mut) or
//! [`detach_stream`](AtServer::detach_stream).
//!
//! ## Example
//!
//! ```no_run
//! use hayes::commands::CommandHandler;
//! use hayes::config::AtServerConfig;
//! use hayes::protocol::CommandType;
//! use hayes::server::AtServer;
//! use tokio::net::TcpStream;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let stream = TcpStream::connect("127.0.0.1:5025").await?;
//! let mut server = AtServer::with_stream(AtServerConfig::default(), stream)?;
//! server.add_command_handler(CommandHandler::with_static_response(
//!     CommandType::Exec,
//!     "I",
//!     "hayes",
//! ))?;
//! loop {
//!     server.process().await?;
//! }
//! # }
//! ```

use crate::commands::{
    CommandHandler, DispatchOutcome, Dispatcher, HandlerRegistry, Request, ResponseWriter,
};
use crate::config::AtServerConfig;
use crate::error::{AtError, AtResult};
use crate::protocol::types::MARKER;
use crate::protocol::{CommandParser, CommandType, LineBuffer};
use crate::server::stats::ServerStats;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

/// An AT command server bound to a stream of type `S`.
pub struct AtServer<S> {
    config: AtServerConfig,
    stream: Option<S>,
    buffer: LineBuffer,
    parser: CommandParser,
    dispatcher: Dispatcher,
    registry: HandlerRegistry,
    writer: ResponseWriter,
    suspended: bool,
    stats: Arc<ServerStats>,
}

impl<S> AtServer<S> {
    /// Creates a server with no stream attached.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the configuration does not validate.
    pub fn new(config: AtServerConfig) -> AtResult<Self> {
        config.validate()?;
        let writer = ResponseWriter::new(
            config.get_command_terminator(),
            config.is_log_enabled(),
            config.get_log_category(),
        );
        Ok(Self {
            buffer: LineBuffer::new(config.get_buffer_capacity()),
            config,
            stream: None,
            parser: CommandParser::new(),
            dispatcher: Dispatcher::new(),
            registry: HandlerRegistry::new(),
            writer,
            suspended: false,
            stats: Arc::new(ServerStats::new()),
        })
    }

    /// Creates a server reading commands from `stream`.
    pub fn with_stream(config: AtServerConfig, stream: S) -> AtResult<Self> {
        let mut server = Self::new(config)?;
        server.stream = Some(stream);
        Ok(server)
    }

    /// Replaces the handler registry, e.g. with one shared by all sessions.
    pub fn with_registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Reports into `stats` instead of a private set of counters.
    pub fn with_stats(mut self, stats: Arc<ServerStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn config(&self) -> &AtServerConfig {
        &self.config
    }

    pub fn stats(&self) -> &Arc<ServerStats> {
        &self.stats
    }

    /// Attaches `stream`, returning the previously attached one.
    pub fn attach_stream(&mut self, stream: S) -> Option<S> {
        self.stream.replace(stream)
    }

    /// Detaches and returns the stream. Buffered bytes are kept.
    pub fn detach_stream(&mut self) -> Option<S> {
        self.stream.take()
    }

    pub fn stream_mut(&mut self) -> Option<&mut S> {
        self.stream.as_mut()
    }

    pub fn add_command_handler(&mut self, handler: CommandHandler) -> AtResult<()> {
        self.registry.add(handler)
    }

    pub fn remove_command_handler(&mut self, command: &str, command_type: CommandType) -> AtResult<()> {
        self.registry.remove(command, command_type)
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.registry
    }

    /// Stops command processing until [`resume`](Self::resume) is called.
    pub fn suspend(&mut self) {
        if !self.suspended {
            debug!("AT server suspended");
            self.suspended = true;
        }
    }

    pub fn resume(&mut self) {
        if self.suspended {
            debug!("AT server resumed");
            self.suspended = false;
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Bytes received but not yet consumed as commands or garbage.
    pub fn buffered(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    /// Appends bytes as if they had been read from the stream.
    ///
    /// Used to hand back input that arrived while another protocol owned
    /// the stream. The bytes are parsed by the next `process()` call.
    pub fn feed(&mut self, data: &[u8]) -> AtResult<()> {
        self.buffer.append(data)
    }

    /// Drops buffered input and unsent output.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.writer.take();
    }

    /// Resets the server and hands the stream back to the caller.
    pub fn destroy(mut self) -> Option<S> {
        self.reset();
        self.stream.take()
    }

    /// Parses and dispatches the line at the front of the buffer.
    ///
    /// Returns false if no complete line was available.
    fn process_request(&mut self) -> bool {
        let step = self.parser.parse(&mut self.buffer);
        if step.dropped > 0 {
            trace!(dropped = step.dropped, "Dropped bytes in front of command marker");
            self.stats.garbage_dropped(step.dropped);
        }
        let command = match step.command {
            Some(command) => command,
            None => return false,
        };

        let Self {
            buffer,
            dispatcher,
            registry,
            writer,
            suspended,
            stats,
            ..
        } = self;

        let handlers = registry.snapshot();
        let line = &buffer.as_slice()[MARKER.len()..];
        writer.log_command(&buffer.as_slice()[..MARKER.len() + command.line_len]);

        let outcome = {
            let mut request = Request::new(line, command, writer, suspended, registry);
            dispatcher.dispatch(&handlers, &mut request)
        };
        buffer.consume(command.consumed());

        stats.line_processed();
        match outcome {
            DispatchOutcome::Failed | DispatchOutcome::Panicked => stats.handler_failed(),
            DispatchOutcome::Unmatched => stats.command_unmatched(),
            DispatchOutcome::Bare | DispatchOutcome::Handled => {}
        }
        true
    }
}

impl<S> AtServer<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Processes buffered lines and reads more input for up to the stream
    /// timeout.
    ///
    /// Returns `Ok(())` right away while suspended, and as soon as a
    /// handler suspends the server.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if no stream is attached
    /// - `LineTooLong` if the buffer filled up without a line terminator;
    ///   the buffer is emptied and the server stays usable
    /// - `StreamClosed` if the peer closed the stream
    /// - `Timeout` or `Io` if writing to the stream failed
    pub async fn process(&mut self) -> AtResult<()> {
        if self.suspended {
            return Ok(());
        }
        if self.stream.is_none() {
            return Err(AtError::InvalidState("no stream attached"));
        }

        self.drain().await?;
        if self.suspended {
            return Ok(());
        }

        let deadline = Instant::now() + self.config.get_stream_timeout();
        loop {
            // Drop garbage so noise alone cannot fill the buffer
            self.process_request();

            if self.buffer.is_full() {
                let capacity = self.buffer.capacity();
                warn!(capacity, "Command line exceeds buffer, dropping input");
                self.buffer.clear();
                self.stats.line_overflowed();
                return Err(AtError::LineTooLong { capacity });
            }

            let budget = deadline.saturating_duration_since(Instant::now());
            let read = self.read_some(budget).await?;
            if read > 0 {
                if self.config.is_echo_enabled() {
                    self.echo(read).await?;
                }
                self.drain().await?;
                if self.suspended {
                    return Ok(());
                }
            }

            if budget.is_zero() {
                break;
            }
        }
        Ok(())
    }

    /// Dispatches every complete buffered line, flushing responses after
    /// each one.
    async fn drain(&mut self) -> AtResult<()> {
        while !self.suspended {
            let handled = self.process_request();
            self.flush().await?;
            if !handled {
                break;
            }
        }
        Ok(())
    }

    /// Reads into the free part of the buffer, waiting at most `budget`.
    ///
    /// A zero budget makes exactly one attempt. Returns 0 if nothing
    /// arrived in time.
    async fn read_some(&mut self, budget: Duration) -> AtResult<usize> {
        let stream = self
            .stream
            .as_mut()
            .ok_or(AtError::InvalidState("no stream attached"))?;

        match time::timeout(budget, self.buffer.read_from(stream)).await {
            Ok(Ok(0)) => Err(AtError::StreamClosed),
            Ok(Ok(n)) => {
                trace!(bytes = n, "Read data");
                self.stats.bytes_read(n);
                Ok(n)
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Ok(0),
        }
    }

    /// Writes the last `count` buffered bytes back to the DTE.
    async fn echo(&mut self, count: usize) -> AtResult<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or(AtError::InvalidState("no stream attached"))?;
        let data = self.buffer.tail(count);
        write_with_timeout(stream, data, self.config.get_stream_timeout()).await?;
        self.stats.bytes_written(data.len());
        Ok(())
    }

    async fn flush(&mut self) -> AtResult<()> {
        if self.writer.is_empty() {
            return Ok(());
        }
        let data = self.writer.take();
        let stream = self
            .stream
            .as_mut()
            .ok_or(AtError::InvalidState("no stream attached"))?;
        write_with_timeout(stream, &data, self.config.get_stream_timeout()).await?;
        self.stats.bytes_written(data.len());
        Ok(())
    }
}

/// Writes and flushes `data`, giving up after `limit`.
pub(crate) async fn write_with_timeout<W>(stream: &mut W, data: &[u8], limit: Duration) -> AtResult<()>
where
    W: AsyncWrite + Unpin,
{
    let write = async {
        stream.write_all(data).await?;
        stream.flush().await
    };
    match time::timeout(limit, write).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(AtError::Timeout),
    }
}
