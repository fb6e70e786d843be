//! # hayes - An AT Command Protocol Engine
//!
//! hayes is the DCE side of the Hayes `AT` command protocol: it reads
//! command lines from a duplex byte stream, dispatches them to registered
//! handlers and writes back intermediate and final responses. A handler can
//! suspend the engine so another protocol (e.g. PPP after `ATD`) can take
//! over the stream, and the owner resumes it later.
//!
//! ## Features
//!
//! - **Hayes syntax**: `AT<cmd>`, `AT<cmd>?`, `AT<cmd>=<args>`, `AT<cmd>=?`
//! - **Longest-name matching**: `+CSQ` wins over `+CS` regardless of
//!   registration order, plus wildcard and integer-suffix handlers
//! - **Guaranteed final response**: exactly one result code per line, even
//!   when a handler fails or panics
//! - **Async I/O**: Built on Tokio; any `AsyncRead + AsyncWrite` stream works
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                               hayes                                     │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  AtServer   │                  │
//! │  │ (Listener)  │    │  Handler    │    │  (session)  │                  │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │                            │                  │                         │
//! │                    data mode (+++)            ▼                         │
//! │                                        ┌─────────────┐                  │
//! │                                        │ LineBuffer  │                  │
//! │                                        │ + Parser    │                  │
//! │                                        └──────┬──────┘                  │
//! │                                               ▼                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │  Request    │<───│  Handler    │<───│ Dispatcher  │                  │
//! │  │ (responses) │    │ (callback)  │    │ + Registry  │                  │
//! │  └─────────────┘    └─────────────┘    └─────────────┘                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use hayes::commands::CommandHandler;
//! use hayes::config::AtServerConfig;
//! use hayes::protocol::{CommandType, FinalResponse};
//! use hayes::server::AtServer;
//! use tokio::net::TcpStream;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let stream = TcpStream::connect("127.0.0.1:5025").await?;
//!     let mut server = AtServer::with_stream(AtServerConfig::default(), stream)?;
//!
//!     // AT+CSQ -> "+CSQ: 20,5" then OK
//!     server.add_command_handler(CommandHandler::new(CommandType::Exec, "+CSQ", |req, _, _| {
//!         req.send_response(format_args!("+CSQ: {},{}", 20, 5))?;
//!         Ok(())
//!     }))?;
//!
//!     // ATD<number> -> CONNECT, then hand the stream to the data protocol
//!     server.add_command_handler(CommandHandler::new(CommandType::Wildcard, "D", |req, _, _| {
//!         req.set_final_response(FinalResponse::Connect);
//!         req.suspend();
//!         Ok(())
//!     }))?;
//!
//!     loop {
//!         server.process().await?;
//!         if server.is_suspended() {
//!             // ... run the data protocol on server.stream_mut() ...
//!             server.resume();
//!         }
//!     }
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: Line buffer, `AT` parser, command types and `scan`
//! - [`commands`]: Handlers, registry, dispatch and the per-line request
//! - [`server`]: The `AtServer` session loop and shared statistics
//! - [`connection`]: TCP client handling with a loopback data mode
//! - [`config`]: Server settings
//! - [`error`]: Error types
//!
//! ## Design Highlights
//!
//! ### Copy-on-Write Registry
//!
//! Dispatch iterates an `Arc` snapshot of the handler list, so handlers can
//! register or remove handlers (themselves included) mid-dispatch.
//!
//! ### Drop-Driven Final Response
//!
//! The final result code is written when the per-line `Request` is dropped,
//! which covers normal returns, errors and caught panics alike.

pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod server;

// Re-export commonly used types for convenience
pub use commands::{CommandHandler, HandlerRegistry, Request};
pub use config::AtServerConfig;
pub use connection::handle_connection;
pub use error::{AtError, AtResult};
pub use protocol::{CommandTerminator, CommandType, FinalResponse};
pub use server::{AtServer, ServerStats};

/// The default port the modem emulator listens on
pub const DEFAULT_PORT: u16 = 5025;

/// The default host the modem emulator binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of hayes
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
