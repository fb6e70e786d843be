//! Connection Handler Module
//!
//! This module serves AT sessions over TCP. Each client connection is
//! handled by its own async task running an [`AtServer`](crate::server::AtServer),
//! so a single process can emulate many modems at once.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (main.rs)                                │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept()
//!                        ▼
//!           ┌────────────────────────┐
//!           │   For each client...   │
//!           └────────────┬───────────┘
//!                        │
//!                        │ spawn task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐   CONNECT +   ┌─────────────┐              │
//! │  │  AtServer   │───suspend────>│  Data mode  │              │
//! │  │  process()  │<────"+++"─────│  loopback   │              │
//! │  └─────────────┘    resume     └─────────────┘              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use hayes::commands::HandlerRegistry;
//! use hayes::config::AtServerConfig;
//! use hayes::connection::handle_connection;
//! use hayes::server::ServerStats;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! # async fn run() -> std::io::Result<()> {
//! let listener = TcpListener::bind("127.0.0.1:5025").await?;
//! let registry = HandlerRegistry::new();
//! let stats = Arc::new(ServerStats::new());
//!
//! // For each accepted connection...
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(
//!     stream,
//!     addr,
//!     AtServerConfig::default(),
//!     registry.clone(),
//!     Arc::clone(&stats),
//! ));
//! # Ok(())
//! # }
//! ```

pub mod handler;

// Re-export commonly used types
pub use handler::{handle_connection, ConnectionError, ConnectionHandler, EscapeDetector, ESCAPE_SEQUENCE};
