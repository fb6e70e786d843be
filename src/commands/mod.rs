//! Command Handling Module
//!
//! Everything between a classified command line and the bytes written back
//! to the DTE.
//!
//! ## Architecture
//!
//! ```text
//! ParsedCommand
//!       │
//!       ▼
//! ┌─────────────────┐
//! │   Dispatcher    │  select handler (dispatch)
//! └────────┬────────┘
//!          │  snapshot
//!          ▼
//! ┌─────────────────┐
//! │ HandlerRegistry │  longest name first (registry)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  callback or canned line (handler)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    Request      │  read / scan / send_response (request)
//! └────────┬────────┘
//!          │  final response on drop
//!          ▼
//!   ResponseWriter
//! ```

pub mod dispatch;
pub mod handler;
pub mod registry;
pub mod request;

pub use dispatch::{select, DispatchOutcome, Dispatcher, Selection};
pub use handler::{CommandHandler, HandlerAction, HandlerFn};
pub use registry::HandlerRegistry;
pub use request::{Request, ResponseWriter};
