//! AT Protocol Implementation
//!
//! This module contains everything that deals with raw bytes on the wire:
//! buffering partial lines, recognizing the `AT` marker, classifying the
//! command syntax and extracting argument fields.
//!
//! ## Modules
//!
//! - `types`: Command types, final result codes and terminators
//! - `buffer`: Fixed-capacity line buffer
//! - `parser`: Marker scan and syntax classification
//! - `scan`: scanf-style argument extraction
//!
//! ## Example
//!
//! ```
//! use hayes::protocol::{CommandParser, CommandType, LineBuffer};
//!
//! let mut buffer = LineBuffer::new(64);
//! buffer.append(b"noise at+cgdcont=1,\"IP\"\r\n").unwrap();
//!
//! let step = CommandParser::new().parse(&mut buffer);
//! let command = step.command.unwrap();
//! assert_eq!(step.dropped, 6);
//! assert_eq!(command.command_type, CommandType::Write);
//! assert_eq!(&buffer.as_slice()[2..2 + command.name_len], b"+CGDCONT");
//! ```

pub mod buffer;
pub mod parser;
pub mod scan;
pub mod types;

// Re-export commonly used types for convenience
pub use buffer::{LineBuffer, DEFAULT_BUFFER_CAPACITY};
pub use parser::{classify, find_marker, CommandParser, MarkerScan, ParseStep, ParsedCommand};
pub use scan::{scan, ScanValue};
pub use types::{CommandTerminator, CommandType, FinalResponse};
