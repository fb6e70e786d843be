//! AT Command Line Parser
//!
//! The parser works in two steps on the front of a [`LineBuffer`]:
//!
//! 1. **Marker scan**: look for the case-insensitive `AT` marker. Every byte
//!    in front of the first possible marker is noise (line noise, stray
//!    terminators, the tail of a previous CRLF) and is dropped right away,
//!    even before a full line has arrived, so garbage cannot fill the buffer.
//! 2. **Classification**: once a complete line starts with `AT`, find the
//!    first `=` or `?` to decide which of the four syntaxes it uses.
//!
//! ## Syntax Table
//!
//! | Line             | Type  | Argument      |
//! |------------------|-------|---------------|
//! | `AT+CSQ`         | Exec  | (none)        |
//! | `AT+CSQ?`        | Read  | after `?`     |
//! | `AT+CSQ=1`       | Write | `1`           |
//! | `AT+CSQ=?`       | Test  | (none)        |
//! | `AT+CSQ=?junk`   | Write | `?junk`       |
//!
//! The last row is deliberate: some DTEs send `=?` followed by data and
//! expect it to be treated as a write.
//!
//! All offsets in [`ParsedCommand`] are relative to the byte right after
//! the marker, i.e. the first byte of the command name.

use crate::protocol::buffer::LineBuffer;
use crate::protocol::types::{syntax, CommandType, MARKER};

/// Where the first possible `AT` marker sits in a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerScan {
    /// Number of leading bytes that cannot be part of a command
    pub skip: usize,
    /// True if a full two-byte marker was found at `skip`
    pub found: bool,
}

/// A classified command line sitting at the front of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Syntactic form of the line
    pub command_type: CommandType,
    /// Length of the command name
    pub name_len: usize,
    /// Length of the line after the marker, terminator excluded
    pub line_len: usize,
    /// Start of the argument bytes
    pub arg_offset: usize,
}

impl ParsedCommand {
    /// Bytes to drop from the buffer once the line has been handled,
    /// marker and single terminator byte included.
    pub fn consumed(&self) -> usize {
        MARKER.len() + self.line_len + 1
    }

    /// True for a bare `AT` line.
    pub fn is_empty(&self) -> bool {
        self.name_len == 0
    }
}

/// Outcome of one parse step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseStep {
    /// Garbage bytes dropped from the front of the buffer
    pub dropped: usize,
    /// The command now at the front of the buffer, if a full line is present
    pub command: Option<ParsedCommand>,
}

/// Stateless parser for AT command lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandParser;

impl CommandParser {
    pub fn new() -> Self {
        Self
    }

    /// Drops leading garbage and classifies the command line at the front.
    ///
    /// The command name is upper-cased in place. The line itself is left in
    /// the buffer; the caller consumes [`ParsedCommand::consumed`] bytes
    /// once it is done with it.
    pub fn parse(&self, buffer: &mut LineBuffer) -> ParseStep {
        let scan = find_marker(buffer.as_slice());
        if scan.skip > 0 {
            buffer.consume(scan.skip);
        }
        if !scan.found {
            return ParseStep {
                dropped: scan.skip,
                command: None,
            };
        }

        let end = match buffer.find_line() {
            Some(end) => end,
            None => {
                return ParseStep {
                    dropped: scan.skip,
                    command: None,
                }
            }
        };

        let command = classify(&buffer.as_slice()[MARKER.len()..end]);
        let name_start = MARKER.len();
        buffer.as_mut_slice()[name_start..name_start + command.name_len].make_ascii_uppercase();

        ParseStep {
            dropped: scan.skip,
            command: Some(command),
        }
    }
}

/// Finds the first possible `AT` marker in `buf`.
///
/// A trailing lone `A` counts as a possible marker start and is kept.
pub fn find_marker(buf: &[u8]) -> MarkerScan {
    for (i, byte) in buf.iter().enumerate() {
        if !byte.eq_ignore_ascii_case(&MARKER[0]) {
            continue;
        }
        match buf.get(i + 1) {
            None => return MarkerScan { skip: i, found: false },
            Some(next) if next.eq_ignore_ascii_case(&MARKER[1]) => {
                return MarkerScan { skip: i, found: true }
            }
            Some(_) => {}
        }
    }
    MarkerScan {
        skip: buf.len(),
        found: false,
    }
}

/// Classifies a command line body (the bytes between the marker and the
/// terminator).
pub fn classify(body: &[u8]) -> ParsedCommand {
    let len = body.len();
    for (i, &byte) in body.iter().enumerate() {
        if byte == syntax::WRITE {
            let command_type = if body.get(i + 1) == Some(&syntax::READ) && i + 2 == len {
                CommandType::Test
            } else {
                CommandType::Write
            };
            let arg_offset = if command_type == CommandType::Test {
                i + 2
            } else {
                i + 1
            };
            return ParsedCommand {
                command_type,
                name_len: i,
                line_len: len,
                arg_offset,
            };
        }
        if byte == syntax::READ {
            return ParsedCommand {
                command_type: CommandType::Read,
                name_len: i,
                line_len: len,
                arg_offset: i + 1,
            };
        }
    }
    ParsedCommand {
        command_type: CommandType::Exec,
        name_len: len,
        line_len: len,
        arg_offset: len,
    }
}
