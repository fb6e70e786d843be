//! AT Protocol Wire Types
//!
//! This module defines the small vocabulary shared by the parser, the
//! dispatcher and the response writer.
//!
//! ## Command Syntax
//!
//! Every command line starts with the case-insensitive marker `AT`, followed
//! by the command name and an optional suffix:
//!
//! - `AT+CSQ`       Exec (no suffix)
//! - `AT+CSQ?`      Read
//! - `AT+CSQ=1,2`   Write
//! - `AT+CSQ=?`     Test
//!
//! Input lines end with either `\r` or `\n`. Output lines are framed by the
//! configured [`CommandTerminator`].
//!
//! ## Final Responses
//!
//! Each processed line produces exactly one final response, written as
//! `<terminator><literal><terminator>`, e.g. `\r\nOK\r\n`.

use std::fmt;
use std::str::FromStr;

/// The two-byte command marker
pub const MARKER: &[u8; 2] = b"AT";

/// Syntax bytes recognized after the command name
pub mod syntax {
    pub const WRITE: u8 = b'=';
    pub const READ: u8 = b'?';
    pub const CR: u8 = b'\r';
    pub const LF: u8 = b'\n';
}

/// The syntactic form of a command line, also used as the type a handler
/// is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    /// `AT<name>`
    Exec,
    /// `AT<name>?`
    Read,
    /// `AT<name>=<args>`
    Write,
    /// `AT<name>=?`
    Test,
    /// `AT<name><integer>`, e.g. `ATE0`. Only used for handlers.
    OneIntArg,
    /// Any command whose name starts with the handler's name. Only used for handlers.
    Wildcard,
    /// Any syntactic form. Only used for handlers.
    Any,
}

impl CommandType {
    /// Returns a short uppercase label for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::Exec => "EXEC",
            CommandType::Read => "READ",
            CommandType::Write => "WRITE",
            CommandType::Test => "TEST",
            CommandType::OneIntArg => "ONE_INT_ARG",
            CommandType::Wildcard => "WILDCARD",
            CommandType::Any => "ANY",
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The final result code terminating a command's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FinalResponse {
    #[default]
    Ok,
    Error,
    Busy,
    NoAnswer,
    NoCarrier,
    NoDialtone,
    CmeError,
    CmsError,
    Connect,
}

impl FinalResponse {
    /// The exact wire literal for this result code.
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalResponse::Ok => "OK",
            FinalResponse::Error => "ERROR",
            FinalResponse::Busy => "BUSY",
            FinalResponse::NoAnswer => "NO_ANSWER",
            FinalResponse::NoCarrier => "NO_CARRIER",
            FinalResponse::NoDialtone => "NO_DIALTONE",
            FinalResponse::CmeError => "+CME_ERROR",
            FinalResponse::CmsError => "+CMS_ERROR",
            FinalResponse::Connect => "CONNECT",
        }
    }

    /// Returns true for result codes that report a failure.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            FinalResponse::Error | FinalResponse::CmeError | FinalResponse::CmsError
        )
    }
}

impl fmt::Display for FinalResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Byte sequence framing every outgoing response line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandTerminator {
    /// `\r`
    Cr,
    /// `\n`
    Lf,
    /// `\r\n`. Not strictly V.250, but what most DTEs expect.
    #[default]
    CrLf,
}

impl CommandTerminator {
    /// The raw bytes written for this terminator.
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            CommandTerminator::Cr => b"\r",
            CommandTerminator::Lf => b"\n",
            CommandTerminator::CrLf => b"\r\n",
        }
    }
}

impl FromStr for CommandTerminator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cr" => Ok(CommandTerminator::Cr),
            "lf" => Ok(CommandTerminator::Lf),
            "crlf" => Ok(CommandTerminator::CrLf),
            other => Err(format!("unknown command terminator '{}'", other)),
        }
    }
}

/// Returns true if `byte` ends an input line.
#[inline]
pub fn is_line_end(byte: u8) -> bool {
    byte == syntax::CR || byte == syntax::LF
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_response_literals() {
        let all = [
            (FinalResponse::Ok, "OK"),
            (FinalResponse::Error, "ERROR"),
            (FinalResponse::Busy, "BUSY"),
            (FinalResponse::NoAnswer, "NO_ANSWER"),
            (FinalResponse::NoCarrier, "NO_CARRIER"),
            (FinalResponse::NoDialtone, "NO_DIALTONE"),
            (FinalResponse::CmeError, "+CME_ERROR"),
            (FinalResponse::CmsError, "+CMS_ERROR"),
            (FinalResponse::Connect, "CONNECT"),
        ];
        for (response, literal) in all {
            assert_eq!(response.as_str(), literal);
            assert_eq!(response.to_string(), literal);
        }
    }

    #[test]
    fn test_final_response_default_is_ok() {
        assert_eq!(FinalResponse::default(), FinalResponse::Ok);
    }

    #[test]
    fn test_terminator_bytes() {
        assert_eq!(CommandTerminator::Cr.as_bytes(), b"\r");
        assert_eq!(CommandTerminator::Lf.as_bytes(), b"\n");
        assert_eq!(CommandTerminator::CrLf.as_bytes(), b"\r\n");
        assert_eq!(CommandTerminator::default(), CommandTerminator::CrLf);
    }

    #[test]
    fn test_terminator_from_str() {
        assert_eq!("CRLF".parse::<CommandTerminator>(), Ok(CommandTerminator::CrLf));
        assert_eq!("lf".parse::<CommandTerminator>(), Ok(CommandTerminator::Lf));
        assert!("tab".parse::<CommandTerminator>().is_err());
    }

    #[test]
    fn test_line_end() {
        assert!(is_line_end(b'\r'));
        assert!(is_line_end(b'\n'));
        assert!(!is_line_end(b'A'));
    }
}
