//! Per-Command Request Object
//!
//! A [`Request`] lives for exactly one dispatch step. Handlers use it to
//! read the command's argument, emit intermediate response lines and pick
//! the final result code.
//!
//! ## Output Framing
//!
//! ```text
//! AT+CSQ\r                       <- from the DTE
//! \r\n+CSQ: 20,5\r\n             <- send_response(), first call adds the leading terminator
//! \r\nOK\r\n                     <- final response, written when the Request is dropped
//! ```
//!
//! The final response is written by `Drop`, so it goes out exactly once no
//! matter how the handler exits: normal return, `Err`, or a panic caught by
//! the dispatcher.

use crate::commands::registry::HandlerRegistry;
use crate::error::{AtError, AtResult};
use crate::protocol::parser::ParsedCommand;
use crate::protocol::scan::{scan, ScanValue};
use crate::protocol::{CommandTerminator, CommandType, FinalResponse};
use bytes::{BufMut, BytesMut};
use std::borrow::Cow;
use std::fmt::{self, Write as _};
use tracing::trace;

/// Responses up to this size are formatted without a heap allocation
pub const RESPONSE_STACK_BUFFER_SIZE: usize = 128;

/// Collects outgoing bytes until the server flushes them to the stream.
#[derive(Debug)]
pub struct ResponseWriter {
    pending: BytesMut,
    terminator: CommandTerminator,
    log_enabled: bool,
    log_category: String,
}

impl ResponseWriter {
    pub fn new(terminator: CommandTerminator, log_enabled: bool, log_category: impl Into<String>) -> Self {
        Self {
            pending: BytesMut::with_capacity(RESPONSE_STACK_BUFFER_SIZE),
            terminator,
            log_enabled,
            log_category: log_category.into(),
        }
    }

    pub fn write(&mut self, data: &[u8]) {
        self.pending.put_slice(data);
    }

    pub fn write_new_line(&mut self) {
        self.pending.put_slice(self.terminator.as_bytes());
    }

    /// Logs a received command line (`> AT+CSQ`).
    pub fn log_command(&self, line: &[u8]) {
        if self.log_enabled && !line.is_empty() {
            trace!(category = %self.log_category, "> {}", String::from_utf8_lossy(line));
        }
    }

    /// Logs an outgoing response line (`< OK`).
    pub fn log_response(&self, line: &[u8]) {
        if self.log_enabled && !line.is_empty() {
            trace!(category = %self.log_category, "< {}", String::from_utf8_lossy(line));
        }
    }

    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Takes all pending bytes, leaving the writer empty.
    pub fn take(&mut self) -> BytesMut {
        self.pending.split()
    }
}

/// One command being dispatched.
pub struct Request<'a> {
    /// The line after the `AT` marker, terminator excluded
    line: &'a [u8],
    name_len: usize,
    arg_offset: usize,
    command_type: CommandType,
    final_response: FinalResponse,
    sent_response: bool,
    writer: &'a mut ResponseWriter,
    suspended: &'a mut bool,
    registry: &'a mut HandlerRegistry,
}

impl<'a> Request<'a> {
    /// Creates a request for `line`, the bytes following the marker.
    pub fn new(
        line: &'a [u8],
        command: ParsedCommand,
        writer: &'a mut ResponseWriter,
        suspended: &'a mut bool,
        registry: &'a mut HandlerRegistry,
    ) -> Self {
        debug_assert!(command.line_len <= line.len());
        Self {
            line: &line[..command.line_len],
            name_len: command.name_len,
            arg_offset: command.arg_offset,
            command_type: command.command_type,
            final_response: FinalResponse::Ok,
            sent_response: false,
            writer,
            suspended,
            registry,
        }
    }

    /// The syntactic form the line was parsed as.
    pub fn command_type(&self) -> CommandType {
        self.command_type
    }

    /// The upper-cased command name, e.g. `+CSQ`.
    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.name_bytes())
    }

    pub fn name_bytes(&self) -> &[u8] {
        &self.line[..self.name_len]
    }

    /// Offset of the argument within the line.
    pub fn arg_offset(&self) -> usize {
        self.arg_offset
    }

    pub(crate) fn set_arg_offset(&mut self, offset: usize) {
        self.arg_offset = offset.min(self.line.len());
    }

    /// The argument bytes, e.g. `1,0` for `AT+CFUN=1,0`.
    pub fn read_bytes(&self) -> &[u8] {
        &self.line[self.arg_offset.min(self.line.len())..]
    }

    pub fn read(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.read_bytes())
    }

    /// Copies the argument into `dst`, returning the number of bytes copied.
    pub fn read_into(&self, dst: &mut [u8]) -> usize {
        copy_prefix(self.read_bytes(), dst)
    }

    /// The whole line after the marker, name and suffix included.
    pub fn read_line_bytes(&self) -> &[u8] {
        self.line
    }

    pub fn read_line(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.line)
    }

    /// Copies the whole line into `dst`, returning the number of bytes copied.
    pub fn read_line_into(&self, dst: &mut [u8]) -> usize {
        copy_prefix(self.line, dst)
    }

    /// Extracts scanf-style fields from the argument.
    ///
    /// The number of fields matched is the length of the result.
    pub fn scan(&self, format: &str) -> Vec<ScanValue> {
        scan(&self.read(), format)
    }

    /// Sends an intermediate response line.
    ///
    /// The first response of a request is preceded by the command
    /// terminator; every response is followed by one.
    pub fn send_response<T: fmt::Display>(&mut self, text: T) -> AtResult<()> {
        if !self.sent_response {
            self.writer.write_new_line();
        }
        self.sent_response = true;

        let mut stack = StackBuffer::new();
        match write!(stack, "{}", text) {
            Ok(()) => {
                self.emit_line(stack.as_bytes());
                Ok(())
            }
            Err(_) if stack.overflowed => {
                let heap = format_exact(&text)?;
                self.emit_line(&heap);
                Ok(())
            }
            Err(_) => Err(AtError::Unknown("response formatting failed".to_string())),
        }
    }

    fn emit_line(&mut self, line: &[u8]) {
        if line.is_empty() {
            return;
        }
        self.writer.write(line);
        self.writer.log_response(line);
        self.writer.write_new_line();
    }

    /// Writes just the command terminator.
    pub fn send_new_line(&mut self) -> AtResult<()> {
        self.writer.write_new_line();
        Ok(())
    }

    /// True once at least one intermediate response was sent.
    pub fn sent_response(&self) -> bool {
        self.sent_response
    }

    pub fn set_final_response(&mut self, response: FinalResponse) {
        self.final_response = response;
    }

    pub fn final_response(&self) -> FinalResponse {
        self.final_response
    }

    /// Suspends the server once this command completes.
    ///
    /// Lines already buffered behind this one stay in the buffer until
    /// the owner resumes the server.
    pub fn suspend(&mut self) {
        *self.suspended = true;
    }

    pub fn is_suspended(&self) -> bool {
        *self.suspended
    }

    /// The server's live handler registry.
    ///
    /// Changes take effect from the next command; the current match loop
    /// keeps iterating its own snapshot.
    pub fn registry_mut(&mut self) -> &mut HandlerRegistry {
        self.registry
    }
}

impl Drop for Request<'_> {
    fn drop(&mut self) {
        let literal = self.final_response.as_str().as_bytes();
        self.writer.write_new_line();
        self.writer.log_response(literal);
        self.writer.write(literal);
        self.writer.write_new_line();
    }
}

impl fmt::Debug for Request<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("line", &String::from_utf8_lossy(self.line))
            .field("command_type", &self.command_type)
            .field("arg_offset", &self.arg_offset)
            .field("final_response", &self.final_response)
            .field("sent_response", &self.sent_response)
            .finish()
    }
}

fn copy_prefix(src: &[u8], dst: &mut [u8]) -> usize {
    let n = src.len().min(dst.len());
    dst[..n].copy_from_slice(&src[..n]);
    n
}

/// Fixed stack buffer used for the first formatting attempt.
struct StackBuffer {
    buf: [u8; RESPONSE_STACK_BUFFER_SIZE],
    len: usize,
    overflowed: bool,
}

impl StackBuffer {
    fn new() -> Self {
        Self {
            buf: [0; RESPONSE_STACK_BUFFER_SIZE],
            len: 0,
            overflowed: false,
        }
    }

    fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl fmt::Write for StackBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.len + s.len();
        if end > self.buf.len() {
            self.overflowed = true;
            return Err(fmt::Error);
        }
        self.buf[self.len..end].copy_from_slice(s.as_bytes());
        self.len = end;
        Ok(())
    }
}

/// Counts formatted bytes without storing them.
struct Measure(usize);

impl fmt::Write for Measure {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0 += s.len();
        Ok(())
    }
}

/// Appends formatted text to a pre-sized vector.
struct VecSink<'a>(&'a mut Vec<u8>);

impl fmt::Write for VecSink<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

/// Formats `text` into a heap buffer sized to the exact output length.
fn format_exact<T: fmt::Display>(text: &T) -> AtResult<Vec<u8>> {
    let mut measure = Measure(0);
    write!(measure, "{}", text)
        .map_err(|_| AtError::Unknown("response formatting failed".to_string()))?;

    let mut heap = Vec::new();
    heap.try_reserve_exact(measure.0)
        .map_err(|_| AtError::NoMemory)?;
    write!(VecSink(&mut heap), "{}", text)
        .map_err(|_| AtError::Unknown("response formatting failed".to_string()))?;
    Ok(heap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::classify;

    struct Harness {
        writer: ResponseWriter,
        suspended: bool,
        registry: HandlerRegistry,
    }

    impl Harness {
        fn new(terminator: CommandTerminator) -> Self {
            Self {
                writer: ResponseWriter::new(terminator, true, "test"),
                suspended: false,
                registry: HandlerRegistry::new(),
            }
        }

        fn request<'a>(&'a mut self, line: &'a [u8]) -> Request<'a> {
            let command = classify(line);
            Request::new(
                line,
                command,
                &mut self.writer,
                &mut self.suspended,
                &mut self.registry,
            )
        }

        fn output(&self) -> &[u8] {
            self.writer.pending()
        }
    }

    #[test]
    fn test_drop_writes_ok() {
        let mut h = Harness::new(CommandTerminator::CrLf);
        drop(h.request(b"+CSQ"));
        assert_eq!(h.output(), b"\r\nOK\r\n");
    }

    #[test]
    fn test_response_then_final() {
        let mut h = Harness::new(CommandTerminator::CrLf);
        {
            let mut req = h.request(b"+CSQ");
            req.send_response(format_args!("+CSQ: {},{}", 20, 5)).unwrap();
        }
        assert_eq!(h.output(), b"\r\n+CSQ: 20,5\r\n\r\nOK\r\n");
    }

    #[test]
    fn test_multiple_responses_single_leading_terminator() {
        let mut h = Harness::new(CommandTerminator::Cr);
        {
            let mut req = h.request(b"+COPS=?");
            req.send_response("line one").unwrap();
            req.send_response("line two").unwrap();
            req.set_final_response(FinalResponse::Error);
        }
        assert_eq!(h.output(), b"\rline one\rline two\r\rERROR\r");
    }

    #[test]
    fn test_long_response_uses_exact_heap_buffer() {
        let mut h = Harness::new(CommandTerminator::Lf);
        let long = "x".repeat(300);
        {
            let mut req = h.request(b"I");
            req.send_response(&long).unwrap();
        }
        let expected = format!("\n{}\n\nOK\n", long);
        assert_eq!(h.output(), expected.as_bytes());
    }

    #[test]
    fn test_response_exactly_stack_size() {
        let mut h = Harness::new(CommandTerminator::Lf);
        let text = "y".repeat(RESPONSE_STACK_BUFFER_SIZE);
        {
            let mut req = h.request(b"I");
            req.send_response(&text).unwrap();
        }
        assert!(h.output().starts_with(format!("\n{}\n", text).as_bytes()));
    }

    #[test]
    fn test_send_new_line() {
        let mut h = Harness::new(CommandTerminator::CrLf);
        {
            let mut req = h.request(b"");
            req.send_new_line().unwrap();
        }
        assert_eq!(h.output(), b"\r\n\r\nOK\r\n");
    }

    #[test]
    fn test_read_argument_and_line() {
        let mut h = Harness::new(CommandTerminator::CrLf);
        let req = h.request(b"+CFUN=1,0");
        assert_eq!(req.command_type(), CommandType::Write);
        assert_eq!(req.name(), "+CFUN");
        assert_eq!(req.read(), "1,0");
        assert_eq!(req.read_line(), "+CFUN=1,0");

        let mut small = [0u8; 2];
        assert_eq!(req.read_into(&mut small), 2);
        assert_eq!(&small, b"1,");

        let mut big = [0u8; 32];
        assert_eq!(req.read_line_into(&mut big), 9);
        assert_eq!(&big[..9], b"+CFUN=1,0");
    }

    #[test]
    fn test_read_exec_has_empty_argument() {
        let mut h = Harness::new(CommandTerminator::CrLf);
        let req = h.request(b"+CSQ");
        assert_eq!(req.read(), "");
        assert!(req.read_bytes().is_empty());
    }

    #[test]
    fn test_scan_argument() {
        let mut h = Harness::new(CommandTerminator::CrLf);
        let req = h.request(b"+CGDCONT=1,\"IP\",\"internet\"");
        let values = req.scan("%d,\"%[^\"]\",\"%[^\"]\"");
        assert_eq!(values.len(), 3);
        assert_eq!(values[0].as_int(), Some(1));
        assert_eq!(values[1].as_str(), Some("IP"));
        assert_eq!(values[2].as_str(), Some("internet"));
    }

    #[test]
    fn test_set_arg_offset_clamps() {
        let mut h = Harness::new(CommandTerminator::CrLf);
        let mut req = h.request(b"X3");
        req.set_arg_offset(1);
        assert_eq!(req.read(), "3");
        req.set_arg_offset(99);
        assert_eq!(req.read(), "");
    }

    #[test]
    fn test_suspend_sets_flag() {
        let mut h = Harness::new(CommandTerminator::CrLf);
        {
            let mut req = h.request(b"D123");
            assert!(!req.is_suspended());
            req.set_final_response(FinalResponse::Connect);
            req.suspend();
            assert!(req.is_suspended());
        }
        assert!(h.suspended);
        assert_eq!(h.output(), b"\r\nCONNECT\r\n");
    }

    #[test]
    fn test_writer_take_empties() {
        let mut writer = ResponseWriter::new(CommandTerminator::CrLf, false, "test");
        writer.write(b"abc");
        assert_eq!(&writer.take()[..], b"abc");
        assert!(writer.is_empty());
    }
}
