//! Command Handlers
//!
//! A [`CommandHandler`] binds a command name and type to an action. The
//! action is either a callback or a canned response line that is sent as
//! an intermediate response before the final `OK`.
//!
//! ## Callbacks
//!
//! Callbacks receive the request, the command type they were invoked as and
//! their own (upper-cased) command name. Any state a callback needs is
//! captured by the closure:
//!
//! ```
//! use hayes::commands::CommandHandler;
//! use hayes::protocol::CommandType;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//!
//! let rate = Arc::new(AtomicU32::new(115200));
//! let handler = CommandHandler::new(CommandType::Read, "+ipr", {
//!     let rate = Arc::clone(&rate);
//!     move |req, _ty, _name| {
//!         req.send_response(format_args!("+IPR: {}", rate.load(Ordering::Relaxed)))?;
//!         Ok(())
//!     }
//! });
//! assert_eq!(handler.command(), "+IPR");
//! ```
//!
//! Returning `Err` turns the command's final response into `ERROR`.

use crate::commands::request::Request;
use crate::protocol::CommandType;
use std::fmt;
use std::sync::Arc;

/// Signature of a handler callback.
pub type HandlerFn = dyn Fn(&mut Request<'_>, CommandType, &str) -> anyhow::Result<()> + Send + Sync;

/// What a handler does when selected.
#[derive(Clone)]
pub enum HandlerAction {
    /// Invoke a callback
    Callback(Arc<HandlerFn>),
    /// Send a fixed response line
    Static(&'static str),
    /// Send an owned response line
    Owned(Arc<str>),
}

impl fmt::Debug for HandlerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerAction::Callback(_) => f.write_str("Callback(..)"),
            HandlerAction::Static(s) => f.debug_tuple("Static").field(s).finish(),
            HandlerAction::Owned(s) => f.debug_tuple("Owned").field(s).finish(),
        }
    }
}

/// A registered command handler.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    command_type: CommandType,
    command: String,
    action: HandlerAction,
}

impl CommandHandler {
    /// Creates a handler that invokes `callback`.
    pub fn new<F>(command_type: CommandType, command: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&mut Request<'_>, CommandType, &str) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::with_action(command_type, command, HandlerAction::Callback(Arc::new(callback)))
    }

    /// Creates a handler that answers with a fixed response line.
    pub fn with_static_response(
        command_type: CommandType,
        command: impl Into<String>,
        response: &'static str,
    ) -> Self {
        Self::with_action(command_type, command, HandlerAction::Static(response))
    }

    /// Creates a handler that answers with an owned response line.
    pub fn with_response(
        command_type: CommandType,
        command: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        let response: String = response.into();
        Self::with_action(command_type, command, HandlerAction::Owned(response.into()))
    }

    fn with_action(command_type: CommandType, command: impl Into<String>, action: HandlerAction) -> Self {
        let mut command = command.into();
        command.make_ascii_uppercase();
        Self {
            command_type,
            command,
            action,
        }
    }

    pub fn command_type(&self) -> CommandType {
        self.command_type
    }

    /// The upper-cased command name.
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn action(&self) -> &HandlerAction {
        &self.action
    }

    /// Runs the handler's action for `request`.
    pub fn invoke(&self, request: &mut Request<'_>, command_type: CommandType) -> anyhow::Result<()> {
        match &self.action {
            HandlerAction::Callback(callback) => callback(request, command_type, self.command.as_str()),
            HandlerAction::Static(response) => Ok(request.send_response(response)?),
            HandlerAction::Owned(response) => Ok(request.send_response(response)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::registry::HandlerRegistry;
    use crate::commands::request::ResponseWriter;
    use crate::protocol::{classify, CommandTerminator};

    fn run(handler: &CommandHandler, line: &[u8]) -> (anyhow::Result<()>, Vec<u8>) {
        let mut writer = ResponseWriter::new(CommandTerminator::CrLf, false, "test");
        let mut suspended = false;
        let mut registry = HandlerRegistry::new();
        let result = {
            let mut req = Request::new(line, classify(line), &mut writer, &mut suspended, &mut registry);
            let ty = req.command_type();
            handler.invoke(&mut req, ty)
        };
        (result, writer.take().to_vec())
    }

    #[test]
    fn test_command_is_uppercased() {
        let handler = CommandHandler::with_static_response(CommandType::Exec, "+gmr", "1.0");
        assert_eq!(handler.command(), "+GMR");
        assert_eq!(handler.command_type(), CommandType::Exec);
    }

    #[test]
    fn test_static_response() {
        let handler = CommandHandler::with_static_response(CommandType::Exec, "+GMR", "1.0");
        let (result, out) = run(&handler, b"+GMR");
        assert!(result.is_ok());
        assert_eq!(out, b"\r\n1.0\r\n\r\nOK\r\n");
    }

    #[test]
    fn test_owned_response() {
        let handler = CommandHandler::with_response(CommandType::Exec, "I", format!("rev {}", 7));
        let (result, out) = run(&handler, b"I");
        assert!(result.is_ok());
        assert_eq!(out, b"\r\nrev 7\r\n\r\nOK\r\n");
    }

    #[test]
    fn test_callback_receives_type_and_name() {
        let handler = CommandHandler::new(CommandType::Any, "+x", |req, ty, name| {
            req.send_response(format_args!("{} {}", ty, name))?;
            Ok(())
        });
        let (result, out) = run(&handler, b"+X?");
        assert!(result.is_ok());
        assert_eq!(out, b"\r\nREAD +X\r\n\r\nOK\r\n");
    }

    #[test]
    fn test_callback_error_is_returned() {
        let handler = CommandHandler::new(CommandType::Exec, "+FAIL", |_req, _ty, _name| {
            anyhow::bail!("nope")
        });
        let (result, _) = run(&handler, b"+FAIL");
        assert!(result.is_err());
    }
}
