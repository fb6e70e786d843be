//! Command Dispatch
//!
//! Picks the handler for a parsed command line and runs it.
//!
//! ## Matching
//!
//! Handlers are tried in registry order (longest name first):
//!
//! 1. **Name match**: the handler's name equals the parsed name, or the
//!    handler is `Wildcard` and its name is a prefix of the parsed name.
//!    The handler is selected if its type equals the parsed type or is
//!    `Any`/`Wildcard`; otherwise the search continues.
//! 2. **Integer suffix**: failing a name match, a `OneIntArg` handler is
//!    selected for an `Exec` line whose name is the handler's name followed
//!    by a signed integer (`ATX3` for handler `X`).
//!
//! A bare `AT` line is answered with `OK` without consulting handlers, and
//! a line nothing matches is answered with `ERROR`.

use crate::commands::handler::CommandHandler;
use crate::commands::request::Request;
use crate::protocol::{CommandType, FinalResponse};
use std::panic::{self, AssertUnwindSafe};
use tracing::{error, warn};

/// A handler chosen for a command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Position of the handler in the list that was searched
    pub index: usize,
    /// Command type passed to the handler's callback
    pub invoke_type: CommandType,
    /// Replacement argument offset, if the match dictates one
    pub arg_offset: Option<usize>,
}

/// What happened to a dispatched line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Bare `AT`, answered with `OK`
    Bare,
    /// A handler ran and returned `Ok`
    Handled,
    /// A handler returned `Err`
    Failed,
    /// A handler panicked
    Panicked,
    /// No handler matched
    Unmatched,
}

/// Finds the handler for `name` parsed as `command_type`.
///
/// `name` must already be upper-cased.
pub fn select(handlers: &[CommandHandler], name: &[u8], command_type: CommandType) -> Option<Selection> {
    for (index, handler) in handlers.iter().enumerate() {
        let command = handler.command().as_bytes();
        let handler_type = handler.command_type();

        let name_match = command == name
            || (handler_type == CommandType::Wildcard && name.starts_with(command));

        if name_match {
            if handler_type == command_type
                || handler_type == CommandType::Any
                || handler_type == CommandType::Wildcard
            {
                // Only exec lines carry the argument in the name tail
                let arg_offset = (handler_type == CommandType::Wildcard
                    && command_type == CommandType::Exec
                    && command.len() < name.len())
                .then_some(command.len());
                return Some(Selection {
                    index,
                    invoke_type: command_type,
                    arg_offset,
                });
            }
            continue;
        }

        if handler_type == CommandType::OneIntArg
            && command_type == CommandType::Exec
            && name.starts_with(command)
            && is_integer(&name[command.len()..])
        {
            return Some(Selection {
                index,
                invoke_type: CommandType::OneIntArg,
                arg_offset: Some(command.len()),
            });
        }
    }
    None
}

/// Leading whitespace is skipped, trailing bytes are not.
fn is_integer(bytes: &[u8]) -> bool {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.trim_start_matches(|c: char| c.is_ascii_whitespace()).parse::<i32>().ok())
        .is_some()
}

/// Runs the matching policy against a request.
#[derive(Debug, Default, Clone, Copy)]
pub struct Dispatcher;

impl Dispatcher {
    pub fn new() -> Self {
        Self
    }

    /// Selects and invokes the handler for `request`, setting its final
    /// response accordingly.
    ///
    /// Handler errors and panics are contained here; they only turn the
    /// final response into `ERROR`.
    pub fn dispatch(&self, handlers: &[CommandHandler], request: &mut Request<'_>) -> DispatchOutcome {
        if request.name_bytes().is_empty() {
            request.set_final_response(FinalResponse::Ok);
            return DispatchOutcome::Bare;
        }

        let selection = match select(handlers, request.name_bytes(), request.command_type()) {
            Some(selection) => selection,
            None => {
                request.set_final_response(FinalResponse::Error);
                return DispatchOutcome::Unmatched;
            }
        };

        let handler = &handlers[selection.index];
        if let Some(offset) = selection.arg_offset {
            request.set_arg_offset(offset);
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            handler.invoke(request, selection.invoke_type)
        }));

        match result {
            Ok(Ok(())) => DispatchOutcome::Handled,
            Ok(Err(e)) => {
                warn!(
                    command = handler.command(),
                    command_type = %selection.invoke_type,
                    "Handler failed: {:#}",
                    e
                );
                request.set_final_response(FinalResponse::Error);
                DispatchOutcome::Failed
            }
            Err(_) => {
                error!(
                    command = handler.command(),
                    command_type = %selection.invoke_type,
                    "Handler panicked"
                );
                request.set_final_response(FinalResponse::Error);
                DispatchOutcome::Panicked
            }
        }
    }
}
