//! Handler Registry
//!
//! The registry keeps handlers sorted by descending command-name length, so
//! when names are prefixes of each other (`+CS`, `+CSQ`) the longest, most
//! specific one is tried first. The sort is stable: handlers with names of
//! equal length keep their registration order.
//!
//! ## Copy-on-Write
//!
//! The handler list lives behind an `Arc`. Dispatch iterates a
//! [`snapshot`](HandlerRegistry::snapshot), and the first modification after
//! a snapshot was taken clones the list. Handlers can therefore add or
//! remove handlers (including themselves) while they run, and cloning a
//! registry to hand it to another session is cheap.

use crate::commands::handler::CommandHandler;
use crate::error::{AtError, AtResult};
use crate::protocol::types::{is_line_end, syntax};
use crate::protocol::CommandType;
use std::sync::Arc;

/// Ordered collection of command handlers.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<Vec<CommandHandler>>,
    /// Maximum number of handlers, if bounded
    limit: Option<usize>,
}

impl HandlerRegistry {
    /// Creates an empty, unbounded registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry that holds at most `limit` handlers.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
            limit: Some(limit),
        }
    }

    /// Registers a handler.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if the command name cannot be matched by any line
    /// - `NoMemory` if the registry is full or cannot grow
    pub fn add(&mut self, handler: CommandHandler) -> AtResult<()> {
        validate(&handler)?;
        if self.limit.is_some_and(|limit| self.handlers.len() >= limit) {
            return Err(AtError::NoMemory);
        }

        let handlers = Arc::make_mut(&mut self.handlers);
        handlers.try_reserve(1).map_err(|_| AtError::NoMemory)?;
        handlers.push(handler);
        // Descending by name length
        handlers.sort_by(|a, b| b.command().len().cmp(&a.command().len()));
        Ok(())
    }

    /// Removes every handler registered for `command` with type `command_type`.
    ///
    /// `CommandType::Any` removes the command's handlers of every type.
    ///
    /// # Errors
    ///
    /// `NotFound` if nothing was removed.
    pub fn remove(&mut self, command: &str, command_type: CommandType) -> AtResult<()> {
        let matches = |h: &CommandHandler| {
            (command_type == CommandType::Any || h.command_type() == command_type)
                && h.command().eq_ignore_ascii_case(command)
        };

        if !self.handlers.iter().any(matches) {
            return Err(AtError::NotFound);
        }
        Arc::make_mut(&mut self.handlers).retain(|h| !matches(h));
        Ok(())
    }

    /// Returns the current handler list, unaffected by later changes.
    pub fn snapshot(&self) -> Arc<Vec<CommandHandler>> {
        Arc::clone(&self.handlers)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CommandHandler> {
        self.handlers.iter()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn clear(&mut self) {
        self.handlers = Arc::new(Vec::new());
    }
}

/// Rejects names that no parsed command line could ever match.
fn validate(handler: &CommandHandler) -> AtResult<()> {
    let name = handler.command();
    let allows_empty = matches!(
        handler.command_type(),
        CommandType::Wildcard | CommandType::Any
    );
    if name.is_empty() && !allows_empty {
        return Err(AtError::InvalidArgument(format!(
            "empty command name for {} handler",
            handler.command_type()
        )));
    }
    if let Some(bad) = name.bytes().find(|&b| {
        b == syntax::WRITE
            || b == syntax::READ
            || is_line_end(b)
            || b.is_ascii_whitespace()
            || !b.is_ascii_graphic()
    }) {
        return Err(AtError::InvalidArgument(format!(
            "command name '{}' contains invalid byte {:#04x}",
            name.escape_debug(),
            bad
        )));
    }
    Ok(())
}
