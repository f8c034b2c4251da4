//! Project attribute blocks.
//!
//! A project keeps its settings as a CRLF-separated list of commands, one
//! attribute per line, the first token being the attribute name:
//!
//! ```text
//! ws_accept http://127.0.0.1:9000/verify
//! pattern /api "http://backend:8080"
//! ```
//!
//! The server only reads `ws_accept*` from it (the verifier endpoint), but
//! the block is edited as a whole so unrelated lines survive a rewrite.

use crate::command::{render_block, tokenize_block};

/// An ordered list of attribute commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeBlock {
    lines: Vec<Vec<String>>,
}

impl AttributeBlock {
    /// Parses a CRLF block.
    pub fn parse(text: &str) -> Self {
        Self {
            lines: tokenize_block(text),
        }
    }

    /// Arguments of the first line whose name is exactly `name`, or an
    /// empty slice when there is none.
    pub fn get(&self, name: &str) -> &[String] {
        self.lines
            .iter()
            .find(|line| line.first().is_some_and(|n| n == name))
            .map(|line| &line[1..])
            .unwrap_or(&[])
    }

    /// Arguments of every line whose name starts with `prefix`, in order.
    pub fn get_like(&self, prefix: &str) -> Vec<&[String]> {
        self.lines
            .iter()
            .filter(|line| line.first().is_some_and(|n| n.starts_with(prefix)))
            .map(|line| &line[1..])
            .collect()
    }

    /// Replaces the first line with the same name as `command`, or appends
    /// it. Empty commands are ignored.
    pub fn set(&mut self, command: Vec<String>) {
        let Some(name) = command.first() else {
            return;
        };
        match self
            .lines
            .iter_mut()
            .find(|line| line.first() == Some(name))
        {
            Some(line) => *line = command,
            None => self.lines.push(command),
        }
    }

    /// Removes every line named `name`. Returns `true` if any was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.lines.len();
        self.lines
            .retain(|line| line.first().is_none_or(|n| n != name));
        self.lines.len() != before
    }

    /// Number of lines, blank ones included.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns `true` if the block has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Renders the block back to its CRLF text form.
    pub fn render(&self) -> String {
        render_block(&self.lines)
    }
}
