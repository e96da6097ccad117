//! Conversation state: an append-only log of turns.

use std::collections::HashSet;

use crate::model::{Message, Part, Role, ToolCall, ToolResult};

/// One unit of conversation history.
#[derive(Debug, Clone)]
pub enum Turn {
    User(String),
    Assistant { text: String, calls: Vec<ToolCall> },
    ToolResult(ToolResult),
}

impl Turn {
    fn role(&self) -> Role {
        match self {
            Turn::User(_) | Turn::ToolResult(_) => Role::User,
            Turn::Assistant { .. } => Role::Assistant,
        }
    }

    fn into_parts(self) -> Vec<Part> {
        match self {
            Turn::User(text) => vec![Part::Text(text)],
            Turn::Assistant { text, calls } => {
                let mut parts = Vec::with_capacity(calls.len() + 1);
                if !text.is_empty() {
                    parts.push(Part::Text(text));
                }
                parts.extend(calls.into_iter().map(Part::ToolCall));
                parts
            }
            Turn::ToolResult(result) => vec![Part::ToolResult(result)],
        }
    }
}

/// The growing context re-sent to the model on every call.
///
/// Turns can only be appended; nothing is ever edited or reordered.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::User(text.into()));
    }

    pub fn push_assistant(&mut self, text: impl Into<String>, calls: Vec<ToolCall>) {
        self.turns.push(Turn::Assistant {
            text: text.into(),
            calls,
        });
    }

    pub fn push_tool_result(&mut self, result: ToolResult) {
        self.turns.push(Turn::ToolResult(result));
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Calls from the latest assistant turn that have no result yet.
    pub fn pending_calls(&self) -> Vec<&ToolCall> {
        let Some(start) = self
            .turns
            .iter()
            .rposition(|turn| matches!(turn, Turn::Assistant { .. }))
        else {
            return Vec::new();
        };

        let answered: HashSet<&str> = self.turns[start + 1..]
            .iter()
            .filter_map(|turn| match turn {
                Turn::ToolResult(result) => Some(result.tool_call_id.as_str()),
                _ => None,
            })
            .collect();

        match &self.turns[start] {
            Turn::Assistant { calls, .. } => calls
                .iter()
                .filter(|call| !answered.contains(call.id.as_str()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Translate the log into model messages.
    ///
    /// Consecutive turns with the same role collapse into one message, so
    /// all results for an assistant turn travel together and a user turn
    /// retried after a failed model call joins the earlier one.
    pub fn snapshot(&self) -> Vec<Message> {
        let mut messages: Vec<Message> = Vec::new();
        for turn in self.turns.iter().cloned() {
            let role = turn.role();
            let parts = turn.into_parts();
            if parts.is_empty() {
                continue;
            }
            match messages.last_mut() {
                Some(last) if last.role == role => last.parts.extend(parts),
                _ => messages.push(Message { role, parts }),
            }
        }
        messages
    }
}
