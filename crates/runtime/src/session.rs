//! The orchestration loop: model call, tool dispatch, repeat.

use std::collections::HashSet;

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::conversation::Conversation;
use crate::model::{Backend, ModelRequest, Reply, ToolCall, ToolResult, Usage};
use crate::tools::{ToolError, ToolHost};
use crate::{Error, Result};

/// Default cap on model calls per user message.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// One tool call made while answering a user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub call_id: String,
    pub name: String,
    pub is_error: bool,
}

/// The outcome of a user turn.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub invocations: Vec<Invocation>,
    pub usage: Usage,
}

/// A conversation driven by a model backend with access to a tool host.
pub struct Session<B, H> {
    backend: B,
    tools: H,
    conversation: Conversation,
    max_iterations: usize,
}

impl<B: Backend, H: ToolHost> Session<B, H> {
    pub fn new(backend: B, tools: H) -> Self {
        Self {
            backend,
            tools,
            conversation: Conversation::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Cap model calls per user message. Values below one are raised to one.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn tools(&self) -> &H {
        &self.tools
    }

    /// Swap in a new tool host, returning the old one.
    ///
    /// The conversation is kept; the next model call advertises the new
    /// host's tools.
    pub fn replace_tools(&mut self, tools: H) -> H {
        std::mem::replace(&mut self.tools, tools)
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Send a user message and run the loop until the model answers.
    ///
    /// On error the conversation keeps everything appended so far, with
    /// every tool call resolved by a result turn.
    pub async fn chat(&mut self, input: &str) -> Result<Answer> {
        self.conversation.push_user(input);

        let mut invocations = Vec::new();
        let mut usage = Usage::default();

        for iteration in 1..=self.max_iterations {
            let messages = self.conversation.snapshot();
            debug!(iteration, messages = messages.len(), "model call");

            let response = self
                .backend
                .call(ModelRequest {
                    messages: &messages,
                    tools: self.tools.specs(),
                })
                .await?;
            usage += response.usage;

            let (text, calls) = match response.reply {
                Reply::Final { text } => {
                    self.conversation.push_assistant(text.clone(), Vec::new());
                    debug!(iteration, tools = invocations.len(), "final answer");
                    return Ok(Answer {
                        text,
                        invocations,
                        usage,
                    });
                }
                Reply::ToolUse { text, calls } => (text, calls),
            };

            warn_duplicate_ids(&calls);
            self.conversation.push_assistant(text, calls.clone());

            let outcomes = self.dispatch(&calls).await;

            let mut fatal = None;
            for (call, outcome) in calls.iter().zip(outcomes) {
                let result = match outcome {
                    Ok(output) => ToolResult::success(call, output),
                    Err(error) => {
                        if error.is_fatal() && fatal.is_none() {
                            fatal = Some(error.clone());
                        }
                        ToolResult::failure(call, error)
                    }
                };
                invocations.push(Invocation {
                    call_id: call.id.clone(),
                    name: call.name.clone(),
                    is_error: result.outcome.is_error(),
                });
                self.conversation.push_tool_result(result);
            }

            if let Some(error) = fatal {
                return Err(Error::Tool(error));
            }
        }

        warn!(limit = self.max_iterations, "model kept calling tools");
        Err(Error::LoopLimitExceeded {
            limit: self.max_iterations,
        })
    }

    /// Run every call concurrently; outcomes come back in call order.
    async fn dispatch(&self, calls: &[ToolCall]) -> Vec<std::result::Result<Value, ToolError>> {
        let tools = &self.tools;
        join_all(calls.iter().map(|call| async move {
            info!(tool = %call.name, id = %call.id, "calling tool");
            let outcome = tools.execute(call).await;
            if let Err(e) = &outcome {
                warn!(tool = %call.name, id = %call.id, error = %e, "tool call failed");
            }
            outcome
        }))
        .await
    }
}

fn warn_duplicate_ids(calls: &[ToolCall]) {
    let mut seen = HashSet::new();
    for call in calls {
        if !seen.insert(call.id.as_str()) {
            warn!(id = %call.id, "model reused a tool call id within one turn");
        }
    }
}
