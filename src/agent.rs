//! The cooking assistant: one chat agent, one conversation thread.
//!
//! ```text
//!   user message
//!        │
//!        ▼
//!  ┌─────────────┐  stream_turn   ┌─────────────┐
//!  │CookingAgent │ ─────────────► │ ChatBackend │
//!  │  (thread)   │ ◄───────────── │             │
//!  └──────┬──────┘  Text/ToolCall └─────────────┘
//!         │ tool calls
//!         ▼
//!   ToolRegistry::call ──► tool result appended, next round
//! ```
//!
//! A turn may take several rounds: whenever the model answers with tool
//! calls, the calls are executed and their results sent back, up to
//! `max_tool_rounds`. The final round offers no tools, so the model has to
//! answer in text. Text from every round is concatenated into the reply.
//!
//! The thread only changes when a turn completes. A turn that fails, or
//! whose future is dropped by a timeout, leaves the history untouched.
//!
//! The process holds at most one agent. [`AgentCell`] builds it on first
//! use; if construction fails the cell stays empty and the next caller
//! tries again.

use futures::future::{BoxFuture, FutureExt};
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use uuid::Uuid;

use crate::chat::{ChatBackend, ChatEvent, ChatMessage, OpenAiChatBackend, ToolCall};
use crate::config::{credential, ChatConfig};
use crate::error::ChefError;
use crate::traits::{ToolContext, ToolRegistry};

pub const AGENT_NAME: &str = "CookingChef";

pub const INSTRUCTIONS: &str = "You are an expert cooking assistant AI chef. \
Help users find recipes, extract ingredients, and provide cooking advice. \
You have access to: 1. A recipe search tool to find recipes by ingredients \
2. An ingredient extraction tool to parse recipes 3. A nutrition information tool. \
Always be friendly, provide detailed cooking tips, and ask clarifying questions when needed.";

/// Reply used when the model produced no text at all.
pub const EMPTY_REPLY: &str = "I'm thinking about that. Could you ask again?";

/// Reply used when a chat turn exceeds its time limit.
pub const TIMEOUT_REPLY: &str =
    "Request timed out. Please check that your GITHUB_TOKEN is configured and valid.";

/// Snapshot of a conversation thread.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationThread {
    pub id: Uuid,
    pub messages: Vec<ChatMessage>,
}

impl ConversationThread {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            messages: Vec::new(),
        }
    }
}

pub struct CookingAgent {
    name: String,
    instructions: String,
    backend: Box<dyn ChatBackend>,
    tools: Arc<ToolRegistry>,
    ctx: ToolContext,
    thread: Mutex<ConversationThread>,
    max_response_chars: usize,
    max_tool_rounds: usize,
}

impl CookingAgent {
    pub fn new(backend: Box<dyn ChatBackend>, tools: Arc<ToolRegistry>, ctx: ToolContext) -> Self {
        let defaults = ChatConfig::default();
        Self {
            name: AGENT_NAME.to_string(),
            instructions: INSTRUCTIONS.to_string(),
            backend,
            tools,
            ctx,
            thread: Mutex::new(ConversationThread::new()),
            max_response_chars: defaults.max_response_chars,
            max_tool_rounds: defaults.max_tool_rounds,
        }
    }

    pub fn with_limits(mut self, max_response_chars: usize, max_tool_rounds: usize) -> Self {
        self.max_response_chars = max_response_chars;
        self.max_tool_rounds = max_tool_rounds;
        self
    }

    /// Agent backed by the OpenAI-compatible endpoint in `config`.
    ///
    /// The API token is read from the environment variable named by
    /// `config.token_env`.
    pub fn from_config(
        config: &ChatConfig,
        tools: Arc<ToolRegistry>,
        ctx: ToolContext,
    ) -> Result<Self, ChefError> {
        let token = credential(&config.token_env).ok_or_else(|| ChefError::MissingCredential {
            var: config.token_env.clone(),
        })?;
        let backend = OpenAiChatBackend::new(config, token)
            .map_err(|e| ChefError::AgentInit(format!("{:#}", e)))?;

        tracing::info!(agent = AGENT_NAME, model = %config.model, "cooking agent ready");
        Ok(Self::new(Box::new(backend), tools, ctx)
            .with_limits(config.max_response_chars, config.max_tool_rounds))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Copy of the conversation so far.
    pub async fn history(&self) -> ConversationThread {
        self.thread.lock().await.clone()
    }

    /// Run one conversation turn. Never fails: errors become the reply text.
    pub async fn chat(&self, message: &str) -> String {
        match self.run_turn(message).await {
            Ok(reply) if reply.is_empty() => EMPTY_REPLY.to_string(),
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(error = %format!("{:#}", e), "chat turn failed");
                format!("Error processing request: {:#}", e)
            }
        }
    }

    async fn run_turn(&self, message: &str) -> anyhow::Result<String> {
        let mut thread = self.thread.lock().await;
        let specs = self.tools.function_specs();
        tracing::debug!(
            agent = %self.name,
            model = self.backend.model_name(),
            history = thread.messages.len(),
            "chat turn"
        );

        let mut turn = vec![ChatMessage::user(message)];
        let mut reply = ReplyBuffer::new(self.max_response_chars);

        for round in 0..=self.max_tool_rounds {
            let offer_tools = round < self.max_tool_rounds;
            let mut messages = Vec::with_capacity(thread.messages.len() + turn.len() + 1);
            messages.push(ChatMessage::system(self.instructions.as_str()));
            messages.extend(thread.messages.iter().cloned());
            messages.extend(turn.iter().cloned());

            let tools: &[Value] = if offer_tools { &specs } else { &[] };
            let mut stream = self.backend.stream_turn(&messages, tools).await?;

            let mut round_text = String::new();
            let mut calls: Vec<ToolCall> = Vec::new();
            while let Some(event) = stream.next().await {
                match event? {
                    ChatEvent::Text(fragment) => round_text.push_str(reply.push(&fragment)),
                    ChatEvent::ToolCall(call) => calls.push(call),
                }
            }

            if calls.is_empty() || !offer_tools {
                if !calls.is_empty() {
                    tracing::warn!(calls = calls.len(), "ignoring tool calls past the round limit");
                }
                turn.push(ChatMessage::assistant(round_text));
                break;
            }

            turn.push(ChatMessage::assistant_tool_calls(round_text, calls.clone()));
            for call in &calls {
                let output = self.dispatch(call).await;
                turn.push(ChatMessage::tool_result(call.id.as_str(), output));
            }
        }

        thread.messages.extend(turn);
        Ok(reply.into_string())
    }

    /// Execute one tool call. Failures are reported back to the model as
    /// the tool's output.
    async fn dispatch(&self, call: &ToolCall) -> String {
        let name = call.function.name.as_str();
        tracing::info!(tool = name, "tool call");

        let params = if call.function.arguments.trim().is_empty() {
            Ok(Value::Null)
        } else {
            serde_json::from_str::<Value>(&call.function.arguments)
                .map_err(|e| anyhow::anyhow!("arguments are not valid JSON: {}", e))
        };

        let result = match params {
            Ok(params) => self.tools.call(name, params, &self.ctx).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(Value::String(s)) => s,
            Ok(other) => other.to_string(),
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "tool call failed");
                format!("Error: {}", e)
            }
        }
    }
}

/// Reply accumulator with an upper bound in characters.
struct ReplyBuffer {
    text: String,
    chars: usize,
    limit: usize,
    truncated: bool,
}

impl ReplyBuffer {
    fn new(limit: usize) -> Self {
        Self {
            text: String::new(),
            chars: 0,
            limit,
            truncated: false,
        }
    }

    /// Append as much of `fragment` as fits. Returns the accepted part.
    fn push<'a>(&mut self, fragment: &'a str) -> &'a str {
        let room = self.limit - self.chars;
        let accepted = match fragment.char_indices().nth(room) {
            Some((cut, _)) => {
                if !self.truncated {
                    tracing::warn!(limit = self.limit, "chat reply truncated");
                    self.truncated = true;
                }
                &fragment[..cut]
            }
            None => fragment,
        };
        self.chars += accepted.chars().count();
        self.text.push_str(accepted);
        accepted
    }

    fn into_string(self) -> String {
        self.text
    }
}

// ============ Singleton ============

type AgentFactory =
    Arc<dyn Fn() -> BoxFuture<'static, Result<CookingAgent, ChefError>> + Send + Sync>;

/// Lazily constructed, process-wide cooking agent.
///
/// Concurrent first callers wait on a single construction. A failed
/// construction is returned to every waiter and leaves the cell empty.
pub struct AgentCell {
    cell: OnceCell<Arc<CookingAgent>>,
    factory: AgentFactory,
}

impl AgentCell {
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CookingAgent, ChefError>> + Send + 'static,
    {
        Self {
            cell: OnceCell::new(),
            factory: Arc::new(move || factory().boxed()),
        }
    }

    /// Cell that builds an [`OpenAiChatBackend`] agent from `config`.
    pub fn from_config(config: ChatConfig, tools: Arc<ToolRegistry>, ctx: ToolContext) -> Self {
        Self::new(move || {
            let result = CookingAgent::from_config(&config, tools.clone(), ctx.clone());
            async move { result }
        })
    }

    pub async fn get_or_init(&self) -> Result<Arc<CookingAgent>, ChefError> {
        self.cell
            .get_or_try_init(|| async { (self.factory)().await.map(Arc::new) })
            .await
            .cloned()
    }

    /// The agent, if it has been constructed.
    pub fn get(&self) -> Option<Arc<CookingAgent>> {
        self.cell.get().cloned()
    }
}
