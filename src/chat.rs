//! Streaming chat completions against an OpenAI-compatible endpoint.
//!
//! The cooking agent talks to the model through [`ChatBackend`], which turns
//! one request into a stream of [`ChatEvent`]s: text fragments as they
//! arrive, then any tool calls the model asked for. Tool-call arguments are
//! streamed by the API in pieces keyed by index; [`SseDecoder`] reassembles
//! them and emits each call once the stream ends.
//!
//! # Wire format
//!
//! ```text
//! POST {base_url}/chat/completions
//! Authorization: Bearer $GITHUB_TOKEN
//! { "model": "...", "stream": true, "messages": [...], "tools": [...] }
//!
//! data: {"choices":[{"delta":{"content":"Hel"}}]}
//! data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1",
//!         "function":{"name":"search_recipes","arguments":"{\"ingr"}}]}}]}
//! data: [DONE]
//! ```

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};

use crate::config::ChatConfig;
use crate::error::ChefError;

// ============ Messages ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One entry of a conversation, in the shape the chat API expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Assistant turn that requested tools. Text spoken before the calls,
    /// if any, is kept as content.
    pub fn assistant_tool_calls(content: String, calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: if content.is_empty() { None } else { Some(content) },
            tool_calls: calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(output.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, exactly as the model produced them.
    pub arguments: String,
}

fn function_kind() -> String {
    "function".to_string()
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: function_kind(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

// ============ Backend trait ============

#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// A fragment of the assistant's reply.
    Text(String),
    /// A complete tool call. Emitted after all text of the response.
    ToolCall(ToolCall),
}

pub type ChatStream = BoxStream<'static, Result<ChatEvent>>;

/// A chat model that streams one assistant response per request.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn model_name(&self) -> &str;

    /// Start a completion over `messages`. `tools` is the OpenAI `tools`
    /// array; an empty slice means no tools are offered.
    async fn stream_turn(&self, messages: &[ChatMessage], tools: &[Value]) -> Result<ChatStream>;
}

// ============ OpenAI-compatible backend ============

pub struct OpenAiChatBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    token: String,
    max_stream_bytes: usize,
}

impl OpenAiChatBackend {
    pub fn new(config: &ChatConfig, token: String) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            bail!("chat base_url is empty");
        }
        let client = reqwest::Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            token,
            max_stream_bytes: config.max_stream_bytes,
        })
    }

    fn request_body(&self, messages: &[ChatMessage], tools: &[Value]) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.to_vec());
            body["tool_choice"] = json!("auto");
        }
        body
    }
}

#[async_trait]
impl ChatBackend for OpenAiChatBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn stream_turn(&self, messages: &[ChatMessage], tools: &[Value]) -> Result<ChatStream> {
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "chat request"
        );

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&self.request_body(messages, tools))
            .send()
            .await
            .with_context(|| format!("failed to reach chat endpoint {}", url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChefError::ModelApi {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            }
            .into());
        }

        let body = resp.bytes_stream().map(|r| r.map(|b| b.to_vec())).boxed();
        Ok(sse_events(body, self.max_stream_bytes))
    }
}

struct StreamState {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    pending: VecDeque<ChatEvent>,
    finished: bool,
}

/// Decode a raw completion body into chat events. The stream ends after the
/// first error.
pub fn sse_events(
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    max_stream_bytes: usize,
) -> ChatStream {
    let state = StreamState {
        body,
        decoder: SseDecoder::new(max_stream_bytes),
        pending: VecDeque::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(event) = st.pending.pop_front() {
                return Some((Ok(event), st));
            }
            if st.finished {
                return None;
            }
            match st.body.next().await {
                Some(Ok(chunk)) => match st.decoder.push(&chunk) {
                    Ok(events) => st.pending.extend(events),
                    Err(e) => {
                        st.finished = true;
                        return Some((Err(e), st));
                    }
                },
                Some(Err(e)) => {
                    st.finished = true;
                    let err = anyhow::Error::new(e).context("chat stream interrupted");
                    return Some((Err(err), st));
                }
                None => {
                    st.finished = true;
                    st.pending.extend(st.decoder.finish());
                }
            }
        }
    })
    .boxed()
}

// ============ SSE decoding ============

#[derive(Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl PartialToolCall {
    fn len(&self) -> usize {
        self.id.len() + self.name.len() + self.arguments.len()
    }
}

/// Incremental decoder for `text/event-stream` chat completion chunks.
///
/// A line, and each tool call assembled from fragments, may hold at most
/// `max_bytes` bytes. Going past that is an error.
pub struct SseDecoder {
    buffer: Vec<u8>,
    calls: BTreeMap<u64, PartialToolCall>,
    done: bool,
    max_bytes: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new(ChatConfig::default().max_stream_bytes)
    }
}

impl SseDecoder {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            calls: BTreeMap::new(),
            done: false,
            max_bytes,
        }
    }

    /// Feed raw bytes. Returns the text events completed by this chunk.
    /// Tool calls are held back until `[DONE]` or [`SseDecoder::finish`].
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<ChatEvent>> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            if pos > self.max_bytes {
                self.buffer.clear();
                bail!("stream line exceeds {} bytes", self.max_bytes);
            }
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            self.handle_line(line.trim(), &mut events)?;
        }
        if self.buffer.len() > self.max_bytes {
            self.buffer.clear();
            bail!("stream line exceeds {} bytes", self.max_bytes);
        }
        Ok(events)
    }

    /// Flush a trailing unterminated line and any assembled tool calls.
    pub fn finish(&mut self) -> Vec<ChatEvent> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest).to_string();
            if let Err(e) = self.handle_line(line.trim(), &mut events) {
                tracing::debug!(error = %e, "ignoring trailing stream fragment");
            }
        }
        self.flush_calls(&mut events);
        events
    }

    fn handle_line(&mut self, line: &str, events: &mut Vec<ChatEvent>) -> Result<()> {
        let Some(payload) = line.strip_prefix("data:") else {
            return Ok(());
        };
        let payload = payload.trim();
        if self.done || payload.is_empty() {
            return Ok(());
        }
        if payload == "[DONE]" {
            self.done = true;
            self.flush_calls(events);
            return Ok(());
        }

        let chunk: Value = serde_json::from_str(payload)
            .with_context(|| format!("malformed stream chunk: {}", payload))?;
        if let Some(err) = chunk.get("error") {
            let message = err["message"].as_str().unwrap_or("unknown error");
            bail!("chat stream error: {}", message);
        }

        let Some(choices) = chunk["choices"].as_array() else {
            return Ok(());
        };
        for choice in choices {
            let delta = &choice["delta"];
            if let Some(text) = delta["content"].as_str() {
                if !text.is_empty() {
                    events.push(ChatEvent::Text(text.to_string()));
                }
            }
            if let Some(calls) = delta["tool_calls"].as_array() {
                for call in calls {
                    let index = call["index"].as_u64().unwrap_or(0);
                    let entry = self.calls.entry(index).or_default();
                    if let Some(id) = call["id"].as_str() {
                        entry.id.push_str(id);
                    }
                    if let Some(name) = call["function"]["name"].as_str() {
                        entry.name.push_str(name);
                    }
                    if let Some(args) = call["function"]["arguments"].as_str() {
                        entry.arguments.push_str(args);
                    }
                    if entry.len() > self.max_bytes {
                        bail!("tool call {} exceeds {} bytes", index, self.max_bytes);
                    }
                }
            }
        }
        Ok(())
    }

    fn flush_calls(&mut self, events: &mut Vec<ChatEvent>) {
        for (index, call) in std::mem::take(&mut self.calls) {
            let id = if call.id.is_empty() {
                format!("call_{}", index)
            } else {
                call.id
            };
            events.push(ChatEvent::ToolCall(ToolCall::new(id, call.name, call.arguments)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(events: &[ChatEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                ChatEvent::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn decodes_text_across_chunk_boundaries() {
        let mut decoder = SseDecoder::default();
        let mut events = decoder
            .push(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\ndata: {\"choi")
            .unwrap();
        events.extend(
            decoder
                .push(b"ces\":[{\"delta\":{\"content\":\"lo\"}}]}\n\ndata: [DONE]\n\n")
                .unwrap(),
        );
        events.extend(decoder.finish());
        assert_eq!(texts(&events), "Hello");
    }

    #[test]
    fn assembles_tool_call_fragments() {
        let mut decoder = SseDecoder::default();
        let stream = concat!(
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_a\",",
            "\"function\":{\"name\":\"get_nutrition_info\",\"arguments\":\"\"}}]}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,",
            "\"function\":{\"arguments\":\"{\\\"dish_name\\\":\"}}]}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,",
            "\"function\":{\"arguments\":\"\\\"Stir Fry\\\"}\"}}]}}]}\n",
            "data: [DONE]\n",
        );
        let events = decoder.push(stream.as_bytes()).unwrap();
        assert_eq!(
            events,
            vec![ChatEvent::ToolCall(ToolCall::new(
                "call_a",
                "get_nutrition_info",
                "{\"dish_name\":\"Stir Fry\"}"
            ))]
        );
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn tool_calls_flushed_at_end_without_done() {
        let mut decoder = SseDecoder::default();
        decoder
            .push(
                b"data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":1,\
                  \"function\":{\"name\":\"search_recipes\",\"arguments\":\"{}\"}}]}}]}",
            )
            .unwrap();
        let events = decoder.finish();
        assert_eq!(
            events,
            vec![ChatEvent::ToolCall(ToolCall::new("call_1", "search_recipes", "{}"))]
        );
    }

    #[test]
    fn ignores_comments_and_blank_lines() {
        let mut decoder = SseDecoder::default();
        let events = decoder
            .push(b": keep-alive\n\nevent: message\ndata: {\"choices\":[]}\n")
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn stream_error_payload_fails() {
        let mut decoder = SseDecoder::default();
        let err = decoder
            .push(b"data: {\"error\":{\"message\":\"rate limited\"}}\n")
            .unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }

    #[test]
    fn unterminated_line_over_limit_fails() {
        let mut decoder = SseDecoder::new(64);
        decoder.push(b"data: {\"choices\":[{\"delta\":").unwrap();
        let err = decoder.push(&[b'x'; 64]).unwrap_err();
        assert!(err.to_string().contains("exceeds 64 bytes"));
    }

    #[test]
    fn terminated_line_over_limit_fails() {
        let mut decoder = SseDecoder::new(16);
        let err = decoder
            .push(b"data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n")
            .unwrap_err();
        assert!(err.to_string().contains("stream line"));
    }

    #[test]
    fn tool_call_arguments_over_limit_fail() {
        let mut decoder = SseDecoder::new(128);
        let fragment = "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\
                        \"function\":{\"arguments\":\"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\"}}]}}]}\n";
        let mut result = Ok(Vec::new());
        for _ in 0..8 {
            result = decoder.push(fragment.as_bytes());
            if result.is_err() {
                break;
            }
        }
        let err = result.unwrap_err();
        assert!(err.to_string().contains("tool call 0 exceeds 128 bytes"));
    }

    #[tokio::test]
    async fn sse_events_stops_after_oversized_line() {
        let chunks: Vec<reqwest::Result<Vec<u8>>> = vec![
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n".to_vec()),
            Ok(vec![b'x'; 512]),
            Ok(b"\ndata: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n".to_vec()),
        ];
        let results: Vec<Result<ChatEvent>> =
            sse_events(futures::stream::iter(chunks).boxed(), 256).collect().await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), &ChatEvent::Text("ok".into()));
        assert!(results[1].is_err());
    }

    #[test]
    fn message_serialization_omits_empty_fields() {
        let user = serde_json::to_value(ChatMessage::user("hi")).unwrap();
        assert_eq!(user, json!({ "role": "user", "content": "hi" }));

        let call = ChatMessage::assistant_tool_calls(
            String::new(),
            vec![ToolCall::new("c1", "search_recipes", "{}")],
        );
        let v = serde_json::to_value(call).unwrap();
        assert!(v.get("content").is_none());
        assert_eq!(v["tool_calls"][0]["type"], "function");

        let result =
            serde_json::to_value(ChatMessage::tool_result("c1", "Found 1 recipes:")).unwrap();
        assert_eq!(result["role"], "tool");
        assert_eq!(result["tool_call_id"], "c1");
    }

    #[test]
    fn request_body_offers_tools_only_when_present() {
        let backend = OpenAiChatBackend::new(&ChatConfig::default(), "t".into()).unwrap();
        let body = backend.request_body(&[ChatMessage::user("hi")], &[]);
        assert!(body.get("tools").is_none());
        assert_eq!(body["stream"], true);
        assert_eq!(body["model"], "openai/gpt-4o");

        let body = backend.request_body(&[], &[json!({ "type": "function" })]);
        assert_eq!(body["tool_choice"], "auto");
    }

    #[tokio::test]
    async fn sse_events_yields_text_then_calls() {
        let chunks: Vec<reqwest::Result<Vec<u8>>> = vec![
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"Let me check.\"}}]}\n".to_vec()),
            Ok(b"data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"x\",\
                  \"function\":{\"name\":\"n\",\"arguments\":\"{}\"}}]}}]}\n"
                .to_vec()),
        ];
        let events: Vec<ChatEvent> = sse_events(futures::stream::iter(chunks).boxed(), 4096)
            .map(|e| e.unwrap())
            .collect()
            .await;
        assert_eq!(
            events,
            vec![
                ChatEvent::Text("Let me check.".into()),
                ChatEvent::ToolCall(ToolCall::new("x", "n", "{}")),
            ]
        );
    }
}
