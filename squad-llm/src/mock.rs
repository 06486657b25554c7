//! Scripted chat provider and tool handler for tests.

use crate::tools::ToolHandler;
use crate::types::{ChatRequest, ChatResponse, ContentBlock, StopReason};
use crate::ChatProvider;
use async_trait::async_trait;
use serde_json::Value;
use squad_core::{SquadResult, StorageError, TokenDelta};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Chat provider that replays a scripted sequence of responses and records
/// every request it receives.
#[derive(Clone)]
pub struct MockChatProvider {
    responses: Arc<Mutex<VecDeque<ChatResponse>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl MockChatProvider {
    /// Script the responses, replayed in order. Once exhausted, the
    /// provider answers with an empty `end_turn` response.
    pub fn new(responses: Vec<ChatResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every request seen so far, in order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().expect("mock lock").clone()
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    async fn chat(&self, request: ChatRequest) -> SquadResult<ChatResponse> {
        self.requests.lock().expect("mock lock").push(request);
        let next = self.responses.lock().expect("mock lock").pop_front();
        Ok(next.unwrap_or_else(|| ChatResponse {
            content: vec![ContentBlock::text("")],
            stop_reason: StopReason::EndTurn,
            usage: TokenDelta::default(),
        }))
    }
}

/// Tool handler that returns scripted results per tool name and records
/// every call. Unscripted tools fail, exercising the error path.
#[derive(Clone, Default)]
pub struct ScriptedToolHandler {
    results: Arc<Mutex<HashMap<String, Value>>>,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl ScriptedToolHandler {
    /// Script the result of one tool.
    pub fn with_result(self, tool: impl Into<String>, result: Value) -> Self {
        self.results
            .lock()
            .expect("mock lock")
            .insert(tool.into(), result);
        self
    }

    /// Every (tool, input) call seen so far.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().expect("mock lock").clone()
    }
}

#[async_trait]
impl ToolHandler for ScriptedToolHandler {
    async fn handle(&self, name: &str, input: &Value) -> SquadResult<Value> {
        self.calls
            .lock()
            .expect("mock lock")
            .push((name.to_string(), input.clone()));
        self.results
            .lock()
            .expect("mock lock")
            .get(name)
            .cloned()
            .ok_or_else(|| {
                StorageError::NotFound {
                    entity: "tool",
                    id: name.to_string(),
                }
                .into()
            })
    }
}
