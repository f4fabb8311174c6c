//! Test utilities for integration tests
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use streamchat::chat::{MessageId, MessageUpdate, RenderSink, RequestConfig, TurnError};
use streamchat::openai::{ByteStream, CompletionRequest, CompletionTransport, Role};

pub const TEST_KEY: &str = "test-key";

/// One `data:` frame carrying `content` as its delta
pub fn frame(content: &str) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({
            "id": "chatcmpl-123",
            "object": "chat.completion.chunk",
            "created": 1694268190,
            "model": "gpt-4.1-mini",
            "choices": [{"index": 0, "delta": {"content": content}, "finish_reason": null}]
        })
    )
}

/// A full response body streaming `deltas`, optionally terminated
pub fn sse_body(deltas: &[&str], terminated: bool) -> String {
    let mut body = String::from("data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\"}}]}\n\n");
    for delta in deltas {
        body.push_str(&frame(delta));
    }
    if terminated {
        body.push_str("data: [DONE]\n\n");
    }
    body
}

pub fn config_with_key() -> RequestConfig {
    RequestConfig {
        api_key: Some(TEST_KEY.to_string()),
        ..Default::default()
    }
}

/// Transport that replays a fixed sequence of chunks and records
/// every request it receives.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    chunks: Vec<Result<Vec<u8>, TurnError>>,
    open_error: Option<TurnError>,
    requests: Arc<Mutex<Vec<(String, CompletionRequest)>>>,
}

impl ScriptedTransport {
    pub fn new(chunks: Vec<Result<Vec<u8>, TurnError>>) -> Self {
        Self {
            chunks,
            ..Default::default()
        }
    }

    /// Splits `body` into chunks of `chunk_size` bytes
    pub fn from_body(body: &str, chunk_size: usize) -> Self {
        let chunks = body
            .as_bytes()
            .chunks(chunk_size)
            .map(|chunk| Ok(chunk.to_vec()))
            .collect();
        Self::new(chunks)
    }

    pub fn failing(err: TurnError) -> Self {
        Self {
            open_error: Some(err),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, req)| req.clone())
            .collect()
    }

    pub fn api_keys(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionTransport for ScriptedTransport {
    async fn open_stream(
        &self,
        api_key: &str,
        request: &CompletionRequest,
    ) -> Result<ByteStream, TurnError> {
        self.requests
            .lock()
            .unwrap()
            .push((api_key.to_string(), request.clone()));
        if let Some(err) = &self.open_error {
            return Err(err.clone());
        }
        Ok(stream::iter(self.chunks.clone()).boxed())
    }
}

/// Transport whose body is fed by the test through a channel, so the
/// test controls exactly when data and end of stream arrive.
pub struct ChannelTransport {
    rx: Mutex<Option<mpsc::UnboundedReceiver<Result<Vec<u8>, TurnError>>>>,
}

impl ChannelTransport {
    pub fn new() -> (mpsc::UnboundedSender<Result<Vec<u8>, TurnError>>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            tx,
            Self {
                rx: Mutex::new(Some(rx)),
            },
        )
    }
}

#[async_trait]
impl CompletionTransport for ChannelTransport {
    async fn open_stream(
        &self,
        _api_key: &str,
        _request: &CompletionRequest,
    ) -> Result<ByteStream, TurnError> {
        let rx = self
            .rx
            .lock()
            .unwrap()
            .take()
            .expect("ChannelTransport only supports one request");
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }
}

/// Transport that never answers
pub struct StalledTransport;

#[async_trait]
impl CompletionTransport for StalledTransport {
    async fn open_stream(
        &self,
        _api_key: &str,
        _request: &CompletionRequest,
    ) -> Result<ByteStream, TurnError> {
        futures::future::pending().await
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SinkEvent {
    Create(MessageId, Role, MessageUpdate),
    Update(MessageId, MessageUpdate),
}

/// Render sink that keeps every call for inspection
#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<SinkEvent>,
}

impl RecordingSink {
    pub fn created(&self) -> Vec<(MessageId, Role)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Create(id, role, _) => Some((id.clone(), *role)),
                _ => None,
            })
            .collect()
    }

    pub fn assistant_id(&self) -> MessageId {
        self.created()
            .into_iter()
            .find(|(_, role)| *role == Role::Assistant)
            .map(|(id, _)| id)
            .expect("No assistant message created")
    }

    pub fn updates_for(&self, id: &MessageId) -> Vec<MessageUpdate> {
        self.events
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Update(event_id, update) if event_id == id => Some(update.clone()),
                _ => None,
            })
            .collect()
    }

    /// Content of every update for `id` that carried content
    pub fn contents_for(&self, id: &MessageId) -> Vec<String> {
        self.updates_for(id)
            .into_iter()
            .filter_map(|update| update.content)
            .collect()
    }

    pub fn last_update(&self) -> MessageUpdate {
        self.updates_for(&self.assistant_id())
            .pop()
            .expect("No updates for the assistant message")
    }
}

impl RenderSink for RecordingSink {
    fn create(&mut self, id: &MessageId, role: Role, update: MessageUpdate) {
        self.events.push(SinkEvent::Create(id.clone(), role, update));
    }

    fn update(&mut self, id: &MessageId, update: MessageUpdate) {
        self.events.push(SinkEvent::Update(id.clone(), update));
    }
}
