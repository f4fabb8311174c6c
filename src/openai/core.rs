use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::TurnError;
use crate::chat::settings::RequestConfig;

/// Models in this family reject the `temperature` parameter
pub const NO_TEMPERATURE_MODEL_PREFIX: &str = "gpt-5";

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "user")]
    User,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: content.to_string(),
        }
    }
}

pub fn model_supports_temperature(model: &str) -> bool {
    !model.starts_with(NO_TEMPERATURE_MODEL_PREFIX)
}

/// Body of a streaming chat completion request.
#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    pub stream: bool,
}

impl CompletionRequest {
    /// Builds the outbound transcript. The system prompt is never part
    /// of `history`, it's synthesized here when non-blank.
    pub fn new(config: &RequestConfig, history: &[Message]) -> Self {
        let system_prompt = config.system_prompt.trim();
        let mut messages = Vec::with_capacity(history.len() + 1);
        if !system_prompt.is_empty() {
            messages.push(Message::new(Role::System, system_prompt));
        }
        messages.extend_from_slice(history);

        let temperature = if model_supports_temperature(&config.model) {
            config.temperature
        } else {
            None
        };

        Self {
            model: config.model.clone(),
            messages,
            temperature,
            stream: true,
        }
    }
}

/// Raw response body as a pull based sequence of byte chunks.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, TurnError>>;

/// Opens a streaming completion. Implementations resolve once the
/// response status is known: a non-success status is an error and no
/// stream is returned.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn open_stream(
        &self,
        api_key: &str,
        request: &CompletionRequest,
    ) -> Result<ByteStream, TurnError>;
}

#[derive(Clone, Debug)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_hostname: String,
}

impl OpenAiClient {
    pub fn new(api_hostname: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_hostname: api_hostname.to_string(),
        }
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.api_hostname.trim_end_matches("/")
        )
    }
}

#[async_trait]
impl CompletionTransport for OpenAiClient {
    async fn open_stream(
        &self,
        api_key: &str,
        request: &CompletionRequest,
    ) -> Result<ByteStream, TurnError> {
        // reqwest keeps no cookie store and sets no Referer unless asked to
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(api_key)
            .header("Content-Type", "application/json")
            .header("Cache-Control", "no-store")
            .timeout(Duration::from_secs(60 * 5))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(status, &body);
            tracing::warn!("Completion request failed with {}: {}", status, message);
            return Err(TurnError::HttpStatus {
                status: status.as_u16(),
                message,
            });
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(TurnError::from))
            .boxed();
        Ok(stream)
    }
}

/// Prefers the server's `error.message`, then the status text.
fn error_message(status: StatusCode, body: &str) -> String {
    let server_message = serde_json::from_str::<Value>(body).ok().and_then(|json| {
        json["error"]["message"]
            .as_str()
            .filter(|msg| !msg.is_empty())
            .map(str::to_string)
    });

    server_message.unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    })
}
