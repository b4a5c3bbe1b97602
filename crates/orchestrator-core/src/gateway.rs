//! Gateway client: the planner's only external dependency when no full
//! planner agent is registered. Concrete transport is a thin, classified
//! wrapper around an OpenAI-compatible chat-completion endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::SecretValue;
use crate::error::{OrchestratorError, Result};

/// `chat(prompt, session_key) -> output`. Failures are surfaced as the
/// classified `GATEWAY_*` error variants.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    async fn chat(&self, prompt: &str, session_key: &str) -> Result<String>;
}

/// OpenAI-compatible chat-completion client.
pub struct HttpGatewayClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: SecretValue,
}

impl HttpGatewayClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: SecretValue) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            api_key,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[async_trait]
impl GatewayClient for HttpGatewayClient {
    async fn chat(&self, prompt: &str, session_key: &str) -> Result<String> {
        tracing::debug!(session_key, "calling gateway chat completion");

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose())
            .json(&request)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        if !response.status().is_success() {
            return Err(OrchestratorError::GatewayProtocolError(format!(
                "gateway returned status {}",
                response.status()
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(classify_reqwest_error)?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                OrchestratorError::GatewayProtocolError("gateway returned no choices".to_string())
            })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> OrchestratorError {
    if err.is_timeout() {
        OrchestratorError::GatewayTimeout(err.to_string())
    } else if err.is_connect() {
        OrchestratorError::GatewayConnectionFailed(err.to_string())
    } else {
        OrchestratorError::GatewayProtocolError(err.to_string())
    }
}

/// Deterministic canned-DAG responder used by the CLI demo and planner
/// tests, so the parse/validate path is exercised without network access.
pub struct MockGatewayClient {
    response: String,
}

impl MockGatewayClient {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

#[async_trait]
impl GatewayClient for MockGatewayClient {
    async fn chat(&self, _prompt: &str, _session_key: &str) -> Result<String> {
        Ok(self.response.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_gateway_returns_canned_response() {
        let gateway = MockGatewayClient::new(r#"{"nodes":[{"id":"a","task":"do it"}]}"#);
        let result = gateway.chat("plan something", "session-1").await.unwrap();
        assert!(result.contains("\"id\":\"a\""));
    }
}
