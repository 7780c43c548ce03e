use crate::config::ModelConfig;
use crate::error::InvocationError;
use crate::providers::traits::Provider;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// OpenAI-compatible chat-completions client.
pub struct OpenAiProvider {
    /// Pre-computed `"Bearer <key>"` header value (avoids `format!` per request).
    cached_auth_header: String,
    api_base: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f64,
    top_p: f64,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiProvider {
    pub fn new(api_key: &str) -> Self {
        Self::with_api_base(api_key, DEFAULT_API_BASE)
    }

    /// Point at a non-default endpoint (compatible gateways, test servers).
    pub fn with_api_base(api_key: &str, api_base: &str) -> Self {
        Self {
            cached_auth_header: format!("Bearer {api_key}"),
            api_base: api_base.trim_end_matches('/').to_string(),
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .connect_timeout(std::time::Duration::from_secs(10))
                .pool_max_idle_per_host(4)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn request_failed(&self, status: StatusCode, body: String) -> InvocationError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => InvocationError::Auth {
                provider: self.name().to_string(),
            },
            _ => InvocationError::Request {
                provider: self.name().to_string(),
                message: format!("{status}: {body}"),
            },
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(
        &self,
        system: &str,
        user: &str,
        params: &ModelConfig,
    ) -> Result<String, InvocationError> {
        let request_id = Uuid::new_v4().simple().to_string()[..8].to_string();
        let start = Instant::now();

        let body = ChatRequest {
            model: &params.name,
            messages: vec![
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: user,
                },
            ],
            temperature: params.temperature,
            top_p: params.top_p,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .header("Authorization", &self.cached_auth_header)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let latency_ms = start.elapsed().as_millis();
                error!(request_id, latency_ms, error = %e, "model call failed");
                if e.is_timeout() {
                    InvocationError::Timeout {
                        provider: self.name().to_string(),
                    }
                } else {
                    InvocationError::Request {
                        provider: self.name().to_string(),
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let latency_ms = start.elapsed().as_millis();
            error!(request_id, latency_ms, %status, "provider returned error status");
            return Err(self.request_failed(status, body));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| InvocationError::Request {
            provider: self.name().to_string(),
            message: format!("response decode: {e}"),
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| InvocationError::Empty {
                provider: self.name().to_string(),
            })?;

        let latency_ms = start.elapsed().as_millis();
        info!(request_id, latency_ms, model = %params.name, "model call ok");
        Ok(content)
    }
}
