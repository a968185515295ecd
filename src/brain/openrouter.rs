//! OpenAI-compatible chat completions client (OpenRouter by default).

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use super::prompt::user_context;
use super::{Decision, DecisionRequest, Oracle, OracleError, parse_decision};

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenRouterClient {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self, OracleError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            model,
            endpoint: OPENROUTER_API_URL.to_string(),
        })
    }

    /// Point the client at another OpenAI-compatible endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn body(&self, request: &DecisionRequest<'_>) -> Value {
        let screenshot = BASE64.encode(request.screenshot);
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": user_context(request) },
                        {
                            "type": "image_url",
                            "image_url": {
                                "url": format!("data:image/png;base64,{screenshot}"),
                                "detail": "high",
                            },
                        },
                    ],
                },
            ],
        })
    }
}

#[async_trait]
impl Oracle for OpenRouterClient {
    async fn decide(&self, request: DecisionRequest<'_>) -> Result<Decision, OracleError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("X-Title", "Browser Agent")
            .json(&self.body(&request))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(OracleError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let json_resp: Value = serde_json::from_str(&body)
            .map_err(|e| OracleError::Parse(format!("invalid response body: {e}")))?;

        if let Some(message) = json_resp["error"]["message"].as_str() {
            return Err(OracleError::Parse(format!("provider error: {message}")));
        }

        let content = json_resp["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| OracleError::Parse("no content in response".to_string()))?;

        debug!(model = %self.model, "oracle says: {}", content);
        parse_decision(content)
    }
}
