use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::debug;

use super::base::{ModelResponse, Provider, Usage};
use super::configs::AnthropicProviderConfig;
use super::utils::{
    anthropic_response_to_message, anthropic_usage, messages_to_anthropic_spec,
    tools_to_anthropic_spec,
};
use crate::models::message::Message;
use crate::models::tool::Tool;

const ANTHROPIC_VERSION: &str = "2023-06-01";
// The messages API requires max_tokens on every request
const DEFAULT_MAX_TOKENS: i32 = 4096;

pub struct AnthropicProvider {
    client: Client,
    config: AnthropicProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicProviderConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { client, config })
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!("{}/v1/messages", self.config.host.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            status => {
                let body: Value = response.json().await.unwrap_or(Value::Null);
                let detail = body
                    .pointer("/error/message")
                    .and_then(Value::as_str)
                    .map(String::from)
                    .unwrap_or_else(|| body.to_string());
                Err(anyhow!("Request failed: {}: {}", status, detail))
            }
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(ModelResponse, Usage)> {
        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_to_anthropic_spec(messages),
            "max_tokens": self.config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        });
        let fields = payload
            .as_object_mut()
            .ok_or_else(|| anyhow!("payload is not an object"))?;

        if !system.is_empty() {
            fields.insert("system".to_string(), json!(system));
        }
        if !tools.is_empty() {
            fields.insert("tools".to_string(), json!(tools_to_anthropic_spec(tools)?));
        }
        if let Some(temp) = self.config.temperature {
            fields.insert("temperature".to_string(), json!(temp));
        }

        debug!(model = %self.config.model, messages = messages.len(), "sending messages request");
        let response = self.post(payload).await?;

        if response.get("type").and_then(Value::as_str) == Some("error") {
            return Err(anyhow!("Anthropic API error: {}", response["error"]));
        }

        let message = anthropic_response_to_message(&response)?;
        let usage = anthropic_usage(&response);

        Ok((message, usage))
    }
}
