use super::{CompletionProvider, PromptMessage, PromptRole};
use crate::config::CompletionConfig;
use crate::shared::error::DeskError;
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::Value;

/// Client for any OpenAI-compatible chat-completions endpoint.
pub struct OpenAiCompatClient {
    client: Client,
    config: CompletionConfig,
}

impl OpenAiCompatClient {
    pub fn new(config: CompletionConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn role_tag(role: PromptRole) -> &'static str {
        match role {
            PromptRole::System => "system",
            PromptRole::User => "user",
            PromptRole::Assistant => "assistant",
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatClient {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[PromptMessage],
    ) -> Result<String, DeskError> {
        if !self.config.is_configured() {
            return Err(DeskError::AssistantServiceUnavailable(
                "completion service is not configured".to_string(),
            ));
        }

        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": system_prompt,
        })];
        for msg in history {
            messages.push(serde_json::json!({
                "role": Self::role_tag(msg.role),
                "content": msg.content,
            }));
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&serde_json::json!({
                "model": self.config.model,
                "messages": messages,
            }))
            .send()
            .await
            .map_err(|e| DeskError::AssistantServiceUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeskError::AssistantServiceUnavailable(format!(
                "completion service returned {}",
                status
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| DeskError::AssistantServiceUnavailable(e.to_string()))?;

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .trim()
            .to_string();
        debug!("completion service returned {} chars", content.len());

        if content.is_empty() {
            return Err(DeskError::AssistantServiceUnavailable(
                "completion service returned an empty response".to_string(),
            ));
        }
        Ok(content)
    }
}
