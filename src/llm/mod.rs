//! Text-completion service abstraction. The orchestrator only needs "role
//! tagged history in, generated text out"; the concrete vendor is opaque.

pub mod openai;

use crate::shared::error::DeskError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use openai::OpenAiCompatClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate one completion for the given system prompt and history.
    /// Misconfiguration and transport failures both surface as
    /// [`DeskError::AssistantServiceUnavailable`]; callers decide the
    /// degraded-service behavior.
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[PromptMessage],
    ) -> Result<String, DeskError>;
}

/// Provider used when no completion service is configured. Always fails with
/// the unavailable error so the orchestrator takes the hand-off path.
pub struct UnconfiguredCompletion;

#[async_trait]
impl CompletionProvider for UnconfiguredCompletion {
    async fn complete(
        &self,
        _system_prompt: &str,
        _history: &[PromptMessage],
    ) -> Result<String, DeskError> {
        Err(DeskError::AssistantServiceUnavailable(
            "completion service is not configured".to_string(),
        ))
    }
}
