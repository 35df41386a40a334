use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub completion: CompletionConfig,
    pub chat: ChatConfig,
    pub partners: PartnerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Connection settings for the opaque text-completion service.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl CompletionConfig {
    /// An absent or blank key/model means the assistant cannot answer and the
    /// orchestrator must take the degraded-service path instead of calling out.
    pub fn is_configured(&self) -> bool {
        !self.base_url.trim().is_empty()
            && !self.api_key.trim().is_empty()
            && !self.model.trim().is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Tolerance window in seconds for matching an optimistic message to its
    /// server-confirmed counterpart.
    pub reconcile_window_secs: i64,
    /// Idle timeout after which clients treat a typing entry as stale.
    pub typing_idle_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            reconcile_window_secs: 5,
            typing_idle_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartnerConfig {
    /// Optional JSON file seeding the static partner directory.
    pub directory_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        dotenv().ok();

        Ok(Self {
            server: ServerConfig {
                host: env::var("DESK_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("DESK_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()?,
            },
            completion: CompletionConfig {
                base_url: env::var("COMPLETION_BASE_URL").unwrap_or_default(),
                api_key: env::var("COMPLETION_API_KEY").unwrap_or_default(),
                model: env::var("COMPLETION_MODEL").unwrap_or_default(),
            },
            chat: ChatConfig {
                reconcile_window_secs: env::var("CHAT_RECONCILE_WINDOW_SECS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()?,
                typing_idle_secs: env::var("CHAT_TYPING_IDLE_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
            },
            partners: PartnerConfig {
                directory_path: env::var("PARTNER_DIRECTORY_PATH").ok(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_completion_config_is_not_configured() {
        let config = CompletionConfig {
            base_url: String::new(),
            api_key: String::new(),
            model: String::new(),
        };
        assert!(!config.is_configured());
    }

    #[test]
    fn full_completion_config_is_configured() {
        let config = CompletionConfig {
            base_url: "https://api.example.com/v1".into(),
            api_key: "sk-test".into(),
            model: "gpt-4o-mini".into(),
        };
        assert!(config.is_configured());
    }
}
