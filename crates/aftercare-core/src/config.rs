use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AftercareError, Result};

/// Top-level configuration for the Aftercare service.
///
/// Loaded from `~/.aftercare/config.toml` by default. Each section
/// corresponds to a bounded context or cross-cutting concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AftercareConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub web_search: WebSearchConfig,
}

impl AftercareConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AftercareConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AftercareError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory for the patient database and passage corpus.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            data_dir: "~/.aftercare/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Session lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle minutes after which a session is evicted.
    pub idle_timeout_minutes: u32,
    /// Logical deadline for one turn; results landing after it are discarded.
    pub turn_deadline_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_minutes: 30,
            turn_deadline_secs: 60,
        }
    }
}

/// Retrieval pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Minimum top passage score for local evidence to be sufficient.
    pub confidence_threshold: f64,
    /// Number of indexed passages to retrieve and cite.
    pub top_k: usize,
    /// Maximum results requested from a web provider per query.
    pub max_web_results: usize,
    /// Per-provider call timeout in seconds.
    pub provider_timeout_secs: u64,
    /// Backoff before the single retry of a failed provider call.
    pub retry_backoff_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.62,
            top_k: 4,
            max_web_results: 3,
            provider_timeout_secs: 10,
            retry_backoff_ms: 250,
        }
    }
}

/// Text generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Base URL of an OpenAI-compatible chat completions endpoint.
    pub api_base: String,
    /// Model identifier sent with each request.
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Call timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            api_key_env: "AFTERCARE_LLM_API_KEY".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Web search provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSearchConfig {
    /// Environment variable holding the primary provider API key.
    pub api_key_env: String,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: "AFTERCARE_SEARCH_API_KEY".to_string(),
        }
    }
}
