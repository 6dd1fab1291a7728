//! OpenAI-compatible chat completions client.
//!
//! One prompt in, one message out, against any endpoint speaking the
//! chat completions wire format (Groq by default). The agents own
//! retries and fallbacks; this client makes a single attempt.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use aftercare_agents::generation::TextGeneration;
use aftercare_core::config::GenerationConfig;
use aftercare_core::error::{AftercareError, Result};

pub struct ChatCompletionsClient {
    client: reqwest::Client,
    api_base: String,
    model: String,
    api_key: String,
}

impl ChatCompletionsClient {
    pub fn new(config: &GenerationConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AftercareError::Generation(format!("http client init: {}", e)))?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl TextGeneration for ChatCompletionsClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AftercareError::Generation(format!("request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AftercareError::Generation(format!("status: {}", e)))?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AftercareError::Generation(format!("response parse: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AftercareError::Generation("no choices in response".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_response_parses() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content, "hello");
    }

    #[test]
    fn test_api_base_trailing_slash_trimmed() {
        let config = GenerationConfig {
            api_base: "https://api.example.com/v1/".to_string(),
            ..GenerationConfig::default()
        };
        let client = ChatCompletionsClient::new(&config, "key".to_string()).unwrap();
        assert_eq!(client.api_base, "https://api.example.com/v1");
    }
}
