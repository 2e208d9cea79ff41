// LLM Provider Service
// OpenAI-compatible chat-completions calls for the providers the LLM
// extraction path supports.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Instant;
use thiserror::Error;

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEEPSEEK_DEFAULT_URL: &str = "https://api.deepseek.com/chat/completions";
const GLM_DEFAULT_URL: &str = "https://open.bigmodel.cn/api/paas/v4/chat/completions";

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Missing content in response")]
    MissingContent,
    #[error("JSON parse error: {0}")]
    JsonError(String),
    #[error("API key not configured for {0}")]
    MissingApiKey(String),
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub name: String,
    pub model: String,
}

/// Parse `name[:model]`, filling in the provider's default model when no
/// model is given.
pub fn parse_provider(spec: &str) -> ProviderSpec {
    let parts: Vec<&str> = spec.splitn(2, ':').collect();
    let name = parts[0].trim().to_lowercase();
    let model = if parts.len() == 2 && !parts[1].trim().is_empty() {
        parts[1].trim().to_string()
    } else {
        default_model(&name).to_string()
    };
    ProviderSpec { name, model }
}

pub fn default_model(provider: &str) -> &'static str {
    match provider {
        "openai" => "gpt-4o-mini",
        "deepseek" => "deepseek-chat",
        "glm" => "glm-4-plus",
        _ => "",
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: i32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessageResponse>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResult {
    pub content: String,
    pub latency_ms: i64,
}

pub struct ProviderClient {
    client: Client,
    openai_url: String,
    deepseek_url: String,
    glm_url: String,
}

impl Default for ProviderClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Provider base URL override from the config file, if any.
fn config_base_url(provider: &str) -> Option<String> {
    let store = super::ConfigStore::new(super::ConfigStore::default_config_dir()?);
    store
        .load()
        .ok()?
        .providers
        .get(provider)
        .and_then(|p| p.base_url.clone())
}

/// Base URL resolution order: environment variable, config file, built-in
/// default.
fn resolve_urls() -> (String, String, String) {
    let resolve = |env_key: &str, provider: &str, default: &str| {
        env::var(env_key)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| config_base_url(provider))
            .unwrap_or_else(|| default.to_string())
    };
    (
        resolve("OPENAI_API_URL", "openai", OPENAI_DEFAULT_URL),
        resolve("DEEPSEEK_API_URL", "deepseek", DEEPSEEK_DEFAULT_URL),
        resolve("GLM_API_URL", "glm", GLM_DEFAULT_URL),
    )
}

impl ProviderClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(80))
            .build()
            .unwrap_or_default();
        let (openai_url, deepseek_url, glm_url) = resolve_urls();
        Self {
            client,
            openai_url,
            deepseek_url,
            glm_url,
        }
    }

    pub fn with_proxy(proxy_url: &str) -> Result<Self, ProviderError> {
        let proxy = reqwest::Proxy::all(proxy_url)?;
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(80))
            .proxy(proxy)
            .build()?;
        let (openai_url, deepseek_url, glm_url) = resolve_urls();
        Ok(Self {
            client,
            openai_url,
            deepseek_url,
            glm_url,
        })
    }

    fn url_for(&self, provider: &str) -> Result<&str, ProviderError> {
        match provider {
            "openai" => Ok(&self.openai_url),
            "deepseek" => Ok(&self.deepseek_url),
            "glm" => Ok(&self.glm_url),
            other => Err(ProviderError::UnknownProvider(other.to_string())),
        }
    }

    /// One chat-completions call with a forced JSON object response. The
    /// prompts mention "json" explicitly, which DeepSeek requires before it
    /// honors the format field.
    pub async fn chat_json(
        &self,
        spec: &ProviderSpec,
        api_key: &str,
        system: &str,
        user: &str,
        max_tokens: i32,
    ) -> Result<ChatResult, ProviderError> {
        let url = self.url_for(&spec.name)?;
        let request = ChatRequest {
            model: spec.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            max_tokens,
            temperature: 0.0,
            response_format: Some(ResponseFormat {
                r#type: "json_object".to_string(),
            }),
        };

        let start = Instant::now();

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let content = data
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or(ProviderError::MissingContent)?;

        Ok(ChatResult {
            content,
            latency_ms,
        })
    }
}

/// Get API key from environment or config file
pub fn get_api_key(provider: &str) -> Option<String> {
    let env_keys = match provider {
        "openai" => vec!["OPENAI_API_KEY", "COVEX_OPENAI_API_KEY"],
        "deepseek" => vec!["DEEPSEEK_API_KEY", "COVEX_DEEPSEEK_API_KEY"],
        "glm" => vec!["GLM_API_KEY", "COVEX_GLM_API_KEY"],
        _ => vec![],
    };

    for key in env_keys {
        if let Ok(val) = env::var(key) {
            let v = val.trim();
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }

    if let Some(config_dir) = super::ConfigStore::default_config_dir() {
        let store = super::ConfigStore::new(config_dir);
        if let Ok(Some(key)) = store.get_api_key(provider) {
            return Some(key);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider() {
        let spec = parse_provider("deepseek:deepseek-reasoner");
        assert_eq!(spec.name, "deepseek");
        assert_eq!(spec.model, "deepseek-reasoner");

        let spec2 = parse_provider("openai");
        assert_eq!(spec2.name, "openai");
        assert_eq!(spec2.model, "gpt-4o-mini");
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let client = ProviderClient::new();
        assert!(matches!(
            client.url_for("cohere"),
            Err(ProviderError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_provider_client_creation() {
        let client = ProviderClient::new();
        assert!(client.deepseek_url.contains("deepseek"));
    }

    #[test]
    fn test_missing_api_key_names_the_provider() {
        let err = ProviderError::MissingApiKey("openai".to_string());
        assert!(err.to_string().contains("openai"));
    }
}
