//! Chat-completion annotator
//!
//! Talks to any OpenAI-compatible `/v1/chat/completions` endpoint. DeepSeek,
//! Kimi (Moonshot), Qwen (DashScope compatible mode) and OpenAI all speak
//! the same request and response shape; only the base URL, model and key
//! differ.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::client::{language_display_name, AnnotateError, Annotator};

/// Default max tokens for one translation
const DEFAULT_MAX_TOKENS: u32 = 2000;

/// Default sampling temperature
const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Chat-completion providers with known defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Deepseek,
    Kimi,
    Qwen,
    Openai,
}

impl Provider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Deepseek => "https://api.deepseek.com",
            Provider::Kimi => "https://api.moonshot.cn",
            Provider::Qwen => "https://dashscope.aliyuncs.com/compatible-mode",
            Provider::Openai => "https://api.openai.com",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Deepseek => "deepseek-chat",
            Provider::Kimi => "moonshot-v1-8k",
            Provider::Qwen => "qwen-turbo",
            Provider::Openai => "gpt-3.5-turbo",
        }
    }

    /// Environment variable conventionally holding this provider's key
    pub fn default_api_key_env(&self) -> &'static str {
        match self {
            Provider::Deepseek => "DEEPSEEK_API_KEY",
            Provider::Kimi => "MOONSHOT_API_KEY",
            Provider::Qwen => "DASHSCOPE_API_KEY",
            Provider::Openai => "OPENAI_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Provider::Deepseek => "deepseek",
            Provider::Kimi => "kimi",
            Provider::Qwen => "qwen",
            Provider::Openai => "openai",
        };
        write!(f, "{}", s)
    }
}

/// Configuration for the chat annotator
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub provider: Provider,
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::for_provider(Provider::default())
    }
}

impl ChatConfig {
    /// Defaults for a given provider
    pub fn for_provider(provider: Provider) -> Self {
        Self {
            provider,
            base_url: provider.default_base_url().to_string(),
            model: provider.default_model().to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// System prompt asking for a faithful translation only
pub fn translation_prompt(target_language: &str) -> String {
    format!(
        "你是一个专业的翻译助手。请将用户输入的内容翻译成{}。\n\
         要求：\n\
         1. 保持原文的格式和结构\n\
         2. 翻译要准确自然，符合目标语言的表达习惯\n\
         3. 专业术语保持准确\n\
         4. 只输出翻译结果，不要有其他解释",
        language_display_name(target_language)
    )
}

/// Annotator backed by an OpenAI-compatible chat endpoint
pub struct ChatAnnotator {
    client: Client,
    api_key: String,
    config: ChatConfig,
}

impl ChatAnnotator {
    /// Create an annotator reading its key from `api_key_env`
    pub fn from_env(api_key_env: &str, config: ChatConfig) -> Result<Self, AnnotateError> {
        let api_key = std::env::var(api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AnnotateError::MissingApiKey {
                env_var: api_key_env.to_string(),
            })?;
        Self::with_api_key(api_key, config)
    }

    /// Create an annotator with an explicit API key
    pub fn with_api_key(api_key: String, config: ChatConfig) -> Result<Self, AnnotateError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    fn build_body(&self, text: &str, target_language: &str) -> Value {
        json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": translation_prompt(target_language) },
                { "role": "user", "content": text }
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens
        })
    }

    fn parse_response(body: &Value) -> Result<String, AnnotateError> {
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| AnnotateError::InvalidResponse("missing choices[0].message.content".to_string()))?;
        Ok(content.trim().to_string())
    }

    async fn send_request(&self, body: Value) -> Result<Value, AnnotateError> {
        let response = self
            .client
            .post(self.config.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(AnnotateError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AnnotateError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl Annotator for ChatAnnotator {
    async fn annotate(&self, text: &str, target_language: &str) -> Result<String, AnnotateError> {
        if text.trim().is_empty() {
            return Err(AnnotateError::EmptyText);
        }
        let body = self.build_body(text, target_language);
        let response = self.send_request(body).await?;
        Self::parse_response(&response)
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}

impl fmt::Debug for ChatAnnotator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatAnnotator")
            .field("provider", &self.config.provider)
            .field("endpoint", &self.config.endpoint())
            .field("model", &self.config.model)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotator(provider: Provider) -> ChatAnnotator {
        ChatAnnotator::with_api_key("test-key".to_string(), ChatConfig::for_provider(provider)).unwrap()
    }

    #[test]
    fn test_provider_defaults() {
        let config = ChatConfig::for_provider(Provider::Qwen);
        assert_eq!(config.model, "qwen-turbo");
        assert_eq!(
            config.endpoint(),
            "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions"
        );
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let mut config = ChatConfig::default();
        config.base_url = "http://localhost:8080/".to_string();
        assert_eq!(config.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_build_body() {
        let client = annotator(Provider::Deepseek);
        let body = client.build_body("Hello world", "zh-CN");
        assert_eq!(body["model"], "deepseek-chat");
        assert_eq!(body["max_tokens"], 2000);
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(body["messages"][0]["content"].as_str().unwrap().contains("简体中文"));
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "Hello world");
    }

    #[test]
    fn test_prompt_passes_through_other_languages() {
        assert!(translation_prompt("ja").contains("翻译成ja"));
    }

    #[test]
    fn test_parse_response() {
        let body = json!({
            "choices": [{ "message": { "role": "assistant", "content": "  你好，世界  " } }]
        });
        assert_eq!(ChatAnnotator::parse_response(&body).unwrap(), "你好，世界");
    }

    #[test]
    fn test_parse_response_missing_choices() {
        let err = ChatAnnotator::parse_response(&json!({ "choices": [] })).unwrap_err();
        assert!(matches!(err, AnnotateError::InvalidResponse(_)));
    }

    #[test]
    fn test_missing_api_key() {
        let err = ChatAnnotator::from_env("GLOSSER_TEST_KEY_THAT_IS_NEVER_SET", ChatConfig::default()).unwrap_err();
        assert!(matches!(err, AnnotateError::MissingApiKey { .. }));
    }

    #[tokio::test]
    async fn test_empty_text_rejected_without_request() {
        let client = annotator(Provider::Openai);
        let err = client.annotate("   ", "zh-CN").await.unwrap_err();
        assert!(matches!(err, AnnotateError::EmptyText));
    }

    #[test]
    fn test_provider_serde() {
        let p: Provider = serde_yaml::from_str("kimi").unwrap();
        assert_eq!(p, Provider::Kimi);
        assert_eq!(p.to_string(), "kimi");
        assert_eq!(p.default_base_url(), "https://api.moonshot.cn");
    }
}
