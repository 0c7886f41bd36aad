use eyre::{Context, Result};
use glosser::annotate::{ChatConfig, Provider};
use glosser::scheduler::{SchedulerConfig, SourceScript};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scheduler: SchedulerSection,
    pub annotator: AnnotatorSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    pub max_concurrent: usize,
    pub prefetch_margin_px: f64,
    pub min_text_len: usize,
    pub coalesce_delay_ms: u64,
    pub observer_retry_ms: u64,
    pub source_script: SourceScript,
    pub target_language: String,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            prefetch_margin_px: 300.0,
            min_text_len: 3,
            coalesce_delay_ms: 0,
            observer_retry_ms: 100,
            source_script: SourceScript::Latin,
            target_language: "zh-CN".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotatorSection {
    pub provider: Provider,
    pub base_url: Option<String>,
    pub model: Option<String>,
    /// Environment variable holding the API key; provider default when unset
    pub api_key_env: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

impl Default for AnnotatorSection {
    fn default() -> Self {
        Self {
            provider: Provider::Deepseek,
            base_url: None,
            model: None,
            api_key_env: None,
            temperature: 0.7,
            max_tokens: 2000,
            timeout_ms: 60000,
        }
    }
}

impl AnnotatorSection {
    pub fn api_key_env(&self) -> &str {
        self.api_key_env
            .as_deref()
            .unwrap_or_else(|| self.provider.default_api_key_env())
    }

    pub fn chat_config(&self) -> ChatConfig {
        let mut chat = ChatConfig::for_provider(self.provider);
        if let Some(base_url) = &self.base_url {
            chat.base_url = base_url.clone();
        }
        if let Some(model) = &self.model {
            chat.model = model.clone();
        }
        chat.temperature = self.temperature;
        chat.max_tokens = self.max_tokens;
        chat.timeout = Duration::from_millis(self.timeout_ms);
        chat
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Runtime settings for the scheduler
    pub fn scheduler_config(&self) -> SchedulerConfig {
        let s = &self.scheduler;
        SchedulerConfig {
            max_concurrent: s.max_concurrent.max(1),
            prefetch_margin: s.prefetch_margin_px,
            min_text_len: s.min_text_len,
            coalesce_delay: Duration::from_millis(s.coalesce_delay_ms),
            observer_retry: Duration::from_millis(s.observer_retry_ms),
            source_script: s.source_script,
            target_language: s.target_language.clone(),
        }
    }
}
