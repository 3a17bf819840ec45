//! LLM configuration persistence and per-model pricing.

use std::path::{Path, PathBuf};
use std::time::Duration;

use casefile_core::CostModel;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::types::LlmProvider;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Published rates in cents per million tokens: (model, input, output).
pub const MODEL_RATES: &[(&str, f64, f64)] = &[
    ("gpt-4o-mini", 15.0, 60.0),
    ("gpt-4o", 250.0, 1000.0),
    ("gpt-4.1-mini", 40.0, 160.0),
    ("gpt-4.1-nano", 10.0, 40.0),
    ("llama-3.3-70b-versatile", 59.0, 79.0),
    ("llama-3.1-8b-instant", 5.0, 8.0),
];

/// Stored LLM configuration (persisted to llm-config.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: LlmProvider,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Overrides the provider's default endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    /// Overrides the built-in rate for `model`.
    #[serde(default)]
    pub input_cents_per_mtok: Option<f64>,
    #[serde(default)]
    pub output_cents_per_mtok: Option<f64>,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Path to config file for saving.
    #[serde(skip)]
    pub config_path: PathBuf,
}

fn default_provider() -> LlmProvider {
    LlmProvider::OpenAI
}
fn default_model() -> String {
    DEFAULT_MODEL.into()
}
fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            api_key: None,
            base_url: None,
            model: DEFAULT_MODEL.into(),
            input_cents_per_mtok: None,
            output_cents_per_mtok: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            config_path: PathBuf::new(),
        }
    }
}

impl LlmConfig {
    /// Load config from file, falling back to env vars and defaults.
    pub fn load(config_path: &Path) -> Self {
        let mut config: LlmConfig = match std::fs::read_to_string(config_path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                warn!("Ignoring unreadable {}: {}", config_path.display(), e);
                LlmConfig::default()
            }),
            Err(_) => LlmConfig::default(),
        };
        config.config_path = config_path.to_path_buf();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var("CASEFILE_LLM_API_KEY")
                .or_else(|_| std::env::var("OPENAI_API_KEY"))
                .ok()
                .filter(|k| !k.trim().is_empty());
        }
        if let Ok(url) = std::env::var("CASEFILE_LLM_BASE_URL") {
            self.base_url = Some(url);
        }
        if let Ok(model) = std::env::var("CASEFILE_LLM_MODEL") {
            self.model = model;
        }
    }

    /// Save config to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&self.config_path, json)?;
        info!("Saved LLM config to {}", self.config_path.display());
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Rates for the configured model. Explicit overrides win; unknown
    /// models fall back to the default model's rates.
    pub fn cost_model(&self) -> CostModel {
        let (input, output) = MODEL_RATES
            .iter()
            .find(|(m, _, _)| *m == self.model)
            .map(|(_, i, o)| (*i, *o))
            .unwrap_or_else(|| {
                let fallback = CostModel::default();
                (fallback.input_cents_per_mtok, fallback.output_cents_per_mtok)
            });
        CostModel::new(
            self.input_cents_per_mtok.unwrap_or(input),
            self.output_cents_per_mtok.unwrap_or(output),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = LlmConfig::load(&dir.path().join("llm-config.json"));
        assert_eq!(config.model, std::env::var("CASEFILE_LLM_MODEL").unwrap_or(DEFAULT_MODEL.into()));
        assert_eq!(config.timeout_seconds, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("llm-config.json");
        let config = LlmConfig {
            provider: LlmProvider::Groq,
            api_key: Some("file-key".into()),
            input_cents_per_mtok: Some(1.0),
            config_path: path.clone(),
            ..Default::default()
        };
        config.save().unwrap();

        let loaded = LlmConfig::load(&path);
        assert_eq!(loaded.provider, LlmProvider::Groq);
        assert_eq!(loaded.api_key.as_deref(), Some("file-key"));
        if std::env::var("CASEFILE_LLM_BASE_URL").is_err() {
            assert_eq!(loaded.base_url(), "https://api.groq.com/openai/v1");
        }
    }

    #[test]
    fn test_cost_model_rates() {
        let config = LlmConfig {
            model: "gpt-4o".into(),
            ..Default::default()
        };
        assert_eq!(config.cost_model(), CostModel::new(250.0, 1000.0));

        let overridden = LlmConfig {
            model: "some-local-model".into(),
            output_cents_per_mtok: Some(0.0),
            ..Default::default()
        };
        assert_eq!(overridden.cost_model(), CostModel::new(15.0, 0.0));
    }
}
