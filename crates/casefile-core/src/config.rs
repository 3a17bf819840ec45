//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Paths to all Casefile data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// SQLite database directory (`data/db/`).
    pub db: PathBuf,
    /// Per-document analysis artifacts (`data/artifacts/`).
    pub artifacts: PathBuf,
    /// LLM provider configuration (`data/llm-config.json`).
    pub llm_config_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            db: root.join("db"),
            artifacts: root.join("artifacts"),
            llm_config_file: root.join("llm-config.json"),
            root,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.db)?;
        std::fs::create_dir_all(&self.artifacts)?;
        Ok(())
    }
}

/// Knobs for the analysis pipeline. Defaults can be overridden by
/// `CASEFILE_*` environment variables and then by CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Monthly Tier-1 spend cap in cents.
    pub monthly_cap_cents: f64,
    /// Jobs pulled per `next_batch` call.
    pub batch_size: usize,
    /// Maximum characters per Tier-1 chunk.
    pub max_chunk_chars: usize,
    /// Maximum output tokens requested per chunk.
    pub max_output_tokens: u32,
    pub temperature: f64,
    /// Minimum gap between consecutive provider calls.
    pub request_delay_ms: u64,
    /// Wait after a rate-limit response before retrying the same chunk.
    pub rate_limit_backoff_ms: u64,
    /// Provider attempts per chunk before the chunk is dropped.
    pub max_chunk_attempts: u32,
    /// Job attempts before a job is terminally failed.
    pub max_job_attempts: u32,
    /// Tier 1 is not started when less than this remains in the budget.
    pub min_call_reserve_cents: f64,
    /// Priority for data sets missing from the priority table.
    pub default_priority: i32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            monthly_cap_cents: 2000.0,
            batch_size: 10,
            max_chunk_chars: 12_000,
            max_output_tokens: 4096,
            temperature: 0.1,
            request_delay_ms: 1_000,
            rate_limit_backoff_ms: 30_000,
            max_chunk_attempts: 3,
            max_job_attempts: 3,
            min_call_reserve_cents: 10.0,
            default_priority: 50,
        }
    }
}

impl PipelineConfig {
    /// Build configuration from defaults plus environment overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(v) = env_parse("CASEFILE_MONTHLY_CAP_CENTS")? {
            config.monthly_cap_cents = v;
        }
        if let Some(v) = env_parse("CASEFILE_BATCH_SIZE")? {
            config.batch_size = v;
        }
        if let Some(v) = env_parse("CASEFILE_MAX_CHUNK_CHARS")? {
            config.max_chunk_chars = v;
        }
        if let Some(v) = env_parse("CASEFILE_MAX_OUTPUT_TOKENS")? {
            config.max_output_tokens = v;
        }
        if let Some(v) = env_parse("CASEFILE_TEMPERATURE")? {
            config.temperature = v;
        }
        if let Some(v) = env_parse("CASEFILE_REQUEST_DELAY_MS")? {
            config.request_delay_ms = v;
        }
        if let Some(v) = env_parse("CASEFILE_RATE_LIMIT_BACKOFF_MS")? {
            config.rate_limit_backoff_ms = v;
        }
        if let Some(v) = env_parse("CASEFILE_MAX_CHUNK_ATTEMPTS")? {
            config.max_chunk_attempts = v;
        }
        if let Some(v) = env_parse("CASEFILE_MAX_JOB_ATTEMPTS")? {
            config.max_job_attempts = v;
        }
        if let Some(v) = env_parse("CASEFILE_MIN_CALL_RESERVE_CENTS")? {
            config.min_call_reserve_cents = v;
        }
        if let Some(v) = env_parse("CASEFILE_DEFAULT_PRIORITY")? {
            config.default_priority = v;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.monthly_cap_cents < 0.0 {
            return Err(Error::Config("monthly cap must not be negative".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch size must be at least 1".into()));
        }
        if self.max_chunk_chars < 500 {
            return Err(Error::Config("max chunk chars must be at least 500".into()));
        }
        if self.max_chunk_attempts == 0 || self.max_job_attempts == 0 {
            return Err(Error::Config("attempt limits must be at least 1".into()));
        }
        Ok(())
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_millis(self.rate_limit_backoff_ms)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} has invalid value {:?}", key, raw))),
        Err(_) => Ok(None),
    }
}

/// Top-level Casefile configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CasefileConfig {
    pub data_paths: DataPaths,
    pub pipeline: PipelineConfig,
}

impl CasefileConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_paths = DataPaths::new(data_dir)?;
        let pipeline = PipelineConfig::from_env()?;
        Ok(Self {
            data_paths,
            pipeline,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_paths_create_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path()).unwrap();
        assert!(paths.db.is_dir());
        assert!(paths.artifacts.is_dir());
        assert_eq!(paths.llm_config_file, dir.path().join("llm-config.json"));
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_job_attempts, 3);
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let config = PipelineConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
