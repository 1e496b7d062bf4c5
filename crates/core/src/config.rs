use crate::error::{Error, Result};
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for the datapolish system
///
/// Read once at startup and immutable for the lifetime of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the source dataset
    #[serde(default = "default_input_file")]
    pub input_file: PathBuf,

    /// Path for the final combined output
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,

    /// Number of worker processes the dataset is split across
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Directory where fragment files are written
    #[serde(default = "default_fragment_dir")]
    pub fragment_dir: PathBuf,

    /// Directory where workers write results, checkpoints, progress and logs
    #[serde(default = "default_result_dir")]
    pub result_dir: PathBuf,

    /// Enhancement service configuration
    #[serde(default)]
    pub enhancer: EnhancerConfig,

    /// Worker processing configuration
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Coordinator monitoring configuration
    #[serde(default)]
    pub monitor: MonitorConfig,
}

/// Configuration for the enhancement service collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancerConfig {
    /// Base URL of the Ollama-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name used for enhancement
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Maximum tokens generated per enhancement
    #[serde(default = "default_num_predict")]
    pub num_predict: u32,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How long to wait for the service to become reachable at startup
    #[serde(default = "default_readiness_timeout_secs")]
    pub readiness_timeout_secs: u64,

    /// GPU memory hint passed through to the service environment (MB)
    #[serde(default = "default_gpu_memory_limit_mb")]
    pub gpu_memory_limit_mb: u64,
}

/// Configuration for checkpointed worker processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Persist a full checkpoint every this many processed entries
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,

    /// Refresh the lightweight progress record every this many entries
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,

    /// Enhancement attempts per entry before degrading to the original
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Fixed backoff between enhancement attempts in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Fixed pause after every entry in milliseconds (request rate bound)
    #[serde(default = "default_entry_pause_ms")]
    pub entry_pause_ms: u64,
}

/// Configuration for coordinator-side progress monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Interval between log/progress polls per worker, in milliseconds
    #[serde(default = "default_log_poll_interval_ms")]
    pub log_poll_interval_ms: u64,

    /// Interval between live display refreshes, in milliseconds
    #[serde(default = "default_display_refresh_ms")]
    pub display_refresh_ms: u64,

    /// Interval between result-file existence checks, in seconds
    #[serde(default = "default_result_poll_interval_secs")]
    pub result_poll_interval_secs: u64,

    /// A worker with no updates for this long is flagged as idle
    #[serde(default = "default_idle_threshold_secs")]
    pub idle_threshold_secs: u64,
}

fn default_input_file() -> PathBuf {
    PathBuf::from("/data/dataset.json")
}

fn default_output_file() -> PathBuf {
    PathBuf::from("/results/dataset.enhanced.json")
}

fn default_workers() -> usize {
    4
}

fn default_fragment_dir() -> PathBuf {
    PathBuf::from("/data/fragments")
}

fn default_result_dir() -> PathBuf {
    PathBuf::from("/results/fragments")
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "gemma3:1b-it-qat".to_string()
}

fn default_temperature() -> f64 {
    0.2
}

fn default_num_predict() -> u32 {
    256
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_readiness_timeout_secs() -> u64 {
    120
}

fn default_gpu_memory_limit_mb() -> u64 {
    2048
}

fn default_checkpoint_interval() -> usize {
    100
}

fn default_progress_interval() -> usize {
    10
}

fn default_max_retries() -> usize {
    3
}

fn default_retry_backoff_ms() -> u64 {
    2000
}

fn default_entry_pause_ms() -> u64 {
    100
}

fn default_log_poll_interval_ms() -> u64 {
    1000
}

fn default_display_refresh_ms() -> u64 {
    2000
}

fn default_result_poll_interval_secs() -> u64 {
    5
}

fn default_idle_threshold_secs() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_file: default_input_file(),
            output_file: default_output_file(),
            workers: default_workers(),
            fragment_dir: default_fragment_dir(),
            result_dir: default_result_dir(),
            enhancer: EnhancerConfig::default(),
            worker: WorkerConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl Default for EnhancerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            num_predict: default_num_predict(),
            request_timeout_secs: default_request_timeout_secs(),
            readiness_timeout_secs: default_readiness_timeout_secs(),
            gpu_memory_limit_mb: default_gpu_memory_limit_mb(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: default_checkpoint_interval(),
            progress_interval: default_progress_interval(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            entry_pause_ms: default_entry_pause_ms(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            log_poll_interval_ms: default_log_poll_interval_ms(),
            display_refresh_ms: default_display_refresh_ms(),
            result_poll_interval_secs: default_result_poll_interval_secs(),
            idle_threshold_secs: default_idle_threshold_secs(),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file with environment variable overrides
    ///
    /// Environment variables are prefixed with `DATAPOLISH_` and use double
    /// underscores for nested values. For example:
    /// - `DATAPOLISH_WORKERS=8`
    /// - `DATAPOLISH_ENHANCER__MODEL=phi:mini`
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        // Add the config file if it exists
        if path.exists() {
            builder = builder.add_source(File::from(path));
        }

        // Add environment variables with DATAPOLISH_ prefix
        builder = builder.add_source(
            Environment::with_prefix("DATAPOLISH")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize config: {e}")))
    }

    /// Creates a config from a TOML string (useful for testing)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("Failed to parse TOML: {e}")))
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::config(
                "Invalid worker count: must be at least 1".to_string(),
            ));
        }

        if self.worker.checkpoint_interval == 0 {
            return Err(Error::config(
                "Invalid checkpoint interval: must be at least 1".to_string(),
            ));
        }

        if self.worker.progress_interval == 0 {
            return Err(Error::config(
                "Invalid progress interval: must be at least 1".to_string(),
            ));
        }

        if self.worker.max_retries == 0 {
            return Err(Error::config(
                "Invalid max retries: must be at least 1".to_string(),
            ));
        }

        if self.enhancer.base_url.is_empty() {
            return Err(Error::config("Enhancer base URL must not be empty".to_string()));
        }

        if !(0.0..=2.0).contains(&self.enhancer.temperature) {
            return Err(Error::config(format!(
                "Invalid temperature {}. Must be between 0.0 and 2.0",
                self.enhancer.temperature
            )));
        }

        if self.monitor.log_poll_interval_ms == 0
            || self.monitor.display_refresh_ms == 0
            || self.monitor.result_poll_interval_secs == 0
        {
            return Err(Error::config(
                "Monitor intervals must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Saves the configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, toml_string)
            .map_err(|e| Error::config(format!("Failed to write config file: {e}")))?;

        Ok(())
    }
}
