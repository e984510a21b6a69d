//! Runtime configuration for the triage worker.
//!
//! Sources, lowest precedence first: built-in defaults, an optional JSON file named by
//! `GRIDWATCH_CONFIG`, then individual `GRIDWATCH_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use gridwatch_ai::labels::default_labels;
use gridwatch_ai::{YoloConfig, DEFAULT_CONFIDENCE_THRESHOLD};

use crate::dispatch::DispatcherConfig;
use crate::media::MediaResolver;

pub const ENV_CONFIG_FILE: &str = "GRIDWATCH_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

impl ConfigError {
    fn invalid(key: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    pub model_path: PathBuf,
    pub labels: Vec<String>,
    pub confidence_threshold: f32,
    pub input_size: u32,
    pub media_root: PathBuf,
    pub workers: usize,
    pub queue_capacity: usize,
    pub detect_timeout_secs: u64,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/best.onnx"),
            labels: default_labels(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            input_size: 640,
            media_root: PathBuf::from("media"),
            workers: 2,
            queue_capacity: 64,
            detect_timeout_secs: 30,
        }
    }
}

impl TriageConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` in place of the environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(ENV_CONFIG_FILE) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_overrides<F>(&mut self, lookup: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("GRIDWATCH_MODEL_PATH") {
            self.model_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("GRIDWATCH_LABELS") {
            self.labels = v
                .split(',')
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = lookup("GRIDWATCH_MEDIA_ROOT") {
            self.media_root = PathBuf::from(v);
        }
        if let Some(v) = lookup("GRIDWATCH_CONFIDENCE") {
            self.confidence_threshold = parse("GRIDWATCH_CONFIDENCE", &v)?;
        }
        if let Some(v) = lookup("GRIDWATCH_INPUT_SIZE") {
            self.input_size = parse("GRIDWATCH_INPUT_SIZE", &v)?;
        }
        if let Some(v) = lookup("GRIDWATCH_WORKERS") {
            self.workers = parse("GRIDWATCH_WORKERS", &v)?;
        }
        if let Some(v) = lookup("GRIDWATCH_QUEUE_CAPACITY") {
            self.queue_capacity = parse("GRIDWATCH_QUEUE_CAPACITY", &v)?;
        }
        if let Some(v) = lookup("GRIDWATCH_DETECT_TIMEOUT_SECS") {
            self.detect_timeout_secs = parse("GRIDWATCH_DETECT_TIMEOUT_SECS", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.confidence_threshold > 0.0 && self.confidence_threshold < 1.0) {
            return Err(ConfigError::invalid(
                "confidence_threshold",
                format!("must be within (0, 1), got {}", self.confidence_threshold),
            ));
        }
        if self.labels.is_empty() {
            return Err(ConfigError::invalid("labels", "at least one label is required"));
        }
        if self.input_size == 0 || self.input_size % 32 != 0 {
            return Err(ConfigError::invalid(
                "input_size",
                format!("must be a positive multiple of 32, got {}", self.input_size),
            ));
        }
        if self.workers == 0 {
            return Err(ConfigError::invalid("workers", "must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::invalid("queue_capacity", "must be at least 1"));
        }
        if self.detect_timeout_secs == 0 {
            return Err(ConfigError::invalid("detect_timeout_secs", "must be at least 1"));
        }
        Ok(())
    }

    pub fn yolo(&self) -> YoloConfig {
        YoloConfig {
            model_path: self.model_path.clone(),
            labels: self.labels.clone(),
            input_size: self.input_size,
        }
    }

    pub fn dispatcher(&self) -> DispatcherConfig {
        DispatcherConfig::default()
            .with_workers(self.workers)
            .with_queue_capacity(self.queue_capacity)
    }

    /// One running inference per worker.
    pub fn inference_limit(&self) -> usize {
        self.workers
    }

    pub fn media(&self) -> MediaResolver {
        MediaResolver::new(&self.media_root)
    }

    pub fn detect_timeout(&self) -> Duration {
        Duration::from_secs(self.detect_timeout_secs)
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| ConfigError::invalid(key, format!("{raw:?}: {e}")))
}
