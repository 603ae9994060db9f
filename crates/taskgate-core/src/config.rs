//! Configuration loaded from `~/.config/taskgate/config.toml`.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::batcher::BatcherConfig;
use crate::dispatcher::DispatcherConfig;
use crate::retry::{BackoffPolicy, ErrorClassifier};

/// Backoff shape and classifier extensions (optional `[retry]` section).
/// The base delay comes from `dispatcher.retry_delay_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Upper bound on backoff delay before jitter, in milliseconds.
    pub max_delay_ms: u64,
    /// Multiplier applied per attempt.
    pub factor: f64,
    /// Jitter range `[jitter_min, jitter_max)` applied multiplicatively.
    pub jitter_min: f64,
    pub jitter_max: f64,
    /// Extra case-insensitive substrings treated as transient errors.
    pub extra_retryable_patterns: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let b = BackoffPolicy::default();
        Self {
            max_delay_ms: b.max_delay.as_millis() as u64,
            factor: b.factor,
            jitter_min: b.jitter_min,
            jitter_max: b.jitter_max,
            extra_retryable_patterns: Vec::new(),
        }
    }
}

/// Global configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub batcher: BatcherConfig,
    /// Optional retry tuning; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl GateConfig {
    pub fn backoff_policy(&self) -> BackoffPolicy {
        let retry = self.retry.clone().unwrap_or_default();
        BackoffPolicy {
            base_delay: self.dispatcher.retry_delay(),
            max_delay: Duration::from_millis(retry.max_delay_ms),
            factor: retry.factor,
            jitter_min: retry.jitter_min,
            jitter_max: retry.jitter_max,
        }
    }

    pub fn classifier(&self) -> ErrorClassifier {
        match &self.retry {
            Some(retry) => ErrorClassifier::with_patterns(retry.extra_retryable_patterns.iter().cloned()),
            None => ErrorClassifier::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.dispatcher.max_concurrent == 0 {
            bail!("dispatcher.max_concurrent must be at least 1");
        }
        if self.dispatcher.max_queue_size == 0 {
            bail!("dispatcher.max_queue_size must be at least 1");
        }
        if self.batcher.batch_size == 0 {
            bail!("batcher.batch_size must be at least 1");
        }
        if let Some(retry) = &self.retry {
            if retry.factor.is_nan() || retry.factor <= 0.0 {
                bail!("retry.factor must be positive, got {}", retry.factor);
            }
            if retry.jitter_min < 0.0 || retry.jitter_min > retry.jitter_max {
                bail!(
                    "retry jitter range [{}, {}) is invalid",
                    retry.jitter_min,
                    retry.jitter_max
                );
            }
        }
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("taskgate")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load and validate configuration from an explicit path.
pub fn load_from_path(path: &Path) -> Result<GateConfig> {
    let data = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: GateConfig = toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<GateConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = GateConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}
