use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Value shipped in the sample config; treated as "no key configured".
pub const PLACEHOLDER_API_KEY: &str = "YOUR_DEEPL_API_KEY_HERE";

/// DeepL accepts at most 50 texts per translate request.
pub const MAX_BATCH_SIZE: usize = 50;

pub const FREE_API_URL: &str = "https://api-free.deepl.com";
pub const PRO_API_URL: &str = "https://api.deepl.com";

/// English words MTool exports commonly carry untranslated (menu labels, switches).
pub const DEFAULT_SKIP_PATTERNS: &[&str] = &[
    "Scene", "Attack", "Fire", "Ice", "Thunder", "Water", "Wind", "Heal", "Magic", "Battle",
    "Save", "Load", "Menu", "Title", "false", "true", "ON", "OFF", "Graphics", "Data", "Window",
];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // DeepL
    #[serde(default)]
    pub deepl_api_key: String,
    #[serde(default = "default_source_language")]
    pub source_language: String,
    #[serde(default = "default_target_language")]
    pub target_language: String,
    /// Base URL; derived from the key type when unset
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default = "default_model_type")]
    pub model_type: Option<String>,
    #[serde(default)]
    pub formality: Option<String>,
    #[serde(default)]
    pub glossary_id: Option<String>,

    // Batching and pacing
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Seconds to wait between two batch requests
    #[serde(default = "default_delay")]
    pub delay_between_requests: f64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Seconds before the first retry; doubles on every further retry
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay: f64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: f64,

    // Files
    #[serde(default)]
    pub input_file: PathBuf,
    #[serde(default)]
    pub output_file: PathBuf,
    #[serde(default = "default_true")]
    pub save_partial_on_error: bool,

    // Filtering
    #[serde(default = "default_skip_patterns")]
    pub skip_patterns: Vec<String>,
}

fn default_source_language() -> String {
    "JA".to_string()
}

fn default_target_language() -> String {
    "EN-US".to_string()
}

fn default_model_type() -> Option<String> {
    Some("prefer_quality_optimized".to_string())
}

fn default_batch_size() -> usize {
    MAX_BATCH_SIZE
}

fn default_delay() -> f64 {
    1.0
}

fn default_max_retries() -> u32 {
    4
}

fn default_retry_base_delay() -> f64 {
    1.0
}

fn default_request_timeout() -> f64 {
    60.0
}

fn default_true() -> bool {
    true
}

fn default_skip_patterns() -> Vec<String> {
    DEFAULT_SKIP_PATTERNS.iter().map(|s| s.to_string()).collect()
}

impl Config {
    /// Read the config file and apply environment overrides.
    ///
    /// Validation is left to the caller so command-line overrides can be
    /// applied first; see [`validate`](Self::validate).
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse a config file without environment overrides or validation.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Config file {} not found or unreadable", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("Invalid JSON in config file {}", path.display()))
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(raw)?;
        Ok(config)
    }

    /// Environment variables win over the file so the key can stay out of it.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(key) = std::env::var("DEEPL_API_KEY") {
            if !key.trim().is_empty() {
                self.deepl_api_key = key;
            }
        }
        if let Ok(lang) = std::env::var("DEEPL_SOURCE_LANG") {
            self.source_language = lang;
        }
        if let Ok(lang) = std::env::var("DEEPL_TARGET_LANG") {
            self.target_language = lang;
        }
        if let Ok(url) = std::env::var("DEEPL_API_URL") {
            self.api_url = Some(url);
        }
        if let Ok(size) = std::env::var("DEEPL_BATCH_SIZE") {
            self.batch_size = size
                .trim()
                .parse()
                .with_context(|| format!("DEEPL_BATCH_SIZE is not a number: {:?}", size))?;
        }
        Ok(())
    }

    /// Check everything a translation run needs.
    pub fn validate(&mut self) -> Result<()> {
        self.validate_api()?;

        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            bail!(
                "batch_size must be between 1 and {}, got {}",
                MAX_BATCH_SIZE,
                self.batch_size
            );
        }

        if self.input_file.as_os_str().is_empty() {
            bail!("input_file is not set");
        }
        if self.output_file.as_os_str().is_empty() {
            bail!("output_file is not set");
        }

        Ok(())
    }

    /// Check the fields used to talk to DeepL and normalize language codes
    /// to upper case. Enough for a usage query; file paths are not required.
    pub fn validate_api(&mut self) -> Result<()> {
        self.deepl_api_key = self.deepl_api_key.trim().to_string();
        if self.deepl_api_key.is_empty() {
            bail!("deepl_api_key is not set (config file or DEEPL_API_KEY)");
        }
        if self.deepl_api_key == PLACEHOLDER_API_KEY {
            bail!("Please set your DeepL API key: deepl_api_key still holds the placeholder");
        }

        self.source_language = self.source_language.trim().to_uppercase();
        self.target_language = self.target_language.trim().to_uppercase();
        if self.source_language.is_empty() {
            bail!("source_language must not be empty");
        }
        if self.target_language.is_empty() {
            bail!("target_language must not be empty");
        }

        check_seconds("delay_between_requests", self.delay_between_requests)?;
        check_seconds("retry_base_delay", self.retry_base_delay)?;
        check_seconds("request_timeout", self.request_timeout)?;
        if self.request_timeout == 0.0 {
            bail!("request_timeout must be greater than zero");
        }

        // Treat empty optional strings like absent ones
        for field in [&mut self.model_type, &mut self.formality, &mut self.glossary_id] {
            if field.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *field = None;
            }
        }

        Ok(())
    }

    /// Keys issued for the free plan end in ":fx" and must use the free host.
    pub fn is_free_key(&self) -> bool {
        self.deepl_api_key.ends_with(":fx")
    }

    /// Base URL of the DeepL API, without a trailing slash.
    pub fn api_base_url(&self) -> String {
        let base = match &self.api_url {
            Some(url) => url.as_str(),
            None if self.is_free_key() => FREE_API_URL,
            None => PRO_API_URL,
        };
        base.trim_end_matches('/').to_string()
    }

    pub fn delay_between_requests(&self) -> Duration {
        seconds(self.delay_between_requests)
    }

    pub fn retry_base_delay(&self) -> Duration {
        seconds(self.retry_base_delay)
    }

    pub fn request_timeout(&self) -> Duration {
        seconds(self.request_timeout)
    }
}

/// Longest accepted delay or timeout (one day).
pub const MAX_SECONDS: f64 = 86_400.0;

fn check_seconds(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        bail!("{} must be a non-negative number of seconds, got {}", field, value);
    }
    if value > MAX_SECONDS {
        bail!("{} must be at most {} seconds, got {}", field, MAX_SECONDS, value);
    }
    Ok(())
}

// Unvalidated values saturate instead of panicking
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(if value > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}
