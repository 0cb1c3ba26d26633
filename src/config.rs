//! Runtime configuration.
//!
//! Read from TOML (`--config PATH`, or `<config dir>/dashfeed/config.toml` when
//! that file exists), then patched from the environment. Every field has a
//! default, so an empty file is a valid config.
//!
//! ```toml
//! [ai]
//! endpoint = "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
//! max_attempts = 3
//! backoff_unit_ms = 1000
//!
//! [statistics]
//! base_url = "https://api.worldbank.org/v2"
//! default_start_year = 2000
//! source = 2
//! ```
use crate::fetcher::RetryPolicy;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_AI_ENDPOINT: &str = "DASHFEED_AI_ENDPOINT";
pub const ENV_WB_BASE_URL: &str = "DASHFEED_WB_BASE_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub endpoint: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub backoff_unit_ms: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent".into(),
            api_key_env: "DASHFEED_API_KEY".into(),
            timeout_secs: 60,
            max_attempts: 3,
            backoff_unit_ms: 1000,
        }
    }
}

impl AiConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff_unit: Duration::from_millis(self.backoff_unit_ms),
        }
    }

    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// First year of the default range; the range ends at the current year.
    pub default_start_year: i32,
    /// World Bank source id for joined multi-indicator requests.
    pub source: Option<u32>,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.worldbank.org/v2".into(),
            timeout_secs: 30,
            default_start_year: 2000,
            source: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ai: AiConfig,
    pub statistics: StatisticsConfig,
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("dashfeed").join("config.toml"))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parse config toml")
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_toml_str(&s).with_context(|| format!("in {}", path.display()))
    }

    /// An explicit path must exist; the default path is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut cfg = match explicit {
            Some(p) => Self::from_file(p)?,
            None => match Self::default_path() {
                Some(p) if p.is_file() => {
                    log::debug!("loading config from {}", p.display());
                    Self::from_file(&p)?
                }
                _ => Self::default(),
            },
        };
        cfg.apply_env_with(|k| std::env::var(k).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply environment overrides from `lookup`.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup(ENV_AI_ENDPOINT).filter(|v| !v.trim().is_empty()) {
            self.ai.endpoint = v;
        }
        if let Some(v) = lookup(ENV_WB_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.statistics.base_url = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.ai.max_attempts == 0 {
            bail!("ai.max_attempts must be at least 1");
        }
        if self.ai.endpoint.trim().is_empty() {
            bail!("ai.endpoint must not be empty");
        }
        if self.statistics.base_url.trim().is_empty() {
            bail!("statistics.base_url must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = Config::from_toml_str("[ai]\nmax_attempts = 5\n").unwrap();
        assert_eq!(cfg.ai.max_attempts, 5);
        assert_eq!(cfg.ai.backoff_unit_ms, 1000);
        assert_eq!(cfg.statistics, StatisticsConfig::default());
    }

    #[test]
    fn env_overrides_endpoints() {
        let mut cfg = Config::default();
        cfg.apply_env_with(|k| match k {
            ENV_AI_ENDPOINT => Some("http://localhost:1/gen".into()),
            _ => None,
        });
        assert_eq!(cfg.ai.endpoint, "http://localhost:1/gen");
        assert_eq!(cfg.statistics.base_url, "https://api.worldbank.org/v2");
    }

    #[test]
    fn zero_attempts_rejected() {
        let cfg = Config::from_toml_str("[ai]\nmax_attempts = 0\n").unwrap();
        assert!(cfg.validate().is_err());
    }
}
