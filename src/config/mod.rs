//! Configuration module - environment variable parsing

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::util::rate_limit::IGNORED_LOG_RATE_LIMIT;
use crate::weapon::{Ruleset, RulesetError, RulesetPreset};

/// Fire-control configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Weapon table, falloff toggle and shot tolerance
    pub ruleset: Arc<Ruleset>,
    /// Ignored-request warnings each session may log per second
    pub ignored_log_per_second: u32,
}

impl Config {
    /// Apply a `.env` file if present, then read the environment
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_level = lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let mut ruleset = match lookup("RULESET_PATH") {
            Some(path) => {
                let path = PathBuf::from(path);
                let json = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::RulesetFile { path, source })?;
                Ruleset::from_json(&json)?
            }
            None => {
                let preset = lookup("FIRE_RULESET").unwrap_or_else(|| "classic".to_string());
                Ruleset::preset(preset.parse::<RulesetPreset>()?)
            }
        };

        let falloff_enabled = parse_opt::<bool>(&lookup, "FALLOFF_ENABLED")?;
        let falloff_k = parse_opt::<f64>(&lookup, "FALLOFF_K")?;
        if falloff_enabled.is_some() || falloff_k.is_some() {
            let enabled = falloff_enabled.unwrap_or(true);
            let falloff = enabled.then(|| {
                let mut falloff = ruleset.falloff().copied().unwrap_or_default();
                if let Some(k) = falloff_k {
                    falloff.k = k;
                }
                falloff
            });
            ruleset = ruleset.with_falloff(falloff)?;
        }

        if let Some(tolerance) = parse_opt::<u32>(&lookup, "CLIP_TOLERANCE")? {
            ruleset = ruleset.with_clip_tolerance(tolerance);
        }

        let ignored_log_per_second =
            parse_opt::<u32>(&lookup, "IGNORED_LOG_PER_SECOND")?.unwrap_or(IGNORED_LOG_RATE_LIMIT);

        Ok(Self {
            log_level,
            ruleset: Arc::new(ruleset),
            ignored_log_per_second,
        })
    }

    /// Defaults with a specific ruleset
    pub fn with_ruleset(ruleset: Ruleset) -> Self {
        Self {
            ruleset: Arc::new(ruleset),
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            ruleset: Arc::new(Ruleset::default()),
            ignored_log_per_second: IGNORED_LOG_RATE_LIMIT,
        }
    }
}

fn parse_opt<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("Failed to read ruleset file {path:?}: {source}")]
    RulesetFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Ruleset(#[from] RulesetError),
}
