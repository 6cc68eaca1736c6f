use std::{path::Path, time::Duration};

use thiserror::Error;

const ENV_PREFIX: &str = "WALKIE_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("line {line}: expected `key = value`")]
    Syntax { line: usize },
    #[error("unknown config key `{0}`")]
    UnknownKey(String),
    #[error("invalid value `{value}` for `{key}`")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Samples at most this far from the last accepted point are treated as GPS noise.
    pub noise_threshold_m: f64,
    pub kcal_per_km: f64,
    /// How often stats are republished while a walk is active.
    pub tick_interval: Duration,

    pub api_base_url: String,
    pub api_token: Option<String>,
    pub request_timeout: Duration,
    /// Upper bound on waiting for the first fix when starting a walk.
    pub fix_timeout: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            noise_threshold_m: 1.0,
            kcal_per_km: 50.0,
            tick_interval: Duration::from_secs(1),
            api_base_url: "http://localhost:5000/api".to_string(),
            api_token: None,
            request_timeout: Duration::from_secs(10),
            fix_timeout: Duration::from_secs(20),
        }
    }
}

impl TrackerConfig {
    /// Parses `key = value` lines on top of the defaults. Blank lines and `#` comments are skipped.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::Syntax { line: index + 1 });
            };
            config.set(key.trim(), value.trim())?;
        }

        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Applies `WALKIE_*` variables from the process environment.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_vars(std::env::vars())
    }

    /// `WALKIE_NOISE_THRESHOLD_M=2` sets `noise_threshold_m`, and so on. Prefixed names that
    /// are not config keys are skipped with a warning; bad values are still errors.
    pub fn with_vars(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Result<Self, ConfigError> {
        for (name, value) in vars {
            let Some(key) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };

            match self.set(&key.to_ascii_lowercase(), value.trim()) {
                Err(ConfigError::UnknownKey(_)) => tracing::warn!("Ignoring {}, not a tracker setting", name),
                result => result?,
            }
        }
        Ok(self)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };

        match key {
            "noise_threshold_m" => self.noise_threshold_m = parse_non_negative(value).ok_or_else(invalid)?,
            "kcal_per_km" => self.kcal_per_km = parse_non_negative(value).ok_or_else(invalid)?,
            "tick_interval_ms" => self.tick_interval = parse_millis(value).ok_or_else(invalid)?,
            "api_base_url" => {
                if value.is_empty() {
                    return Err(invalid());
                }
                self.api_base_url = value.trim_end_matches('/').to_string();
            }
            "api_token" => self.api_token = (!value.is_empty()).then(|| value.to_string()),
            "request_timeout_ms" => self.request_timeout = parse_millis(value).ok_or_else(invalid)?,
            "fix_timeout_ms" => self.fix_timeout = parse_millis(value).ok_or_else(invalid)?,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }

        Ok(())
    }
}

fn parse_non_negative(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

fn parse_millis(value: &str) -> Option<Duration> {
    value.parse::<u64>().ok().filter(|ms| *ms > 0).map(Duration::from_millis)
}
