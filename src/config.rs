use crate::error::ConfigError;
use crate::types::Language;
use std::collections::HashMap;
use std::time::Duration;

/// Bundled defaults, used when neither `.env` nor the environment sets a key.
const BUNDLED_CONFIG: &str = include_str!("../assets/config.env");

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_STREAM_SECS: u64 = 120;
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub api_base_url: String,
    pub language: Language,
    pub streaming: bool,
    pub connect_timeout: Duration,
    pub max_stream_duration: Duration,
    pub strict_decoding: bool,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            language: Language::English,
            streaming: true,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            max_stream_duration: Duration::from_secs(DEFAULT_MAX_STREAM_SECS),
            strict_decoding: false,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl Config {
    /// Load from `.env`, then the process environment, then the bundled defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env is normal outside development.
        let _ = dotenvy::dotenv();
        let bundled = parse_env_file(BUNDLED_CONFIG);
        Self::from_lookup(|key| std::env::var(key).ok().or_else(|| bundled.get(key).cloned()))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_base_url = get("SAHAB_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base_url);

        let language = match get("SAHAB_LANGUAGE") {
            Some(raw) => raw
                .parse::<Language>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: "SAHAB_LANGUAGE",
                    value: raw.clone(),
                    reason: e.to_string(),
                })?,
            None => defaults.language,
        };

        let streaming = match get("SAHAB_STREAMING") {
            Some(raw) => parse_flag("SAHAB_STREAMING", &raw)?,
            None => defaults.streaming,
        };
        let strict_decoding = match get("SAHAB_STRICT_DECODING") {
            Some(raw) => parse_flag("SAHAB_STRICT_DECODING", &raw)?,
            None => defaults.strict_decoding,
        };
        let connect_timeout = match get("SAHAB_CONNECT_TIMEOUT_SECS") {
            Some(raw) => parse_secs("SAHAB_CONNECT_TIMEOUT_SECS", &raw)?,
            None => defaults.connect_timeout,
        };
        let max_stream_duration = match get("SAHAB_MAX_STREAM_SECS") {
            Some(raw) => parse_secs("SAHAB_MAX_STREAM_SECS", &raw)?,
            None => defaults.max_stream_duration,
        };
        let log_level = get("SAHAB_LOG_LEVEL").unwrap_or(defaults.log_level);

        Ok(Self {
            api_base_url,
            language,
            streaming,
            connect_timeout,
            max_stream_duration,
            strict_decoding,
            log_level,
        })
    }

    pub fn chat_endpoint(&self) -> String {
        format!("{}/chat", self.api_base_url)
    }
}

/// Parse `KEY=VALUE` lines, skipping blanks and `#` comments.
fn parse_env_file(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
            reason: "expected true or false".into(),
        }),
    }
}

fn parse_secs(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
            reason: "expected a positive number of seconds".into(),
        }),
    }
}
