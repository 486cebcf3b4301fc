use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::interview::InterviewSettings;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Number of questions requested from the generator per session.
    pub question_count: usize,
    /// Pause between the end of a spoken prompt and the start of capture.
    pub listen_debounce_ms: u64,
    /// Sessions not polled for this long are disposed and forgotten.
    pub session_idle_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let config = Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            question_count: env_or("INTERVIEW_QUESTION_COUNT", 8)?,
            listen_debounce_ms: env_or("LISTEN_DEBOUNCE_MS", 500)?,
            session_idle_timeout_secs: env_or("SESSION_IDLE_TIMEOUT_SECS", 1800)?,
        };

        if config.question_count == 0 {
            bail!("INTERVIEW_QUESTION_COUNT must be at least 1");
        }
        if config.session_idle_timeout_secs == 0 {
            bail!("SESSION_IDLE_TIMEOUT_SECS must be at least 1");
        }

        Ok(config)
    }

    pub fn interview_settings(&self) -> InterviewSettings {
        InterviewSettings {
            question_count: self.question_count,
            listen_debounce: Duration::from_millis(self.listen_debounce_ms),
        }
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout_secs)
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("{key} has an invalid value: '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_accepts_padded_numbers() {
        let port: u16 = parse_value("PORT", " 9090 ").unwrap();
        assert_eq!(port, 9090);
    }

    #[test]
    fn test_parse_value_rejects_garbage() {
        let result: Result<u64> = parse_value("LISTEN_DEBOUNCE_MS", "soon");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("LISTEN_DEBOUNCE_MS"));
    }

    #[test]
    fn test_interview_settings_from_config() {
        let config = Config {
            anthropic_api_key: "test".to_string(),
            port: 8080,
            rust_log: "info".to_string(),
            question_count: 5,
            listen_debounce_ms: 750,
            session_idle_timeout_secs: 900,
        };
        let settings = config.interview_settings();
        assert_eq!(settings.question_count, 5);
        assert_eq!(settings.listen_debounce, Duration::from_millis(750));
        assert_eq!(config.session_idle_timeout(), Duration::from_secs(900));
    }
}
