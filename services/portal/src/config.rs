//! services/portal/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use portal_core::UserProfile;
use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

pub const DEFAULT_API_URL: &str = "http://localhost:5000";
pub const DEFAULT_COURSE_URL: &str = "https://contentcourse.ccbp.tech/";
pub const DEFAULT_EXAM_URL: &str = "https://manpowerexams.ccbp.tech/";

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_url: Url,
    pub request_timeout: Duration,
    pub log_level: Level,
    pub state_path: PathBuf,
    pub course_url: Url,
    pub exam_url: Url,
    pub default_identity: UserProfile,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Backend ---
        let api_url = parse_url("PORTAL_API_URL", &var_or("PORTAL_API_URL", DEFAULT_API_URL))?;

        let timeout_str = var_or("PORTAL_TIMEOUT_SECS", "15");
        let timeout_secs = timeout_str
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "PORTAL_TIMEOUT_SECS".to_string(),
                    format!("'{}' is not a positive number of seconds", timeout_str),
                )
            })?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Local session storage ---
        let state_path = std::env::var("PORTAL_STATE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.portal/session.json"));

        // --- Embedded platforms ---
        let course_url = parse_url(
            "PORTAL_COURSE_URL",
            &var_or("PORTAL_COURSE_URL", DEFAULT_COURSE_URL),
        )?;
        let exam_url = parse_url("PORTAL_EXAM_URL", &var_or("PORTAL_EXAM_URL", DEFAULT_EXAM_URL))?;

        // --- Fallback identity for a missing or unreadable profile ---
        let default_identity = UserProfile::new(
            var_or("PORTAL_DEFAULT_NAME", "Guest Learner"),
            var_or("PORTAL_DEFAULT_EMAIL", "guest@portal.local"),
        );

        Ok(Self {
            api_url,
            request_timeout: Duration::from_secs(timeout_secs),
            log_level,
            state_path,
            course_url,
            exam_url,
            default_identity,
        })
    }

    /// Replaces the backend base URL, e.g. from a command-line flag.
    pub fn with_api_url(mut self, raw: &str) -> Result<Self, ConfigError> {
        self.api_url = parse_url("PORTAL_API_URL", raw)?;
        Ok(self)
    }
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_url(name: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("'{}' cannot be used as a base URL", raw),
        ));
    }
    Ok(url)
}
