use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_PORT: u16 = 8081;
const DEFAULT_DETECTION_URL: &str = "http://localhost:8000";
const DEFAULT_DETECTION_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorBackend {
    Http,
    Mock,
}

impl FromStr for DetectorBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(DetectorBackend::Http),
            "mock" => Ok(DetectorBackend::Mock),
            other => Err(format!("unknown detector backend '{}'", other)),
        }
    }
}

/// Process-wide settings, built once in `main` and handed to each service.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub detection_service_url: String,
    pub detection_timeout: Duration,
    pub detector_backend: DetectorBackend,
    pub jwt_secret: String,
    pub tasks_table: Option<String>,
    pub default_confidence_threshold: f32,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let default_confidence_threshold: f32 = parse_or(
            &lookup,
            "DEFAULT_CONFIDENCE_THRESHOLD",
            DEFAULT_CONFIDENCE_THRESHOLD,
        )?;
        if !(0.0..=1.0).contains(&default_confidence_threshold) {
            return Err(ConfigError::Invalid {
                key: "DEFAULT_CONFIDENCE_THRESHOLD",
                reason: "must be within [0, 1]".to_string(),
            });
        }

        let timeout_secs: u64 = parse_or(
            &lookup,
            "DETECTION_TIMEOUT_SECS",
            DEFAULT_DETECTION_TIMEOUT_SECS,
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "DETECTION_TIMEOUT_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            detection_service_url: lookup("DETECTION_SERVICE_URL")
                .unwrap_or_else(|| DEFAULT_DETECTION_URL.to_string()),
            detection_timeout: Duration::from_secs(timeout_secs),
            detector_backend: parse_or(&lookup, "DETECTOR_BACKEND", DetectorBackend::Http)?,
            jwt_secret,
            tasks_table: lookup("DYNAMODB_TASKS_TABLE").filter(|s| !s.trim().is_empty()),
            default_confidence_threshold,
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => {
            log::debug!("{} not set, using default", key);
            Ok(default)
        }
    }
}
