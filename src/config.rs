use std::env;
use std::path::PathBuf;

use crate::error::AppError;
use crate::models::notification::DEFAULT_NOTIFICATION_CAPACITY;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    /// Unset means the service runs against the in-process demo trip service.
    pub trip_service_url: Option<String>,
    pub request_timeout_secs: u64,
    /// Uploads may only read captured files from under this directory.
    pub capture_dir: PathBuf,
    pub event_buffer_size: usize,
    pub notification_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            trip_service_url: env::var("TRIP_SERVICE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            request_timeout_secs: parse_or_default("REQUEST_TIMEOUT_SECS", 30)?,
            capture_dir: parse_or_default("CAPTURE_DIR", PathBuf::from("captures"))?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            notification_capacity: parse_or_default(
                "NOTIFICATION_CAPACITY",
                DEFAULT_NOTIFICATION_CAPACITY,
            )?,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
