//! Process configuration read from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `API_KEY` | required |
//! | `WEBHOOK_URL` | required |
//! | `HTTP_SERVER_PORT` | `8080` |
//! | `STATS_WINDOW_MINUTES` | `60` |
//! | `REDIS_URL` | unset (in-memory backend) |
//! | `WORKER_MAX_RETRIES` | `5` |
//! | `RETRY_MAX` | `3` |
//! | `RETRY_WAIT_MIN` | `1s` |
//! | `RETRY_WAIT_MAX` | `30s` |
//! | `RETRY_TIMEOUT` | `10s` |
//! | `DISPATCH_BUFFER` | `1024` |

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::service::DEFAULT_DISPATCH_BUFFER;
use crate::webhook::RetryConfig;
use crate::worker::{DEFAULT_MAX_RETRIES, WorkerConfig};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_STATS_WINDOW_MINUTES: u64 = 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_key: String,
    pub webhook_url: String,
    pub port: u16,
    pub stats_window: Duration,
    pub redis_url: Option<String>,
    pub worker_max_retries: u32,
    pub retry: RetryConfig,
    pub dispatch_buffer: usize,
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let number = |name: &'static str| -> Result<Option<u64>> {
            get(name).map(|v| parse_value(name, &v)).transpose()
        };

        let duration = |name: &'static str, default: Duration| -> Result<Duration> {
            match get(name) {
                Some(v) => parse_duration(&v).ok_or(ConfigError::Invalid { name, value: v }),
                None => Ok(default),
            }
        };

        let defaults = RetryConfig::DEFAULT;
        let retry = RetryConfig::new(
            number("RETRY_MAX")?
                .map(|n| to_u32("RETRY_MAX", n))
                .transpose()?
                .unwrap_or(defaults.max_retries),
            duration("RETRY_WAIT_MIN", defaults.min_wait)?,
            duration("RETRY_WAIT_MAX", defaults.max_wait)?,
            duration("RETRY_TIMEOUT", defaults.timeout)?,
        );
        if retry.min_wait > retry.max_wait {
            return Err(ConfigError::Invalid {
                name: "RETRY_WAIT_MIN",
                value: format!("{:?} exceeds RETRY_WAIT_MAX", retry.min_wait),
            });
        }

        Ok(Config {
            api_key: required("API_KEY")?,
            webhook_url: required("WEBHOOK_URL")?,
            port: get("HTTP_SERVER_PORT")
                .map(|v| parse_value("HTTP_SERVER_PORT", &v))
                .transpose()?
                .unwrap_or(DEFAULT_PORT),
            stats_window: Duration::from_secs(
                number("STATS_WINDOW_MINUTES")?
                    .unwrap_or(DEFAULT_STATS_WINDOW_MINUTES)
                    .saturating_mul(60),
            ),
            redis_url: get("REDIS_URL"),
            worker_max_retries: number("WORKER_MAX_RETRIES")?
                .map(|n| to_u32("WORKER_MAX_RETRIES", n))
                .transpose()?
                .unwrap_or(DEFAULT_MAX_RETRIES),
            retry,
            dispatch_buffer: get("DISPATCH_BUFFER")
                .map(|v| parse_value::<usize>("DISPATCH_BUFFER", &v))
                .transpose()?
                .filter(|&n| n > 0)
                .unwrap_or(DEFAULT_DISPATCH_BUFFER),
        })
    }

    pub fn worker(&self) -> WorkerConfig {
        WorkerConfig::new(self.webhook_url.clone(), self.worker_max_retries)
    }
}

fn parse_value<T: FromStr>(name: &'static str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}

fn to_u32(name: &'static str, n: u64) -> Result<u32> {
    u32::try_from(n).map_err(|_| ConfigError::Invalid {
        name,
        value: n.to_string(),
    })
}

/// Parses `250ms`, `5s`, `2m` or `1h`. A bare number is seconds.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let n: u64 = digits.parse().ok()?;
    match unit {
        "ms" => Some(Duration::from_millis(n)),
        "" | "s" => Some(Duration::from_secs(n)),
        "m" => n.checked_mul(60).map(Duration::from_secs),
        "h" => n.checked_mul(3600).map(Duration::from_secs),
        _ => None,
    }
}
