use std::env;
use std::str::FromStr;
use std::time::Duration;

use dotenv::dotenv;

use crate::buffer::{MAX_RECORDS, NEAR_CAPACITY_THRESHOLD};
use crate::color::DEFAULT_PALETTE;
use crate::error::ConfigError;
use crate::paginate::DEFAULT_PAGE_SIZE;
use crate::rank::DEFAULT_TOP_N;

pub const DEFAULT_SERVER: &str = "http://localhost:5000";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub server_url: String,
    pub capacity: usize,
    pub page_size: usize,
    pub top_n: usize,
    pub refresh_interval: Duration,
    pub reconnect_delay: Duration,
    /// Buffer length at which a capacity warning is logged.
    pub near_capacity: usize,
    /// Records older than this are pruned on refresh. Off when `None`.
    pub max_age: Option<Duration>,
    pub palette: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_url: DEFAULT_SERVER.to_string(),
            capacity: MAX_RECORDS,
            page_size: DEFAULT_PAGE_SIZE,
            top_n: DEFAULT_TOP_N,
            refresh_interval: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(3),
            near_capacity: NEAR_CAPACITY_THRESHOLD,
            max_age: None,
            palette: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Record age limit given in hours. Rejects values whose seconds do not fit a `u64`.
pub fn max_age_from_hours(hours: u64) -> Result<Duration, ConfigError> {
    hours
        .checked_mul(3600)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::InvalidValue {
            key: "max age hours".to_string(),
            value: hours.to_string(),
        })
}

impl Config {
    /// Defaults overridden by `DNSVIEW_*` variables, `.env` included.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(url) = lookup("DNSVIEW_SERVER") {
            config.server_url = url;
        }
        if let Some(capacity) = parse(&lookup, "DNSVIEW_CAPACITY")? {
            config.capacity = capacity;
        }
        if let Some(size) = parse(&lookup, "DNSVIEW_PAGE_SIZE")? {
            config.page_size = size;
        }
        if let Some(n) = parse(&lookup, "DNSVIEW_TOP_N")? {
            config.top_n = n;
        }
        if let Some(secs) = parse(&lookup, "DNSVIEW_REFRESH_SECS")? {
            config.refresh_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse(&lookup, "DNSVIEW_RECONNECT_SECS")? {
            config.reconnect_delay = Duration::from_secs(secs);
        }
        if let Some(threshold) = parse(&lookup, "DNSVIEW_NEAR_CAPACITY")? {
            config.near_capacity = threshold;
        }
        if let Some(hours) = parse::<u64>(&lookup, "DNSVIEW_MAX_AGE_HOURS")? {
            config.max_age = Some(max_age_from_hours(hours)?);
        }
        if let Some(palette) = lookup("DNSVIEW_PALETTE") {
            config.palette = palette
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("capacity", self.capacity),
            ("page size", self.page_size),
            ("top-N", self.top_n),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: "0".to_string(),
                });
            }
        }
        if self.refresh_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "refresh interval".to_string(),
                value: "0".to_string(),
            });
        }
        if self.palette.is_empty() {
            return Err(ConfigError::EmptyPalette);
        }
        Ok(())
    }

    /// Socket.IO websocket endpoint of the backend.
    pub fn push_url(&self) -> String {
        let base = self.server_url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        format!("{}/socket.io/?EIO=4&transport=websocket", base)
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
    }
}
