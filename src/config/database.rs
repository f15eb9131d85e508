use serde::Deserialize;
use std::time::Duration;

use crate::database::DEFAULT_TIMEOUT;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_type")]
    pub r#type: String,
    pub uri: String,
    #[serde(default = "default_max_open_conns")]
    pub max_open_conns: u32,
    #[serde(default = "default_max_idle_conns")]
    pub max_idle_conns: u32,
    /// Upper bound for a single store operation, e.g. `10s` or `1m`.
    #[serde(default)]
    pub timeout: Option<String>,
    /// Insert the sample contacts when the store starts out empty.
    #[serde(default)]
    pub seed_samples: bool,
}

fn default_db_type() -> String {
    "sqlite".to_string()
}

fn default_max_open_conns() -> u32 {
    20
}

fn default_max_idle_conns() -> u32 {
    2
}

impl DatabaseConfig {
    pub fn timeout_duration(&self) -> Result<Duration, anyhow::Error> {
        match &self.timeout {
            Some(s) => parse_duration(s),
            None => Ok(DEFAULT_TIMEOUT),
        }
    }
}

pub(crate) fn parse_duration(s: &str) -> Result<Duration, anyhow::Error> {
    let s = s.trim();

    let duration = if let Some(ms) = s.strip_suffix("ms") {
        Duration::from_millis(ms.trim().parse()?)
    } else if let Some(secs) = s.strip_suffix('s') {
        Duration::from_secs(secs.trim().parse()?)
    } else if let Some(mins) = s.strip_suffix('m') {
        Duration::from_secs(scaled(mins, 60)?)
    } else if let Some(hours) = s.strip_suffix('h') {
        Duration::from_secs(scaled(hours, 3600)?)
    } else {
        Duration::from_secs(s.parse()?)
    };

    if duration.is_zero() {
        anyhow::bail!("duration must be greater than zero: {s}");
    }
    Ok(duration)
}

fn scaled(value: &str, factor: u64) -> Result<u64, anyhow::Error> {
    value
        .trim()
        .parse::<u64>()?
        .checked_mul(factor)
        .ok_or_else(|| anyhow::anyhow!("duration out of range: {}", value.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration(" 7 ").unwrap(), Duration::from_secs(7));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("-5s").is_err());
        assert!(parse_duration("18446744073709551615m").is_err());
        assert!(parse_duration("9999999999999999h").is_err());
    }
}
