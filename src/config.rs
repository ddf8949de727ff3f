use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

use crate::report::DEFAULT_THRESHOLD_DAYS;

const DEFAULT_LOG_FILE: &str = "moodle_grading_auditor.log";

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub token: String,
    pub accept_invalid_certs: bool,
    pub threshold_days: u32,
    pub log_file: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = required(&lookup, "MOODLE_API_URL_BASE")?;
        let token = required(&lookup, "MOODLE_API_TOKEN")?;

        let accept_invalid_certs = match lookup("MOODLE_ACCEPT_INVALID_CERTS") {
            Some(value) => parse_bool(&value).with_context(|| {
                format!("MOODLE_ACCEPT_INVALID_CERTS has an invalid value: {}", value)
            })?,
            None => false,
        };

        let threshold_days = match lookup("GRADING_DELAY_DAYS") {
            Some(value) => {
                let days: u32 = value
                    .trim()
                    .parse()
                    .with_context(|| format!("GRADING_DELAY_DAYS is not a number: {}", value))?;
                if days == 0 {
                    anyhow::bail!("GRADING_DELAY_DAYS must be at least 1");
                }
                days
            }
            None => DEFAULT_THRESHOLD_DAYS,
        };

        let log_file = lookup("AUDITOR_LOG_FILE")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));

        Ok(Config {
            base_url,
            token,
            accept_invalid_certs,
            threshold_days,
            log_file,
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).with_context(|| {
        format!("{} not found. Please set it in .env file or environment", key)
    })?;

    if value.trim().is_empty() {
        anyhow::bail!("{} is empty", key);
    }

    Ok(value.trim().to_string())
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => anyhow::bail!("expected true or false"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    const BASE: [(&str, &str); 2] = [
        ("MOODLE_API_URL_BASE", "https://moodle.example.edu/webservice/rest/server.php"),
        ("MOODLE_API_TOKEN", "abc123"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&BASE)).unwrap();
        assert_eq!(config.token, "abc123");
        assert!(!config.accept_invalid_certs);
        assert_eq!(config.threshold_days, 7);
        assert_eq!(config.log_file, PathBuf::from("moodle_grading_auditor.log"));
    }

    #[test]
    fn test_optional_settings() {
        let mut pairs = BASE.to_vec();
        pairs.push(("MOODLE_ACCEPT_INVALID_CERTS", "true"));
        pairs.push(("GRADING_DELAY_DAYS", "10"));
        pairs.push(("AUDITOR_LOG_FILE", "/tmp/auditor.log"));

        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();
        assert!(config.accept_invalid_certs);
        assert_eq!(config.threshold_days, 10);
        assert_eq!(config.log_file, PathBuf::from("/tmp/auditor.log"));
    }

    #[test]
    fn test_missing_token_is_an_error() {
        let err = Config::from_lookup(lookup_from(&BASE[..1])).unwrap_err();
        assert!(err.to_string().contains("MOODLE_API_TOKEN"));

        let pairs = [BASE[0], ("MOODLE_API_TOKEN", "  ")];
        let err = Config::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_invalid_threshold() {
        let mut pairs = BASE.to_vec();
        pairs.push(("GRADING_DELAY_DAYS", "0"));
        assert!(Config::from_lookup(lookup_from(&pairs)).is_err());

        let mut pairs = BASE.to_vec();
        pairs.push(("GRADING_DELAY_DAYS", "a week"));
        assert!(Config::from_lookup(lookup_from(&pairs)).is_err());
    }
}
