use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{IngestError, Result};

/// Runtime knobs read from an optional TOML file. Absent keys keep their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub http: HttpSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub max_attempts: u32,
    pub retry_statuses: Vec<u16>,
    pub backoff_factor_ms: u64,
    pub max_retry_after_secs: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_statuses: vec![429, 500, 502, 503, 504],
            backoff_factor_ms: 0,
            max_retry_after_secs: 60,
            request_timeout_secs: 60,
            user_agent: concat!("etf_ingest/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            IngestError::Settings(format!("Failed to read settings file '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Defaults when no file is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| IngestError::Settings(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.http.max_attempts, 3);
        assert_eq!(settings.http.retry_statuses, vec![429, 500, 502, 503, 504]);
        assert_eq!(settings.http.backoff_factor_ms, 0);
    }

    #[test]
    fn partial_http_table_overrides_only_given_keys() {
        let settings = Settings::from_toml(
            r#"
[http]
max_attempts = 5
request_timeout_secs = 10
"#,
        )
        .unwrap();
        assert_eq!(settings.http.max_attempts, 5);
        assert_eq!(settings.http.request_timeout(), Duration::from_secs(10));
        assert_eq!(settings.http.retry_statuses, vec![429, 500, 502, 503, 504]);
    }

    #[test]
    fn malformed_toml_is_settings_error() {
        assert!(matches!(
            Settings::from_toml("[http\nmax_attempts = "),
            Err(IngestError::Settings(_))
        ));
    }
}
