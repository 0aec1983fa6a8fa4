use crate::error::ClientError;
use reqwest::Url;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_API_BASE_URL: &str = "https://stockify-backend-9gfp.onrender.com";
pub const API_URL_ENV: &str = "STOCKIFY_API_URL";
pub const PREDICT_TIMEOUT_ENV: &str = "STOCKIFY_PREDICT_TIMEOUT_SECS";
pub const LIST_TIMEOUT_ENV: &str = "STOCKIFY_LIST_TIMEOUT_SECS";

pub const DEFAULT_PREDICT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_LIST_TIMEOUT_SECS: u64 = 30;

pub const MIN_PREDICTION_DAYS: u32 = 1;
pub const MAX_PREDICTION_DAYS: u32 = 30;
pub const DEFAULT_PREDICTION_DAYS: u32 = 7;

/// Prediction lists longer than this are flagged scrollable.
pub const SCROLLABLE_PREDICTIONS_THRESHOLD: usize = 5;
pub const ERROR_BANNER_TTL: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq)]
pub struct ClientConfig {
    pub api_base_url: Url,
    /// `None` disables the timeout.
    pub predict_timeout: Option<Duration>,
    pub list_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(api_base_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            api_base_url: parse_base_url(api_base_url)?,
            predict_timeout: Some(Duration::from_secs(DEFAULT_PREDICT_TIMEOUT_SECS)),
            list_timeout: Some(Duration::from_secs(DEFAULT_LIST_TIMEOUT_SECS)),
        })
    }

    pub fn with_predict_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.predict_timeout = timeout;
        self
    }

    pub fn with_list_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.list_timeout = timeout;
        self
    }

    /// Defaults overlaid with `STOCKIFY_*` environment variables (a `.env` file
    /// is honoured if present).
    pub fn from_env() -> Result<Self, ClientError> {
        if let Ok(path) = dotenvy::dotenv() {
            info!("Loaded environment from {}", path.display());
        }

        let base = std::env::var(API_URL_ENV)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let mut config = Self::new(&base)?;
        if let Some(timeout) = timeout_from_env(PREDICT_TIMEOUT_ENV) {
            config.predict_timeout = timeout;
        }
        if let Some(timeout) = timeout_from_env(LIST_TIMEOUT_ENV) {
            config.list_timeout = timeout;
        }
        Ok(config)
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.api_base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::Config(format!("cannot build URL for {}: {}", path, e)))
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    let trimmed = raw.trim();
    // `Url::join` replaces the last path segment unless the base ends with '/'.
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };
    let url = Url::parse(&with_slash)
        .map_err(|e| ClientError::Config(format!("invalid API base URL {:?}: {}", trimmed, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ClientError::Config(format!(
            "API base URL must be http or https, got {}",
            url.scheme()
        )));
    }
    Ok(url)
}

/// `Some(None)` means "explicitly disabled" (value 0).
fn timeout_from_env(var: &str) -> Option<Option<Duration>> {
    let raw = std::env::var(var).ok()?;
    match parse_timeout_secs(&raw) {
        Some(timeout) => Some(timeout),
        None => {
            warn!("Ignoring {}={:?}; expected a whole number of seconds", var, raw);
            None
        }
    }
}

pub fn parse_timeout_secs(raw: &str) -> Option<Option<Duration>> {
    let secs: u64 = raw.trim().parse().ok()?;
    Some(timeout_from_secs(secs))
}

pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_keep_base_path() {
        let cfg = ClientConfig::new("https://example.com/api").unwrap();
        assert_eq!(
            cfg.endpoint("/predict").unwrap().as_str(),
            "https://example.com/api/predict"
        );
        let cfg = ClientConfig::new("http://127.0.0.1:5000/").unwrap();
        assert_eq!(
            cfg.endpoint("popular").unwrap().as_str(),
            "http://127.0.0.1:5000/popular"
        );
    }

    #[test]
    fn default_timeouts_match_service_expectations() {
        let cfg = ClientConfig::new(DEFAULT_API_BASE_URL).unwrap();
        assert_eq!(cfg.predict_timeout, Some(Duration::from_secs(60)));
        assert_eq!(cfg.list_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn rejects_non_http_base_urls() {
        assert!(matches!(
            ClientConfig::new("ftp://example.com"),
            Err(ClientError::Config(_))
        ));
        assert!(ClientConfig::new("not a url").is_err());
    }

    #[test]
    fn timeout_parsing() {
        assert_eq!(parse_timeout_secs("15"), Some(Some(Duration::from_secs(15))));
        assert_eq!(parse_timeout_secs(" 0 "), Some(None));
        assert_eq!(parse_timeout_secs("soon"), None);
    }
}
