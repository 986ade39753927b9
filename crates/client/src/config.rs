//! Client configuration loaded from `TXRELAY_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use txrelay_infra::DEFAULT_STORAGE_KEY;
use url::Url;

use crate::retry::RetryPolicy;

/// Payment UI the checkout events are accepted from by default.
pub const DEFAULT_TRUSTED_ORIGIN: &str = "https://3cities.xyz";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("no data directory available; set TXRELAY_STORE_PATH")]
    NoDataDir,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Page's transaction details endpoint; the order id is derived from it.
    pub transaction_details_url: Url,
    /// Order status endpoint used by the poller; polling is off without it.
    pub order_detail_url: Option<Url>,
    /// Base URL of the embedded payment UI.
    pub trusted_origin: String,
    pub store_path: PathBuf,
    pub storage_key: String,
    pub csrf_token: Option<String>,
    pub retry: RetryPolicy,
    pub poll_interval: Duration,
    /// The page already reports a submitted payment: poll from startup.
    pub payment_submitted: bool,
}

impl ClientConfig {
    /// Config with defaults for everything but the transaction details URL.
    pub fn new(transaction_details_url: Url, store_path: PathBuf) -> Self {
        Self {
            transaction_details_url,
            order_detail_url: None,
            trusted_origin: DEFAULT_TRUSTED_ORIGIN.to_string(),
            store_path,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            csrf_token: None,
            retry: RetryPolicy::default(),
            poll_interval: Duration::from_secs(5),
            payment_submitted: false,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary `key -> value` source (tests use a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let details_key = "TXRELAY_TRANSACTION_DETAILS_URL";
        let transaction_details_url =
            parse_url(details_key, &get(details_key).ok_or(ConfigError::Missing(details_key))?)?;

        let store_path = match get("TXRELAY_STORE_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_store_path()?,
        };

        let mut config = Self::new(transaction_details_url, store_path);

        if let Some(raw) = get("TXRELAY_ORDER_DETAIL_URL") {
            config.order_detail_url = Some(parse_url("TXRELAY_ORDER_DETAIL_URL", &raw)?);
        }
        if let Some(origin) = get("TXRELAY_TRUSTED_ORIGIN") {
            parse_url("TXRELAY_TRUSTED_ORIGIN", &origin)?;
            config.trusted_origin = origin;
        }
        if let Some(key) = get("TXRELAY_STORAGE_KEY") {
            config.storage_key = key;
        }
        config.csrf_token = get("TXRELAY_CSRF_TOKEN");

        if let Some(raw) = get("TXRELAY_BACKOFF_BASE_MS") {
            config.retry.base_delay = parse_millis("TXRELAY_BACKOFF_BASE_MS", &raw)?;
        }
        if let Some(raw) = get("TXRELAY_BACKOFF_MAX_MS") {
            config.retry.max_delay = parse_millis("TXRELAY_BACKOFF_MAX_MS", &raw)?;
        }
        if config.retry.max_delay < config.retry.base_delay {
            return Err(ConfigError::Invalid {
                key: "TXRELAY_BACKOFF_MAX_MS",
                message: "must not be smaller than TXRELAY_BACKOFF_BASE_MS".into(),
            });
        }
        if let Some(raw) = get("TXRELAY_POLL_INTERVAL_MS") {
            config.poll_interval = parse_millis("TXRELAY_POLL_INTERVAL_MS", &raw)?;
        }
        if let Some(raw) = get("TXRELAY_PAYMENT_SUBMITTED") {
            config.payment_submitted = parse_bool("TXRELAY_PAYMENT_SUBMITTED", &raw)?;
        }

        Ok(config)
    }

    pub fn with_order_detail_url(mut self, url: Url) -> Self {
        self.order_detail_url = Some(url);
        self
    }

    pub fn with_trusted_origin(mut self, origin: impl Into<String>) -> Self {
        self.trusted_origin = origin.into();
        self
    }

    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

fn default_store_path() -> Result<PathBuf, ConfigError> {
    let base = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
    Ok(base.join("txrelay").join("buffer.db"))
}

fn parse_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|e| ConfigError::Invalid {
        key,
        message: e.to_string(),
    })
}

fn parse_millis(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| ConfigError::Invalid {
            key,
            message: e.to_string(),
        })
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            key,
            message: format!("expected a boolean, got {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const DETAILS: &str = "https://t.example/e/order/ABC12/s/transaction_details/";

    #[test]
    fn defaults_apply_when_only_required_values_are_set() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("TXRELAY_TRANSACTION_DETAILS_URL", DETAILS),
            ("TXRELAY_STORE_PATH", "/tmp/txrelay.db"),
        ]))
        .unwrap();

        assert_eq!(config.transaction_details_url.as_str(), DETAILS);
        assert_eq!(config.trusted_origin, DEFAULT_TRUSTED_ORIGIN);
        assert_eq!(config.storage_key, DEFAULT_STORAGE_KEY);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.store_path, PathBuf::from("/tmp/txrelay.db"));
        assert!(config.order_detail_url.is_none());
        assert!(!config.payment_submitted);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("TXRELAY_TRANSACTION_DETAILS_URL", DETAILS),
            ("TXRELAY_STORE_PATH", "/tmp/txrelay.db"),
            ("TXRELAY_ORDER_DETAIL_URL", "https://t.example/e/order/ABC12/s/"),
            ("TXRELAY_BACKOFF_BASE_MS", "10"),
            ("TXRELAY_BACKOFF_MAX_MS", "80"),
            ("TXRELAY_POLL_INTERVAL_MS", "25"),
            ("TXRELAY_PAYMENT_SUBMITTED", "yes"),
            ("TXRELAY_CSRF_TOKEN", "tok"),
        ]))
        .unwrap();

        assert_eq!(config.retry.base_delay, Duration::from_millis(10));
        assert_eq!(config.retry.max_delay, Duration::from_millis(80));
        assert_eq!(config.poll_interval, Duration::from_millis(25));
        assert!(config.payment_submitted);
        assert_eq!(config.csrf_token.as_deref(), Some("tok"));
        assert!(config.order_detail_url.is_some());
    }

    #[test]
    fn missing_or_invalid_values_are_rejected() {
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[])),
            Err(ConfigError::Missing("TXRELAY_TRANSACTION_DETAILS_URL"))
        ));

        let err = ClientConfig::from_lookup(lookup(&[
            ("TXRELAY_TRANSACTION_DETAILS_URL", DETAILS),
            ("TXRELAY_STORE_PATH", "/tmp/txrelay.db"),
            ("TXRELAY_BACKOFF_BASE_MS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "TXRELAY_BACKOFF_BASE_MS", .. }));

        let err = ClientConfig::from_lookup(lookup(&[
            ("TXRELAY_TRANSACTION_DETAILS_URL", DETAILS),
            ("TXRELAY_STORE_PATH", "/tmp/txrelay.db"),
            ("TXRELAY_BACKOFF_BASE_MS", "500"),
            ("TXRELAY_BACKOFF_MAX_MS", "100"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "TXRELAY_BACKOFF_MAX_MS", .. }));
    }
}
