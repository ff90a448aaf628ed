//! Configuration for the purge engine.
//!
//! Loaded once from YAML and treated as read-only while a batch runs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PurgeError, PurgeResult};

/// Full configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub purger: PurgerSettings,

    #[serde(default)]
    pub derivatives: DerivativeConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub queuer: QueuerConfig,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> PurgeResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PurgeError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> PurgeResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| PurgeError::config(format!("failed to parse config YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PurgeResult<()> {
        self.purger.validate()?;

        if !self.derivatives.styles.is_empty() && self.derivatives.public_base_url.is_empty() {
            return Err(PurgeError::config(
                "derivatives.public_base_url is required when styles are configured",
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for style in &self.derivatives.styles {
            if style.trim().is_empty() {
                return Err(PurgeError::config("derivative style names can not be empty"));
            }
            if !seen.insert(style.as_str()) {
                return Err(PurgeError::config(format!(
                    "duplicate derivative style: {}",
                    style
                )));
            }
        }
        Ok(())
    }

    /// Origin the derived locators are generated under.
    ///
    /// Falls back to the scheme and host of `derivatives.public_base_url`.
    pub fn effective_origin(&self) -> Option<String> {
        if let Some(origin) = &self.purger.origin {
            return Some(origin.trim_end_matches('/').to_string());
        }
        let base = url::Url::parse(&self.derivatives.public_base_url).ok()?;
        let origin = base.origin();
        origin.is_tuple().then(|| origin.ascii_serialization())
    }
}

/// Settings for building and sending purge requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PurgerSettings {
    /// Purge endpoint: scheme, host, optional port and base path.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Scheme and host the derived locators are generated under.
    #[serde(default)]
    pub origin: Option<String>,

    /// HTTP method used for purge requests.
    #[serde(default = "default_request_method")]
    pub request_method: String,

    /// Maximum number of purge requests in flight.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: f64,

    /// Connect timeout in seconds.
    #[serde(default = "default_timeout")]
    pub connect_timeout_secs: f64,

    /// Treat non-2xx responses as failures.
    #[serde(default = "default_true")]
    pub http_errors: bool,

    /// Verify TLS certificates of the purge endpoint.
    #[serde(default = "default_true")]
    pub verify_tls: bool,

    /// Static headers sent with each purge request. Values may carry tokens.
    #[serde(default)]
    pub headers: Vec<HeaderSetting>,
}

/// One configured request header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderSetting {
    pub field: String,
    pub value: String,
}

fn default_endpoint() -> String {
    "http://127.0.0.1:6081".to_string()
}

fn default_request_method() -> String {
    "BAN".to_string()
}

fn default_concurrency() -> usize {
    10
}

fn default_timeout() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

impl Default for PurgerSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            origin: None,
            request_method: default_request_method(),
            concurrency: default_concurrency(),
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_timeout(),
            http_errors: true,
            verify_tls: true,
            headers: Vec::new(),
        }
    }
}

impl PurgerSettings {
    /// Create settings from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `EDGEPURGE_ENDPOINT` | Purge endpoint |
    /// | `EDGEPURGE_ORIGIN` | Origin of derived locators |
    /// | `EDGEPURGE_METHOD` | Request method |
    /// | `EDGEPURGE_CONCURRENCY` | Concurrency ceiling |
    /// | `EDGEPURGE_TIMEOUT` | Request timeout in seconds |
    pub fn from_env() -> Self {
        Self::default().merge_env()
    }

    /// Override fields that are set in the environment.
    pub fn merge_env(mut self) -> Self {
        if let Ok(endpoint) = std::env::var("EDGEPURGE_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Ok(origin) = std::env::var("EDGEPURGE_ORIGIN") {
            self.origin = Some(origin);
        }
        if let Ok(method) = std::env::var("EDGEPURGE_METHOD") {
            self.request_method = method;
        }
        if let Some(concurrency) = std::env::var("EDGEPURGE_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.concurrency = concurrency;
        }
        if let Some(timeout) = std::env::var("EDGEPURGE_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.timeout_secs = timeout;
        }
        self
    }

    /// Set the purge endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the origin of derived locators.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Set the request method.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.request_method = method.into();
        self
    }

    /// Set the concurrency ceiling.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Add a static header.
    pub fn with_header(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(HeaderSetting {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Concurrency ceiling, never below one.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }

    pub fn validate(&self) -> PurgeResult<()> {
        let endpoint = url::Url::parse(&self.endpoint).map_err(|e| {
            PurgeError::config(format!("invalid purger.endpoint {:?}: {}", self.endpoint, e))
        })?;
        if endpoint.cannot_be_a_base() || endpoint.host_str().is_none() {
            return Err(PurgeError::config(format!(
                "purger.endpoint must be an absolute http(s) URL: {}",
                self.endpoint
            )));
        }
        if reqwest::Method::from_bytes(self.request_method.as_bytes()).is_err() {
            return Err(PurgeError::config(format!(
                "invalid purger.request_method: {:?}",
                self.request_method
            )));
        }
        for (field, secs) in [
            ("timeout_secs", self.timeout_secs),
            ("connect_timeout_secs", self.connect_timeout_secs),
        ] {
            timeout_duration(field, secs)?;
        }
        for header in &self.headers {
            if reqwest::header::HeaderName::from_bytes(header.field.as_bytes()).is_err() {
                return Err(PurgeError::config(format!(
                    "invalid header name: {:?}",
                    header.field
                )));
            }
        }
        Ok(())
    }
}

/// A positive timeout that fits in a [`Duration`].
pub(crate) fn timeout_duration(field: &str, secs: f64) -> PurgeResult<Duration> {
    match Duration::try_from_secs_f64(secs) {
        Ok(duration) if !duration.is_zero() => Ok(duration),
        _ => Err(PurgeError::config(format!(
            "purger.{} must be a positive number of seconds, got {}",
            field, secs
        ))),
    }
}

/// Derivation rules applied to every canonical resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DerivativeConfig {
    /// Public URL prefix the derivatives are served under.
    #[serde(default)]
    pub public_base_url: String,

    /// Rule names in registry order.
    #[serde(default)]
    pub styles: Vec<String>,

    /// Storage scheme derivatives are written under.
    #[serde(default = "default_derivative_scheme")]
    pub derivative_scheme: String,
}

fn default_derivative_scheme() -> String {
    "public".to_string()
}

impl Default for DerivativeConfig {
    fn default() -> Self {
        Self {
            public_base_url: String::new(),
            styles: Vec::new(),
            derivative_scheme: default_derivative_scheme(),
        }
    }
}

/// Local storage roots used for existence checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Storage scheme (e.g. `public`) to local directory.
    #[serde(default)]
    pub roots: BTreeMap<String, PathBuf>,
}

/// Which entities feed the queue and where their resource references live.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueuerConfig {
    /// Entity type to allowed bundles. Empty means every entity is accepted.
    #[serde(default)]
    pub entity_types: BTreeMap<String, Vec<String>>,

    /// Entity type to the attributes that hold resource references.
    #[serde(default)]
    pub resource_fields: BTreeMap<String, Vec<String>>,
}
