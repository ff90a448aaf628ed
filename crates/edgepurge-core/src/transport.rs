//! HTTP layer: sending purge requests and mapping response statuses.
//!
//! This is the ONLY place for status code handling.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::config::{timeout_duration, PurgerSettings};
use crate::error::{PurgeError, PurgeResult};
use crate::request::PurgeRequest;

pub const USER_AGENT_VALUE: &str = concat!("edgepurge/", env!("CARGO_PKG_VERSION"));

/// Successful purge response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeResponse {
    pub status: u16,
}

/// Sends one purge request to the edge cache.
#[async_trait]
pub trait PurgeTransport: Send + Sync {
    async fn send(&self, request: &PurgeRequest) -> PurgeResult<PurgeResponse>;
}

/// reqwest-backed transport. Timeouts come from the client configuration.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    http_errors: bool,
}

impl HttpTransport {
    pub fn new(settings: &PurgerSettings) -> PurgeResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let timeout = timeout_duration("timeout_secs", settings.timeout_secs)?;
        let connect_timeout =
            timeout_duration("connect_timeout_secs", settings.connect_timeout_secs)?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .danger_accept_invalid_certs(!settings.verify_tls)
            .default_headers(default_headers)
            .build()
            .map_err(|e| PurgeError::Config {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            http_errors: settings.http_errors,
        })
    }

    /// Wrap an existing client (custom TLS roots, proxies, ...).
    pub fn with_client(client: reqwest::Client, http_errors: bool) -> Self {
        Self {
            client,
            http_errors,
        }
    }
}

#[async_trait]
impl PurgeTransport for HttpTransport {
    async fn send(&self, request: &PurgeRequest) -> PurgeResult<PurgeResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|e| {
            PurgeError::InvalidRequest {
                message: format!("invalid method {:?}: {}", request.method, e),
            }
        })?;

        let mut headers = HeaderMap::with_capacity(request.headers.len());
        for (field, value) in &request.headers {
            let name = HeaderName::from_bytes(field.as_bytes()).map_err(|e| {
                PurgeError::InvalidRequest {
                    message: format!("invalid header name {:?}: {}", field, e),
                }
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| PurgeError::InvalidRequest {
                message: format!("invalid value for header {}: {}", field, e),
            })?;
            headers.insert(name, value);
        }

        debug!(method = %method, target = %request.target, "sending purge request");
        let response = self
            .client
            .request(method, &request.target)
            .headers(headers)
            .send()
            .await?;

        let status = response.status().as_u16();
        match status {
            200..=299 => Ok(PurgeResponse { status }),
            _ if !self.http_errors => Ok(PurgeResponse { status }),
            _ => Err(PurgeError::Status {
                status,
                target: request.target.clone(),
            }),
        }
    }
}
