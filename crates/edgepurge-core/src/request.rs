//! Building purge requests from derived locators.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::PurgerSettings;
use crate::invalidation::{Invalidation, URI_INVALIDATION_TYPE};

/// Transport options of a purge request, headers excluded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestOptions {
    pub timeout: f64,
    pub connect_timeout: f64,
    pub http_errors: bool,
    pub verify: bool,
}

impl RequestOptions {
    pub fn from_settings(settings: &PurgerSettings) -> Self {
        Self {
            timeout: settings.timeout_secs,
            connect_timeout: settings.connect_timeout_secs,
            http_errors: settings.http_errors,
            verify: settings.verify_tls,
        }
    }
}

/// One purge request against the edge cache. The body is always empty.
#[derive(Debug, Clone, PartialEq)]
pub struct PurgeRequest {
    pub method: String,
    pub target: String,
    pub headers: BTreeMap<String, String>,
    pub options: RequestOptions,
}

/// Turns derived locators into purge requests.
#[derive(Debug, Clone)]
pub struct PurgeRequestBuilder {
    method: String,
    endpoint: String,
    origin: Option<String>,
    headers: Vec<(String, String)>,
    options: RequestOptions,
}

impl PurgeRequestBuilder {
    /// `origin` is the scheme and host the derived locators were generated under.
    pub fn new(settings: &PurgerSettings, origin: Option<String>) -> Self {
        Self {
            method: settings.request_method.clone(),
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            origin: origin.map(|o| o.trim_end_matches('/').to_string()),
            headers: settings
                .headers
                .iter()
                .map(|h| (h.field.clone(), h.value.clone()))
                .collect(),
            options: RequestOptions::from_settings(settings),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Build the request for one derived locator of `invalidation`.
    pub fn build(&self, locator_url: &str, invalidation: &Invalidation) -> PurgeRequest {
        let headers = self
            .headers
            .iter()
            .map(|(field, value)| (field.clone(), replace_tokens(value, invalidation)))
            .collect();

        PurgeRequest {
            method: self.method.clone(),
            target: rewrite_target(locator_url, self.origin.as_deref(), &self.endpoint),
            headers,
            options: self.options.clone(),
        }
    }
}

/// Point `locator` at `endpoint`, keeping its path, query and fragment.
///
/// A locator under `origin` has that prefix swapped; any other absolute
/// locator has its scheme and authority swapped; a relative locator is
/// appended to the endpoint.
pub fn rewrite_target(locator: &str, origin: Option<&str>, endpoint: &str) -> String {
    let endpoint = endpoint.trim_end_matches('/');

    if let Some(origin) = origin.map(|o| o.trim_end_matches('/')) {
        if let Some(rest) = locator.strip_prefix(origin) {
            if rest.is_empty() {
                return format!("{}/", endpoint);
            }
            if rest.starts_with('/') {
                return format!("{}{}", endpoint, rest);
            }
        }
    }

    match url::Url::parse(locator) {
        Ok(url) if url.has_host() => format!("{}{}", endpoint, &url[url::Position::BeforePath..]),
        _ => format!("{}/{}", endpoint, locator.trim_start_matches('/')),
    }
}

/// Replace `[invalidation:*]` tokens in a header value.
pub fn replace_tokens(value: &str, invalidation: &Invalidation) -> String {
    if !value.contains("[invalidation:") {
        return value.to_string();
    }
    value
        .replace("[invalidation:id]", &invalidation.id().to_string())
        .replace("[invalidation:expression]", invalidation.expression())
        .replace("[invalidation:type]", URI_INVALIDATION_TYPE)
}
