//! Diagnostics for failed purges.
//!
//! Reporting never fails the caller: an unencodable diagnostic degrades to a
//! plain log line and a panicking reporter is contained by the dispatcher.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{error, warn};

use crate::error::{PurgeError, PurgeResult};
use crate::request::{PurgeRequest, RequestOptions};

/// Structured record handed to a [`FailureReporter`] for every failed purge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureDiagnostic {
    /// Error kind (see [`PurgeError::kind`]); not part of the JSON record.
    #[serde(skip)]
    pub kind: &'static str,
    #[serde(rename = "msg")]
    pub message: String,
    #[serde(rename = "uri")]
    pub target: String,
    pub method: String,
    #[serde(rename = "guzzle_opt")]
    pub options: RequestOptions,
    pub headers: BTreeMap<String, String>,
}

impl FailureDiagnostic {
    pub fn new(request: &PurgeRequest, error: &PurgeError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            target: request.target.clone(),
            method: request.method.clone(),
            options: request.options.clone(),
            headers: request.headers.clone(),
        }
    }

    /// JSON encoding of the record.
    pub fn to_json(&self) -> PurgeResult<String> {
        encode(self)
    }
}

/// Side channel receiving diagnostics for failed purges.
pub trait FailureReporter: Send + Sync {
    fn report(&self, diagnostic: &FailureDiagnostic);
}

/// Default reporter: one `error!` event per failed purge.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl FailureReporter for TracingReporter {
    fn report(&self, diagnostic: &FailureDiagnostic) {
        let details = encode_or_degrade(diagnostic, &diagnostic.message);
        error!(
            kind = diagnostic.kind,
            uri = %diagnostic.target,
            "item failed due {}, details (JSON): {}",
            diagnostic.kind,
            details
        );
    }
}

/// Reporter that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl FailureReporter for NullReporter {
    fn report(&self, _diagnostic: &FailureDiagnostic) {}
}

fn encode<T: Serialize>(payload: &T) -> PurgeResult<String> {
    serde_json::to_string(payload).map_err(|e| PurgeError::Diagnostic {
        message: e.to_string(),
    })
}

/// Encode `payload` as JSON, or log the encoding failure and fall back to
/// `fallback` so the caller always has something to emit.
pub fn encode_or_degrade<T: Serialize>(payload: &T, fallback: &str) -> String {
    match encode(payload) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "failed to encode purge diagnostic");
            serde_json::json!({ "msg": fallback, "encoding_error": e.to_string() }).to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::Error as _;

    fn sample() -> (PurgeRequest, PurgeError) {
        let mut headers = BTreeMap::new();
        headers.insert("X-Purge-Token".to_string(), "secret".to_string());
        let request = PurgeRequest {
            method: "BAN".into(),
            target: "https://cdn.example/styles/thumb/public/a.png".into(),
            headers,
            options: RequestOptions {
                timeout: 1.0,
                connect_timeout: 1.0,
                http_errors: true,
                verify: true,
            },
        };
        let error = PurgeError::Status {
            status: 503,
            target: request.target.clone(),
        };
        (request, error)
    }

    #[test]
    fn test_diagnostic_json_shape() {
        let (request, error) = sample();
        let diagnostic = FailureDiagnostic::new(&request, &error);
        let json: serde_json::Value =
            serde_json::from_str(&diagnostic.to_json().unwrap()).unwrap();

        assert_eq!(json["uri"], "https://cdn.example/styles/thumb/public/a.png");
        assert_eq!(json["method"], "BAN");
        assert_eq!(
            json["msg"],
            "HTTP 503 from https://cdn.example/styles/thumb/public/a.png"
        );
        assert_eq!(json["headers"]["X-Purge-Token"], "secret");
        assert_eq!(json["guzzle_opt"]["timeout"], 1.0);
        assert!(json["guzzle_opt"].get("headers").is_none());
        assert!(json.get("kind").is_none());
    }

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _s: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("refusing to serialize"))
        }
    }

    #[test]
    fn test_encoding_failure_degrades() {
        let line = encode_or_degrade(&Unencodable, "HTTP 503");
        assert!(line.contains("HTTP 503"));
        assert!(line.contains("refusing to serialize"));
        assert!(serde_json::from_str::<serde_json::Value>(&line).is_ok());
    }

    #[test]
    fn test_degraded_line_escapes_control_characters() {
        let line = encode_or_degrade(&Unencodable, "bad\u{1}byte \"quoted\"");
        let json: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(json["msg"], "bad\u{1}byte \"quoted\"");
        assert!(json["encoding_error"]
            .as_str()
            .unwrap()
            .ends_with("refusing to serialize"));
    }
}
