use async_trait::async_trait;
use bytes::Bytes;
use sprest_core::RequestInfo;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Invalid request URL '{0}'")]
    InvalidUrl(String),
    #[error("HTTP client build failed: {0}")]
    Build(String),
    #[error("Body error: {0}")]
    Body(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Response payload as delivered by the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Text(String),
    Binary(Bytes),
}

/// Status and body of one completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: ResponseBody,
}

impl RawResponse {
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: ResponseBody::Text(body.into()),
        }
    }

    pub fn binary(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: ResponseBody::Binary(body.into()),
        }
    }

    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self::text(status, body.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text; binary bodies are decoded lossily.
    pub fn body_text(&self) -> String {
        match &self.body {
            ResponseBody::Text(text) => text.clone(),
            ResponseBody::Binary(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    pub fn body_bytes(&self) -> Bytes {
        match &self.body {
            ResponseBody::Text(text) => Bytes::copy_from_slice(text.as_bytes()),
            ResponseBody::Binary(bytes) => bytes.clone(),
        }
    }
}

impl fmt::Display for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = match &self.body {
            ResponseBody::Text(text) => text.len(),
            ResponseBody::Binary(bytes) => bytes.len(),
        };
        write!(f, "{} ({} bytes)", self.status, size)
    }
}

/// Performs one HTTP call per request description.
///
/// Non-2xx statuses are returned as responses, not errors; errors mean no response arrived.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    async fn execute(&self, request: &RequestInfo) -> Result<RawResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_response_helpers() {
        let ok = RawResponse::json(200, &json!({"d": {}}));
        assert!(ok.is_success());
        assert_eq!(ok.body_text(), r#"{"d":{}}"#);
        assert_eq!(ok.to_string(), "200 (8 bytes)");

        let failed = RawResponse::text(500, "");
        assert!(!failed.is_success());

        let bytes = RawResponse::binary(200, vec![0u8, 159, 146, 150]);
        assert_eq!(bytes.body_bytes().len(), 4);
        assert!(RawResponse::text(299, "").is_success());
        assert!(!RawResponse::text(300, "").is_success());
    }

    #[test]
    fn test_error_display() {
        let err = TransportError::InvalidUrl("nope".to_string());
        assert_eq!(err.to_string(), "Invalid request URL 'nope'");
    }
}
