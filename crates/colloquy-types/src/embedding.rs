//! Embedding request and error types.
//!
//! [`InvokeRequest`] is the payload handed to an inference endpoint.
//! [`EndpointError`] describes transport-level failures of that endpoint and
//! [`EmbeddingError`] is the single domain error surfaced by embedding calls.

use serde_json::{Map, Value};
use thiserror::Error;

/// MIME type used by JSON inference endpoints.
pub const APPLICATION_JSON: &str = "application/json";

/// A single invocation of a hosted inference endpoint.
#[derive(Debug, Clone)]
pub struct InvokeRequest<'a> {
    /// Name of the deployed endpoint.
    pub endpoint_name: &'a str,
    /// Serialized request body.
    pub body: Vec<u8>,
    /// MIME type of `body`.
    pub content_type: &'a str,
    /// MIME type the caller expects back.
    pub accept: &'a str,
    /// Extra invocation options forwarded to the endpoint client.
    pub endpoint_kwargs: &'a Map<String, Value>,
}

/// Failures raised by an inference endpoint client.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("credentials unavailable: {0}")]
    Credentials(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("endpoint returned {status}: {message}")]
    Status { status: u16, message: String },
}

/// Errors surfaced by embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Any failure while invoking the endpoint, with the original cause.
    #[error("Error raised by inference endpoint: {0}")]
    Endpoint(String),

    #[error("failed to encode embedding request: {0}")]
    Encode(String),

    #[error("failed to decode embedding response: {0}")]
    Decode(String),

    #[error("endpoint returned no embeddings")]
    EmptyResponse,

    #[error("chunk size must be at least 1")]
    InvalidChunkSize,
}

impl From<EndpointError> for EmbeddingError {
    fn from(err: EndpointError) -> Self {
        EmbeddingError::Endpoint(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_error_wraps_cause() {
        let err: EmbeddingError = EndpointError::Status {
            status: 424,
            message: "model container crashed".to_string(),
        }
        .into();
        let msg = err.to_string();
        assert!(msg.starts_with("Error raised by inference endpoint:"));
        assert!(msg.contains("424"));
        assert!(msg.contains("model container crashed"));
    }

    #[test]
    fn test_chunk_size_error_display() {
        assert_eq!(
            EmbeddingError::InvalidChunkSize.to_string(),
            "chunk size must be at least 1"
        );
    }
}
