//! Content handlers translate between texts and an endpoint's wire format.
//!
//! The same batching logic can target endpoints with different payload
//! shapes by swapping the handler.

use colloquy_types::embedding::{APPLICATION_JSON, EmbeddingError};
use serde_json::{Map, Value};

/// Request/response transform pair for an embedding endpoint.
///
/// Object safe so adapters can hold a `Box<dyn ContentHandler>`.
pub trait ContentHandler: Send + Sync {
    /// MIME type of the serialized request body.
    fn content_type(&self) -> &str;

    /// MIME type expected back from the endpoint.
    fn accepts(&self) -> &str;

    /// Serialize `prompts` into a request body, merging `model_kwargs`.
    fn transform_input(
        &self,
        prompts: &[String],
        model_kwargs: &Map<String, Value>,
    ) -> Result<Vec<u8>, EmbeddingError>;

    /// Decode a response body into one vector per prompt.
    fn transform_output(&self, output: &[u8]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// JSON handler for SageMaker embedding containers.
///
/// Request: `{"type": "embeddings", "input": [...], **model_kwargs}`.
/// Response: the body is the list of vectors itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct SagemakerEmbeddingsContentHandler;

impl SagemakerEmbeddingsContentHandler {
    pub fn new() -> Self {
        Self
    }
}

impl ContentHandler for SagemakerEmbeddingsContentHandler {
    fn content_type(&self) -> &str {
        APPLICATION_JSON
    }

    fn accepts(&self) -> &str {
        APPLICATION_JSON
    }

    fn transform_input(
        &self,
        prompts: &[String],
        model_kwargs: &Map<String, Value>,
    ) -> Result<Vec<u8>, EmbeddingError> {
        let mut payload = Map::new();
        payload.insert("type".to_string(), Value::from("embeddings"));
        payload.insert("input".to_string(), Value::from(prompts.to_vec()));
        // Later keys win, so model kwargs may override the defaults above.
        for (key, value) in model_kwargs {
            payload.insert(key.clone(), value.clone());
        }
        serde_json::to_vec(&Value::Object(payload)).map_err(|e| EmbeddingError::Encode(e.to_string()))
    }

    fn transform_output(&self, output: &[u8]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let text = std::str::from_utf8(output).map_err(|e| EmbeddingError::Decode(e.to_string()))?;
        serde_json::from_str(text).map_err(|e| EmbeddingError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_declared_mime_types() {
        let handler = SagemakerEmbeddingsContentHandler::new();
        assert_eq!(handler.content_type(), "application/json");
        assert_eq!(handler.accepts(), "application/json");
    }

    #[test]
    fn test_transform_input_payload() {
        let handler = SagemakerEmbeddingsContentHandler::new();
        let mut kwargs = Map::new();
        kwargs.insert("normalize".to_string(), json!(true));

        let body = handler
            .transform_input(&["a".to_string(), "b".to_string()], &kwargs)
            .unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            value,
            json!({ "type": "embeddings", "input": ["a", "b"], "normalize": true })
        );
    }

    #[test]
    fn test_model_kwargs_override_defaults() {
        let handler = SagemakerEmbeddingsContentHandler::new();
        let mut kwargs = Map::new();
        kwargs.insert("type".to_string(), json!("query"));

        let body = handler.transform_input(&["q".to_string()], &kwargs).unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["type"], json!("query"));
    }

    #[test]
    fn test_transform_output_is_vector_list() {
        let handler = SagemakerEmbeddingsContentHandler::new();
        let vectors = handler.transform_output(b"[[0.5, 1.0], [2.0, -1.5]]").unwrap();
        assert_eq!(vectors, vec![vec![0.5, 1.0], vec![2.0, -1.5]]);
    }

    #[test]
    fn test_transform_output_rejects_other_shapes() {
        let handler = SagemakerEmbeddingsContentHandler::new();
        let err = handler
            .transform_output(br#"{"embeddings": [[1.0]]}"#)
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::Decode(_)));

        let err = handler.transform_output(&[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, EmbeddingError::Decode(_)));
    }
}
