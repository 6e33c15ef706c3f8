//! SagemakerEndpointEmbeddings -- batched embeddings over a hosted endpoint.
//!
//! Texts are normalized (newlines become spaces), split into consecutive
//! chunks, and sent to the endpoint one chunk at a time. Chunk results are
//! concatenated in order so the output lines up with the input. Any failure
//! aborts the whole call; partial results are never returned.

use colloquy_types::config::default_chunk_size;
use colloquy_types::embedding::{EmbeddingError, InvokeRequest};
use serde_json::{Map, Value};
use tracing::debug;

use super::content_handler::{ContentHandler, SagemakerEmbeddingsContentHandler};
use super::embedder::Embedder;
use super::endpoint::InferenceEndpoint;

/// Embedding adapter for a SageMaker-style inference endpoint.
///
/// Holds only configuration; safe to reuse across calls.
pub struct SagemakerEndpointEmbeddings<E: InferenceEndpoint> {
    endpoint: E,
    endpoint_name: String,
    content_handler: Box<dyn ContentHandler>,
    model_kwargs: Map<String, Value>,
    endpoint_kwargs: Map<String, Value>,
    chunk_size: usize,
}

impl<E: InferenceEndpoint> SagemakerEndpointEmbeddings<E> {
    /// Create an adapter with a fresh [`SagemakerEmbeddingsContentHandler`]
    /// and a default chunk size of 64.
    pub fn new(endpoint: E, endpoint_name: impl Into<String>) -> Self {
        Self {
            endpoint,
            endpoint_name: endpoint_name.into(),
            content_handler: Box::new(SagemakerEmbeddingsContentHandler::new()),
            model_kwargs: Map::new(),
            endpoint_kwargs: Map::new(),
            chunk_size: default_chunk_size(),
        }
    }

    pub fn with_content_handler(mut self, handler: impl ContentHandler + 'static) -> Self {
        self.content_handler = Box::new(handler);
        self
    }

    pub fn with_model_kwargs(mut self, model_kwargs: Map<String, Value>) -> Self {
        self.model_kwargs = model_kwargs;
        self
    }

    pub fn with_endpoint_kwargs(mut self, endpoint_kwargs: Map<String, Value>) -> Self {
        self.endpoint_kwargs = endpoint_kwargs;
        self
    }

    /// Chunk size used by the [`Embedder`] implementation.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn endpoint_name(&self) -> &str {
        &self.endpoint_name
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Embed every text, `chunk_size` texts per endpoint call.
    pub async fn embed_documents(
        &self,
        texts: &[String],
        chunk_size: usize,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if chunk_size == 0 {
            return Err(EmbeddingError::InvalidChunkSize);
        }
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let chunk_size = chunk_size.min(texts.len());
        let mut results = Vec::with_capacity(texts.len());
        for (index, chunk) in texts.chunks(chunk_size).enumerate() {
            debug!(
                endpoint = %self.endpoint_name,
                chunk = index,
                size = chunk.len(),
                "Invoking embedding endpoint"
            );
            results.extend(self.embedding_func(chunk).await?);
        }
        Ok(results)
    }

    /// Embed a single query text.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embedding_func(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or(EmbeddingError::EmptyResponse)
    }

    /// One endpoint round trip for a single chunk.
    async fn embedding_func(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let texts: Vec<String> = texts.iter().map(|t| t.replace('\n', " ")).collect();
        let body = self
            .content_handler
            .transform_input(&texts, &self.model_kwargs)?;

        let request = InvokeRequest {
            endpoint_name: &self.endpoint_name,
            body,
            content_type: self.content_handler.content_type(),
            accept: self.content_handler.accepts(),
            endpoint_kwargs: &self.endpoint_kwargs,
        };
        let response = self
            .endpoint
            .invoke(request)
            .await
            .map_err(EmbeddingError::from)?;

        self.content_handler.transform_output(&response)
    }
}

impl<E: InferenceEndpoint> Embedder for SagemakerEndpointEmbeddings<E> {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.embed_documents(texts, self.chunk_size).await
    }

    fn model_name(&self) -> &str {
        &self.endpoint_name
    }
}
