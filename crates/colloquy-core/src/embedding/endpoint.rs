//! InferenceEndpoint trait definition.
//!
//! The remote invocation primitive behind the embedding adapter. The
//! SageMaker Runtime HTTP client in colloquy-infra implements it; tests
//! implement it with in-process fakes.

use colloquy_types::embedding::{EndpointError, InvokeRequest};

/// Sends one request body to a hosted model and returns the raw response body.
pub trait InferenceEndpoint: Send + Sync {
    fn invoke(
        &self,
        request: InvokeRequest<'_>,
    ) -> impl std::future::Future<Output = Result<Vec<u8>, EndpointError>> + Send;
}
