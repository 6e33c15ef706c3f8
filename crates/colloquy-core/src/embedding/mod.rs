//! Text embedding through hosted inference endpoints.
//!
//! - [`content_handler`]: the request/response transform pair.
//! - [`endpoint`]: the invocation primitive a transport implements.
//! - [`sagemaker`]: chunked batching over an endpoint.
//! - [`embedder`] / [`box_embedder`]: the generic text-to-vector port.

pub mod box_embedder;
pub mod content_handler;
pub mod embedder;
pub mod endpoint;
pub mod sagemaker;
