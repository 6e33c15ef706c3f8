//! SageMaker Runtime inference endpoint client.

pub mod client;
pub mod credentials;
pub mod sigv4;

pub use client::SagemakerRuntimeClient;
