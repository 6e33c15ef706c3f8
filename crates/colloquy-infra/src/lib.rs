//! Infrastructure layer for Colloquy.
//!
//! Contains implementations of the traits defined in `colloquy-core`:
//! SQLite chat history storage and the SageMaker Runtime inference client
//! (SigV4 signing, credential resolution), plus the config file loader.

pub mod config;
pub mod sagemaker;
pub mod sqlite;
