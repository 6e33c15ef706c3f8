//! Shared domain types for Colloquy.
//!
//! This crate contains the data shapes used across the workspace: chats,
//! chat messages and their retrieval sources, embedding errors, global
//! configuration, and the repository error type.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod embedding;
pub mod error;
