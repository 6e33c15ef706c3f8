//! Ports and pure logic for Colloquy.
//!
//! This crate defines the `ChatHistoryStore` trait that storage backends
//! implement, an in-memory reference store, and the embedding pipeline that
//! batches texts against a pluggable inference endpoint. It depends only on
//! `colloquy-types` -- never on `colloquy-infra` or any database/IO crate.

pub mod chat;
pub mod embedding;
