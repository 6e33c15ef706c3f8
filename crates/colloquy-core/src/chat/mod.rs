//! Chat history persistence: the store contract, the pagination cursor
//! shared by all backends, and an in-memory implementation.

pub mod memory;
pub mod pagination;
pub mod store;
