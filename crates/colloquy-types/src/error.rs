use thiserror::Error;

/// Errors from repository operations (used by trait definitions in colloquy-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("query error: {0}")]
    Query(String),

    /// The referenced user/chat/message combination does not exist or
    /// belongs to another user.
    #[error("entity not found")]
    NotFound,

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl RepositoryError {
    /// True for the `NotFound` variant.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound)
    }
}
