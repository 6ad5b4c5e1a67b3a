use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Order not found")]
    NotFound,
    #[error("Order already exists")]
    AlreadyExists,
    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),
    #[error("Serialization failure: {0}")]
    Serialization(String),
    #[error("Store error: {0}")]
    Store(String),
}

/// Failures reported by a [`KeyValueStore`](super::ports::KeyValueStore).
///
/// Guard failures name the key whose precondition did not hold; when one is
/// returned from a commit, no mutation of that transaction was applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("key already exists: {0}")]
    KeyExists(String),
    #[error("key not found: {0}")]
    KeyNotFound(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("transaction failed: {0}")]
    Transaction(String),
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::KeyExists(_) => DomainError::AlreadyExists,
            StoreError::KeyNotFound(_) => DomainError::NotFound,
            StoreError::Unavailable(_) | StoreError::Transaction(_) => {
                DomainError::Store(e.to_string())
            }
        }
    }
}
