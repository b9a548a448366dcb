//! Error types for the savings-group store

use thiserror::Error;

/// Result type for store and ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Store and ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Referenced entity id is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Non-positive (or otherwise unusable) numeric input
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// A record with this id already exists
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// A declared-unique secondary key collides with another record
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Table or index misconfiguration (programming error)
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Operation not allowed in the entity's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Phone/PIN pair did not match
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the failure came from the storage engine rather than caller input
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::Io(_) | Error::Serialization(_))
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_classification() {
        assert!(Error::Storage("quota exceeded".into()).is_storage());
        assert!(!Error::NotFound("member".into()).is_storage());
        assert!(!Error::InvalidAmount("0".into()).is_storage());
    }

    #[test]
    fn test_display() {
        let err = Error::ConstraintViolation("users.phone = 509".into());
        assert_eq!(err.to_string(), "Constraint violation: users.phone = 509");
        assert_eq!(Error::InvalidCredentials.to_string(), "Invalid credentials");
    }
}
