use bincode::error::{DecodeError, EncodeError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BucketError>;

#[derive(Error, Debug)]
pub enum BucketError {
    #[error("Wrong number of args for '{command}': expected {expected}, got {actual}")]
    ArgumentCountMismatch {
        command: String,
        expected: usize,
        actual: usize,
    },

    #[error("Failed to parse {argument}: '{value}' is not an integer")]
    ParseError { argument: String, value: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Key type miss match")]
    TypeMismatch,

    #[error("Failed to allocate a table of {size} slots")]
    AllocationFailure { size: usize },

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("Failed to parse environment variable {var_name}: value '{value}' - {error}")]
    EnvParseError {
        var_name: String,
        value: String,
        error: String,
    },

    #[cfg(feature = "redb")]
    #[error("ReDB error: {0}")]
    RedbError(#[from] Box<redb::Error>),
}

impl From<EncodeError> for BucketError {
    fn from(err: EncodeError) -> Self {
        BucketError::SerializationError(err.to_string())
    }
}

impl From<DecodeError> for BucketError {
    fn from(err: DecodeError) -> Self {
        BucketError::SerializationError(err.to_string())
    }
}

#[cfg(feature = "redb")]
impl From<redb::Error> for BucketError {
    fn from(err: redb::Error) -> Self {
        BucketError::RedbError(Box::new(err))
    }
}
