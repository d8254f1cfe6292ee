use thiserror::Error;

/// Errors produced by resource model operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("resource identifier must not be empty")]
    EmptyIdentifier,

    #[error("invalid resource identifier {identifier:?}: {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    #[error("invalid child name {0:?}")]
    InvalidChildName(String),
}
