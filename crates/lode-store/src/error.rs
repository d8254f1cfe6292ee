use lode_stream::StreamError;
use lode_types::ResourceIdentifier;

/// Coarse classification of an [`AccessError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    Unsupported,
    Internal,
}

/// Errors from data accessor operations.
///
/// One taxonomy is shared by backends, validators and decorators so that
/// errors propagate through accessor chains unchanged.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    /// The identifier does not exist for the requested operation.
    #[error("resource not found: {0}")]
    NotFound(ResourceIdentifier),

    /// The payload was rejected by a validator before reaching storage.
    #[error("invalid content for {identifier}: {reason}")]
    Validation {
        identifier: ResourceIdentifier,
        reason: String,
    },

    /// The backend detected a conflicting state.
    #[error("conflict on {identifier}: {reason}")]
    Conflict {
        identifier: ResourceIdentifier,
        reason: String,
    },

    /// The accessor cannot service this representation.
    #[error("unsupported representation: {0}")]
    Unsupported(String),

    /// Backend failure unrelated to validity.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error from the underlying storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The data stream failed while being read.
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    /// Stored metadata could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl AccessError {
    pub fn validation(identifier: &ResourceIdentifier, reason: impl Into<String>) -> Self {
        Self::Validation {
            identifier: identifier.clone(),
            reason: reason.into(),
        }
    }

    pub fn conflict(identifier: &ResourceIdentifier, reason: impl Into<String>) -> Self {
        Self::Conflict {
            identifier: identifier.clone(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::Internal(_) | Self::Io(_) | Self::Stream(_) | Self::Serialization(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

impl From<serde_json::Error> for AccessError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result alias for accessor operations.
pub type AccessResult<T> = Result<T, AccessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_classify_variants() {
        let id = ResourceIdentifier::new("/a");
        assert!(AccessError::NotFound(id.clone()).is_not_found());
        assert!(AccessError::validation(&id, "too big").is_validation());
        assert!(AccessError::conflict(&id, "exists").is_conflict());
        assert_eq!(
            AccessError::Unsupported("rdf".into()).kind(),
            ErrorKind::Unsupported
        );
        assert_eq!(AccessError::Stream(StreamError::Closed).kind(), ErrorKind::Internal);
        assert_eq!(
            AccessError::Io(std::io::Error::other("disk")).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn display_names_the_resource() {
        let err = AccessError::validation(&ResourceIdentifier::new("/big.txt"), "over 10 bytes");
        assert_eq!(err.to_string(), "invalid content for /big.txt: over 10 bytes");
    }
}
