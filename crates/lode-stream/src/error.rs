use std::io;

/// Errors carried by a [`GuardedStream`](crate::GuardedStream).
///
/// The type is `Clone` so that a stored error can be handed to every
/// consumer that polls the stream after the failure happened.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// The underlying source failed with an I/O error.
    #[error("I/O error ({kind:?}): {message}")]
    Io { kind: io::ErrorKind, message: String },

    /// The producer explicitly aborted the stream.
    #[error("stream aborted: {0}")]
    Aborted(String),

    /// The producer went away without finishing the stream.
    #[error("stream closed before completion")]
    Closed,

    /// The stream content was expected to be UTF-8 but was not.
    #[error("invalid UTF-8 in stream: {0}")]
    Utf8(String),
}

impl StreamError {
    /// Create an abort error with a reason.
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::Aborted(reason.into())
    }
}

impl From<io::Error> for StreamError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<StreamError> for io::Error {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::Io { kind, message } => io::Error::new(kind, message),
            other => io::Error::new(io::ErrorKind::Other, other.to_string()),
        }
    }
}

/// Result alias for stream operations.
pub type StreamResult<T> = Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_keeps_kind() {
        let err = StreamError::from(io::Error::new(io::ErrorKind::BrokenPipe, "pipe gone"));
        assert!(matches!(
            err,
            StreamError::Io {
                kind: io::ErrorKind::BrokenPipe,
                ..
            }
        ));
        assert!(err.to_string().contains("pipe gone"));
    }

    #[test]
    fn converts_back_to_io_error() {
        let io_err: io::Error = StreamError::aborted("client went away").into();
        assert_eq!(io_err.kind(), io::ErrorKind::Other);
        assert!(io_err.to_string().contains("client went away"));
    }
}
