use async_trait::async_trait;
use futures::StreamExt;
use lode_store::{AccessError, AccessResult};
use lode_stream::GuardedStream;

use crate::validator::{DataValidator, ValidationRequest};

/// Rejects documents larger than `max_bytes`.
///
/// The body is buffered while it is counted, so nothing is forwarded until
/// the whole input has been read. Once the limit is exceeded the rest of the
/// input is drained without being kept.
#[derive(Clone, Copy, Debug)]
pub struct MaxSizeValidator {
    pub max_bytes: u64,
}

impl MaxSizeValidator {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }
}

#[async_trait]
impl DataValidator for MaxSizeValidator {
    fn name(&self) -> &str {
        "max-size"
    }

    async fn handle(&self, request: ValidationRequest<'_>) -> AccessResult<GuardedStream> {
        let ValidationRequest {
            identifier, data, ..
        } = request;
        let mut data = data;
        let mut chunks = Vec::new();
        let mut total = 0u64;
        while let Some(chunk) = data.next().await {
            let chunk = chunk?;
            total += chunk.len() as u64;
            if total <= self.max_bytes {
                chunks.push(chunk);
            } else {
                chunks.clear();
            }
        }

        if total > self.max_bytes {
            return Err(AccessError::validation(
                identifier,
                format!(
                    "document is {total} bytes, limit is {} bytes",
                    self.max_bytes
                ),
            ));
        }
        Ok(GuardedStream::from_chunks(chunks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lode_stream::{channel, StreamError};
    use lode_types::{RepresentationMetadata, ResourceIdentifier};

    async fn run(limit: u64, data: GuardedStream) -> AccessResult<GuardedStream> {
        let id = ResourceIdentifier::new("/big.txt");
        let meta = RepresentationMetadata::new(id.clone());
        MaxSizeValidator::new(limit)
            .handle(ValidationRequest::new(&id, data, &meta))
            .await
    }

    #[tokio::test]
    async fn accepts_at_limit() {
        let out = run(10, GuardedStream::from("0123456789")).await.unwrap();
        assert_eq!(out.read_to_string().await.unwrap(), "0123456789");
    }

    #[tokio::test]
    async fn rejects_over_limit() {
        let err = run(10, GuardedStream::from("0123456789a")).await.unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("11 bytes"));
    }

    #[tokio::test]
    async fn counts_across_chunks() {
        let data = GuardedStream::from_chunks(vec!["12345".into(), "67890".into(), "x".into()]);
        assert!(run(10, data).await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn stream_error_is_not_a_validation_error() {
        let (mut tx, rx) = channel(2);
        tx.send("abc").await.unwrap();
        tx.abort(StreamError::aborted("client went away"));
        let err = run(10, rx).await.unwrap_err();
        assert!(matches!(err, AccessError::Stream(StreamError::Aborted(_))));
    }
}
