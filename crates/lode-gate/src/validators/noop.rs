use async_trait::async_trait;
use lode_store::AccessResult;
use lode_stream::GuardedStream;

use crate::validator::{DataValidator, ValidationRequest};

/// Accepts every document and passes the body through untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopValidator;

#[async_trait]
impl DataValidator for NoopValidator {
    fn name(&self) -> &str {
        "noop"
    }

    async fn handle(&self, request: ValidationRequest<'_>) -> AccessResult<GuardedStream> {
        Ok(request.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lode_types::{RepresentationMetadata, ResourceIdentifier};

    #[tokio::test]
    async fn passes_body_through() {
        let id = ResourceIdentifier::new("/a.txt");
        let meta = RepresentationMetadata::new(id.clone());
        let out = NoopValidator
            .handle(ValidationRequest::new(&id, GuardedStream::from("abc"), &meta))
            .await
            .unwrap();
        assert_eq!(out.read_to_string().await.unwrap(), "abc");
    }
}
