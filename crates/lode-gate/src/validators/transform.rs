use async_trait::async_trait;
use bytes::Bytes;
use lode_store::AccessResult;
use lode_stream::GuardedStream;

use crate::validator::{DataValidator, ValidationRequest};

type TransformFn = dyn Fn(Bytes) -> Bytes + Send + Sync;

/// Buffers the whole body and re-emits `f(body)`.
pub struct TransformValidator {
    name: String,
    transform: Box<TransformFn>,
}

impl TransformValidator {
    pub fn new<F>(name: impl Into<String>, transform: F) -> Self
    where
        F: Fn(Bytes) -> Bytes + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            transform: Box::new(transform),
        }
    }

    /// ASCII upper-casing of the whole body.
    pub fn uppercase() -> Self {
        Self::new("uppercase", |body: Bytes| {
            Bytes::from(body.to_ascii_uppercase())
        })
    }
}

#[async_trait]
impl DataValidator for TransformValidator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, request: ValidationRequest<'_>) -> AccessResult<GuardedStream> {
        let body = request.data.read_to_end().await?;
        Ok(GuardedStream::from_bytes((self.transform)(body)))
    }
}

impl std::fmt::Debug for TransformValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformValidator")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
