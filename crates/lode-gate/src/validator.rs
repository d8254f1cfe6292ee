use async_trait::async_trait;
use lode_store::AccessResult;
use lode_stream::GuardedStream;
use lode_types::{RepresentationMetadata, ResourceIdentifier};

// ---------------------------------------------------------------------------
// ValidationRequest
// ---------------------------------------------------------------------------

/// A document write presented to a validator.
///
/// The validator owns the body stream; identifier and metadata are borrowed
/// from the write that is being validated.
pub struct ValidationRequest<'a> {
    /// The document being written.
    pub identifier: &'a ResourceIdentifier,
    /// The body to inspect. Consumed by the validator.
    pub data: GuardedStream,
    /// Metadata supplied with the write.
    pub metadata: &'a RepresentationMetadata,
}

impl<'a> ValidationRequest<'a> {
    pub fn new(
        identifier: &'a ResourceIdentifier,
        data: GuardedStream,
        metadata: &'a RepresentationMetadata,
    ) -> Self {
        Self {
            identifier,
            data,
            metadata,
        }
    }

    /// The same request carrying a different body.
    pub fn with_data(self, data: GuardedStream) -> Self {
        Self { data, ..self }
    }
}

impl std::fmt::Debug for ValidationRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationRequest")
            .field("identifier", self.identifier)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// DataValidator trait
// ---------------------------------------------------------------------------

/// Inspects (and possibly transforms) a document body before it is stored.
///
/// On success the validator returns the stream that should be persisted:
/// the input unchanged, a re-wrapped buffer of it, or transformed content.
/// Content that violates policy is rejected with
/// [`AccessError::Validation`](lode_store::AccessError::Validation); errors
/// of the input stream propagate as `AccessError::Stream`.
///
/// The trait is object-safe and `Send + Sync` so validators can be stored in
/// a `Vec<Box<dyn DataValidator>>`.
#[async_trait]
pub trait DataValidator: Send + Sync {
    /// Human-readable name of this validator (e.g., "max-size").
    fn name(&self) -> &str;

    /// Validate the request and return the stream to persist.
    async fn handle(&self, request: ValidationRequest<'_>) -> AccessResult<GuardedStream>;
}

#[async_trait]
impl<T: DataValidator + ?Sized> DataValidator for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn handle(&self, request: ValidationRequest<'_>) -> AccessResult<GuardedStream> {
        (**self).handle(request).await
    }
}
