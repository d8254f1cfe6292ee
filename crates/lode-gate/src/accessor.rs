use async_trait::async_trait;
use lode_store::{AccessResult, AtomicDataAccessor, ChildStream, DataAccessor};
use lode_stream::GuardedStream;
use lode_types::{Representation, RepresentationMetadata, ResourceIdentifier};

use crate::validator::{DataValidator, ValidationRequest};

/// Wraps an [`AtomicDataAccessor`] so that every document body is validated
/// before it is written.
///
/// `write_document` hands the body to the validator first. A rejection is
/// returned unchanged and the inner accessor is never called; on success the
/// validator's output stream is written with the original identifier and
/// metadata. Because the inner accessor is atomic, a body that fails halfway
/// through (after validation started streaming it) still leaves no partial
/// document.
///
/// Every other operation is delegated as-is, including `write_container`,
/// which carries no body to validate.
pub struct ValidatingDataAccessor<A, V> {
    accessor: A,
    validator: V,
}

impl<A, V> ValidatingDataAccessor<A, V>
where
    A: AtomicDataAccessor,
    V: DataValidator,
{
    pub fn new(accessor: A, validator: V) -> Self {
        Self {
            accessor,
            validator,
        }
    }

    /// The wrapped accessor.
    pub fn inner(&self) -> &A {
        &self.accessor
    }

    pub fn validator(&self) -> &V {
        &self.validator
    }

    pub fn into_parts(self) -> (A, V) {
        (self.accessor, self.validator)
    }
}

#[async_trait]
impl<A, V> DataAccessor for ValidatingDataAccessor<A, V>
where
    A: AtomicDataAccessor,
    V: DataValidator,
{
    async fn can_handle(&self, representation: &Representation) -> AccessResult<()> {
        self.accessor.can_handle(representation).await
    }

    async fn get_data(&self, identifier: &ResourceIdentifier) -> AccessResult<GuardedStream> {
        self.accessor.get_data(identifier).await
    }

    async fn get_metadata(
        &self,
        identifier: &ResourceIdentifier,
    ) -> AccessResult<RepresentationMetadata> {
        self.accessor.get_metadata(identifier).await
    }

    fn get_children<'a>(&'a self, identifier: &'a ResourceIdentifier) -> ChildStream<'a> {
        self.accessor.get_children(identifier)
    }

    async fn write_document(
        &self,
        identifier: &ResourceIdentifier,
        data: GuardedStream,
        metadata: RepresentationMetadata,
    ) -> AccessResult<()> {
        let validated = self
            .validator
            .handle(ValidationRequest::new(identifier, data, &metadata))
            .await?;
        tracing::debug!(
            identifier = %identifier,
            validator = self.validator.name(),
            "document passed validation"
        );
        self.accessor
            .write_document(identifier, validated, metadata)
            .await
    }

    async fn write_container(
        &self,
        identifier: &ResourceIdentifier,
        metadata: RepresentationMetadata,
    ) -> AccessResult<()> {
        // Containers have no body, so there is nothing to validate.
        self.accessor.write_container(identifier, metadata).await
    }

    async fn delete_resource(&self, identifier: &ResourceIdentifier) -> AccessResult<()> {
        self.accessor.delete_resource(identifier).await
    }
}

impl<A, V> AtomicDataAccessor for ValidatingDataAccessor<A, V>
where
    A: AtomicDataAccessor,
    V: DataValidator,
{
}

impl<A: std::fmt::Debug, V: DataValidator> std::fmt::Debug for ValidatingDataAccessor<A, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatingDataAccessor")
            .field("accessor", &self.accessor)
            .field("validator", &self.validator.name())
            .finish()
    }
}
