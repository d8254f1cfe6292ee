//! The [`DataAccessor`] contract every backend and decorator implements.

use std::future::Future;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use lode_stream::GuardedStream;
use lode_types::{Representation, RepresentationMetadata, ResourceIdentifier};

use crate::error::AccessResult;

/// Lazy sequence of child metadata produced by [`DataAccessor::get_children`].
pub type ChildStream<'a> = BoxStream<'a, AccessResult<RepresentationMetadata>>;

/// Uniform read/write/delete interface over stored resources.
///
/// Implementations hold no entity state of their own beyond what the backend
/// stores. Every operation fails with [`AccessError::NotFound`] when the
/// identifier is absent, and with `Conflict` or an internal error as
/// appropriate.
///
/// The trait is object-safe: accessors can be stored as
/// `Box<dyn DataAccessor>` and wrapped by decorators implementing the same
/// trait.
///
/// [`AccessError::NotFound`]: crate::AccessError::NotFound
#[async_trait]
pub trait DataAccessor: Send + Sync {
    /// Check whether this accessor can service `representation`.
    ///
    /// Resolves on success and fails with `Unsupported` otherwise. Never has
    /// side effects.
    async fn can_handle(&self, representation: &Representation) -> AccessResult<()>;

    /// Stream the body of an existing document.
    async fn get_data(&self, identifier: &ResourceIdentifier) -> AccessResult<GuardedStream>;

    /// Metadata of a document or container.
    async fn get_metadata(
        &self,
        identifier: &ResourceIdentifier,
    ) -> AccessResult<RepresentationMetadata>;

    /// Metadata of each direct child of a container.
    ///
    /// Every call returns a fresh sequence. Nothing is read until the
    /// sequence is polled.
    fn get_children<'a>(&'a self, identifier: &'a ResourceIdentifier) -> ChildStream<'a>;

    /// Store a document body together with its metadata.
    ///
    /// Takes ownership of `data`; the caller must not read it afterwards.
    async fn write_document(
        &self,
        identifier: &ResourceIdentifier,
        data: GuardedStream,
        metadata: RepresentationMetadata,
    ) -> AccessResult<()>;

    /// Create a container or replace its metadata.
    async fn write_container(
        &self,
        identifier: &ResourceIdentifier,
        metadata: RepresentationMetadata,
    ) -> AccessResult<()>;

    /// Remove a document or container.
    async fn delete_resource(&self, identifier: &ResourceIdentifier) -> AccessResult<()>;
}

/// A [`DataAccessor`] whose writes are all-or-nothing.
///
/// Implementors guarantee that after `write_document` returns, either the
/// full body and its metadata are visible together, or the previous version
/// (or absence) is unchanged. A stream error, a backend error or an
/// abandoned write never leaves a truncated document behind. The same holds
/// for the metadata written by `write_container`.
pub trait AtomicDataAccessor: DataAccessor {}

#[async_trait]
impl<T: DataAccessor + ?Sized> DataAccessor for Box<T> {
    async fn can_handle(&self, representation: &Representation) -> AccessResult<()> {
        (**self).can_handle(representation).await
    }

    async fn get_data(&self, identifier: &ResourceIdentifier) -> AccessResult<GuardedStream> {
        (**self).get_data(identifier).await
    }

    async fn get_metadata(
        &self,
        identifier: &ResourceIdentifier,
    ) -> AccessResult<RepresentationMetadata> {
        (**self).get_metadata(identifier).await
    }

    fn get_children<'a>(&'a self, identifier: &'a ResourceIdentifier) -> ChildStream<'a> {
        (**self).get_children(identifier)
    }

    async fn write_document(
        &self,
        identifier: &ResourceIdentifier,
        data: GuardedStream,
        metadata: RepresentationMetadata,
    ) -> AccessResult<()> {
        (**self).write_document(identifier, data, metadata).await
    }

    async fn write_container(
        &self,
        identifier: &ResourceIdentifier,
        metadata: RepresentationMetadata,
    ) -> AccessResult<()> {
        (**self).write_container(identifier, metadata).await
    }

    async fn delete_resource(&self, identifier: &ResourceIdentifier) -> AccessResult<()> {
        (**self).delete_resource(identifier).await
    }
}

impl<T: AtomicDataAccessor + ?Sized> AtomicDataAccessor for Box<T> {}

/// Turn a one-shot listing future into a lazy [`ChildStream`].
///
/// The future is not started until the stream is first polled. A listing
/// failure is yielded as the single item of the stream.
pub fn deferred_children<'a, F>(listing: F) -> ChildStream<'a>
where
    F: Future<Output = AccessResult<Vec<RepresentationMetadata>>> + Send + 'a,
{
    stream::once(listing)
        .flat_map(|result| match result {
            Ok(children) => stream::iter(children.into_iter().map(Ok)).left_stream(),
            Err(err) => stream::iter(std::iter::once(Err(err))).right_stream(),
        })
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AccessError;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn deferred_children_yields_listing() {
        let children = deferred_children(async {
            Ok(vec![
                RepresentationMetadata::new(ResourceIdentifier::new("/c/a")),
                RepresentationMetadata::new(ResourceIdentifier::new("/c/b")),
            ])
        });
        let listed: Vec<_> = children.try_collect().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[1].identifier().path(), "/c/b");
    }

    #[tokio::test]
    async fn deferred_children_yields_single_error() {
        let id = ResourceIdentifier::new("/missing/");
        let mut children = deferred_children(async { Err(AccessError::NotFound(id)) });
        assert!(children.next().await.unwrap().unwrap_err().is_not_found());
        assert!(children.next().await.is_none());
    }

    #[tokio::test]
    async fn listing_is_not_started_until_polled() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let started = AtomicBool::new(false);
        let children = deferred_children(async {
            started.store(true, Ordering::SeqCst);
            Ok(Vec::new())
        });
        assert!(!started.load(Ordering::SeqCst));
        let listed: Vec<_> = children.try_collect().await.unwrap();
        assert!(listed.is_empty());
        assert!(started.load(Ordering::SeqCst));
    }
}
