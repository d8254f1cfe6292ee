use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use lode_stream::GuardedStream;
use lode_types::{vocab, Representation, RepresentationMetadata, ResourceIdentifier};

use crate::error::{AccessError, AccessResult};
use crate::traits::{deferred_children, AtomicDataAccessor, ChildStream, DataAccessor};

#[derive(Clone, Debug)]
enum Entry {
    Document {
        data: Bytes,
        metadata: RepresentationMetadata,
    },
    Container {
        metadata: RepresentationMetadata,
    },
}

impl Entry {
    fn metadata(&self) -> &RepresentationMetadata {
        match self {
            Self::Document { metadata, .. } | Self::Container { metadata } => metadata,
        }
    }
}

/// In-memory, `BTreeMap`-based data accessor.
///
/// Intended for tests and embedding. Document bodies are drained completely
/// before the write lock is taken, so a failing stream never touches the map
/// and every write is atomic.
pub struct InMemoryDataAccessor {
    root: ResourceIdentifier,
    entries: RwLock<BTreeMap<ResourceIdentifier, Entry>>,
}

impl InMemoryDataAccessor {
    /// Create an accessor holding only the root container `/`.
    pub fn new() -> Self {
        Self::with_root(ResourceIdentifier::root())
    }

    /// Create an accessor whose root container is `root`.
    pub fn with_root(root: ResourceIdentifier) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            root.clone(),
            Entry::Container {
                metadata: RepresentationMetadata::container(root.clone()),
            },
        );
        Self {
            root,
            entries: RwLock::new(entries),
        }
    }

    /// Number of stored resources, root included.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Returns `true` if only the root container exists.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// Returns `true` if `identifier` exists.
    pub fn contains(&self, identifier: &ResourceIdentifier) -> bool {
        self.entries
            .read()
            .expect("lock poisoned")
            .contains_key(identifier)
    }

    /// Identifiers of the direct children of `container`, sorted.
    fn child_ids(
        entries: &BTreeMap<ResourceIdentifier, Entry>,
        container: &ResourceIdentifier,
    ) -> Vec<ResourceIdentifier> {
        entries
            .range(container.clone()..)
            .take_while(|(id, _)| id.path().starts_with(container.path()))
            .filter(|(id, _)| container.is_parent_of(id))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// The other spelling of an identifier: `/a` for `/a/` and vice versa.
    fn twin(identifier: &ResourceIdentifier) -> ResourceIdentifier {
        match identifier.path().strip_suffix('/') {
            Some(stripped) => ResourceIdentifier::new(stripped),
            None => ResourceIdentifier::new(format!("{}/", identifier.path())),
        }
    }

    /// Ancestors of `identifier` that do not exist yet, outermost last.
    ///
    /// Fails if any ancestor exists as a document.
    fn missing_ancestors(
        &self,
        entries: &BTreeMap<ResourceIdentifier, Entry>,
        identifier: &ResourceIdentifier,
    ) -> AccessResult<Vec<ResourceIdentifier>> {
        let mut missing = Vec::new();
        let mut current = identifier.parent();
        while let Some(ancestor) = current {
            if entries.contains_key(&ancestor) {
                break;
            }
            if entries.contains_key(&Self::twin(&ancestor)) {
                return Err(AccessError::conflict(
                    identifier,
                    format!("ancestor {ancestor} exists as a document"),
                ));
            }
            if ancestor == self.root {
                break;
            }
            current = ancestor.parent();
            missing.push(ancestor);
        }
        Ok(missing)
    }

    /// Fail with `Unsupported` unless `identifier` lies under the root.
    fn check_within_root(&self, identifier: &ResourceIdentifier) -> AccessResult<()> {
        if identifier.path().starts_with(self.root.path()) {
            Ok(())
        } else {
            Err(AccessError::Unsupported(format!(
                "{identifier} is outside {}",
                self.root
            )))
        }
    }

    fn insert_ancestors(
        entries: &mut BTreeMap<ResourceIdentifier, Entry>,
        missing: Vec<ResourceIdentifier>,
    ) {
        for ancestor in missing {
            tracing::debug!(identifier = %ancestor, "creating intermediate container");
            let metadata = RepresentationMetadata::container(ancestor.clone());
            entries.insert(ancestor, Entry::Container { metadata });
        }
    }

    fn list_children(
        &self,
        identifier: &ResourceIdentifier,
    ) -> AccessResult<Vec<RepresentationMetadata>> {
        let entries = self.entries.read().expect("lock poisoned");
        match entries.get(identifier) {
            Some(Entry::Container { .. }) => Ok(Self::child_ids(&entries, identifier)
                .iter()
                .filter_map(|id| entries.get(id))
                .map(|entry| entry.metadata().clone())
                .collect()),
            _ => Err(AccessError::NotFound(identifier.clone())),
        }
    }
}

impl Default for InMemoryDataAccessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataAccessor for InMemoryDataAccessor {
    async fn can_handle(&self, representation: &Representation) -> AccessResult<()> {
        if !representation.is_binary() {
            return Err(AccessError::Unsupported(
                "only binary data can be stored in memory".into(),
            ));
        }
        Ok(())
    }

    async fn get_data(&self, identifier: &ResourceIdentifier) -> AccessResult<GuardedStream> {
        let entries = self.entries.read().expect("lock poisoned");
        match entries.get(identifier) {
            Some(Entry::Document { data, .. }) => Ok(GuardedStream::from_bytes(data.clone())),
            _ => Err(AccessError::NotFound(identifier.clone())),
        }
    }

    async fn get_metadata(
        &self,
        identifier: &ResourceIdentifier,
    ) -> AccessResult<RepresentationMetadata> {
        let entries = self.entries.read().expect("lock poisoned");
        match entries.get(identifier) {
            Some(Entry::Document { metadata, .. }) => Ok(metadata.clone()),
            Some(Entry::Container { metadata }) => {
                let mut metadata = metadata.clone();
                for child in Self::child_ids(&entries, identifier) {
                    metadata.add(vocab::CONTAINS, child.path());
                }
                Ok(metadata)
            }
            None => Err(AccessError::NotFound(identifier.clone())),
        }
    }

    fn get_children<'a>(&'a self, identifier: &'a ResourceIdentifier) -> ChildStream<'a> {
        deferred_children(async move { self.list_children(identifier) })
    }

    async fn write_document(
        &self,
        identifier: &ResourceIdentifier,
        data: GuardedStream,
        metadata: RepresentationMetadata,
    ) -> AccessResult<()> {
        if identifier.is_container() {
            return Err(AccessError::conflict(
                identifier,
                "a document identifier cannot end with '/'",
            ));
        }
        self.check_within_root(identifier)?;

        // Drain first: a stream failure must leave the map untouched.
        let body = data.read_to_end().await.map_err(|err| {
            tracing::warn!(identifier = %identifier, error = %err, "document write aborted");
            AccessError::from(err)
        })?;

        let mut metadata = metadata.rebind(identifier.clone());
        metadata.remove(vocab::CONTAINS);
        metadata.add(vocab::RESOURCE_TYPE, vocab::LDP_RESOURCE);
        metadata.set_content_length(body.len() as u64);
        metadata.set(vocab::MODIFIED, chrono::Utc::now().to_rfc3339());

        let mut entries = self.entries.write().expect("lock poisoned");
        if entries.contains_key(&Self::twin(identifier)) {
            return Err(AccessError::conflict(identifier, "a container exists with this name"));
        }
        let missing = self.missing_ancestors(&entries, identifier)?;
        Self::insert_ancestors(&mut entries, missing);

        tracing::debug!(identifier = %identifier, bytes = body.len(), "document stored");
        entries.insert(
            identifier.clone(),
            Entry::Document {
                data: body,
                metadata,
            },
        );
        Ok(())
    }

    async fn write_container(
        &self,
        identifier: &ResourceIdentifier,
        metadata: RepresentationMetadata,
    ) -> AccessResult<()> {
        if !identifier.is_container() {
            return Err(AccessError::conflict(
                identifier,
                "a container identifier must end with '/'",
            ));
        }
        self.check_within_root(identifier)?;

        let mut metadata = metadata.rebind(identifier.clone());
        metadata.remove(vocab::CONTAINS);
        metadata.add(vocab::RESOURCE_TYPE, vocab::LDP_CONTAINER);

        let mut entries = self.entries.write().expect("lock poisoned");
        if entries.contains_key(&Self::twin(identifier)) {
            return Err(AccessError::conflict(identifier, "a document exists with this name"));
        }
        let missing = self.missing_ancestors(&entries, identifier)?;
        Self::insert_ancestors(&mut entries, missing);

        tracing::debug!(identifier = %identifier, "container stored");
        entries.insert(identifier.clone(), Entry::Container { metadata });
        Ok(())
    }

    async fn delete_resource(&self, identifier: &ResourceIdentifier) -> AccessResult<()> {
        let mut entries = self.entries.write().expect("lock poisoned");
        match entries.get(identifier) {
            None => return Err(AccessError::NotFound(identifier.clone())),
            Some(Entry::Container { .. }) => {
                if *identifier == self.root {
                    return Err(AccessError::conflict(identifier, "cannot delete the root container"));
                }
                if !Self::child_ids(&entries, identifier).is_empty() {
                    return Err(AccessError::conflict(identifier, "container is not empty"));
                }
            }
            Some(Entry::Document { .. }) => {}
        }
        entries.remove(identifier);
        tracing::debug!(identifier = %identifier, "resource deleted");
        Ok(())
    }
}

impl AtomicDataAccessor for InMemoryDataAccessor {}

impl std::fmt::Debug for InMemoryDataAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDataAccessor")
            .field("root", &self.root)
            .field("resource_count", &self.len())
            .finish()
    }
}
