use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use lode_stream::GuardedStream;
use lode_types::{vocab, Representation, RepresentationMetadata, ResourceIdentifier};
use serde::{Deserialize, Serialize};
use tempfile::{Builder, NamedTempFile, TempPath};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::RwLock;

use crate::error::{AccessError, AccessResult};
use crate::traits::{deferred_children, AtomicDataAccessor, ChildStream, DataAccessor};

/// Sidecar suffix for document metadata, and the name of container metadata.
const META_SUFFIX: &str = ".meta";
/// Names starting with this prefix belong to the accessor itself.
const INTERNAL_PREFIX: &str = ".lode-";
const STAGING_PREFIX: &str = ".lode-staging-";
const BACKUP_PREFIX: &str = ".lode-backup-";
const JOURNAL_PREFIX: &str = ".lode-journal-";
const CHUNK_SIZE: usize = 64 * 1024;
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Data accessor storing resources as files under a root directory.
///
/// # Layout
///
/// - document `/a/b.txt` → `<root>/a/b.txt`, metadata in `<root>/a/b.txt.meta`
/// - container `/a/` → directory `<root>/a`, metadata in `<root>/a/.meta`
///
/// # Atomicity
///
/// Bodies and metadata are first staged as temporary files in the root
/// directory and fsynced. Only once the whole stream has been consumed are
/// they published over their final names. Publishing is journaled: the
/// previous files are hard-linked to backups and a journal naming every
/// target is written before the first rename, and removing the journal is
/// the commit point. A commit that fails midway is rolled back at once, and
/// one interrupted by a crash is rolled back the next time the store is
/// opened. Within a process, readers never observe a half-published commit.
pub struct FileDataAccessor {
    root: PathBuf,
    /// Held exclusively while a commit or delete touches the tree.
    commit_lock: RwLock<()>,
}

/// The files a commit is about to replace, with paths relative to the root.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Journal {
    entries: Vec<JournalEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct JournalEntry {
    target: PathBuf,
    /// `None` if the target did not exist before the commit.
    backup: Option<PathBuf>,
}

impl Journal {
    /// Put every target back the way it was. Safe to run more than once.
    fn roll_back(&self, root: &Path) -> io::Result<()> {
        for entry in self.entries.iter().rev() {
            let target = root.join(&entry.target);
            match &entry.backup {
                Some(backup) => match std::fs::rename(root.join(backup), &target) {
                    Err(err) if err.kind() != io::ErrorKind::NotFound => return Err(err),
                    _ => {}
                },
                None => match std::fs::symlink_metadata(&target) {
                    Ok(meta) if !meta.is_dir() => std::fs::remove_file(&target)?,
                    Ok(_) => {}
                    Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                    Err(err) => return Err(err),
                },
            }
        }
        Ok(())
    }

    fn backups(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().filter_map(|entry| entry.backup.as_deref())
    }
}

impl FileDataAccessor {
    /// Open (and create if needed) a store rooted at `root`.
    ///
    /// Commits interrupted by a crash are rolled back and stray staging
    /// files are removed before the store is returned.
    pub fn new(root: impl Into<PathBuf>) -> AccessResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        recover(&root)?;
        Ok(Self {
            root,
            commit_lock: RwLock::new(()),
        })
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an identifier to a path under the root.
    fn resolve(&self, identifier: &ResourceIdentifier) -> AccessResult<PathBuf> {
        let path = identifier.path();
        if path == "/" {
            return Ok(self.root.clone());
        }
        let relative = path.strip_prefix('/').ok_or_else(|| {
            AccessError::Unsupported(format!("identifier {identifier} is not an absolute path"))
        })?;
        let relative = relative.strip_suffix('/').unwrap_or(relative);
        let mut resolved = self.root.clone();
        for segment in relative.split('/') {
            if segment.is_empty()
                || segment == "."
                || segment == ".."
                || segment.starts_with(INTERNAL_PREFIX)
                || segment.ends_with(META_SUFFIX)
            {
                return Err(AccessError::Unsupported(format!(
                    "identifier {identifier} contains reserved segment {segment:?}"
                )));
            }
            resolved.push(segment);
        }
        Ok(resolved)
    }

    /// Fail with `Conflict` if any directory between the root and `path` is
    /// a regular file.
    async fn check_ancestors(&self, identifier: &ResourceIdentifier, path: &Path) -> AccessResult<()> {
        let ancestors: Vec<&Path> = path
            .ancestors()
            .skip(1)
            .take_while(|dir| dir.starts_with(&self.root) && *dir != self.root)
            .collect();
        for dir in ancestors.into_iter().rev() {
            match stat(dir).await? {
                Some(meta) if meta.is_dir() => {}
                Some(_) => {
                    return Err(AccessError::conflict(
                        identifier,
                        format!("ancestor {} is a document", dir.display()),
                    ));
                }
                None => break,
            }
        }
        Ok(())
    }

    /// Create an empty temporary file in the root directory.
    async fn reserve(&self, prefix: &'static str) -> AccessResult<NamedTempFile> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || Builder::new().prefix(prefix).tempfile_in(root))
            .await
            .map_err(|err| AccessError::Internal(err.to_string()))?
            .map_err(AccessError::from)
    }

    /// Write `data` to a staging file and fsync it. Returns the staged path
    /// and the number of bytes written. The staging file is removed if
    /// anything fails.
    async fn stage_stream(&self, mut data: GuardedStream) -> AccessResult<(TempPath, u64)> {
        let (file, path) = self.reserve(STAGING_PREFIX).await?.into_parts();
        let mut file = File::from_std(file);
        let mut size = 0u64;
        while let Some(chunk) = data.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            size += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        Ok((path, size))
    }

    async fn stage_json<T: Serialize>(&self, value: &T) -> AccessResult<TempPath> {
        let encoded = serde_json::to_vec_pretty(value)?;
        let (path, _) = self.stage_stream(GuardedStream::from_bytes(encoded)).await?;
        Ok(path)
    }

    /// Hard-link (or copy) an existing regular file to `<root>/<name>`.
    /// Returns the backup name, or `None` if there is nothing to keep.
    async fn backup(&self, target: &Path, name: String) -> AccessResult<Option<PathBuf>> {
        if !stat(target).await?.is_some_and(|meta| meta.is_file()) {
            return Ok(None);
        }
        let backup = self.root.join(&name);
        if tokio::fs::hard_link(target, &backup).await.is_err() {
            tokio::fs::copy(target, &backup).await?;
        }
        Ok(Some(PathBuf::from(name)))
    }

    /// Publish every staged file over its target as a single unit.
    ///
    /// The caller must hold the commit lock exclusively.
    async fn commit(
        &self,
        identifier: &ResourceIdentifier,
        staged: Vec<(TempPath, PathBuf)>,
    ) -> AccessResult<()> {
        let tag = match staged.first() {
            Some((first, _)) => commit_tag(first)?,
            None => return Ok(()),
        };
        let targets = staged
            .iter()
            .map(|(_, target)| {
                target
                    .strip_prefix(&self.root)
                    .map(Path::to_path_buf)
                    .map_err(|_| AccessError::Internal(format!("{} is outside the store", target.display())))
            })
            .collect::<AccessResult<Vec<_>>>()?;

        let mut journal = Journal::default();
        for (index, target) in targets.into_iter().enumerate() {
            let name = format!("{BACKUP_PREFIX}{tag}-{index}");
            match self.backup(&self.root.join(&target), name).await {
                Ok(backup) => journal.entries.push(JournalEntry { target, backup }),
                Err(err) => {
                    self.discard_backups(&journal).await;
                    return Err(err);
                }
            }
        }

        let journal_path = self.root.join(format!("{JOURNAL_PREFIX}{tag}"));
        let written = match self.stage_json(&journal).await {
            Ok(staged_journal) => publish(staged_journal, &journal_path).await,
            Err(err) => Err(err),
        };
        if let Err(err) = written {
            self.discard_backups(&journal).await;
            return Err(err);
        }

        for (file, target) in staged {
            if let Err(err) = publish(file, &target).await {
                tracing::warn!(identifier = %identifier, error = %err, "commit failed, rolling back");
                self.roll_back(journal, journal_path).await;
                return Err(err);
            }
        }

        if let Err(err) = tokio::fs::remove_file(&journal_path).await {
            tracing::warn!(identifier = %identifier, error = %err, "could not close journal, rolling back");
            self.roll_back(journal, journal_path).await;
            return Err(err.into());
        }
        self.discard_backups(&journal).await;
        Ok(())
    }

    /// Undo a failed commit. The journal is only removed once every target
    /// has been restored, so a failed rollback is retried on the next open.
    async fn roll_back(&self, journal: Journal, journal_path: PathBuf) {
        let root = self.root.clone();
        let rolled_back = tokio::task::spawn_blocking(move || {
            journal.roll_back(&root)?;
            std::fs::remove_file(&journal_path)?;
            Ok::<_, io::Error>(journal)
        })
        .await;
        match rolled_back {
            Ok(Ok(journal)) => self.discard_backups(&journal).await,
            Ok(Err(err)) => {
                tracing::error!(root = %self.root.display(), error = %err, "rollback failed, journal kept for recovery");
            }
            Err(err) => {
                tracing::error!(root = %self.root.display(), error = %err, "rollback task failed");
            }
        }
    }

    async fn discard_backups(&self, journal: &Journal) {
        for backup in journal.backups() {
            let path = self.root.join(backup);
            if let Err(err) = remove_if_exists(&path).await {
                tracing::warn!(path = %path.display(), error = %err, "could not remove backup");
            }
        }
    }

    /// Names of the visible entries of a directory, with a directory flag,
    /// sorted by name.
    async fn list_entries(&self, dir: &Path) -> AccessResult<Vec<(String, bool)>> {
        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with(INTERNAL_PREFIX) || name.ends_with(META_SUFFIX) {
                continue;
            }
            let is_dir = entry.file_type().await?.is_dir();
            entries.push((name, is_dir));
        }
        entries.sort();
        Ok(entries)
    }

    async fn document_metadata(
        &self,
        identifier: &ResourceIdentifier,
        path: &Path,
        stat: &Metadata,
    ) -> AccessResult<RepresentationMetadata> {
        if let Some(stored) = read_metadata(&meta_path(path), identifier).await? {
            return Ok(stored);
        }
        let mut metadata =
            RepresentationMetadata::new(identifier.clone()).with_content_type(DEFAULT_CONTENT_TYPE);
        metadata.add(vocab::RESOURCE_TYPE, vocab::LDP_RESOURCE);
        metadata.set_content_length(stat.len());
        Ok(metadata)
    }

    async fn container_metadata(
        &self,
        identifier: &ResourceIdentifier,
        dir: &Path,
    ) -> AccessResult<RepresentationMetadata> {
        Ok(read_metadata(&dir.join(META_SUFFIX), identifier)
            .await?
            .unwrap_or_else(|| RepresentationMetadata::container(identifier.clone())))
    }

    async fn read_children(
        &self,
        identifier: &ResourceIdentifier,
    ) -> AccessResult<Vec<RepresentationMetadata>> {
        let _reading = self.commit_lock.read().await;
        let dir = self.container_dir(identifier).await?;
        let mut children = Vec::new();
        for (name, is_dir) in self.list_entries(&dir).await? {
            let child = child_identifier(identifier, &name, is_dir)?;
            let path = dir.join(&name);
            let metadata = if is_dir {
                self.container_metadata(&child, &path).await?
            } else {
                let stat = tokio::fs::metadata(&path).await?;
                self.document_metadata(&child, &path, &stat).await?
            };
            children.push(metadata);
        }
        Ok(children)
    }

    /// The directory of an existing container.
    async fn container_dir(&self, identifier: &ResourceIdentifier) -> AccessResult<PathBuf> {
        if !identifier.is_container() {
            return Err(AccessError::NotFound(identifier.clone()));
        }
        let dir = self.resolve(identifier)?;
        let stat = tokio::fs::metadata(&dir)
            .await
            .map_err(|err| not_found_or(err, identifier))?;
        if !stat.is_dir() {
            return Err(AccessError::NotFound(identifier.clone()));
        }
        Ok(dir)
    }

    /// The path and file metadata of an existing document.
    async fn document_file(
        &self,
        identifier: &ResourceIdentifier,
    ) -> AccessResult<(PathBuf, Metadata)> {
        if identifier.is_container() {
            return Err(AccessError::NotFound(identifier.clone()));
        }
        let path = self.resolve(identifier)?;
        let stat = tokio::fs::metadata(&path)
            .await
            .map_err(|err| not_found_or(err, identifier))?;
        if !stat.is_file() {
            return Err(AccessError::NotFound(identifier.clone()));
        }
        Ok((path, stat))
    }
}

#[async_trait]
impl DataAccessor for FileDataAccessor {
    async fn can_handle(&self, representation: &Representation) -> AccessResult<()> {
        if !representation.is_binary() {
            return Err(AccessError::Unsupported(
                "only binary data can be stored on disk".into(),
            ));
        }
        Ok(())
    }

    async fn get_data(&self, identifier: &ResourceIdentifier) -> AccessResult<GuardedStream> {
        let _reading = self.commit_lock.read().await;
        let (path, _) = self.document_file(identifier).await?;
        let file = File::open(&path)
            .await
            .map_err(|err| not_found_or(err, identifier))?;
        Ok(GuardedStream::new(stream::try_unfold(file, read_chunk)))
    }

    async fn get_metadata(
        &self,
        identifier: &ResourceIdentifier,
    ) -> AccessResult<RepresentationMetadata> {
        let _reading = self.commit_lock.read().await;
        if identifier.is_container() {
            let dir = self.container_dir(identifier).await?;
            let mut metadata = self.container_metadata(identifier, &dir).await?;
            for (name, is_dir) in self.list_entries(&dir).await? {
                let child = child_identifier(identifier, &name, is_dir)?;
                metadata.add(vocab::CONTAINS, child.path());
            }
            return Ok(metadata);
        }
        let (path, stat) = self.document_file(identifier).await?;
        self.document_metadata(identifier, &path, &stat).await
    }

    fn get_children<'a>(&'a self, identifier: &'a ResourceIdentifier) -> ChildStream<'a> {
        deferred_children(self.read_children(identifier))
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
        let target = self.resolve(identifier)?;
        if stat(&target).await?.is_some_and(|meta| meta.is_dir()) {
            return Err(AccessError::conflict(identifier, "a container exists with this name"));
        }
        self.check_ancestors(identifier, &target).await?;

        let (body, size) = self.stage_stream(data).await.map_err(|err| {
            tracing::warn!(identifier = %identifier, error = %err, "document write aborted");
            err
        })?;

        let mut metadata = metadata.rebind(identifier.clone());
        metadata.remove(vocab::CONTAINS);
        metadata.add(vocab::RESOURCE_TYPE, vocab::LDP_RESOURCE);
        metadata.set_content_length(size);
        metadata.set(vocab::MODIFIED, chrono::Utc::now().to_rfc3339());
        let staged_metadata = self.stage_json(&metadata).await?;

        let _committing = self.commit_lock.write().await;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let sidecar = meta_path(&target);
        self.commit(identifier, vec![(body, target), (staged_metadata, sidecar)])
            .await?;
        tracing::debug!(identifier = %identifier, bytes = size, "document stored");
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
        let dir = self.resolve(identifier)?;
        if stat(&dir).await?.is_some_and(|meta| meta.is_file()) {
            return Err(AccessError::conflict(identifier, "a document exists with this name"));
        }
        self.check_ancestors(identifier, &dir).await?;

        let mut metadata = metadata.rebind(identifier.clone());
        metadata.remove(vocab::CONTAINS);
        metadata.add(vocab::RESOURCE_TYPE, vocab::LDP_CONTAINER);
        let staged = self.stage_json(&metadata).await?;

        let _committing = self.commit_lock.write().await;
        tokio::fs::create_dir_all(&dir).await?;
        self.commit(identifier, vec![(staged, dir.join(META_SUFFIX))])
            .await?;
        tracing::debug!(identifier = %identifier, "container stored");
        Ok(())
    }

    async fn delete_resource(&self, identifier: &ResourceIdentifier) -> AccessResult<()> {
        let _committing = self.commit_lock.write().await;
        if identifier.is_container() {
            let dir = self.container_dir(identifier).await?;
            if dir == self.root {
                return Err(AccessError::conflict(identifier, "cannot delete the root container"));
            }
            if !self.list_entries(&dir).await?.is_empty() {
                return Err(AccessError::conflict(identifier, "container is not empty"));
            }
            remove_if_exists(&dir.join(META_SUFFIX)).await?;
            tokio::fs::remove_dir(&dir).await?;
        } else {
            let (path, _) = self.document_file(identifier).await?;
            tokio::fs::remove_file(&path).await?;
            remove_if_exists(&meta_path(&path)).await?;
        }
        tracing::debug!(identifier = %identifier, "resource deleted");
        Ok(())
    }
}

impl AtomicDataAccessor for FileDataAccessor {}

impl std::fmt::Debug for FileDataAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDataAccessor")
            .field("root", &self.root)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Roll back interrupted commits and remove stray staging files and backups.
fn recover(root: &Path) -> AccessResult<()> {
    let mut journals = Vec::new();
    let mut leftovers = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.starts_with(JOURNAL_PREFIX) {
            journals.push(entry.path());
        } else if name.starts_with(STAGING_PREFIX) || name.starts_with(BACKUP_PREFIX) {
            leftovers.push(entry.path());
        }
    }

    for path in journals {
        tracing::warn!(journal = %path.display(), "rolling back interrupted commit");
        let journal: Journal = serde_json::from_slice(&std::fs::read(&path)?)?;
        journal.roll_back(root)?;
        std::fs::remove_file(&path)?;
    }
    for path in leftovers {
        match std::fs::remove_file(&path) {
            Ok(()) => tracing::debug!(path = %path.display(), "removed stray file"),
            // Already consumed by a rollback.
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

/// Rename a staged file over `target`.
async fn publish(staged: TempPath, target: &Path) -> AccessResult<()> {
    tokio::fs::rename(&staged, target).await?;
    // The staged name is gone; keep the guard from deleting anything.
    staged.keep().map_err(|err| AccessError::Io(err.error))?;
    Ok(())
}

/// The unique part of a staging file name, shared by the commit's backups
/// and journal.
fn commit_tag(staged: &TempPath) -> AccessResult<String> {
    staged
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_prefix(STAGING_PREFIX))
        .map(str::to_owned)
        .ok_or_else(|| AccessError::Internal("unexpected staging file name".into()))
}

async fn stat(path: &Path) -> AccessResult<Option<Metadata>> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(Some(meta)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn meta_path(document: &Path) -> PathBuf {
    let mut name = document.file_name().unwrap_or_default().to_os_string();
    name.push(META_SUFFIX);
    document.with_file_name(name)
}

fn child_identifier(
    parent: &ResourceIdentifier,
    name: &str,
    container: bool,
) -> AccessResult<ResourceIdentifier> {
    parent
        .child(name, container)
        .map_err(|err| AccessError::Internal(err.to_string()))
}

fn not_found_or(err: io::Error, identifier: &ResourceIdentifier) -> AccessError {
    if err.kind() == io::ErrorKind::NotFound {
        AccessError::NotFound(identifier.clone())
    } else {
        AccessError::Io(err)
    }
}

async fn read_metadata(
    path: &Path,
    identifier: &ResourceIdentifier,
) -> AccessResult<Option<RepresentationMetadata>> {
    match tokio::fs::read(path).await {
        Ok(raw) => {
            let stored: RepresentationMetadata = serde_json::from_slice(&raw)?;
            Ok(Some(stored.rebind(identifier.clone())))
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

async fn remove_if_exists(path: &Path) -> AccessResult<()> {
    match tokio::fs::remove_file(path).await {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
        _ => Ok(()),
    }
}

async fn read_chunk(mut file: File) -> io::Result<Option<(Bytes, File)>> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let read = file.read(&mut buf).await?;
    if read == 0 {
        return Ok(None);
    }
    buf.truncate(read);
    Ok(Some((Bytes::from(buf), file)))
}
