//! Data accessors for Lode.
//!
//! A data accessor reads, writes and deletes resources in some backend,
//! exchanging bodies as [`GuardedStream`]s and descriptions as
//! [`RepresentationMetadata`]. Decorators (such as the validating accessor
//! in `lode-gate`) implement the same trait and wrap another accessor.
//!
//! # Backends
//!
//! Both backends implement [`DataAccessor`] and [`AtomicDataAccessor`]:
//!
//! - [`InMemoryDataAccessor`] -- `BTreeMap`-based store for tests and embedding
//! - [`FileDataAccessor`] -- one file per document under a root directory
//!
//! # Design Rules
//!
//! 1. A failing body stream never leaves a partial document behind.
//! 2. Content and metadata of a document become visible together.
//! 3. Child listings are lazy and restartable.
//! 4. Every failure maps to one [`AccessError`] variant; nothing is swallowed.
//!
//! [`GuardedStream`]: lode_stream::GuardedStream
//! [`RepresentationMetadata`]: lode_types::RepresentationMetadata

pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use error::{AccessError, AccessResult, ErrorKind};
pub use file::FileDataAccessor;
pub use memory::InMemoryDataAccessor;
pub use traits::{deferred_children, AtomicDataAccessor, ChildStream, DataAccessor};
