//! Resource model for Lode.
//!
//! Pure data shared by every accessor, validator and backend. Nothing here
//! performs I/O.
//!
//! # Key Types
//!
//! - [`ResourceIdentifier`] -- immutable, value-compared locator of one resource
//! - [`RepresentationMetadata`] -- predicate/values multimap describing a resource
//! - [`Representation`] -- metadata plus an optional [`GuardedStream`] body

pub mod error;
pub mod identifier;
pub mod metadata;
pub mod representation;

pub use error::TypeError;
pub use identifier::ResourceIdentifier;
pub use lode_stream::GuardedStream;
pub use metadata::{vocab, RepresentationMetadata};
pub use representation::Representation;
