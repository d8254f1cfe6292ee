//! Write-time validation for Lode.
//!
//! Every document written through a [`ValidatingDataAccessor`] first passes
//! through a [`DataValidator`]. Validators may reject a body, pass it
//! through, or replace it with transformed content. A [`ValidatorChain`]
//! composes several validators, and [`GateConfig`] builds a chain from a TOML
//! file.
//!
//! # Quick Start
//!
//! ```rust
//! use lode_gate::{GateConfig, ValidatingDataAccessor};
//! use lode_store::{DataAccessor, InMemoryDataAccessor};
//! use lode_stream::GuardedStream;
//! use lode_types::{RepresentationMetadata, ResourceIdentifier};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let config = GateConfig::from_toml_str("max_document_bytes = 10\nuppercase = true").unwrap();
//! let accessor = ValidatingDataAccessor::new(InMemoryDataAccessor::new(), config.build_chain());
//!
//! let id = ResourceIdentifier::new("/doc.txt");
//! accessor
//!     .write_document(&id, GuardedStream::from("hello"), RepresentationMetadata::new(id.clone()))
//!     .await
//!     .unwrap();
//! let body = accessor.get_data(&id).await.unwrap().read_to_string().await.unwrap();
//! assert_eq!(body, "HELLO");
//! # });
//! ```

pub mod accessor;
pub mod chain;
pub mod config;
pub mod error;
pub mod validator;
pub mod validators;

pub use accessor::ValidatingDataAccessor;
pub use chain::ValidatorChain;
pub use config::GateConfig;
pub use error::GateError;
pub use validator::{DataValidator, ValidationRequest};
pub use validators::{ContentTypeValidator, MaxSizeValidator, NoopValidator, TransformValidator};
