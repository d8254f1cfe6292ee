use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::chain::ValidatorChain;
use crate::error::GateError;
use crate::validators::{ContentTypeValidator, MaxSizeValidator, TransformValidator};

/// Configuration for the write-time validator chain.
///
/// Loaded from TOML; every field is optional:
///
/// ```toml
/// max_document_bytes = 1048576
/// allowed_content_types = ["text/*", "application/json"]
/// uppercase = false
/// permissive = false
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    /// Largest accepted document body. `None` means no limit.
    pub max_document_bytes: Option<u64>,
    /// Allowed media types (`type/subtype` or `type/*`). Empty admits all.
    pub allowed_content_types: Vec<String>,
    /// Upper-case document bodies before storing them.
    pub uppercase: bool,
    /// When `true`, no validator runs and every write is accepted.
    pub permissive: bool,
}

impl GateConfig {
    /// A configuration that accepts every write unchanged.
    pub fn permissive() -> Self {
        Self {
            permissive: true,
            ..Default::default()
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, GateError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GateError> {
        let source = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.as_ref().display(), "gate configuration loaded");
        Ok(config)
    }

    /// Check semantic constraints TOML parsing cannot express.
    pub fn validate(&self) -> Result<(), GateError> {
        for entry in &self.allowed_content_types {
            let Some((top, sub)) = entry.split_once('/') else {
                return Err(GateError::Config(format!(
                    "content type {entry:?} must have the form type/subtype"
                )));
            };
            if top.trim().is_empty() || sub.trim().is_empty() || top == "*" {
                return Err(GateError::Config(format!(
                    "content type {entry:?} must have the form type/subtype or type/*"
                )));
            }
        }
        Ok(())
    }

    /// Build the validator chain this configuration describes.
    ///
    /// Order: content type, size, transform. The metadata-only check runs
    /// first and the size limit applies to the body as submitted.
    pub fn build_chain(&self) -> ValidatorChain {
        if self.permissive {
            return ValidatorChain::permissive();
        }
        let mut chain = ValidatorChain::new();
        if !self.allowed_content_types.is_empty() {
            chain.add(Box::new(ContentTypeValidator::new(
                self.allowed_content_types.iter().cloned(),
            )));
        }
        if let Some(max_bytes) = self.max_document_bytes {
            chain.add(Box::new(MaxSizeValidator::new(max_bytes)));
        }
        if self.uppercase {
            chain.add(Box::new(TransformValidator::uppercase()));
        }
        chain
    }
}
