use std::fmt;

/// Errors raised while loading or building gate configuration.
///
/// Write-time rejections are not `GateError`s: validators report them as
/// [`AccessError::Validation`](lode_store::AccessError::Validation) so they
/// travel through accessor chains unchanged.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// Configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for [`GateConfig`](crate::GateConfig).
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

impl PartialEq for GateError {
    fn eq(&self, other: &Self) -> bool {
        // Compare by display representation for test convenience.
        fmt::format(format_args!("{self}")) == fmt::format(format_args!("{other}"))
    }
}

impl Eq for GateError {}
