//! Error types for artefact naming, manifest, and checksum values.
//!
//! Each variant provides a descriptive message identifying the invalid input
//! and the constraint that was violated.

use thiserror::Error;

/// Errors arising from invalid artefact-related values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArtefactError {
    /// A release tag is not of the form `MAJOR.MINOR.PATCH[-suffix]`.
    #[error("invalid release tag \"{value}\": {reason}")]
    InvalidReleaseTag {
        /// The rejected tag.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },

    /// A schema version is outside the accepted range.
    #[error("unsupported schema version {value}; current maximum is {max}")]
    UnsupportedSchemaVersion {
        /// The rejected version number.
        value: u32,
        /// The highest version this build understands.
        max: u32,
    },

    /// A checksum is not a valid 64-character lowercase hex string.
    #[error("invalid SHA-256 checksum: {reason}")]
    InvalidChecksum {
        /// Description of the validation failure.
        reason: String,
    },

    /// The archive format label is not recognised.
    #[error("unknown archive format \"{value}\"; expected xcframework.zip or tar.zst")]
    UnknownFormat {
        /// The rejected label.
        value: String,
    },
}

/// Result type alias using [`ArtefactError`].
pub type Result<T> = std::result::Result<T, ArtefactError>;
