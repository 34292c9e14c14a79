//! Error types for artefact packaging operations.
//!
//! Covers matrix validation failures, I/O and archive-writer failures, and
//! serialisation problems that can occur while bundling native binaries.

use super::checksum::IntegrityError;
use crate::interface::BindingError;
use bindkit_common::{TargetTuple, WrappedLibrary};
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors arising from artefact packaging operations.
#[derive(Debug, Error)]
pub enum PackagingError {
    /// A declared target has no binary.
    #[error("incomplete matrix for {library}: no binary for {tuple}")]
    IncompleteMatrix {
        /// Library being packaged.
        library: WrappedLibrary,
        /// First missing target in matrix order.
        tuple: TargetTuple,
    },

    /// A binary was supplied for a target outside the declared matrix.
    #[error("binary for {library} targets {tuple}, which is not in the declared matrix")]
    UndeclaredTarget {
        /// Library being packaged.
        library: WrappedLibrary,
        /// The undeclared target.
        tuple: TargetTuple,
    },

    /// Two binaries were supplied for the same target.
    #[error("more than one binary for {library} on {tuple}")]
    DuplicateTarget {
        /// Library being packaged.
        library: WrappedLibrary,
        /// The repeated target.
        tuple: TargetTuple,
    },

    /// A binary belongs to a different library than the one being packaged.
    #[error("binary {path} belongs to {found}, not {library}")]
    ForeignBinary {
        /// Library being packaged.
        library: WrappedLibrary,
        /// Library the binary was built for.
        found: WrappedLibrary,
        /// Path of the binary.
        path: Utf8PathBuf,
    },

    /// The declared matrix is empty.
    #[error("no targets declared for {library}")]
    EmptyMatrix {
        /// Library being packaged.
        library: WrappedLibrary,
    },

    /// A binary does not carry the expected interface fingerprint.
    #[error(transparent)]
    Binding(#[from] BindingError),

    /// Hashing a binary or the finished archive failed.
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// An I/O operation failed (reading source files, writing the archive).
    #[error("I/O error during packaging: {0}")]
    Io(#[from] std::io::Error),

    /// The zip writer failed.
    #[error("zip error during packaging: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// JSON serialisation of the manifest failed.
    #[error("manifest serialisation error: {0}")]
    Serialization(#[from] serde_json::Error),
}
