//! Error types for interface descriptions and generated bindings.

use crate::artefact::checksum::Checksum;
use bindkit_common::WrappedLibrary;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors raised while loading interface descriptions, generating binding
/// modules, or checking them against native binaries.
#[derive(Debug, Error)]
pub enum BindingError {
    /// A description, binding, or binary could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path of the file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A generated binding could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Path of the file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The interface description is not valid JSON for the schema.
    #[error("invalid interface description {origin}: {reason}")]
    Parse {
        /// Where the description came from.
        origin: String,
        /// Parser message.
        reason: String,
    },

    /// The description could not be put into canonical form for hashing.
    #[error("cannot canonicalise interface description {namespace}: {reason}")]
    Canonicalize {
        /// Namespace of the description.
        namespace: String,
        /// Serialiser message.
        reason: String,
    },

    /// Two declarations share a name.
    #[error("duplicate declaration \"{name}\" in interface description")]
    DuplicateName {
        /// The repeated name.
        name: String,
    },

    /// A referenced type cannot be represented in the host languages.
    #[error("unsupported type \"{ty}\" in {item}{}", library_suffix(.library.as_ref()))]
    UnsupportedType {
        /// Library whose description was being generated, when known.
        library: Option<WrappedLibrary>,
        /// Declaration that references the type (`Record.field`, `fn.arg`).
        item: String,
        /// The offending type.
        ty: String,
    },

    /// A native binary or generated binding was built from a different
    /// interface than the one expected.
    #[error(
        "interface mismatch for {library} in {subject}: expected digest {expected}, found {}",
        found_label(.actual.as_ref())
    )]
    AbiMismatch {
        /// Library being checked.
        library: WrappedLibrary,
        /// What was checked (binary path, archive, or binding file).
        subject: String,
        /// Digest the caller expected.
        expected: Checksum,
        /// Digest found, or `None` when no fingerprint was present.
        actual: Option<Checksum>,
    },
}

fn library_suffix(library: Option<&WrappedLibrary>) -> String {
    library.map_or_else(String::new, |lib| format!(" ({lib})"))
}

fn found_label(actual: Option<&Checksum>) -> String {
    actual.map_or_else(|| "no fingerprint".to_owned(), ToString::to_string)
}

impl BindingError {
    /// Attach the library name to an [`BindingError::UnsupportedType`].
    #[must_use]
    pub fn for_library(self, lib: WrappedLibrary) -> Self {
        match self {
            Self::UnsupportedType { item, ty, .. } => Self::UnsupportedType {
                library: Some(lib),
                item,
                ty,
            },
            other => other,
        }
    }
}
