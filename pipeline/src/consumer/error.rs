//! Error types for consumer manifests and artefact resolution.

use crate::artefact::checksum::{Checksum, IntegrityError};
use crate::artefact::extraction::ExtractionError;
use crate::artefact::fetch::FetchError;
use crate::interface::BindingError;
use bindkit_common::WrappedLibrary;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors raised while building a consumer manifest or resolving its
/// artefacts.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The manifest or the override switch is inconsistent.
    #[error("configuration error{}: {reason}", library_prefix(.library.as_ref()))]
    Configuration {
        /// Library the problem concerns, when it concerns one.
        library: Option<WrappedLibrary>,
        /// What is wrong and how to fix it.
        reason: String,
    },

    /// An artefact's content does not match its pinned checksum.
    #[error("checksum mismatch for {library} ({subject}): expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Library whose artefact failed verification.
        library: WrappedLibrary,
        /// URL or path of the artefact.
        subject: String,
        /// Pinned checksum.
        expected: Checksum,
        /// Checksum of the bytes received.
        actual: Checksum,
    },

    /// A local archive or binding does not match the interface it is
    /// paired with, or a binding could not be read.
    #[error(transparent)]
    Binding(#[from] BindingError),

    /// Downloading a remote artefact failed.
    #[error("failed to fetch {library}: {source}")]
    Fetch {
        /// Library being fetched.
        library: WrappedLibrary,
        /// Underlying fetch error.
        #[source]
        source: FetchError,
    },

    /// A local archive could not be inspected.
    #[error("failed to read archive for {library}: {source}")]
    Archive {
        /// Library whose archive was read.
        library: WrappedLibrary,
        /// Underlying extraction error.
        #[source]
        source: ExtractionError,
    },

    /// A cache or archive file could not be accessed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path involved.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

fn library_prefix(library: Option<&WrappedLibrary>) -> String {
    library.map_or_else(String::new, |lib| format!(" for {lib}"))
}

impl ResolveError {
    pub(crate) fn configuration(library: WrappedLibrary, reason: impl Into<String>) -> Self {
        Self::Configuration {
            library: Some(library),
            reason: reason.into(),
        }
    }

    /// Convert a failed verification of an artefact belonging to `library`.
    pub(crate) fn from_integrity(library: WrappedLibrary, err: IntegrityError) -> Self {
        match err {
            IntegrityError::Mismatch {
                subject,
                expected,
                actual,
            } => Self::ChecksumMismatch {
                library,
                subject,
                expected,
                actual,
            },
            IntegrityError::Io { path, source } => Self::Io { path, source },
        }
    }
}
