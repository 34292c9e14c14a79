//! Top-level error type for the `bindkit` command.
//!
//! Every module owns its own error enum; [`PipelineError`] gathers them so
//! the command flow can propagate with `?`, and [`PipelineError::kind`]
//! folds them into the failure categories users act on.

use crate::artefact::checksum::IntegrityError;
use crate::artefact::error::ArtefactError;
use crate::artefact::extraction::ExtractionError;
use crate::artefact::fetch::FetchError;
use crate::artefact::packaging_error::PackagingError;
use crate::artefact::store::StoreError;
use crate::builder::BuildError;
use crate::consumer::ResolveError;
use crate::credentials::CredentialsError;
use crate::graph::GraphError;
use crate::interface::BindingError;
use crate::publish::PublishError;
use crate::render::RenderError;
use bindkit_common::CommonError;
use camino::Utf8PathBuf;
use std::fmt;
use thiserror::Error;

/// Failure categories shared by every stage of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Declarations are missing, contradictory, or malformed.
    Configuration,
    /// A declared target has no binary.
    IncompleteMatrix,
    /// Bytes do not match their pinned checksum.
    ChecksumMismatch,
    /// A binary and its binding were generated from different interfaces.
    AbiMismatch,
    /// The interface references a type the host languages cannot express.
    UnsupportedType,
    /// Anything else: I/O, network, compiler, or registry failures.
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Configuration => "configuration",
            Self::IncompleteMatrix => "incomplete matrix",
            Self::ChecksumMismatch => "checksum mismatch",
            Self::AbiMismatch => "ABI mismatch",
            Self::UnsupportedType => "unsupported type",
            Self::Other => "other",
        })
    }
}

/// Errors surfaced by `bindkit` commands.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration could not be loaded or names something unknown.
    #[error(transparent)]
    Config(#[from] CommonError),

    /// A native build failed.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// Binding generation or ABI verification failed.
    #[error(transparent)]
    Binding(#[from] BindingError),

    /// An archive could not be packaged.
    #[error(transparent)]
    Packaging(#[from] PackagingError),

    /// An archive could not be stored.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A file failed verification.
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// An archive could not be read.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// A download failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A consumer manifest could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// A consumer manifest could not be rendered or written.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Publishing credentials are missing.
    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    /// The registry refused an upload.
    #[error(transparent)]
    Publish(#[from] PublishError),

    /// The build plan is malformed.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A value in the configuration is malformed.
    #[error(transparent)]
    Artefact(#[from] ArtefactError),

    /// The command needs an interface description that was not declared.
    #[error(
        "no interface description declared for {library}; set `interface` under [library.{library}] in bindkit.toml"
    )]
    MissingInterface {
        /// Library without a description.
        library: String,
    },

    /// The command needs a release tag that was not declared.
    #[error(
        "no release tag declared for {library}; set `tag` under [library.{library}] in bindkit.toml"
    )]
    MissingTag {
        /// Library without a tag.
        library: String,
    },

    /// Publishing found no stored archive for a library.
    #[error("{library} has no stored archive for {tag}; run `bindkit package` first")]
    NotPackaged {
        /// Library without an archive.
        library: String,
        /// Release tag looked up.
        tag: String,
    },

    /// A filesystem operation outside any module failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path involved.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// Classify the error into one of the shared failure categories.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_)
            | Self::Artefact(_)
            | Self::MissingInterface { .. }
            | Self::MissingTag { .. }
            | Self::NotPackaged { .. }
            | Self::Credentials(_)
            | Self::Publish(PublishError::NoRegistry)
            | Self::Graph(_) => ErrorKind::Configuration,
            Self::Binding(err) => binding_kind(err),
            Self::Packaging(err) => packaging_kind(err),
            Self::Resolve(err) => resolve_kind(err),
            Self::Integrity(IntegrityError::Mismatch { .. })
            | Self::Store(StoreError::Integrity(IntegrityError::Mismatch { .. })) => {
                ErrorKind::ChecksumMismatch
            }
            _ => ErrorKind::Other,
        }
    }
}

fn binding_kind(err: &BindingError) -> ErrorKind {
    match err {
        BindingError::AbiMismatch { .. } => ErrorKind::AbiMismatch,
        BindingError::UnsupportedType { .. } => ErrorKind::UnsupportedType,
        BindingError::Parse { .. }
        | BindingError::Canonicalize { .. }
        | BindingError::DuplicateName { .. } => ErrorKind::Configuration,
        BindingError::Read { .. } | BindingError::Write { .. } => ErrorKind::Other,
    }
}

fn packaging_kind(err: &PackagingError) -> ErrorKind {
    match err {
        PackagingError::IncompleteMatrix { .. } => ErrorKind::IncompleteMatrix,
        PackagingError::UndeclaredTarget { .. }
        | PackagingError::DuplicateTarget { .. }
        | PackagingError::ForeignBinary { .. }
        | PackagingError::EmptyMatrix { .. } => ErrorKind::Configuration,
        PackagingError::Binding(inner) => binding_kind(inner),
        PackagingError::Integrity(IntegrityError::Mismatch { .. }) => ErrorKind::ChecksumMismatch,
        _ => ErrorKind::Other,
    }
}

fn resolve_kind(err: &ResolveError) -> ErrorKind {
    match err {
        ResolveError::Configuration { .. } => ErrorKind::Configuration,
        ResolveError::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
        ResolveError::Binding(inner) => binding_kind(inner),
        ResolveError::Fetch { .. } | ResolveError::Archive { .. } | ResolveError::Io { .. } => {
            ErrorKind::Other
        }
    }
}

/// Result alias for command flows.
pub type Result<T> = std::result::Result<T, PipelineError>;
