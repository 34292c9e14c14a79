//! Error types for the shared domain model.
//!
//! Every variant names the rejected input so that the failing value can be
//! located in `bindkit.toml` or on the command line.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors raised while parsing catalogue names, target tuples, and
/// configuration files.
#[derive(Debug, Error)]
pub enum CommonError {
    /// The library name is not one of the wrapped libraries.
    #[error("unknown library \"{value}\"; expected one of: {expected}")]
    UnknownLibrary {
        /// The rejected name.
        value: String,
        /// Comma-separated list of accepted names.
        expected: String,
    },

    /// The platform label is not recognised.
    #[error("unknown platform \"{value}\"")]
    UnknownPlatform {
        /// The rejected label.
        value: String,
    },

    /// The architecture label is not recognised.
    #[error("unknown architecture \"{value}\"")]
    UnknownArchitecture {
        /// The rejected label.
        value: String,
    },

    /// The platform and architecture are individually valid but have no
    /// compilation target.
    #[error("no compilation target for {platform} on {architecture}")]
    UnsupportedTuple {
        /// Platform label.
        platform: String,
        /// Architecture label.
        architecture: String,
    },

    /// The host operating system label is not recognised.
    #[error("unknown host operating system \"{value}\"")]
    UnknownHost {
        /// The rejected label.
        value: String,
    },

    /// The build profile label is not recognised.
    #[error("unknown build profile \"{value}\"; expected debug or release")]
    UnknownProfile {
        /// The rejected label.
        value: String,
    },

    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    ConfigRead {
        /// Path of the configuration file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for the schema.
    #[error("invalid configuration in {path}: {reason}")]
    ConfigParse {
        /// Path of the configuration file.
        path: Utf8PathBuf,
        /// Parser message.
        reason: String,
    },
}

/// Result type alias using [`CommonError`].
pub type Result<T> = std::result::Result<T, CommonError>;
