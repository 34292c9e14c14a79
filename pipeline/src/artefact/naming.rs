//! Archive naming policy for packaged native libraries.
//!
//! Archives are named `<library>_<bindingKind>FFI.<archiveFormat>`, for
//! example `anoncreds_uniffiFFI.xcframework.zip`. The same stem is the
//! binary-target name consumers link against, so the name alone identifies
//! which binding module an archive belongs to.

use super::error::{ArtefactError, Result};
use bindkit_common::WrappedLibrary;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Container format of a packaged archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArchiveFormat {
    /// Zip archive laid out as an Apple framework bundle.
    #[default]
    #[serde(rename = "xcframework.zip")]
    XcframeworkZip,
    /// Zstandard-compressed tarball with one directory per target.
    #[serde(rename = "tar.zst")]
    TarZst,
}

impl ArchiveFormat {
    /// Return the file extension, without a leading dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::XcframeworkZip => "xcframework.zip",
            Self::TarZst => "tar.zst",
        }
    }

    /// Infer the format from an archive file name.
    #[must_use]
    pub fn from_file_name(name: &str) -> Option<Self> {
        [Self::XcframeworkZip, Self::TarZst]
            .into_iter()
            .find(|format| name.ends_with(&format!(".{}", format.extension())))
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ArchiveFormat {
    type Err = ArtefactError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "xcframework.zip" => Ok(Self::XcframeworkZip),
            "tar.zst" => Ok(Self::TarZst),
            other => Err(ArtefactError::UnknownFormat {
                value: other.to_owned(),
            }),
        }
    }
}

/// A fully-qualified archive name.
///
/// # Examples
///
/// ```
/// use bindkit_common::WrappedLibrary;
/// use bindkit_pipeline::artefact::naming::{ArchiveFormat, ArtefactName};
///
/// let name = ArtefactName::new(WrappedLibrary::IndyVdr, ArchiveFormat::XcframeworkZip);
/// assert_eq!(name.to_string(), "indy_vdr_uniffiFFI.xcframework.zip");
/// assert_eq!(name.bundle_dir(), "indy_vdr_uniffiFFI.xcframework");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArtefactName {
    library: WrappedLibrary,
    format: ArchiveFormat,
}

impl ArtefactName {
    /// Create an archive name.
    #[must_use]
    pub const fn new(library: WrappedLibrary, format: ArchiveFormat) -> Self {
        Self { library, format }
    }

    /// Return the library component.
    #[must_use]
    pub const fn library(&self) -> WrappedLibrary {
        self.library
    }

    /// Return the format component.
    #[must_use]
    pub const fn format(&self) -> ArchiveFormat {
        self.format
    }

    /// Return the filename as a string without consuming the value.
    #[must_use]
    pub fn filename(&self) -> String {
        self.to_string()
    }

    /// Return the top-level directory used inside framework archives.
    #[must_use]
    pub fn bundle_dir(&self) -> String {
        format!("{}.xcframework", self.library.binary_target_name())
    }
}

impl fmt::Display for ArtefactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.library.binary_target_name(), self.format)
    }
}
