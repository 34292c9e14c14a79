//! Manifest schema embedded in every packaged archive.
//!
//! Each archive ships an `artifact-manifest.json` recording which library
//! and release it belongs to, the interface it was built against, and one
//! entry per target tuple with the path and checksum of that binary.
//!
//! ```json
//! {
//!   "schema_version": 1,
//!   "library": "askar",
//!   "release_tag": "0.2.2-binary",
//!   "format": "xcframework.zip",
//!   "generated_at": "2026-02-03T00:00:00Z",
//!   "interface": { "version": "0.2.2", "digest": "..." },
//!   "entries": [
//!     { "target": "macos-arm64", "path": "askar_uniffiFFI.xcframework/macos-arm64/libaskar_uniffi.a", "sha256": "..." }
//!   ]
//! }
//! ```

use super::checksum::Checksum;
use super::naming::ArchiveFormat;
use super::release_tag::ReleaseTag;
use super::schema_version::SchemaVersion;
use crate::interface::InterfaceStamp;
use bindkit_common::{TargetTuple, WrappedLibrary};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// File name of the manifest inside an archive.
pub const MANIFEST_FILE_NAME: &str = "artifact-manifest.json";

/// An ISO 8601 UTC timestamp recording when an archive was built.
///
/// The value is stored as an opaque string. It is part of the archived
/// bytes, so it must be derived from the inputs rather than the wall clock
/// (see [`GeneratedAt::from_unix_seconds`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneratedAt(String);

impl GeneratedAt {
    /// Create a new timestamp wrapper.
    ///
    /// # Examples
    ///
    /// ```
    /// use bindkit_pipeline::artefact::manifest::GeneratedAt;
    ///
    /// let ts = GeneratedAt::new("2026-02-03T00:00:00Z");
    /// assert_eq!(ts.as_str(), "2026-02-03T00:00:00Z");
    /// ```
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Format seconds since the Unix epoch as `YYYY-MM-DDTHH:MM:SSZ`.
    ///
    /// Values beyond chrono's representable range clamp to the epoch.
    ///
    /// # Examples
    ///
    /// ```
    /// use bindkit_pipeline::artefact::manifest::GeneratedAt;
    ///
    /// assert_eq!(GeneratedAt::from_unix_seconds(0).as_str(), "1970-01-01T00:00:00Z");
    /// ```
    #[must_use]
    pub fn from_unix_seconds(secs: u64) -> Self {
        let instant = i64::try_from(secs)
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        Self(instant.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    /// Return the timestamp as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GeneratedAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One native binary inside an archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Target the binary was compiled for.
    pub target: TargetTuple,
    /// Path of the binary inside the archive.
    pub path: String,
    /// Checksum of the binary.
    pub sha256: Checksum,
}

/// The manifest shipped inside each packaged archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    /// Manifest schema version.
    pub schema_version: SchemaVersion,
    /// Library the archive belongs to.
    pub library: WrappedLibrary,
    /// Release the archive is published under.
    pub release_tag: ReleaseTag,
    /// Container format.
    pub format: ArchiveFormat,
    /// Build timestamp.
    pub generated_at: GeneratedAt,
    /// Interface the binaries were built against.
    pub interface: InterfaceStamp,
    /// One entry per target tuple, in matrix order.
    pub entries: Vec<ManifestEntry>,
}

impl ArtifactManifest {
    /// Return the entry for `target`, if present.
    #[must_use]
    pub fn entry(&self, target: TargetTuple) -> Option<&ManifestEntry> {
        self.entries.iter().find(|entry| entry.target == target)
    }

    /// Return the covered target tuples in manifest order.
    #[must_use]
    pub fn targets(&self) -> Vec<TargetTuple> {
        self.entries.iter().map(|entry| entry.target).collect()
    }

    /// Serialise to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a manifest, validating every field.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed, a newtype rejects its
    /// value, or the schema version is newer than this build understands.
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
