//! Schema version newtype for artifact manifest versioning.
//!
//! Restricts the version to the range `1..=CURRENT_MAX`.

use super::error::{ArtefactError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The highest schema version this build can read.
const CURRENT_MAX: u32 = 1;

/// A validated artifact manifest schema version.
///
/// Additive manifest changes increment the version while keeping backward
/// compatibility; a reader rejects versions newer than it understands.
///
/// # Examples
///
/// ```
/// use bindkit_pipeline::artefact::schema_version::SchemaVersion;
///
/// let v = SchemaVersion::current();
/// assert_eq!(u32::from(v), 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct SchemaVersion(u32);

impl SchemaVersion {
    /// Return the current (latest) schema version.
    #[must_use]
    pub const fn current() -> Self {
        Self(CURRENT_MAX)
    }
}

impl TryFrom<u32> for SchemaVersion {
    type Error = ArtefactError;

    fn try_from(value: u32) -> Result<Self> {
        if value == 0 || value > CURRENT_MAX {
            return Err(ArtefactError::UnsupportedSchemaVersion {
                value,
                max: CURRENT_MAX,
            });
        }
        Ok(Self(value))
    }
}

impl From<SchemaVersion> for u32 {
    fn from(v: SchemaVersion) -> Self {
        v.0
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::zero(0)]
    #[case::future(2)]
    fn rejects_out_of_range(#[case] value: u32) {
        assert!(matches!(
            SchemaVersion::try_from(value),
            Err(ArtefactError::UnsupportedSchemaVersion { max: 1, .. })
        ));
    }

    #[test]
    fn deserialising_a_future_version_fails() {
        let parsed: std::result::Result<SchemaVersion, _> = serde_json::from_str("7");
        assert!(parsed.is_err());
    }

    #[test]
    fn current_serialises_as_number() {
        let json = serde_json::to_string(&SchemaVersion::current()).expect("serialise");
        assert_eq!(json, "1");
    }
}
