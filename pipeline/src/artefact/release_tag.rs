//! Release tag newtype.
//!
//! A release tag versions published archives independently of the consumer
//! package version. Tags take the form `MAJOR.MINOR.PATCH` with an optional
//! `-suffix` of ASCII alphanumerics, dots, and dashes (`0.2.3-binary`).

use super::error::{ArtefactError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A validated release tag.
///
/// # Examples
///
/// ```
/// use bindkit_pipeline::artefact::release_tag::ReleaseTag;
///
/// let tag = ReleaseTag::try_from("0.2.3-binary").expect("valid tag");
/// assert_eq!(tag.core(), (0, 2, 3));
/// assert_eq!(tag.suffix(), Some("binary"));
/// assert!(ReleaseTag::try_from("v1").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReleaseTag {
    raw: String,
    core: (u64, u64, u64),
}

impl ReleaseTag {
    /// Return the tag as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Return the numeric `(major, minor, patch)` triple.
    #[must_use]
    pub const fn core(&self) -> (u64, u64, u64) {
        self.core
    }

    /// Return the suffix after the first dash, if any.
    #[must_use]
    pub fn suffix(&self) -> Option<&str> {
        self.raw.split_once('-').map(|(_, suffix)| suffix)
    }
}

impl TryFrom<&str> for ReleaseTag {
    type Error = ArtefactError;

    fn try_from(value: &str) -> Result<Self> {
        let invalid = |reason: &str| ArtefactError::InvalidReleaseTag {
            value: value.to_owned(),
            reason: reason.to_owned(),
        };
        let (core, suffix) = match value.split_once('-') {
            Some((core, suffix)) => (core, Some(suffix)),
            None => (value, None),
        };
        let parts = core
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                    return Err(invalid("expected MAJOR.MINOR.PATCH"));
                }
                part.parse::<u64>()
                    .map_err(|_| invalid("version component out of range"))
            })
            .collect::<Result<Vec<_>>>()?;
        let [major, minor, patch] = parts.as_slice() else {
            return Err(invalid("expected MAJOR.MINOR.PATCH"));
        };
        if let Some(suffix) = suffix {
            if suffix.is_empty()
                || !suffix
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
            {
                return Err(invalid("suffix must be ASCII alphanumerics, dots, or dashes"));
            }
        }
        Ok(Self {
            raw: value.to_owned(),
            core: (*major, *minor, *patch),
        })
    }
}

impl TryFrom<String> for ReleaseTag {
    type Error = ArtefactError;

    fn try_from(value: String) -> Result<Self> {
        Self::try_from(value.as_str())
    }
}

impl From<ReleaseTag> for String {
    fn from(value: ReleaseTag) -> Self {
        value.raw
    }
}

impl fmt::Display for ReleaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
