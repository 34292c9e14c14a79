//! SHA-256 checksum newtype and file hashing.
//!
//! Validates that the value is a 64-character lowercase hexadecimal string
//! representing a 256-bit hash digest. Checksums identify packaged archives,
//! the binaries inside them, and interface descriptions.

use super::error::{ArtefactError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::Read;
use thiserror::Error;

/// Expected length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// A validated hex-encoded SHA-256 checksum.
///
/// # Examples
///
/// ```
/// use bindkit_pipeline::artefact::checksum::Checksum;
///
/// let checksum = Checksum::of_bytes(b"hello");
/// assert_eq!(checksum.as_str().len(), 64);
/// assert!(Checksum::try_from("ABC").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Checksum(String);

impl Checksum {
    /// Hash an in-memory buffer.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(bytes)))
    }

    /// Hash a file, reading it in chunks.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrityError::Io`] if the file cannot be read.
    pub fn of_file(path: &Utf8Path) -> std::result::Result<Self, IntegrityError> {
        let io_err = |source| IntegrityError::Io {
            path: path.to_owned(),
            source,
        };
        let mut file = fs::File::open(path).map_err(io_err)?;
        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 8192];
        loop {
            let bytes_read = file.read(&mut buffer).map_err(io_err)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }
        Ok(Self(format!("{:x}", hasher.finalize())))
    }

    /// Hash `path` and compare against `self`.
    ///
    /// `subject` names what is being checked in the error message, typically
    /// the library and file name.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrityError::Mismatch`] when the digests differ, or
    /// [`IntegrityError::Io`] when the file cannot be read.
    pub fn verify_file(
        &self,
        path: &Utf8Path,
        subject: &str,
    ) -> std::result::Result<(), IntegrityError> {
        let actual = Self::of_file(path)?;
        if &actual == self {
            return Ok(());
        }
        Err(IntegrityError::Mismatch {
            subject: subject.to_owned(),
            expected: self.clone(),
            actual,
        })
    }

    /// Return the checksum as a hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Checksum {
    type Error = ArtefactError;

    fn try_from(value: &str) -> Result<Self> {
        validate_sha256(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for Checksum {
    type Error = ArtefactError;

    fn try_from(value: String) -> Result<Self> {
        validate_sha256(&value)?;
        Ok(Self(value))
    }
}

impl From<Checksum> for String {
    fn from(value: Checksum) -> Self {
        value.0
    }
}

impl AsRef<str> for Checksum {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors raised while hashing or verifying a file.
#[derive(Debug, Error)]
pub enum IntegrityError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path of the file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The computed digest differs from the declared one.
    #[error("checksum mismatch for {subject}: expected {expected}, got {actual}")]
    Mismatch {
        /// What was verified.
        subject: String,
        /// The declared checksum.
        expected: Checksum,
        /// The computed checksum.
        actual: Checksum,
    },
}

/// Validate that `value` is a well-formed hex-encoded SHA-256 digest.
fn validate_sha256(value: &str) -> Result<()> {
    if value.len() != DIGEST_HEX_LEN {
        return Err(ArtefactError::InvalidChecksum {
            reason: format!(
                "expected {DIGEST_HEX_LEN} hex characters, got {}",
                value.len()
            ),
        });
    }
    if let Some(bad) = value.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(ArtefactError::InvalidChecksum {
            reason: format!("non-hex character '{bad}'"),
        });
    }
    if value.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(ArtefactError::InvalidChecksum {
            reason: "checksum must be lowercase".to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::too_short("abcdef")]
    #[case::too_long(&"a".repeat(65))]
    #[case::non_hex(&format!("{}g", "a".repeat(63)))]
    #[case::uppercase(&"A".repeat(64))]
    fn rejects_malformed_checksums(#[case] value: &str) {
        assert!(Checksum::try_from(value).is_err(), "{value} should fail");
    }

    #[test]
    fn accepts_published_release_checksum() {
        let value = "5b40cc2f5aea9605172100aa6f1909d23a9c6341ccd6b1ecad897313e405e749";
        let checksum = Checksum::try_from(value).expect("valid");
        assert_eq!(checksum.to_string(), value);
    }

    #[test]
    fn of_bytes_matches_known_digest() {
        assert_eq!(
            Checksum::of_bytes(b"").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn of_file_matches_of_bytes() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::try_from(dir.path().join("blob")).expect("utf8");
        fs::write(&path, b"native library").expect("write");

        assert_eq!(
            Checksum::of_file(&path).expect("hash"),
            Checksum::of_bytes(b"native library")
        );
    }

    #[test]
    fn verify_file_reports_mismatch() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::try_from(dir.path().join("blob")).expect("utf8");
        fs::write(&path, b"tampered").expect("write");

        let err = Checksum::of_bytes(b"original")
            .verify_file(&path, "askar archive")
            .expect_err("mismatch");
        assert!(matches!(err, IntegrityError::Mismatch { .. }));
        assert!(err.to_string().contains("askar archive"));
    }

    #[test]
    fn deserialisation_validates() {
        let bad: std::result::Result<Checksum, _> = serde_json::from_str("\"xyz\"");
        assert!(bad.is_err());
    }
}
