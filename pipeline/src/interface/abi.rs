//! Interface fingerprints embedded in native binaries.
//!
//! A wrapper crate embeds `BINDKIT_INTERFACE_DIGEST=<64 hex>` as a static
//! byte string when it is compiled. The packager and the local override
//! path scan binaries for that marker to prove a binary and a generated
//! binding came from the same interface description.

use super::error::BindingError;
use crate::artefact::checksum::Checksum;
use bindkit_common::WrappedLibrary;
use camino::Utf8Path;
use log::debug;

/// Prefix preceding the hex digest inside a binary.
pub const FINGERPRINT_MARKER: &[u8] = b"BINDKIT_INTERFACE_DIGEST=";

const DIGEST_LEN: usize = 64;

/// Bytes a wrapper crate embeds to advertise `digest`.
///
/// # Examples
///
/// ```
/// use bindkit_pipeline::artefact::checksum::Checksum;
/// use bindkit_pipeline::interface::abi;
///
/// let digest = Checksum::of_bytes(b"interface");
/// let mut binary = b"\x7fELF....".to_vec();
/// binary.extend(abi::fingerprint(&digest));
/// assert_eq!(abi::embedded_digest(&binary), Some(digest));
/// ```
#[must_use]
pub fn fingerprint(digest: &Checksum) -> Vec<u8> {
    let mut bytes = FINGERPRINT_MARKER.to_vec();
    bytes.extend_from_slice(digest.as_str().as_bytes());
    bytes
}

/// Find the first well-formed fingerprint in `bytes`.
///
/// Occurrences of the marker not followed by 64 lowercase hex characters
/// are skipped.
#[must_use]
pub fn embedded_digest(bytes: &[u8]) -> Option<Checksum> {
    let mut offset = 0;
    while let Some(found) = find(&bytes[offset..], FINGERPRINT_MARKER) {
        let start = offset + found + FINGERPRINT_MARKER.len();
        let candidate = bytes
            .get(start..start + DIGEST_LEN)
            .and_then(|hex| std::str::from_utf8(hex).ok())
            .and_then(|hex| Checksum::try_from(hex).ok());
        if candidate.is_some() {
            return candidate;
        }
        offset = start;
    }
    None
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Check that the binary at `path` carries the fingerprint `expected`.
///
/// # Errors
///
/// Returns [`BindingError::Read`] when the file cannot be read and
/// [`BindingError::AbiMismatch`] when the fingerprint is missing or differs.
pub fn verify_binary(
    path: &Utf8Path,
    library: WrappedLibrary,
    expected: &Checksum,
) -> Result<(), BindingError> {
    let bytes = std::fs::read(path).map_err(|source| BindingError::Read {
        path: path.to_owned(),
        source,
    })?;
    let actual = embedded_digest(&bytes);
    if actual.as_ref() == Some(expected) {
        debug!("{path}: interface fingerprint matches {expected}");
        return Ok(());
    }
    Err(BindingError::AbiMismatch {
        library,
        subject: path.to_string(),
        expected: expected.clone(),
        actual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use rstest::rstest;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, bytes: &[u8]) -> Utf8PathBuf {
        let path = Utf8PathBuf::from_path_buf(dir.path().join(name)).expect("utf8 path");
        std::fs::write(&path, bytes).expect("write binary");
        path
    }

    #[test]
    fn skips_truncated_marker() {
        let digest = Checksum::of_bytes(b"v1");
        let mut bytes = FINGERPRINT_MARKER.to_vec();
        bytes.extend_from_slice(b"nothex");
        bytes.extend(fingerprint(&digest));
        assert_eq!(embedded_digest(&bytes), Some(digest));
    }

    #[rstest]
    #[case::matching(b"v1".as_slice(), true)]
    #[case::different(b"v2".as_slice(), false)]
    fn verifies_fingerprint(#[case] embedded: &[u8], #[case] ok: bool) {
        let dir = TempDir::new().expect("tempdir");
        let mut bytes = vec![0u8; 32];
        bytes.extend(fingerprint(&Checksum::of_bytes(embedded)));
        let path = write(&dir, "libaskar_uniffi.a", &bytes);
        let result = verify_binary(&path, WrappedLibrary::Askar, &Checksum::of_bytes(b"v1"));
        assert_eq!(result.is_ok(), ok);
    }

    #[test]
    fn missing_fingerprint_is_a_mismatch() {
        let dir = TempDir::new().expect("tempdir");
        let path = write(&dir, "libaskar_uniffi.a", b"no marker here");
        let err = verify_binary(&path, WrappedLibrary::Askar, &Checksum::of_bytes(b"v1"))
            .expect_err("mismatch");
        assert!(matches!(
            err,
            BindingError::AbiMismatch { actual: None, .. }
        ));
    }
}
