//! Reading and unpacking packaged archives.
//!
//! Both archive formats carry `artifact-manifest.json` at their root.
//! Unpacking validates every entry path before writing to guard against
//! path traversal (zip-slip), then checks each unpacked binary against the
//! checksum recorded in the manifest.

use super::checksum::IntegrityError;
use super::manifest::{ArtifactManifest, MANIFEST_FILE_NAME};
use super::naming::ArchiveFormat;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io::Read;
use std::path::{Component, Path};

/// Errors arising from archive inspection and extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// I/O error during extraction.
    #[error("extraction I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The zip reader failed.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// The archive has no manifest.
    #[error("{archive} contains no {MANIFEST_FILE_NAME}")]
    MissingManifest {
        /// Archive path.
        archive: Utf8PathBuf,
    },

    /// The manifest could not be parsed.
    #[error("invalid manifest in {archive}: {reason}")]
    InvalidManifest {
        /// Archive path.
        archive: Utf8PathBuf,
        /// Parser message.
        reason: String,
    },

    /// An unpacked binary does not match its manifest checksum.
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
}

/// Read the embedded manifest without unpacking anything else.
///
/// # Errors
///
/// Returns [`ExtractionError::MissingManifest`] when the archive has no
/// manifest, [`ExtractionError::InvalidManifest`] when it does not parse,
/// and I/O or zip errors when the archive is unreadable.
pub fn read_manifest(
    archive: &Utf8Path,
    format: ArchiveFormat,
) -> Result<ArtifactManifest, ExtractionError> {
    let json = match format {
        ArchiveFormat::XcframeworkZip => read_zip_entry(archive, MANIFEST_FILE_NAME)?,
        ArchiveFormat::TarZst => read_tar_entry(archive, MANIFEST_FILE_NAME)?,
    }
    .ok_or_else(|| ExtractionError::MissingManifest {
        archive: archive.to_owned(),
    })?;
    ArtifactManifest::parse(&json).map_err(|err| ExtractionError::InvalidManifest {
        archive: archive.to_owned(),
        reason: err.to_string(),
    })
}

fn read_zip_entry(archive: &Utf8Path, name: &str) -> Result<Option<String>, ExtractionError> {
    let mut zip = zip::ZipArchive::new(fs::File::open(archive)?)?;
    let mut entry = match zip.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let mut text = String::new();
    entry.read_to_string(&mut text)?;
    Ok(Some(text))
}

fn read_tar_entry(archive: &Utf8Path, name: &str) -> Result<Option<String>, ExtractionError> {
    let decoder = zstd::Decoder::new(fs::File::open(archive)?)?;
    let mut tar = tar::Archive::new(decoder);
    for entry in tar.entries()? {
        let mut entry = entry?;
        if entry.path()?.as_ref() == Path::new(name) {
            let mut text = String::new();
            entry.read_to_string(&mut text)?;
            return Ok(Some(text));
        }
    }
    Ok(None)
}

/// Unpack `archive` into `dest_dir` and verify every binary listed in its
/// manifest.
///
/// Returns the manifest together with the unpacked binary paths in
/// manifest order.
///
/// # Errors
///
/// Returns [`ExtractionError::PathTraversal`] for unsafe entry paths and
/// [`ExtractionError::Integrity`] when an unpacked binary differs from its
/// recorded checksum.
pub fn extract(
    archive: &Utf8Path,
    format: ArchiveFormat,
    dest_dir: &Utf8Path,
) -> Result<(ArtifactManifest, Vec<Utf8PathBuf>), ExtractionError> {
    let manifest = read_manifest(archive, format)?;
    fs::create_dir_all(dest_dir)?;
    match format {
        ArchiveFormat::XcframeworkZip => {
            let mut zip = zip::ZipArchive::new(fs::File::open(archive)?)?;
            for i in 0..zip.len() {
                let mut entry = zip.by_index(i)?;
                let name = entry.name().to_owned();
                validate_entry_path(Path::new(&name))?;
                if entry.is_dir() {
                    continue;
                }
                let dest = dest_dir.join(&name);
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                std::io::copy(&mut entry, &mut fs::File::create(&dest)?)?;
            }
        }
        ArchiveFormat::TarZst => {
            let decoder = zstd::Decoder::new(fs::File::open(archive)?)?;
            let mut tar = tar::Archive::new(decoder);
            for entry in tar.entries()? {
                let mut entry = entry?;
                let path = entry.path()?.into_owned();
                validate_entry_path(&path)?;
                let dest = dest_dir.as_std_path().join(&path);
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                entry.unpack(&dest)?;
            }
        }
    }

    let mut binaries = Vec::with_capacity(manifest.entries.len());
    for entry in &manifest.entries {
        validate_entry_path(Path::new(&entry.path))?;
        let path = dest_dir.join(&entry.path);
        entry.sha256.verify_file(&path, &entry.path)?;
        binaries.push(path);
    }
    Ok((manifest, binaries))
}

/// Validate that an entry path does not escape the destination directory
/// via `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> Result<(), ExtractionError> {
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
    if escapes {
        return Err(ExtractionError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    Ok(())
}
