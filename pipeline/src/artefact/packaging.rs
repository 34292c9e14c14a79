//! Artefact packaging for native library distribution.
//!
//! Bundles the binaries of one library across its declared target matrix
//! into a single archive with an embedded `artifact-manifest.json`, then
//! checksums the archive. Packaging is all-or-nothing: a missing, foreign,
//! duplicated, or undeclared binary aborts before anything is written.
//!
//! `xcframework.zip` archives follow the Apple framework bundle layout
//! described in [`super::xcframework`]; `tar.zst` archives hold one
//! directory per target.
//!
//! Archives are reproducible. Entries are written in sorted order with a
//! fixed timestamp, owner, and mode, so identical inputs always produce an
//! identical checksum.

use super::checksum::Checksum;
use super::manifest::{ArtifactManifest, GeneratedAt, MANIFEST_FILE_NAME, ManifestEntry};
use super::naming::{ArchiveFormat, ArtefactName};
use super::packaging_error::PackagingError;
use super::release_tag::ReleaseTag;
use super::schema_version::SchemaVersion;
use super::xcframework;
use crate::builder::NativeLibraryTarget;
use crate::interface::{InterfaceStamp, abi};
use bindkit_common::{TargetTuple, WrappedLibrary};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use zip::write::SimpleFileOptions;

/// Permission bits recorded for every archive entry.
const ENTRY_MODE: u32 = 0o644;

/// Input parameters for [`package_artefact`].
#[derive(Debug, Clone)]
pub struct PackageParams {
    /// Library being packaged.
    pub library: WrappedLibrary,
    /// Release the archive will be published under.
    pub release_tag: ReleaseTag,
    /// Container format.
    pub format: ArchiveFormat,
    /// Every target the archive must cover, in matrix order.
    pub declared: Vec<TargetTuple>,
    /// Compiled binaries, one per declared target.
    pub binaries: Vec<NativeLibraryTarget>,
    /// Interface the binaries were built against.
    pub interface: InterfaceStamp,
    /// Directory where the archive will be written.
    pub output_dir: Utf8PathBuf,
    /// Timestamp recorded in the manifest.
    pub generated_at: GeneratedAt,
    /// C header for the FFI module. Framework slices get a `Headers`
    /// directory only when this is set.
    pub ffi_header: Option<String>,
}

/// A finished archive. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedArtifact {
    /// Path of the archive on disk.
    pub archive_path: Utf8PathBuf,
    /// Archive file name.
    pub file_name: String,
    /// Release tag.
    pub release_tag: ReleaseTag,
    /// Checksum of the archive bytes.
    pub checksum: Checksum,
    /// Manifest embedded in the archive.
    pub manifest: ArtifactManifest,
}

/// A file to place in the archive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(super) struct ArchiveEntry {
    /// Path inside the archive.
    pub(super) archive_path: String,
    /// Contents source.
    pub(super) source: EntrySource,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(super) enum EntrySource {
    File(Utf8PathBuf),
    Bytes(Vec<u8>),
}

/// Package one library's binaries into a checksummed archive.
///
/// # Errors
///
/// Returns [`PackagingError::IncompleteMatrix`] naming the first declared
/// target without a binary, [`PackagingError::UndeclaredTarget`] or
/// [`PackagingError::DuplicateTarget`] for surplus binaries,
/// [`PackagingError::Binding`] when a binary's interface fingerprint does
/// not match, and I/O, zip, or serialisation errors while writing.
pub fn package_artefact(params: &PackageParams) -> Result<PackagedArtifact, PackagingError> {
    let ordered = match_matrix(params)?;
    for binary in &ordered {
        abi::verify_binary(&binary.binary, params.library, &params.interface.digest)?;
    }

    let name = ArtefactName::new(params.library, params.format);
    let (mut entries, manifest_entries) = match params.format {
        ArchiveFormat::XcframeworkZip => {
            let bundle = xcframework::layout(&name, &ordered, params.ffi_header.as_deref())?;
            (bundle.entries, bundle.manifest)
        }
        ArchiveFormat::TarZst => flat_layout(&ordered)?,
    };

    let manifest = ArtifactManifest {
        schema_version: SchemaVersion::current(),
        library: params.library,
        release_tag: params.release_tag.clone(),
        format: params.format,
        generated_at: params.generated_at.clone(),
        interface: params.interface.clone(),
        entries: manifest_entries,
    };
    entries.push(ArchiveEntry {
        archive_path: MANIFEST_FILE_NAME.to_owned(),
        source: EntrySource::Bytes(manifest.to_json()?.into_bytes()),
    });
    entries.sort();

    fs::create_dir_all(&params.output_dir)?;
    let file_name = name.filename();
    let archive_path = params.output_dir.join(&file_name);
    match params.format {
        ArchiveFormat::XcframeworkZip => write_zip(&archive_path, &entries)?,
        ArchiveFormat::TarZst => write_tar_zst(&archive_path, &entries)?,
    }
    let checksum = Checksum::of_file(&archive_path)?;
    debug!("packaged {archive_path} ({checksum})");

    Ok(PackagedArtifact {
        archive_path,
        file_name,
        release_tag: params.release_tag.clone(),
        checksum,
        manifest,
    })
}

/// Pair each declared target with exactly one binary, in matrix order.
fn match_matrix(params: &PackageParams) -> Result<Vec<&NativeLibraryTarget>, PackagingError> {
    let library = params.library;
    let mut declared = Vec::new();
    for tuple in &params.declared {
        if !declared.contains(tuple) {
            declared.push(*tuple);
        }
    }
    if declared.is_empty() {
        return Err(PackagingError::EmptyMatrix { library });
    }

    let mut seen = BTreeSet::new();
    for binary in &params.binaries {
        if binary.library != library {
            return Err(PackagingError::ForeignBinary {
                library,
                found: binary.library,
                path: binary.binary.clone(),
            });
        }
        if !declared.contains(&binary.tuple) {
            return Err(PackagingError::UndeclaredTarget {
                library,
                tuple: binary.tuple,
            });
        }
        if !seen.insert(binary.tuple) {
            return Err(PackagingError::DuplicateTarget {
                library,
                tuple: binary.tuple,
            });
        }
    }

    declared
        .into_iter()
        .map(|tuple| {
            params
                .binaries
                .iter()
                .find(|binary| binary.tuple == tuple)
                .ok_or(PackagingError::IncompleteMatrix { library, tuple })
        })
        .collect()
}

/// One `<tuple>/<file>` directory per binary.
fn flat_layout(
    ordered: &[&NativeLibraryTarget],
) -> Result<(Vec<ArchiveEntry>, Vec<ManifestEntry>), PackagingError> {
    let mut entries = Vec::with_capacity(ordered.len() + 1);
    let mut manifest_entries = Vec::with_capacity(ordered.len());
    for binary in ordered {
        let archive_path = format!(
            "{}/{}",
            binary.tuple,
            binary.tuple.library_file_name(&binary.library.crate_name())
        );
        manifest_entries.push(ManifestEntry {
            target: binary.tuple,
            path: archive_path.clone(),
            sha256: Checksum::of_file(&binary.binary)?,
        });
        entries.push(ArchiveEntry {
            archive_path,
            source: EntrySource::File(binary.binary.clone()),
        });
    }
    Ok((entries, manifest_entries))
}

fn write_zip(output: &Utf8Path, entries: &[ArchiveEntry]) -> Result<(), PackagingError> {
    let file = fs::File::create(output)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(ENTRY_MODE);
    for entry in entries {
        writer.start_file(entry.archive_path.as_str(), options)?;
        match &entry.source {
            EntrySource::File(path) => {
                io::copy(&mut fs::File::open(path)?, &mut writer)?;
            }
            EntrySource::Bytes(bytes) => {
                io::copy(&mut bytes.as_slice(), &mut writer)?;
            }
        }
    }
    writer.finish()?;
    Ok(())
}

fn write_tar_zst(output: &Utf8Path, entries: &[ArchiveEntry]) -> Result<(), PackagingError> {
    let file = fs::File::create(output)?;
    let encoder = zstd::Encoder::new(file, 0)?;
    let mut builder = tar::Builder::new(encoder);
    for entry in entries {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_mode(ENTRY_MODE);
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);
        match &entry.source {
            EntrySource::File(path) => {
                let source = fs::File::open(path)?;
                header.set_size(source.metadata()?.len());
                builder.append_data(&mut header, &entry.archive_path, source)?;
            }
            EntrySource::Bytes(bytes) => {
                header.set_size(bytes.len() as u64);
                builder.append_data(&mut header, &entry.archive_path, bytes.as_slice())?;
            }
        }
    }
    let encoder = builder.into_inner()?;
    encoder.finish()?;
    Ok(())
}

#[cfg(test)]
#[path = "packaging_tests.rs"]
mod tests;
