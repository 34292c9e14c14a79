//! Generated binding modules and their on-disk form.
//!
//! Every generated file starts with a header naming the interface version
//! and digest it was generated from. The header is what lets a later run
//! tell a current binding from a stale one without regenerating it.

use super::description::InterfaceStamp;
use super::error::BindingError;
use super::generator::HostLanguage;
use crate::artefact::checksum::Checksum;
use bindkit_common::WrappedLibrary;
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::fs;
use std::io;

const GENERATED_NOTICE: &str = "// Generated by bindkit. Do not edit.";
const VERSION_PREFIX: &str = "// bindkit-interface-version: ";
const DIGEST_PREFIX: &str = "// bindkit-interface-digest: ";

/// Header lines stamping `stamp` into a generated file.
pub(crate) fn stamp_header(stamp: &InterfaceStamp) -> String {
    format!(
        "{GENERATED_NOTICE}\n{VERSION_PREFIX}{}\n{DIGEST_PREFIX}{}\n",
        stamp.version, stamp.digest
    )
}

/// File name of the generated module for `library` in `language`, e.g.
/// `askar_uniffi.swift`.
#[must_use]
pub fn binding_file_name(library: WrappedLibrary, language: HostLanguage) -> String {
    format!("{}.{}", library.crate_name(), language.extension())
}

/// Location of the generated module for `library` in `language` under
/// `root`: `<root>/<language>/<file>`.
#[must_use]
pub fn binding_path(
    root: &Utf8Path,
    library: WrappedLibrary,
    language: HostLanguage,
) -> Utf8PathBuf {
    root.join(language.dir_name())
        .join(binding_file_name(library, language))
}

/// Generated source for one library in one host language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingModule {
    /// Library the binding wraps.
    pub library: WrappedLibrary,
    /// Host language.
    pub language: HostLanguage,
    /// Interface the source was generated from.
    pub stamp: InterfaceStamp,
    /// File name, e.g. `askar_uniffi.swift`.
    pub file_name: String,
    /// Complete source text, header included.
    pub source: String,
}

/// Result of writing a module to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The file was created or its content changed.
    Written,
    /// The file already held identical content and was left untouched.
    Unchanged,
}

impl BindingModule {
    /// Host-language module name (`Askar`, `IndyVdr`, ...).
    #[must_use]
    pub fn module_name(&self) -> &'static str {
        self.library.module_name()
    }

    /// Path of this module under `root`: `<root>/<language>/<file>`.
    #[must_use]
    pub fn path_under(&self, root: &Utf8Path) -> Utf8PathBuf {
        binding_path(root, self.library, self.language)
    }

    /// Write the module under `root`, skipping the write when the file
    /// already holds identical bytes.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::Write`] when the directory or file cannot be
    /// written, or [`BindingError::Read`] when an existing file cannot be
    /// read.
    pub fn write_to(&self, root: &Utf8Path) -> Result<WriteOutcome, BindingError> {
        let path = self.path_under(root);
        match fs::read(&path) {
            Ok(existing) if existing == self.source.as_bytes() => {
                debug!("{path} is up to date");
                return Ok(WriteOutcome::Unchanged);
            }
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(BindingError::Read { path, source }),
        }
        let write_err = |source| BindingError::Write {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(&path, &self.source).map_err(write_err)?;
        debug!("wrote {path}");
        Ok(WriteOutcome::Written)
    }
}

/// Read the stamp from the header of a generated file.
///
/// Returns `Ok(None)` when the file has no complete, well-formed stamp.
///
/// # Errors
///
/// Returns [`BindingError::Read`] when the file cannot be read.
pub fn read_stamp(path: &Utf8Path) -> Result<Option<InterfaceStamp>, BindingError> {
    let source = fs::read_to_string(path).map_err(|source| BindingError::Read {
        path: path.to_owned(),
        source,
    })?;
    let mut version = None;
    let mut digest = None;
    for line in source.lines().take_while(|line| line.starts_with("//")) {
        if let Some(value) = line.strip_prefix(VERSION_PREFIX) {
            version = Some(value.trim().to_owned());
        } else if let Some(value) = line.strip_prefix(DIGEST_PREFIX) {
            digest = Checksum::try_from(value.trim()).ok();
        }
    }
    Ok(version
        .zip(digest)
        .map(|(version, digest)| InterfaceStamp { version, digest }))
}

/// Check that the generated file at `path` was produced from the
/// interface with digest `expected`.
///
/// # Errors
///
/// Returns [`BindingError::AbiMismatch`] for a stale or unstamped file and
/// [`BindingError::Read`] when it cannot be read.
pub fn verify_up_to_date(
    path: &Utf8Path,
    library: WrappedLibrary,
    expected: &Checksum,
) -> Result<InterfaceStamp, BindingError> {
    match read_stamp(path)? {
        Some(stamp) if &stamp.digest == expected => Ok(stamp),
        found => Err(BindingError::AbiMismatch {
            library,
            subject: path.to_string(),
            expected: expected.clone(),
            actual: found.map(|stamp| stamp.digest),
        }),
    }
}
