//! Artefact resolution: exactly one verified source per library.
//!
//! In [`OverrideMode::Remote`] every library resolves to its pinned release,
//! fetched through the checksum-verified cache. In [`OverrideMode::Local`]
//! every library resolves to its locally built archive, which must exist
//! and must have been built from the same interface as the binding module
//! generated for that library. There is no mixed mode and no fallback from
//! one source to the other.

use super::cache::{ArtifactCache, CacheRequest};
use super::error::ResolveError;
use super::manifest::{ConsumerManifest, LibraryEntry, LocalSource, RemoteSource};
use super::override_mode::{OVERRIDE_ENV_VAR, OverrideMode};
use crate::artefact::checksum::Checksum;
use crate::artefact::extraction::read_manifest;
use crate::artefact::fetch::CancellationToken;
use crate::artefact::naming::ArchiveFormat;
use crate::interface::{BindingError, HostLanguage, binding_path, read_stamp};
use bindkit_common::WrappedLibrary;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

/// Where a resolved artefact comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSource {
    /// A pinned release, verified and cached locally.
    Remote {
        /// Download URL.
        url: String,
        /// Verified checksum.
        checksum: Checksum,
        /// Cached copy.
        path: Utf8PathBuf,
    },
    /// A locally built archive.
    Local {
        /// Archive path.
        path: Utf8PathBuf,
    },
}

/// The artefact a binding module links against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    /// Library the artefact belongs to.
    pub library: WrappedLibrary,
    /// Binary-target name.
    pub binary_target: String,
    /// Resolved source.
    pub source: ArtifactSource,
}

/// Resolves every library in a consumer manifest.
pub struct Resolver<'a> {
    cache: ArtifactCache<'a>,
    bindings_root: Utf8PathBuf,
}

impl<'a> Resolver<'a> {
    /// Create a resolver fetching remote artefacts through `cache` and
    /// checking local archives against the bindings under `bindings_root`.
    #[must_use]
    pub fn new(cache: ArtifactCache<'a>, bindings_root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            cache,
            bindings_root: bindings_root.into(),
        }
    }

    /// Resolve one artefact per library, in manifest order.
    ///
    /// Every library is checked for a usable declaration before anything is
    /// fetched or opened.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Configuration`] when a library lacks the
    /// declaration the mode requires, [`ResolveError::ChecksumMismatch`]
    /// when an artefact fails verification, and
    /// [`BindingError::AbiMismatch`] (through [`ResolveError::Binding`])
    /// when a local archive and its binding disagree.
    pub fn resolve(
        &self,
        manifest: &ConsumerManifest,
        mode: OverrideMode,
        cancel: &CancellationToken,
    ) -> Result<Vec<ResolvedArtifact>, ResolveError> {
        info!(
            "resolving {} libraries from {mode} artefacts",
            manifest.entries.len()
        );
        match mode {
            OverrideMode::Remote => {
                let pinned = manifest
                    .entries
                    .iter()
                    .map(|entry| remote_declaration(entry).map(|remote| (entry, remote)))
                    .collect::<Result<Vec<_>, _>>()?;
                pinned
                    .par_iter()
                    .map(|(entry, remote)| self.resolve_remote(entry, remote, cancel))
                    .collect()
            }
            OverrideMode::Local => {
                let local = manifest
                    .entries
                    .iter()
                    .map(|entry| local_declaration(entry).map(|local| (entry, local)))
                    .collect::<Result<Vec<_>, _>>()?;
                local
                    .iter()
                    .map(|(entry, local)| self.resolve_local(entry, local, manifest.format))
                    .collect()
            }
        }
    }

    fn resolve_remote(
        &self,
        entry: &LibraryEntry,
        remote: &RemoteSource,
        cancel: &CancellationToken,
    ) -> Result<ResolvedArtifact, ResolveError> {
        let path = self.cache.fetch_verified(
            &CacheRequest {
                library: entry.library,
                url: &remote.url,
                checksum: &remote.checksum,
                file_name: &remote.file_name,
            },
            cancel,
        )?;
        debug!("{} resolved to {}", entry.library, remote.url);
        Ok(ResolvedArtifact {
            library: entry.library,
            binary_target: entry.binary_target.clone(),
            source: ArtifactSource::Remote {
                url: remote.url.clone(),
                checksum: remote.checksum.clone(),
                path,
            },
        })
    }

    fn resolve_local(
        &self,
        entry: &LibraryEntry,
        local: &LocalSource,
        default_format: ArchiveFormat,
    ) -> Result<ResolvedArtifact, ResolveError> {
        let library = entry.library;
        let archive = &local.archive;
        if !archive.is_file() {
            return Err(ResolveError::configuration(
                library,
                format!(
                    "local archive {archive} does not exist; package it first or unset {OVERRIDE_ENV_VAR}"
                ),
            ));
        }
        if let Some(expected) = &local.checksum {
            verify_local_checksum(library, archive, expected)?;
        }

        let format = ArchiveFormat::from_file_name(archive.as_str()).unwrap_or(default_format);
        let archived = read_manifest(archive, format)
            .map_err(|source| ResolveError::Archive { library, source })?;
        if archived.library != library {
            return Err(ResolveError::configuration(
                library,
                format!("{archive} packages {}", archived.library),
            ));
        }
        self.check_bindings(library, archive, &archived.interface.digest)?;

        debug!("{library} resolved to local archive {archive}");
        Ok(ResolvedArtifact {
            library,
            binary_target: entry.binary_target.clone(),
            source: ArtifactSource::Local {
                path: archive.clone(),
            },
        })
    }

    /// Every generated binding for `library` must be stamped with the
    /// digest the archive was built from, and at least one must exist.
    fn check_bindings(
        &self,
        library: WrappedLibrary,
        archive: &Utf8Path,
        archive_digest: &Checksum,
    ) -> Result<(), ResolveError> {
        let mut checked = 0;
        for language in HostLanguage::ALL {
            let path = binding_path(&self.bindings_root, library, language);
            if !path.is_file() {
                continue;
            }
            match read_stamp(&path)? {
                Some(stamp) if &stamp.digest == archive_digest => checked += 1,
                Some(stamp) => {
                    return Err(BindingError::AbiMismatch {
                        library,
                        subject: archive.to_string(),
                        expected: stamp.digest,
                        actual: Some(archive_digest.clone()),
                    }
                    .into());
                }
                None => {
                    return Err(BindingError::AbiMismatch {
                        library,
                        subject: path.to_string(),
                        expected: archive_digest.clone(),
                        actual: None,
                    }
                    .into());
                }
            }
        }
        if checked == 0 {
            return Err(ResolveError::configuration(
                library,
                format!(
                    "no generated binding under {}; generate bindings before using local archives",
                    self.bindings_root
                ),
            ));
        }
        Ok(())
    }
}

fn remote_declaration(entry: &LibraryEntry) -> Result<&RemoteSource, ResolveError> {
    entry.remote.as_ref().ok_or_else(|| {
        ResolveError::configuration(
            entry.library,
            "no pinned remote artefact; declare tag and checksum",
        )
    })
}

fn local_declaration(entry: &LibraryEntry) -> Result<&LocalSource, ResolveError> {
    entry.local.as_ref().ok_or_else(|| {
        ResolveError::configuration(
            entry.library,
            format!(
                "{OVERRIDE_ENV_VAR} is set but no local_archive is declared; the override applies to every library"
            ),
        )
    })
}

fn verify_local_checksum(
    library: WrappedLibrary,
    archive: &Utf8Path,
    expected: &Checksum,
) -> Result<(), ResolveError> {
    expected
        .verify_file(archive, archive.as_str())
        .map_err(|err| ResolveError::from_integrity(library, err))
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
