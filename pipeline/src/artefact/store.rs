//! Versioned artefact storage.
//!
//! Published archives are immutable: a release tag holds at most one
//! version of each file. Republishing identical bytes is a no-op;
//! republishing different bytes under the same tag is refused.
//!
//! The bundled [`DirectoryStore`] lays files out as
//! `<root>/<release-tag>/<file>` with a `<file>.sha256` sidecar in the
//! `sha256sum` format, and serialises writers with an advisory lock.

use super::checksum::{Checksum, IntegrityError};
use super::packaging::PackagedArtifact;
use super::release_tag::ReleaseTag;
use camino::{Utf8Path, Utf8PathBuf};
use fs2::FileExt;
use log::{debug, info};
use std::fs;
use std::io;
use thiserror::Error;

const LOCK_FILE_NAME: &str = ".bindkit-store.lock";

/// Errors raised by artefact stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The tag already holds a different file with the same name.
    #[error(
        "{file_name} is already published under {tag} with checksum {existing}; refusing to replace it with {new}"
    )]
    AlreadyPublished {
        /// Release tag.
        tag: String,
        /// Archive file name.
        file_name: String,
        /// Checksum of the stored file.
        existing: Checksum,
        /// Checksum of the rejected file.
        new: Checksum,
    },

    /// A stored file no longer matches its recorded checksum.
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// A filesystem operation failed.
    #[error("store I/O error at {path}: {source}")]
    Io {
        /// Path involved.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Result of a publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    /// Location of the stored archive.
    pub path: Utf8PathBuf,
    /// Checksum of the stored archive.
    pub checksum: Checksum,
    /// `false` when identical bytes were already stored.
    pub newly_written: bool,
}

/// Destination for packaged archives.
#[cfg_attr(test, mockall::automock)]
pub trait ArtifactStore: Send + Sync {
    /// Publish an archive under its release tag.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyPublished`] when the tag already holds
    /// different bytes under the same file name.
    fn publish(&self, artifact: &PackagedArtifact) -> Result<StoredArtifact, StoreError>;

    /// Return the stored path and checksum for a file, verified against its
    /// sidecar, or `None` when it was never published.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Integrity`] when the file no longer matches.
    fn locate(
        &self,
        tag: &ReleaseTag,
        file_name: &str,
    ) -> Result<Option<(Utf8PathBuf, Checksum)>, StoreError>;
}

/// A store backed by a local directory tree.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: Utf8PathBuf,
}

impl DirectoryStore {
    /// Create a store rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding every file for `tag`.
    #[must_use]
    pub fn tag_dir(&self, tag: &ReleaseTag) -> Utf8PathBuf {
        self.root.join(tag.as_str())
    }

    fn sidecar(path: &Utf8Path) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{path}.sha256"))
    }

    fn read_sidecar(path: &Utf8Path) -> Result<Option<Checksum>, StoreError> {
        let sidecar = Self::sidecar(path);
        match fs::read_to_string(&sidecar) {
            Ok(text) => Ok(text
                .split_whitespace()
                .next()
                .and_then(|hex| Checksum::try_from(hex).ok())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                path: sidecar,
                source,
            }),
        }
    }
}

fn io_error(path: &Utf8Path) -> impl Fn(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_owned(),
        source,
    }
}

impl ArtifactStore for DirectoryStore {
    fn publish(&self, artifact: &PackagedArtifact) -> Result<StoredArtifact, StoreError> {
        let dir = self.tag_dir(&artifact.release_tag);
        fs::create_dir_all(&dir).map_err(io_error(&dir))?;

        let lock_path = dir.join(LOCK_FILE_NAME);
        let lock = fs::File::create(&lock_path).map_err(io_error(&lock_path))?;
        lock.lock_exclusive().map_err(io_error(&lock_path))?;

        let dest = dir.join(&artifact.file_name);
        if dest.exists() {
            let existing = Checksum::of_file(&dest)?;
            if existing == artifact.checksum {
                debug!("{dest} already published with identical content");
                return Ok(StoredArtifact {
                    path: dest,
                    checksum: existing,
                    newly_written: false,
                });
            }
            return Err(StoreError::AlreadyPublished {
                tag: artifact.release_tag.to_string(),
                file_name: artifact.file_name.clone(),
                existing,
                new: artifact.checksum.clone(),
            });
        }

        let staged = tempfile::NamedTempFile::new_in(&dir).map_err(io_error(&dir))?;
        let staged_path = Utf8PathBuf::try_from(staged.path().to_path_buf()).map_err(|err| {
            StoreError::Io {
                path: dir.clone(),
                source: err.into_io_error(),
            }
        })?;
        fs::copy(&artifact.archive_path, &staged_path).map_err(io_error(&artifact.archive_path))?;
        artifact
            .checksum
            .verify_file(&staged_path, &artifact.file_name)?;
        staged.persist(&dest).map_err(|err| StoreError::Io {
            path: dest.clone(),
            source: err.error,
        })?;
        let sidecar = Self::sidecar(&dest);
        fs::write(
            &sidecar,
            format!("{}  {}\n", artifact.checksum, artifact.file_name),
        )
        .map_err(io_error(&sidecar))?;
        info!("published {dest}");
        Ok(StoredArtifact {
            path: dest,
            checksum: artifact.checksum.clone(),
            newly_written: true,
        })
    }

    fn locate(
        &self,
        tag: &ReleaseTag,
        file_name: &str,
    ) -> Result<Option<(Utf8PathBuf, Checksum)>, StoreError> {
        let path = self.tag_dir(tag).join(file_name);
        if !path.is_file() {
            return Ok(None);
        }
        let checksum = match Self::read_sidecar(&path)? {
            Some(recorded) => {
                recorded.verify_file(&path, file_name)?;
                recorded
            }
            None => Checksum::of_file(&path)?,
        };
        Ok(Some((path, checksum)))
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
