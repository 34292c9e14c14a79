//! Content-addressed cache for remote artefacts.
//!
//! Entries live at `<root>/<sha256>/<file>`. A cached file is re-hashed
//! every time it is reused; a corrupt entry is discarded and fetched again.
//! Downloads stream into a temporary file inside the entry directory and
//! are renamed into place only once their checksum matches, so a failed or
//! cancelled download never leaves a partial artefact behind.

use super::error::ResolveError;
use crate::artefact::checksum::Checksum;
use crate::artefact::fetch::{ArtifactFetcher, CancellationToken, RetryPolicy};
use bindkit_common::WrappedLibrary;
use camino::{Utf8Path, Utf8PathBuf};
use fs2::FileExt;
use log::{debug, info, warn};
use std::fs;
use std::io;

const LOCK_FILE_NAME: &str = ".lock";

/// The platform cache directory for bindkit, if one can be determined.
#[must_use]
pub fn default_cache_dir() -> Option<Utf8PathBuf> {
    directories_next::ProjectDirs::from("org", "bindkit", "bindkit")
        .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.cache_dir().join("artifacts")).ok())
}

/// One artefact to bring into the cache.
#[derive(Debug, Clone, Copy)]
pub struct CacheRequest<'a> {
    /// Library the artefact belongs to.
    pub library: WrappedLibrary,
    /// Download URL.
    pub url: &'a str,
    /// Pinned checksum.
    pub checksum: &'a Checksum,
    /// File name of the cached entry.
    pub file_name: &'a str,
}

/// A verified, content-addressed artefact cache.
pub struct ArtifactCache<'a> {
    root: Utf8PathBuf,
    fetcher: &'a dyn ArtifactFetcher,
    retry: RetryPolicy,
}

impl<'a> ArtifactCache<'a> {
    /// Create a cache rooted at `root`, fetching misses with `fetcher`.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>, fetcher: &'a dyn ArtifactFetcher) -> Self {
        Self {
            root: root.into(),
            fetcher,
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Cache root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Path an entry occupies once cached.
    #[must_use]
    pub fn entry_path(&self, checksum: &Checksum, file_name: &str) -> Utf8PathBuf {
        self.root.join(checksum.as_str()).join(file_name)
    }

    /// Return a verified local copy of the requested artefact, downloading
    /// it when it is missing or corrupt.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::ChecksumMismatch`] when the downloaded bytes
    /// do not match the pin, [`ResolveError::Fetch`] when the download
    /// fails after retries or is cancelled, and [`ResolveError::Io`] for
    /// cache filesystem failures.
    pub fn fetch_verified(
        &self,
        request: &CacheRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<Utf8PathBuf, ResolveError> {
        let dir = self.root.join(request.checksum.as_str());
        fs::create_dir_all(&dir).map_err(io_error(&dir))?;
        let lock_path = dir.join(LOCK_FILE_NAME);
        let lock = fs::File::create(&lock_path).map_err(io_error(&lock_path))?;
        lock.lock_exclusive().map_err(io_error(&lock_path))?;

        let dest = dir.join(request.file_name);
        if reuse(&dest, request)? {
            return Ok(dest);
        }

        let staged = tempfile::NamedTempFile::new_in(&dir).map_err(io_error(&dir))?;
        let staged_path =
            Utf8PathBuf::try_from(staged.path().to_path_buf()).map_err(|err| ResolveError::Io {
                path: dir.clone(),
                source: err.into_io_error(),
            })?;
        info!("fetching {} for {}", request.url, request.library);
        let bytes = self
            .retry
            .run(request.url, cancel, |_| {
                self.fetcher.fetch(request.url, &staged_path, cancel)
            })
            .map_err(|source| ResolveError::Fetch {
                library: request.library,
                source,
            })?;

        verify(&staged_path, request, request.url)?;
        staged.persist(&dest).map_err(|err| ResolveError::Io {
            path: dest.clone(),
            source: err.error,
        })?;
        debug!("cached {bytes} bytes at {dest}");
        Ok(dest)
    }
}

/// Whether `dest` already holds the pinned bytes. Corrupt entries are
/// removed.
fn reuse(dest: &Utf8Path, request: &CacheRequest<'_>) -> Result<bool, ResolveError> {
    if !dest.is_file() {
        return Ok(false);
    }
    match verify(dest, request, dest.as_str()) {
        Ok(()) => {
            debug!("cache hit for {} at {dest}", request.library);
            Ok(true)
        }
        Err(ResolveError::ChecksumMismatch { actual, .. }) => {
            warn!(
                "discarding corrupt cache entry {dest} (checksum {actual}, expected {})",
                request.checksum
            );
            fs::remove_file(dest).map_err(io_error(dest))?;
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

fn verify(path: &Utf8Path, request: &CacheRequest<'_>, subject: &str) -> Result<(), ResolveError> {
    request
        .checksum
        .verify_file(path, subject)
        .map_err(|err| ResolveError::from_integrity(request.library, err))
}

fn io_error(path: &Utf8Path) -> impl Fn(io::Error) -> ResolveError + '_ {
    move |source| ResolveError::Io {
        path: path.to_owned(),
        source,
    }
}
