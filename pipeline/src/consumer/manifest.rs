//! The consumer manifest: what each wrapped library contributes to the
//! consumer package and where its binary comes from.
//!
//! Built from `bindkit.toml`. Every library entry carries both the pinned
//! remote source and the local archive used under the override, so the
//! choice between them is made in one place, by [`super::resolver`], and
//! never per library.

use super::error::ResolveError;
use super::override_mode::OVERRIDE_ENV_VAR;
use crate::artefact::checksum::Checksum;
use crate::artefact::naming::{ArchiveFormat, ArtefactName};
use crate::artefact::release_tag::ReleaseTag;
use bindkit_common::{LibraryConfig, PackageConfig, PipelineConfig, WrappedLibrary};
use camino::{Utf8Path, Utf8PathBuf};

/// Base URL for release downloads.
const RELEASE_HOST: &str = "https://github.com";

/// Build the download URL of `file` published under `tag` in `repository`
/// (`owner/name`).
///
/// # Examples
///
/// ```
/// use bindkit_pipeline::consumer::manifest::remote_url;
///
/// assert_eq!(
///     remote_url("hyperledger/aries-uniffi-wrappers", "0.2.3-binary", "anoncreds_uniffiFFI.xcframework.zip"),
///     "https://github.com/hyperledger/aries-uniffi-wrappers/releases/download/0.2.3-binary/anoncreds_uniffiFFI.xcframework.zip"
/// );
/// ```
#[must_use]
pub fn remote_url(repository: &str, tag: &str, file: &str) -> String {
    format!("{RELEASE_HOST}/{repository}/releases/download/{tag}/{file}")
}

/// A pinned remote artefact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSource {
    /// Download URL.
    pub url: String,
    /// Expected SHA-256 of the archive.
    pub checksum: Checksum,
    /// Archive file name, used for the cache entry.
    pub file_name: String,
    /// Release tag, when the URL was derived from one.
    pub release_tag: Option<ReleaseTag>,
}

/// A locally built artefact used under the override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSource {
    /// Archive path, absolute or relative to the manifest directory.
    pub archive: Utf8PathBuf,
    /// Optional SHA-256 of the archive.
    pub checksum: Option<Checksum>,
}

/// Test target contributed by a library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestTarget {
    /// Target name, e.g. `AskarTests`.
    pub name: String,
    /// Test sources.
    pub path: Utf8PathBuf,
    /// Resource files copied next to the tests.
    pub resources: Vec<Utf8PathBuf>,
}

/// Everything the consumer package declares for one library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryEntry {
    /// The library.
    pub library: WrappedLibrary,
    /// Binary-target name the glue module links against.
    pub binary_target: String,
    /// Hand-maintained wrapper sources.
    pub source_path: Utf8PathBuf,
    /// Test target.
    pub test_target: TestTarget,
    /// Pinned remote artefact.
    pub remote: Option<RemoteSource>,
    /// Local archive for the override.
    pub local: Option<LocalSource>,
    /// Interface description path.
    pub interface: Option<Utf8PathBuf>,
}

/// The consumer manifest for every configured library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerManifest {
    /// Package-level metadata.
    pub package: PackageConfig,
    /// Archive format of every artefact.
    pub format: ArchiveFormat,
    /// Library entries in catalogue order.
    pub entries: Vec<LibraryEntry>,
}

impl ConsumerManifest {
    /// Build the manifest from configuration. Relative local paths are
    /// resolved against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Configuration`] when a library pins its own
    /// source, a remote artefact lacks a checksum, a tag or checksum is
    /// malformed, or the archive format is unknown.
    pub fn from_config(config: &PipelineConfig, base_dir: &Utf8Path) -> Result<Self, ResolveError> {
        let format = config
            .release
            .format
            .parse::<ArchiveFormat>()
            .map_err(|err| ResolveError::Configuration {
                library: None,
                reason: err.to_string(),
            })?;
        let libraries = config
            .libraries()
            .map_err(|err| ResolveError::Configuration {
                library: None,
                reason: err.to_string(),
            })?;

        let mut entries: Vec<LibraryEntry> = Vec::with_capacity(libraries.len());
        for (library, settings) in libraries {
            if entries.iter().any(|entry| entry.library == library) {
                return Err(ResolveError::configuration(
                    library,
                    "declared twice under different spellings",
                ));
            }
            entries.push(library_entry(
                library,
                settings,
                &config.release.repository,
                format,
                base_dir,
            )?);
        }
        Ok(Self {
            package: config.package.clone(),
            format,
            entries,
        })
    }

    /// Return the entry for `library`, if configured.
    #[must_use]
    pub fn entry(&self, library: WrappedLibrary) -> Option<&LibraryEntry> {
        self.entries.iter().find(|entry| entry.library == library)
    }
}

fn library_entry(
    library: WrappedLibrary,
    settings: &LibraryConfig,
    repository: &str,
    format: ArchiveFormat,
    base_dir: &Utf8Path,
) -> Result<LibraryEntry, ResolveError> {
    if let Some(source) = &settings.source {
        return Err(ResolveError::configuration(
            library,
            format!(
                "per-library source \"{source}\" is not supported; set {OVERRIDE_ENV_VAR} or pass --local to switch every library at once"
            ),
        ));
    }
    let descriptor = library.descriptor();
    Ok(LibraryEntry {
        library,
        binary_target: library.binary_target_name(),
        source_path: Utf8PathBuf::from(descriptor.swift_source_path),
        test_target: TestTarget {
            name: format!("{}Tests", descriptor.module_name),
            path: Utf8PathBuf::from(descriptor.swift_test_path),
            resources: descriptor
                .test_resources
                .iter()
                .map(Utf8PathBuf::from)
                .collect(),
        },
        remote: remote_source(library, settings, repository, format)?,
        local: local_source(library, settings, base_dir)?,
        interface: settings.interface.as_ref().map(|path| base_dir.join(path)),
    })
}

fn parse_checksum(library: WrappedLibrary, value: &str) -> Result<Checksum, ResolveError> {
    Checksum::try_from(value).map_err(|err| ResolveError::configuration(library, err.to_string()))
}

fn remote_source(
    library: WrappedLibrary,
    settings: &LibraryConfig,
    repository: &str,
    format: ArchiveFormat,
) -> Result<Option<RemoteSource>, ResolveError> {
    let file_name = ArtefactName::new(library, format).filename();
    let release_tag = settings
        .tag
        .as_deref()
        .map(ReleaseTag::try_from)
        .transpose()
        .map_err(|err| ResolveError::configuration(library, err.to_string()))?;
    let checksum = settings
        .checksum
        .as_deref()
        .map(|value| parse_checksum(library, value))
        .transpose()?;

    let url = match (&settings.url, &release_tag) {
        (Some(url), _) => url.clone(),
        (None, Some(tag)) => remote_url(repository, tag.as_str(), &file_name),
        (None, None) if checksum.is_some() => {
            return Err(ResolveError::configuration(
                library,
                "checksum is set but neither tag nor url names the artefact",
            ));
        }
        (None, None) => return Ok(None),
    };
    let Some(checksum) = checksum else {
        return Err(ResolveError::configuration(
            library,
            format!("remote artefact {url} is not pinned by a checksum"),
        ));
    };
    Ok(Some(RemoteSource {
        url,
        checksum,
        file_name,
        release_tag,
    }))
}

fn local_source(
    library: WrappedLibrary,
    settings: &LibraryConfig,
    base_dir: &Utf8Path,
) -> Result<Option<LocalSource>, ResolveError> {
    let checksum = settings
        .local_checksum
        .as_deref()
        .map(|value| parse_checksum(library, value))
        .transpose()?;
    match (&settings.local_archive, checksum) {
        (Some(archive), checksum) => Ok(Some(LocalSource {
            archive: base_dir.join(archive),
            checksum,
        })),
        (None, Some(_)) => Err(ResolveError::configuration(
            library,
            "local_checksum is set without local_archive",
        )),
        (None, None) => Ok(None),
    }
}
