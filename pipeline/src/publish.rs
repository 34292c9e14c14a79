//! Maven-style publication of packaged artefacts.
//!
//! Each file is uploaded with an HTTP `PUT` to
//! `<registry>/<group path>/<artifact>/<version>/<file>`, followed by a
//! `<file>.sha256` companion, using basic authentication. Desktop JVM
//! classifier jars found next to the Gradle project are published with
//! the archive.

use crate::artefact::checksum::Checksum;
use crate::artefact::fetch::http_agent;
use crate::credentials::Credentials;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bindkit_common::TargetTuple;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use std::fs;
use thiserror::Error;

/// Errors raised while publishing.
#[derive(Debug, Error)]
pub enum PublishError {
    /// No registry is configured.
    #[error("no registry configured; set release.registry in bindkit.toml")]
    NoRegistry,

    /// The registry rejected an upload.
    #[error("registry rejected {url} with HTTP {code}")]
    Rejected {
        /// Upload URL.
        url: String,
        /// HTTP status code.
        code: u16,
    },

    /// The upload did not reach the registry.
    #[error("failed to upload {url}: {reason}")]
    Transport {
        /// Upload URL.
        url: String,
        /// Error description.
        reason: String,
    },

    /// A file to publish could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path of the file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Uploads bytes to a URL.
#[cfg_attr(test, mockall::automock)]
pub trait RegistryTransport: Send + Sync {
    /// `PUT` `body` at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Rejected`] for non-success responses and
    /// [`PublishError::Transport`] when the request fails.
    fn put(&self, url: &str, body: &[u8]) -> Result<(), PublishError>;
}

/// HTTP transport with basic authentication.
pub struct HttpTransport {
    authorization: String,
}

impl HttpTransport {
    /// Build a transport authenticating as `credentials`.
    #[must_use]
    pub fn new(credentials: &Credentials) -> Self {
        let pair = format!("{}:{}", credentials.username, credentials.token());
        Self {
            authorization: format!("Basic {}", STANDARD.encode(pair)),
        }
    }
}

impl RegistryTransport for HttpTransport {
    fn put(&self, url: &str, body: &[u8]) -> Result<(), PublishError> {
        http_agent()
            .put(url)
            .header("Authorization", &self.authorization)
            .send(body)
            .map_err(|err| match err {
                ureq::Error::StatusCode(code) => PublishError::Rejected {
                    url: url.to_owned(),
                    code,
                },
                other => PublishError::Transport {
                    url: url.to_owned(),
                    reason: other.to_string(),
                },
            })?;
        Ok(())
    }
}

/// Maven coordinates of a published library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coordinates {
    /// Group, dotted (`org.hyperledger`).
    pub group: String,
    /// Artifact id (`askar_uniffi`).
    pub artifact: String,
    /// Version.
    pub version: String,
}

impl Coordinates {
    /// Directory of this version under the registry root.
    #[must_use]
    pub fn path(&self) -> String {
        format!(
            "{}/{}/{}",
            self.group.replace('.', "/"),
            self.artifact,
            self.version
        )
    }

    /// Standard file name for a classifier and extension.
    #[must_use]
    pub fn file_name(&self, classifier: Option<&str>, extension: &str) -> String {
        match classifier {
            Some(classifier) => {
                format!("{}-{}-{classifier}.{extension}", self.artifact, self.version)
            }
            None => format!("{}-{}.{extension}", self.artifact, self.version),
        }
    }
}

/// One file to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishItem {
    /// Local file.
    pub path: Utf8PathBuf,
    /// Maven classifier, if any.
    pub classifier: Option<String>,
    /// Extension used in the published file name.
    pub extension: String,
}

/// Classifier jars built for the desktop tuples in `tuples`, looked up as
/// `<libs_dir>/<artifact>-<version>-<classifier>.jar`. Missing jars are
/// skipped.
#[must_use]
pub fn jvm_classifier_jars(
    libs_dir: &Utf8Path,
    coordinates: &Coordinates,
    tuples: &[TargetTuple],
) -> Vec<PublishItem> {
    tuples
        .iter()
        .filter_map(TargetTuple::jvm_classifier)
        .filter_map(|classifier| {
            let path = libs_dir.join(coordinates.file_name(Some(classifier), "jar"));
            path.is_file().then(|| PublishItem {
                path,
                classifier: Some(classifier.to_owned()),
                extension: "jar".to_owned(),
            })
        })
        .collect()
}

/// Publishes files to a Maven-layout registry.
pub struct MavenPublisher<'a> {
    registry: String,
    transport: &'a dyn RegistryTransport,
}

impl<'a> MavenPublisher<'a> {
    /// Create a publisher for `registry` (base URL, no trailing slash needed).
    #[must_use]
    pub fn new(registry: &str, transport: &'a dyn RegistryTransport) -> Self {
        Self {
            registry: registry.trim_end_matches('/').to_owned(),
            transport,
        }
    }

    /// Upload every item and its checksum, returning the item URLs.
    ///
    /// # Errors
    ///
    /// Stops at the first file that cannot be read or uploaded.
    pub fn publish(
        &self,
        coordinates: &Coordinates,
        items: &[PublishItem],
    ) -> Result<Vec<String>, PublishError> {
        let base = format!("{}/{}", self.registry, coordinates.path());
        let mut urls = Vec::with_capacity(items.len());
        for item in items {
            let body = fs::read(&item.path).map_err(|source| PublishError::Read {
                path: item.path.clone(),
                source,
            })?;
            let name = coordinates.file_name(item.classifier.as_deref(), &item.extension);
            let url = format!("{base}/{name}");
            debug!("uploading {} ({} bytes) to {url}", item.path, body.len());
            self.transport.put(&url, &body)?;
            let checksum = Checksum::of_bytes(&body);
            self.transport
                .put(&format!("{url}.sha256"), checksum.as_str().as_bytes())?;
            info!("published {url}");
            urls.push(url);
        }
        Ok(urls)
    }
}
