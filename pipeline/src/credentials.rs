//! Publishing credentials.
//!
//! When `local.properties` exists in the project root, `githubUsername` and
//! `githubToken` are read from it and the environment is ignored. Otherwise
//! `GITHUB_ACTOR` and `GITHUB_TOKEN` are used. Only publication needs
//! credentials; every other command runs without them.

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use thiserror::Error;

/// Properties file consulted before the environment.
pub const LOCAL_PROPERTIES: &str = "local.properties";

const USERNAME_PROPERTY: &str = "githubUsername";
const TOKEN_PROPERTY: &str = "githubToken";
const USERNAME_ENV: &str = "GITHUB_ACTOR";
const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Where credentials were found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// A `local.properties` file.
    LocalProperties(Utf8PathBuf),
    /// `GITHUB_ACTOR` / `GITHUB_TOKEN`.
    Environment,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalProperties(path) => write!(f, "{path}"),
            Self::Environment => write!(f, "the {USERNAME_ENV}/{TOKEN_ENV} environment"),
        }
    }
}

/// Errors raised while loading credentials.
#[derive(Debug, Error)]
pub enum CredentialsError {
    /// A required value is absent or empty.
    #[error("{key} is not set in {source_label}")]
    Missing {
        /// Property or variable name.
        key: &'static str,
        /// Where it was looked up.
        source_label: String,
    },

    /// The properties file exists but cannot be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path of the properties file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Username and token for the package registry.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Registry user.
    pub username: String,
    token: String,
    /// Where the values came from.
    pub source: CredentialSource,
}

impl Credentials {
    /// Credentials supplied directly rather than discovered.
    #[must_use]
    pub fn new(username: &str, token: &str, source: CredentialSource) -> Self {
        Self {
            username: username.to_owned(),
            token: token.to_owned(),
            source,
        }
    }

    /// The secret token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Load credentials for a project rooted at `project_root`.
///
/// # Errors
///
/// Returns [`CredentialsError::Missing`] when the chosen source lacks a
/// value and [`CredentialsError::Read`] when `local.properties` exists but
/// cannot be read.
pub fn load_credentials(project_root: &Utf8Path) -> Result<Credentials, CredentialsError> {
    let path = project_root.join(LOCAL_PROPERTIES);
    match fs::read_to_string(&path) {
        Ok(text) => {
            let mut properties = parse_properties(&text);
            let source = CredentialSource::LocalProperties(path);
            Ok(Credentials {
                username: required(properties.remove(USERNAME_PROPERTY), USERNAME_PROPERTY, &source)?,
                token: required(properties.remove(TOKEN_PROPERTY), TOKEN_PROPERTY, &source)?,
                source,
            })
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let source = CredentialSource::Environment;
            Ok(Credentials {
                username: required(std::env::var(USERNAME_ENV).ok(), USERNAME_ENV, &source)?,
                token: required(std::env::var(TOKEN_ENV).ok(), TOKEN_ENV, &source)?,
                source,
            })
        }
        Err(source) => Err(CredentialsError::Read { path, source }),
    }
}

fn required(
    value: Option<String>,
    key: &'static str,
    source: &CredentialSource,
) -> Result<String, CredentialsError> {
    value
        .filter(|value| !value.is_empty())
        .ok_or_else(|| CredentialsError::Missing {
            key,
            source_label: source.to_string(),
        })
}

/// Parse the subset of the Java properties format used for secrets:
/// `key=value` or `key:value` lines, with `#` and `!` comments.
fn parse_properties(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| {
            let split = line.find(['=', ':'])?;
            let (key, value) = line.split_at(split);
            Some((key.trim().to_owned(), value[1..].trim().to_owned()))
        })
        .collect()
}
