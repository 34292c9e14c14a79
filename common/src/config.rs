//! `bindkit.toml` configuration schema and loader.
//!
//! The file declares the consumer package metadata, the release repository
//! and archive format, the target matrix with optional capability
//! overrides, and one `[library.<name>]` table per wrapped library. Library
//! keys are checked against [`WrappedLibrary`] while loading, so an unknown
//! name fails before any build step runs.

use crate::capability::{Capability, CapabilityTable, HostOs};
use crate::error::{CommonError, Result};
use crate::library::WrappedLibrary;
use crate::platform::{Platform, Profile, TargetTuple};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "bindkit.toml";

/// Top-level pipeline configuration.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Consumer package metadata.
    pub package: PackageConfig,
    /// Release publication settings.
    pub release: ReleaseConfig,
    /// Declared target matrix.
    pub matrix: MatrixConfig,
    /// Output and cache locations.
    pub paths: PathsConfig,
    /// Per-library settings keyed by library name.
    #[serde(rename = "library")]
    pub libraries: BTreeMap<String, LibraryConfig>,
}

impl PipelineConfig {
    /// Load and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`CommonError::ConfigRead`] when the file cannot be read and
    /// [`CommonError::ConfigParse`] when it is not valid for the schema or
    /// names an unknown library.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|source| CommonError::ConfigRead {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&source, path)
    }

    /// Parse and validate configuration from a TOML string. `origin` is used
    /// only in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`CommonError::ConfigParse`] when the TOML is malformed or a
    /// library key is not a wrapped library.
    ///
    /// # Examples
    ///
    /// ```
    /// use bindkit_common::config::PipelineConfig;
    /// use camino::Utf8Path;
    ///
    /// let config = PipelineConfig::from_toml_str(
    ///     "[library.askar]\ntag = \"0.2.2-binary\"\n",
    ///     Utf8Path::new("bindkit.toml"),
    /// )
    /// .expect("valid configuration");
    /// assert_eq!(config.libraries().expect("known").len(), 1);
    /// ```
    pub fn from_toml_str(source: &str, origin: &Utf8Path) -> Result<Self> {
        let config: Self = toml::from_str(source).map_err(|err| CommonError::ConfigParse {
            path: origin.to_owned(),
            reason: err.to_string(),
        })?;
        config
            .libraries()
            .map_err(|err| CommonError::ConfigParse {
                path: origin.to_owned(),
                reason: err.to_string(),
            })?;
        Ok(config)
    }

    /// Return the configured libraries as catalogue entries, in catalogue
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`CommonError::UnknownLibrary`] for keys outside the
    /// catalogue.
    pub fn libraries(&self) -> Result<Vec<(WrappedLibrary, &LibraryConfig)>> {
        let mut resolved = self
            .libraries
            .iter()
            .map(|(key, cfg)| key.parse::<WrappedLibrary>().map(|lib| (lib, cfg)))
            .collect::<Result<Vec<_>>>()?;
        resolved.sort_by_key(|(lib, _)| *lib);
        Ok(resolved)
    }

    /// Return the settings for one library, if configured.
    #[must_use]
    pub fn library(&self, library: WrappedLibrary) -> Option<&LibraryConfig> {
        self.libraries.get(library.key()).or_else(|| {
            // Accept the crate-style spelling as well.
            self.libraries.get(library.descriptor().ident)
        })
    }
}

/// Consumer package metadata shared by every rendered manifest.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PackageConfig {
    /// Package name.
    pub name: String,
    /// Swift tools version written at the top of `Package.swift`.
    pub swift_tools_version: String,
    /// Minimum macOS version.
    pub macos: String,
    /// Minimum iOS version.
    pub ios: String,
    /// Android settings.
    pub android: AndroidConfig,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            name: "aries-uniffi-wrappers".to_owned(),
            swift_tools_version: "5.7".to_owned(),
            macos: "10.15".to_owned(),
            ios: "15".to_owned(),
            android: AndroidConfig::default(),
        }
    }
}

/// Android packaging metadata.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AndroidConfig {
    /// Minimum supported SDK level.
    pub min_sdk: u32,
    /// SDK level compiled against.
    pub compile_sdk: u32,
}

impl Default for AndroidConfig {
    fn default() -> Self {
        Self {
            min_sdk: 24,
            compile_sdk: 35,
        }
    }
}

/// Release publication settings.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ReleaseConfig {
    /// `owner/name` of the repository hosting release downloads.
    pub repository: String,
    /// Archive format label (`xcframework.zip` or `tar.zst`).
    pub format: String,
    /// Maven-style registry base URL used by `publish`.
    pub registry: Option<String>,
    /// Maven group used in registry paths.
    pub group: String,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            repository: "hyperledger/aries-uniffi-wrappers".to_owned(),
            format: "xcframework.zip".to_owned(),
            registry: None,
            group: "org.hyperledger".to_owned(),
        }
    }
}

/// The declared target matrix.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct MatrixConfig {
    /// Every target a release must contain.
    pub targets: Vec<TargetTuple>,
    /// Build profile.
    pub profile: Profile,
    /// Overrides applied on top of the stock capability table.
    pub capability: Vec<CapabilityRule>,
}

impl MatrixConfig {
    /// Build the capability table: stock rules plus configured overrides.
    #[must_use]
    pub fn capability_table(&self) -> CapabilityTable {
        self.capability
            .iter()
            .fold(CapabilityTable::default(), |table, rule| {
                table.with(rule.host, rule.platform, rule.capability)
            })
    }
}

/// One capability override.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CapabilityRule {
    /// Build host.
    pub host: HostOs,
    /// Target platform.
    pub platform: Platform,
    /// Capability to apply.
    pub capability: Capability,
}

/// Output and cache locations.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Directory receiving packaged archives.
    pub out_dir: Utf8PathBuf,
    /// Directory receiving generated bindings.
    pub bindings_dir: Utf8PathBuf,
    /// Cargo target directory used by build units.
    pub target_dir: Utf8PathBuf,
    /// Remote artifact cache. Defaults to the platform cache directory.
    pub cache_dir: Option<Utf8PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            out_dir: Utf8PathBuf::from("out"),
            bindings_dir: Utf8PathBuf::from("generated"),
            target_dir: Utf8PathBuf::from("target"),
            cache_dir: None,
        }
    }
}

/// Per-library settings.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LibraryConfig {
    /// Release tag of the pinned remote artifact.
    pub tag: Option<String>,
    /// SHA-256 of the pinned remote artifact.
    pub checksum: Option<String>,
    /// Explicit download URL; derived from the repository and tag when absent.
    pub url: Option<String>,
    /// Archive used when the local override is active.
    pub local_archive: Option<Utf8PathBuf>,
    /// Optional SHA-256 of the local archive.
    pub local_checksum: Option<String>,
    /// Path of the interface description.
    pub interface: Option<Utf8PathBuf>,
    /// Per-library source selection. Not supported: the override is global,
    /// and any value here is rejected during resolution.
    pub source: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SAMPLE: &str = r#"
[package]
name = "wrappers"
ios = "16"

[release]
repository = "example/wrappers"
format = "tar.zst"

[matrix]
targets = ["macos-arm64", "ios-simulator-arm64"]

[[matrix.capability]]
host = "macos"
platform = "linux"
capability = "requires-cross-compiler"

[library.indy-vdr]
tag = "0.2.1-binary"
checksum = "fcaf8df60f41a149d1f496e494499f8645f971a68e9c024b0498271756180a4e"
local_archive = "indy-vdr/out/indy_vdr_uniffiFFI.xcframework.zip"

[library.anoncreds]
tag = "0.2.3-binary"
"#;

    fn parse(source: &str) -> Result<PipelineConfig> {
        PipelineConfig::from_toml_str(source, Utf8Path::new("bindkit.toml"))
    }

    #[rstest]
    fn parses_sample_configuration() {
        let config = parse(SAMPLE).expect("sample parses");

        assert_eq!(config.package.name, "wrappers");
        assert_eq!(config.package.ios, "16");
        assert_eq!(config.package.macos, "10.15");
        assert_eq!(config.release.format, "tar.zst");
        assert_eq!(config.matrix.targets.len(), 2);
        assert_eq!(config.matrix.profile, Profile::Release);
    }

    #[rstest]
    fn libraries_are_returned_in_catalogue_order() {
        let config = parse(SAMPLE).expect("sample parses");
        let libs: Vec<_> = config
            .libraries()
            .expect("known")
            .into_iter()
            .map(|(lib, _)| lib)
            .collect();
        assert_eq!(libs, vec![WrappedLibrary::Anoncreds, WrappedLibrary::IndyVdr]);
    }

    #[rstest]
    fn capability_overrides_apply() {
        let config = parse(SAMPLE).expect("sample parses");
        let table = config.matrix.capability_table();
        assert_eq!(
            table.capability(HostOs::MacOs, Platform::Linux),
            Capability::RequiresCrossCompiler
        );
    }

    #[rstest]
    fn rejects_unknown_library_at_load() {
        let err = parse("[library.sqlite]\ntag = \"1.0.0\"\n").expect_err("unknown library");
        assert!(err.to_string().contains("sqlite"), "unexpected: {err}");
    }

    #[rstest]
    #[case::unknown_field("[package]\ncolour = \"blue\"\n")]
    #[case::bad_target("[matrix]\ntargets = [\"ios-x86\"]\n")]
    #[case::bad_capability(
        "[[matrix.capability]]\nhost = \"macos\"\nplatform = \"linux\"\ncapability = \"maybe\"\n"
    )]
    fn rejects_invalid_documents(#[case] source: &str) {
        assert!(matches!(parse(source), Err(CommonError::ConfigParse { .. })));
    }

    #[rstest]
    fn lookup_accepts_both_spellings() {
        let config = parse("[library.indy_vdr]\ntag = \"0.2.1-binary\"\n").expect("parses");
        assert!(config.library(WrappedLibrary::IndyVdr).is_some());
    }

    #[rstest]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::try_from(dir.path().join("missing.toml")).expect("utf8");
        assert!(matches!(
            PipelineConfig::load(&path),
            Err(CommonError::ConfigRead { .. })
        ));
    }
}
