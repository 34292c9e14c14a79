//! Catalogue of the wrapped native libraries.
//!
//! The set of libraries is closed: credentials (`anoncreds`), secure storage
//! (`askar`), and the ledger client (`indy-vdr`). Each variant maps to a
//! static [`LibraryDescriptor`] so that callers never search a mutable list
//! by name; unknown names are rejected when parsed.

use crate::error::{CommonError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Kind of foreign-function binding produced for a library.
///
/// The kind becomes part of the crate name and the published archive name
/// (`<library>_<kind>FFI.<format>`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BindingKind {
    /// Bindings generated from a UniFFI-style interface description.
    #[default]
    Uniffi,
}

impl BindingKind {
    /// Return the lowercase identifier used in crate and archive names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uniffi => "uniffi",
        }
    }
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options forwarded to the binding generator for one library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindgenOptions {
    /// Package (Kotlin) or module namespace used in generated code.
    pub package_name: &'static str,
    /// Name of the compiled dynamic library the bindings load.
    pub cdylib_name: &'static str,
    /// Whether generated Kotlin should avoid `java.lang.ref.Cleaner` and
    /// rely on explicit `close()` only.
    pub disable_java_cleaner: bool,
}

/// Static build and packaging facts about one wrapped library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibraryDescriptor {
    /// Short identifier used in archive names (`anoncreds`, `askar`, `indy_vdr`).
    pub ident: &'static str,
    /// Host-language module name (`Anoncreds`, `Askar`, `IndyVdr`).
    pub module_name: &'static str,
    /// Directory of the Rust wrapper crate, relative to the workspace root.
    pub crate_dir: &'static str,
    /// Hand-maintained Swift wrapper sources.
    pub swift_source_path: &'static str,
    /// Swift test target sources.
    pub swift_test_path: &'static str,
    /// Resource files bundled with the test target.
    pub test_resources: &'static [&'static str],
    /// Gradle project directory for the Kotlin multiplatform module.
    pub gradle_project_dir: &'static str,
    /// Options for the binding generator.
    pub bindgen: BindgenOptions,
}

const ANONCREDS: LibraryDescriptor = LibraryDescriptor {
    ident: "anoncreds",
    module_name: "Anoncreds",
    crate_dir: "anoncreds",
    swift_source_path: "swift/Sources/Anoncreds",
    swift_test_path: "swift/Tests/AnoncredsTests",
    test_resources: &[],
    gradle_project_dir: "anoncreds",
    bindgen: BindgenOptions {
        package_name: "anoncreds_uniffi",
        cdylib_name: "anoncreds_uniffi",
        disable_java_cleaner: true,
    },
};

const ASKAR: LibraryDescriptor = LibraryDescriptor {
    ident: "askar",
    module_name: "Askar",
    crate_dir: "askar",
    swift_source_path: "swift/Sources/Askar",
    swift_test_path: "swift/Tests/AskarTests",
    test_resources: &["resources/indy_wallet_sqlite.db"],
    gradle_project_dir: "askar",
    bindgen: BindgenOptions {
        package_name: "askar_uniffi",
        cdylib_name: "askar_uniffi",
        disable_java_cleaner: true,
    },
};

const INDY_VDR: LibraryDescriptor = LibraryDescriptor {
    ident: "indy_vdr",
    module_name: "IndyVdr",
    crate_dir: "indy-vdr",
    swift_source_path: "swift/Sources/IndyVdr",
    swift_test_path: "swift/Tests/IndyVdrTests",
    test_resources: &["resources/genesis_sov_buildernet.txn"],
    gradle_project_dir: "indy-vdr",
    bindgen: BindgenOptions {
        package_name: "indy_vdr_uniffi",
        cdylib_name: "indy_vdr_uniffi",
        disable_java_cleaner: false,
    },
};

/// One of the externally maintained native libraries wrapped by the pipeline.
///
/// # Examples
///
/// ```
/// use bindkit_common::library::WrappedLibrary;
///
/// let lib: WrappedLibrary = "indy-vdr".parse().expect("known library");
/// assert_eq!(lib.crate_name(), "indy_vdr_uniffi");
/// assert_eq!(lib.binary_target_name(), "indy_vdr_uniffiFFI");
/// assert!("sqlite".parse::<WrappedLibrary>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WrappedLibrary {
    /// Anonymous credentials.
    Anoncreds,
    /// Secure storage / wallet engine.
    Askar,
    /// Distributed-ledger verification client.
    IndyVdr,
}

impl WrappedLibrary {
    /// Every wrapped library, in declaration order.
    pub const ALL: [Self; 3] = [Self::Anoncreds, Self::Askar, Self::IndyVdr];

    /// Return the static descriptor for this library.
    #[must_use]
    pub const fn descriptor(self) -> &'static LibraryDescriptor {
        match self {
            Self::Anoncreds => &ANONCREDS,
            Self::Askar => &ASKAR,
            Self::IndyVdr => &INDY_VDR,
        }
    }

    /// Return the configuration key for this library (`anoncreds`,
    /// `askar`, `indy-vdr`).
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Anoncreds => "anoncreds",
            Self::Askar => "askar",
            Self::IndyVdr => "indy-vdr",
        }
    }

    /// Return the wrapper crate name, e.g. `askar_uniffi`.
    #[must_use]
    pub fn crate_name(self) -> String {
        format!("{}_{}", self.descriptor().ident, BindingKind::default())
    }

    /// Return the binary-target name consumers link against, e.g.
    /// `askar_uniffiFFI`.
    #[must_use]
    pub fn binary_target_name(self) -> String {
        format!("{}FFI", self.crate_name())
    }

    /// Return the host-language module name.
    #[must_use]
    pub const fn module_name(self) -> &'static str {
        self.descriptor().module_name
    }
}

impl fmt::Display for WrappedLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for WrappedLibrary {
    type Err = CommonError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim() {
            "anoncreds" => Ok(Self::Anoncreds),
            "askar" => Ok(Self::Askar),
            "indy-vdr" | "indy_vdr" => Ok(Self::IndyVdr),
            other => Err(CommonError::UnknownLibrary {
                value: other.to_owned(),
                expected: Self::ALL
                    .iter()
                    .map(|lib| lib.key())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

impl Serialize for WrappedLibrary {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

impl<'de> Deserialize<'de> for WrappedLibrary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
