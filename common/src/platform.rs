//! Platform, architecture, and build-profile model.
//!
//! A [`TargetTuple`] pairs a [`Platform`] with an [`Architecture`] and is
//! only constructible for combinations that have a Rust compilation target.
//! Tuples have a stable textual label (`macos-arm64`, `ios-simulator-arm64`)
//! used in configuration files, archive layouts, and error messages.

use crate::error::{CommonError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Operating system a native library is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Platform {
    /// macOS desktop.
    MacOs,
    /// iOS devices.
    Ios,
    /// iOS simulator.
    IosSimulator,
    /// Linux desktop/server.
    Linux,
    /// Windows desktop (MinGW toolchain).
    Windows,
    /// Android devices and emulators.
    Android,
}

/// Coarse grouping of platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformFamily {
    /// Desktop operating systems.
    Desktop,
    /// Mobile operating systems.
    Mobile,
    /// Simulators running on a desktop host.
    Simulator,
}

impl Platform {
    /// Every platform, in matrix order.
    pub const ALL: [Self; 6] = [
        Self::MacOs,
        Self::Ios,
        Self::IosSimulator,
        Self::Linux,
        Self::Windows,
        Self::Android,
    ];

    /// Return the configuration label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MacOs => "macos",
            Self::Ios => "ios",
            Self::IosSimulator => "ios-simulator",
            Self::Linux => "linux",
            Self::Windows => "windows",
            Self::Android => "android",
        }
    }

    /// Return the family this platform belongs to.
    #[must_use]
    pub const fn family(self) -> PlatformFamily {
        match self {
            Self::MacOs | Self::Linux | Self::Windows => PlatformFamily::Desktop,
            Self::Ios | Self::Android => PlatformFamily::Mobile,
            Self::IosSimulator => PlatformFamily::Simulator,
        }
    }

    /// Whether binaries for this platform are linked through an Apple
    /// framework bundle.
    #[must_use]
    pub const fn is_apple(self) -> bool {
        matches!(self, Self::MacOs | Self::Ios | Self::IosSimulator)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = CommonError;

    fn from_str(value: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == value)
            .ok_or_else(|| CommonError::UnknownPlatform {
                value: value.to_owned(),
            })
    }
}

impl<'de> Deserialize<'de> for Platform {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// CPU architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Architecture {
    /// 64-bit x86.
    X86_64,
    /// 64-bit ARM.
    Aarch64,
    /// 32-bit ARMv7.
    Armv7,
    /// 32-bit x86.
    I686,
}

impl Architecture {
    /// Every architecture.
    pub const ALL: [Self; 4] = [Self::X86_64, Self::Aarch64, Self::Armv7, Self::I686];

    /// Return the short label used in tuple labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::X86_64 => "x64",
            Self::Aarch64 => "arm64",
            Self::Armv7 => "armv7",
            Self::I686 => "x86",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Architecture {
    type Err = CommonError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "x64" | "x86_64" => Ok(Self::X86_64),
            "arm64" | "aarch64" => Ok(Self::Aarch64),
            "armv7" => Ok(Self::Armv7),
            "x86" | "i686" => Ok(Self::I686),
            other => Err(CommonError::UnknownArchitecture {
                value: other.to_owned(),
            }),
        }
    }
}

/// Cargo build profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Unoptimised build.
    Debug,
    /// Optimised build.
    #[default]
    Release,
}

impl Profile {
    /// Return the cargo output directory name.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for Profile {
    type Err = CommonError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "debug" => Ok(Self::Debug),
            "release" => Ok(Self::Release),
            other => Err(CommonError::UnknownProfile {
                value: other.to_owned(),
            }),
        }
    }
}

/// A (platform, architecture) pair with a known compilation target.
///
/// # Examples
///
/// ```
/// use bindkit_common::platform::TargetTuple;
///
/// let tuple: TargetTuple = "ios-simulator-arm64".parse().expect("valid tuple");
/// assert_eq!(tuple.rust_triple(), "aarch64-apple-ios-sim");
/// assert_eq!(tuple.to_string(), "ios-simulator-arm64");
/// assert!("windows-armv7".parse::<TargetTuple>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetTuple {
    platform: Platform,
    architecture: Architecture,
    triple: &'static str,
}

impl TargetTuple {
    /// Construct a tuple, rejecting combinations with no Rust target.
    ///
    /// # Errors
    ///
    /// Returns [`CommonError::UnsupportedTuple`] for combinations such as
    /// `windows-armv7`.
    pub fn new(platform: Platform, architecture: Architecture) -> Result<Self> {
        rust_triple_for(platform, architecture)
            .map(|triple| Self {
                platform,
                architecture,
                triple,
            })
            .ok_or_else(|| CommonError::UnsupportedTuple {
                platform: platform.to_string(),
                architecture: architecture.to_string(),
            })
    }

    /// Return the platform.
    #[must_use]
    pub const fn platform(&self) -> Platform {
        self.platform
    }

    /// Return the architecture.
    #[must_use]
    pub const fn architecture(&self) -> Architecture {
        self.architecture
    }

    /// Return the Rust target triple.
    #[must_use]
    pub const fn rust_triple(&self) -> &'static str {
        self.triple
    }

    /// Return the file name of the compiled library for `crate_name`.
    ///
    /// Apple platforms link static archives into framework bundles; every
    /// other platform loads a dynamic library at runtime.
    #[must_use]
    pub fn library_file_name(&self, crate_name: &str) -> String {
        match self.platform {
            Platform::MacOs | Platform::Ios | Platform::IosSimulator => {
                format!("lib{crate_name}.a")
            }
            Platform::Windows => format!("{crate_name}.dll"),
            Platform::Linux | Platform::Android => format!("lib{crate_name}.so"),
        }
    }

    /// Return the JVM resource classifier for desktop targets, used when
    /// publishing per-platform jars.
    #[must_use]
    pub const fn jvm_classifier(&self) -> Option<&'static str> {
        match (self.platform, self.architecture) {
            (Platform::MacOs, Architecture::Aarch64) => Some("darwin-aarch64"),
            (Platform::MacOs, Architecture::X86_64) => Some("darwin-x86-64"),
            (Platform::Linux, Architecture::Aarch64) => Some("linux-aarch64"),
            (Platform::Linux, Architecture::X86_64) => Some("linux-x86-64"),
            (Platform::Windows, Architecture::X86_64) => Some("win32-x86-64"),
            _ => None,
        }
    }
}

fn rust_triple_for(platform: Platform, architecture: Architecture) -> Option<&'static str> {
    use Architecture::{Aarch64, Armv7, I686, X86_64};
    use Platform::{Android, Ios, IosSimulator, Linux, MacOs, Windows};

    match (platform, architecture) {
        (MacOs, X86_64) => Some("x86_64-apple-darwin"),
        (MacOs, Aarch64) => Some("aarch64-apple-darwin"),
        (Ios, Aarch64) => Some("aarch64-apple-ios"),
        (IosSimulator, Aarch64) => Some("aarch64-apple-ios-sim"),
        (IosSimulator, X86_64) => Some("x86_64-apple-ios"),
        (Linux, X86_64) => Some("x86_64-unknown-linux-gnu"),
        (Linux, Aarch64) => Some("aarch64-unknown-linux-gnu"),
        (Windows, X86_64) => Some("x86_64-pc-windows-gnu"),
        (Android, Aarch64) => Some("aarch64-linux-android"),
        (Android, Armv7) => Some("armv7-linux-androideabi"),
        (Android, X86_64) => Some("x86_64-linux-android"),
        (Android, I686) => Some("i686-linux-android"),
        _ => None,
    }
}

impl fmt::Display for TargetTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.platform, self.architecture)
    }
}

impl FromStr for TargetTuple {
    type Err = CommonError;

    fn from_str(value: &str) -> Result<Self> {
        let (platform, architecture) =
            value
                .rsplit_once('-')
                .ok_or_else(|| CommonError::UnknownPlatform {
                    value: value.to_owned(),
                })?;
        Self::new(platform.parse()?, architecture.parse()?)
    }
}

impl Serialize for TargetTuple {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TargetTuple {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
