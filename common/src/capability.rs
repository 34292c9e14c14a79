//! Host capability table for cross-compilation planning.
//!
//! Whether a target platform can be built depends on the host operating
//! system. Rather than branching on the host at each build step, the rules
//! live in a [`CapabilityTable`] that maps `(host, platform)` to a
//! [`Capability`] and is evaluated once against the declared matrix,
//! producing a [`BuildMatrix`].

use crate::error::{CommonError, Result};
use crate::platform::{Platform, TargetTuple};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Operating system of the machine running the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostOs {
    /// macOS build host.
    MacOs,
    /// Linux build host.
    Linux,
    /// Windows build host.
    Windows,
}

impl HostOs {
    /// Detect the host this binary was compiled for.
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Linux
        }
    }
}

impl fmt::Display for HostOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MacOs => "macos",
            Self::Linux => "linux",
            Self::Windows => "windows",
        })
    }
}

impl FromStr for HostOs {
    type Err = CommonError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "macos" => Ok(Self::MacOs),
            "linux" => Ok(Self::Linux),
            "windows" => Ok(Self::Windows),
            other => Err(CommonError::UnknownHost {
                value: other.to_owned(),
            }),
        }
    }
}

/// Whether and how a host can produce binaries for a target platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    /// The host toolchain builds the target directly.
    Supported,
    /// The target is skipped on this host.
    Excluded,
    /// The target needs a containerised cross compiler.
    RequiresCrossCompiler,
}

/// The tool used to compile one planned target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildTool {
    /// Plain `cargo`.
    Cargo,
    /// `cross`, a drop-in cargo replacement running in a container.
    Cross,
}

impl BuildTool {
    /// Return the executable name.
    #[must_use]
    pub const fn program(self) -> &'static str {
        match self {
            Self::Cargo => "cargo",
            Self::Cross => "cross",
        }
    }
}

/// Mapping from `(host, platform)` to [`Capability`].
///
/// Pairs absent from the table are treated as [`Capability::Excluded`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityTable {
    entries: BTreeMap<(HostOs, Platform), Capability>,
}

impl CapabilityTable {
    /// Create an empty table.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Set the capability for one `(host, platform)` pair, replacing any
    /// previous value.
    #[must_use]
    pub fn with(mut self, host: HostOs, platform: Platform, capability: Capability) -> Self {
        self.entries.insert((host, platform), capability);
        self
    }

    /// Look up the capability for a pair.
    #[must_use]
    pub fn capability(&self, host: HostOs, platform: Platform) -> Capability {
        self.entries
            .get(&(host, platform))
            .copied()
            .unwrap_or(Capability::Excluded)
    }

    /// Evaluate the table once for `host` against the declared targets.
    ///
    /// Targets are kept in declaration order; excluded targets are reported
    /// separately so callers can tell the user what was skipped.
    #[must_use]
    pub fn plan(&self, host: HostOs, declared: &[TargetTuple]) -> BuildMatrix {
        let mut buildable = Vec::new();
        let mut excluded = Vec::new();
        for tuple in declared {
            match self.capability(host, tuple.platform()) {
                Capability::Supported => buildable.push(PlannedTarget {
                    tuple: *tuple,
                    tool: BuildTool::Cargo,
                }),
                Capability::RequiresCrossCompiler => buildable.push(PlannedTarget {
                    tuple: *tuple,
                    tool: BuildTool::Cross,
                }),
                Capability::Excluded => {
                    debug!("excluding {tuple} on {host} host");
                    excluded.push(*tuple);
                }
            }
        }
        BuildMatrix {
            host,
            buildable,
            excluded,
        }
    }
}

impl Default for CapabilityTable {
    /// The stock rules: Apple targets build only on macOS; Linux and
    /// Windows desktop binaries are produced with `cross` off their native
    /// host and skipped on macOS; Android builds everywhere, through `cross`
    /// on Windows.
    fn default() -> Self {
        use Capability::{Excluded, RequiresCrossCompiler, Supported};
        use HostOs as H;
        use Platform as P;

        Self::empty()
            .with(H::MacOs, P::MacOs, Supported)
            .with(H::MacOs, P::Ios, Supported)
            .with(H::MacOs, P::IosSimulator, Supported)
            .with(H::MacOs, P::Android, Supported)
            .with(H::MacOs, P::Linux, Excluded)
            .with(H::MacOs, P::Windows, Excluded)
            .with(H::Linux, P::Linux, RequiresCrossCompiler)
            .with(H::Linux, P::Windows, RequiresCrossCompiler)
            .with(H::Linux, P::Android, Supported)
            .with(H::Windows, P::Windows, Supported)
            .with(H::Windows, P::Linux, RequiresCrossCompiler)
            .with(H::Windows, P::Android, RequiresCrossCompiler)
    }
}

/// One target the current host will build, with the tool to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlannedTarget {
    /// The target tuple.
    pub tuple: TargetTuple,
    /// Compiler front end for this tuple.
    pub tool: BuildTool,
}

/// Result of evaluating a [`CapabilityTable`] for one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildMatrix {
    /// Host the matrix was evaluated for.
    pub host: HostOs,
    /// Targets to build, in declaration order.
    pub buildable: Vec<PlannedTarget>,
    /// Declared targets skipped on this host.
    pub excluded: Vec<TargetTuple>,
}

impl BuildMatrix {
    /// Return the buildable tuples without their tools.
    #[must_use]
    pub fn tuples(&self) -> Vec<TargetTuple> {
        self.buildable.iter().map(|t| t.tuple).collect()
    }
}
