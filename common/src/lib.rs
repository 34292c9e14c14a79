//! Shared domain model for the bindkit pipeline: the fixed catalogue of
//! wrapped native libraries, the platform/architecture matrix, the host
//! capability table, and the `bindkit.toml` configuration schema.

pub mod capability;
pub mod config;
pub mod error;
pub mod library;
pub mod platform;

pub use capability::{BuildMatrix, BuildTool, Capability, CapabilityTable, HostOs, PlannedTarget};
pub use config::{
    AndroidConfig, CONFIG_FILE_NAME, CapabilityRule, LibraryConfig, MatrixConfig, PackageConfig,
    PathsConfig, PipelineConfig, ReleaseConfig,
};
pub use error::{CommonError, Result};
pub use library::{BindgenOptions, BindingKind, LibraryDescriptor, WrappedLibrary};
pub use platform::{Architecture, Platform, PlatformFamily, Profile, TargetTuple};
