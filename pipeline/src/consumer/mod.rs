//! The consumer side of the pipeline: which artefact each binding module
//! links against.
//!
//! - [`manifest`]: per-library declarations loaded from `bindkit.toml`.
//! - [`override_mode`]: the global local-override switch.
//! - [`cache`]: content-addressed, verified download cache.
//! - [`resolver`]: one verified artefact per library.

pub mod cache;
pub mod error;
pub mod manifest;
pub mod override_mode;
pub mod resolver;

pub use error::ResolveError;
pub use manifest::{ConsumerManifest, LibraryEntry};
pub use override_mode::{OVERRIDE_ENV_VAR, OverrideMode, RequestedSource};
pub use resolver::{ArtifactSource, ResolvedArtifact, Resolver};
