//! Artefact naming, manifest schema, packaging, storage, and retrieval.
//!
//! # Sub-modules
//!
//! - [`checksum`]: SHA-256 checksum newtype and file verification.
//! - [`error`]: validation errors for artefact values.
//! - [`extraction`]: manifest reading and unpacking with path traversal
//!   protection.
//! - [`fetch`]: download trait, HTTP implementation, retry and cancellation.
//! - [`manifest`]: the `artifact-manifest.json` schema.
//! - [`naming`]: archive formats and file names.
//! - [`packaging`]: archive creation and manifest emission.
//! - [`packaging_error`]: packaging failures.
//! - [`release_tag`]: release tag newtype.
//! - [`schema_version`]: manifest schema version newtype.
//! - [`store`]: immutable, versioned artefact storage.
//! - [`xcframework`]: Apple framework bundle layout and universal binaries.

pub mod checksum;
pub mod error;
pub mod extraction;
pub mod fetch;
pub mod manifest;
pub mod naming;
pub mod packaging;
pub mod packaging_error;
pub mod release_tag;
pub mod schema_version;
pub mod store;
pub mod xcframework;
