//! bindkit pipeline library.
//!
//! This crate compiles the wrapped native libraries per target, generates
//! Swift and Kotlin bindings from their interface descriptions, packages the
//! binaries into checksummed archives, and wires consumer manifests to
//! either a pinned remote release or a local override. It backs the
//! `bindkit` CLI binary and can be driven programmatically.
//!
//! # Modules
//!
//! - [`artefact`] - Archive naming, manifests, packaging, storage, and fetch
//! - [`builder`] - Native build units driving `cargo` or `cross`
//! - [`cli`] - Command-line argument definitions
//! - [`consumer`] - Consumer manifests, the local override, and resolution
//! - [`credentials`] - Publishing credentials from `local.properties` or env
//! - [`error`] - Top-level error type and failure categories
//! - [`flow`] - Command flows behind each subcommand
//! - [`graph`] - Build task graph and level-parallel scheduler
//! - [`interface`] - Interface descriptions and binding generation
//! - [`output`] - Progress output on stderr
//! - [`publish`] - Maven-layout registry uploads
//! - [`render`] - `Package.swift` and `settings.gradle.kts` rendering

pub mod artefact;
pub mod builder;
pub mod cli;
pub mod consumer;
pub mod credentials;
pub mod error;
pub mod flow;
pub mod graph;
pub mod interface;
pub mod output;
pub mod publish;
pub mod render;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
