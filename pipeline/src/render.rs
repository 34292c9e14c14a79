//! Rendering of consumer manifests.
//!
//! `Package.swift` wires each hand-maintained wrapper target to the binary
//! target resolved for its library: remote by URL and checksum, or local by
//! path, never both. `settings.gradle.kts` includes one Gradle project per
//! library. Output depends only on the inputs, so re-rendering an unchanged
//! configuration rewrites nothing.

use crate::consumer::manifest::ConsumerManifest;
use crate::consumer::resolver::{ArtifactSource, ResolvedArtifact};
use bindkit_common::WrappedLibrary;
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use log::debug;
use std::fs;
use std::io;
use thiserror::Error;

/// File name of the Swift package manifest.
pub const PACKAGE_SWIFT: &str = "Package.swift";
/// File name of the Gradle settings script.
pub const SETTINGS_GRADLE: &str = "settings.gradle.kts";

/// Errors raised while rendering or writing consumer manifests.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A configured library has no resolved artefact.
    #[error("no artefact was resolved for {library}")]
    Unresolved {
        /// The library.
        library: WrappedLibrary,
    },

    /// A rendered file could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Destination path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Render `Package.swift` for the manifest and its resolved artefacts.
///
/// Local archives are written relative to `package_dir`, the directory the
/// rendered file will live in, because `SwiftPM` resolves `binaryTarget`
/// paths against the package root.
///
/// # Errors
///
/// Returns [`RenderError::Unresolved`] when a library in the manifest has
/// no entry in `resolved`.
pub fn render_package_swift(
    manifest: &ConsumerManifest,
    resolved: &[ResolvedArtifact],
    package_dir: &Utf8Path,
) -> Result<String, RenderError> {
    let package = &manifest.package;
    let mut out = String::new();
    push(&mut out, &format!("// swift-tools-version: {}", package.swift_tools_version));
    push(&mut out, "import PackageDescription");
    push(&mut out, "");
    push(&mut out, "let package = Package(");
    push(&mut out, &format!("  name: \"{}\",", package.name));
    push(&mut out, "  platforms: [");
    push(&mut out, &format!("    .macOS(.v{}),", swift_version(&package.macos)));
    push(&mut out, &format!("    .iOS(.v{}),", swift_version(&package.ios)));
    push(&mut out, "  ],");
    push(&mut out, "  products: [");
    for entry in &manifest.entries {
        let module = entry.library.module_name();
        push(&mut out, "    .library(");
        push(&mut out, &format!("      name: \"{module}\","));
        push(&mut out, &format!("      targets: [\"{module}\"]),"));
    }
    push(&mut out, "  ],");
    push(&mut out, "  dependencies: [],");
    push(&mut out, "  targets: [");
    for entry in &manifest.entries {
        let artifact = resolved
            .iter()
            .find(|artifact| artifact.library == entry.library)
            .ok_or(RenderError::Unresolved {
                library: entry.library,
            })?;
        let module = entry.library.module_name();
        push(&mut out, "    .target(");
        push(&mut out, &format!("      name: \"{module}\","));
        push(&mut out, &format!("      dependencies: [\"{}\"],", entry.binary_target));
        push(&mut out, &format!("      path: \"{}\"),", entry.source_path));

        let test = &entry.test_target;
        push(&mut out, "    .testTarget(");
        push(&mut out, &format!("      name: \"{}\",", test.name));
        push(&mut out, &format!("      dependencies: [\"{module}\"],"));
        if test.resources.is_empty() {
            push(&mut out, &format!("      path: \"{}\"),", test.path));
        } else {
            push(&mut out, &format!("      path: \"{}\",", test.path));
            push(&mut out, "      resources: [");
            for resource in &test.resources {
                push(&mut out, &format!("        .copy(\"{resource}\"),"));
            }
            push(&mut out, "      ]),");
        }

        push(&mut out, "    .binaryTarget(");
        push(&mut out, &format!("      name: \"{}\",", entry.binary_target));
        match &artifact.source {
            ArtifactSource::Remote { url, checksum, .. } => {
                push(&mut out, &format!("      url: \"{url}\","));
                push(&mut out, &format!("      checksum: \"{checksum}\"),"));
            }
            ArtifactSource::Local { path } => {
                let path = relative_to(path, package_dir);
                push(&mut out, &format!("      path: \"{path}\"),"));
            }
        }
    }
    push(&mut out, "  ]");
    push(&mut out, ")");
    Ok(out)
}

/// `target` relative to `base`, compared component by component without
/// touching the filesystem.
fn relative_to(target: &Utf8Path, base: &Utf8Path) -> Utf8PathBuf {
    if target.has_root() != base.has_root() {
        debug!("cannot express {target} relative to {base}; rendering it unchanged");
        return target.to_owned();
    }
    let target_parts = normal_components(target);
    let base_parts = normal_components(base);
    let common = target_parts
        .iter()
        .zip(&base_parts)
        .take_while(|(a, b)| a == b)
        .count();
    let mut relative = Utf8PathBuf::new();
    for _ in common..base_parts.len() {
        relative.push("..");
    }
    for part in target_parts.iter().skip(common) {
        relative.push(part.as_str());
    }
    relative
}

fn normal_components(path: &Utf8Path) -> Vec<Utf8Component<'_>> {
    path.components()
        .filter(|part| !matches!(part, Utf8Component::CurDir))
        .collect()
}

/// Render `settings.gradle.kts` including one project per library.
#[must_use]
pub fn render_settings_gradle(manifest: &ConsumerManifest) -> String {
    let mut out = String::new();
    push(&mut out, &format!("rootProject.name = \"{}\"", manifest.package.name));
    push(&mut out, "");
    push(&mut out, "pluginManagement {");
    push(&mut out, "    repositories {");
    push(&mut out, "        google()");
    push(&mut out, "        gradlePluginPortal()");
    push(&mut out, "        mavenCentral()");
    push(&mut out, "    }");
    push(&mut out, "}");
    push(&mut out, "");
    push(&mut out, "dependencyResolutionManagement {");
    push(&mut out, "    repositories {");
    push(&mut out, "        google()");
    push(&mut out, "        mavenCentral()");
    push(&mut out, "    }");
    push(&mut out, "}");
    push(&mut out, "");
    for entry in &manifest.entries {
        let dir = entry.library.descriptor().gradle_project_dir;
        push(&mut out, &format!("include(\":{dir}\")"));
        push(
            &mut out,
            &format!("project(\":{dir}\").name = \"{}\"", entry.library.crate_name()),
        );
    }
    out
}

fn push(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}

/// `10.15` → `10_15`, the form SwiftPM uses in version constants.
fn swift_version(version: &str) -> String {
    version.replace('.', "_")
}

/// Write `contents` to `path` unless it already holds exactly that.
/// Returns whether the file was written.
///
/// # Errors
///
/// Returns [`RenderError::Write`] when the file cannot be written.
pub fn write_if_changed(path: &Utf8Path, contents: &str) -> Result<bool, RenderError> {
    if fs::read(path).is_ok_and(|existing| existing == contents.as_bytes()) {
        debug!("{path} is up to date");
        return Ok(false);
    }
    let write_err = |source| RenderError::Write {
        path: path.to_owned(),
        source,
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(path, contents).map_err(write_err)?;
    Ok(true)
}
