//! Behaviour-driven tests for packaging native binaries into archives.
//!
//! Uses the rstest-bdd v0.5.0 mutable world pattern.

use bindkit_common::{Profile, TargetTuple, WrappedLibrary};
use bindkit_pipeline::artefact::checksum::Checksum;
use bindkit_pipeline::artefact::manifest::GeneratedAt;
use bindkit_pipeline::artefact::naming::{ArchiveFormat, ArtefactName};
use bindkit_pipeline::artefact::packaging::{PackageParams, PackagedArtifact, package_artefact};
use bindkit_pipeline::artefact::packaging_error::PackagingError;
use bindkit_pipeline::artefact::release_tag::ReleaseTag;
use bindkit_pipeline::builder::NativeLibraryTarget;
use bindkit_pipeline::interface::InterfaceStamp;
use bindkit_pipeline::test_utils::write_fake_binary;
use camino::Utf8PathBuf;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// World types
// ---------------------------------------------------------------------------

struct PackagingWorld {
    _dir: TempDir,
    root: Utf8PathBuf,
    library: WrappedLibrary,
    interface: InterfaceStamp,
    declared: Vec<TargetTuple>,
    binaries: Vec<NativeLibraryTarget>,
    outcomes: Vec<Result<PackagedArtifact, PackagingError>>,
}

#[fixture]
fn world() -> PackagingWorld {
    let dir = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 path");
    PackagingWorld {
        _dir: dir,
        root,
        library: WrappedLibrary::Askar,
        interface: InterfaceStamp {
            version: "0.2.2".to_owned(),
            digest: Checksum::of_bytes(b"wrapper interface"),
        },
        declared: Vec::new(),
        binaries: Vec::new(),
        outcomes: Vec::new(),
    }
}

fn parse_tuples(labels: &str) -> Vec<TargetTuple> {
    labels
        .split(',')
        .map(|label| label.trim().parse().expect("valid tuple"))
        .collect()
}

/// Package the world's library from its binaries into `out`.
fn run_packaging(world: &mut PackagingWorld, out: &str) {
    let params = PackageParams {
        library: world.library,
        release_tag: ReleaseTag::try_from("0.2.2-binary").expect("valid tag"),
        format: ArchiveFormat::XcframeworkZip,
        declared: world.declared.clone(),
        binaries: world.binaries.clone(),
        interface: world.interface.clone(),
        output_dir: world.root.join(out),
        generated_at: GeneratedAt::new("2026-02-03T00:00:00Z"),
        ffi_header: None,
    };
    world.outcomes.push(package_artefact(&params));
}

fn packaged(world: &PackagingWorld, index: usize) -> &PackagedArtifact {
    match world.outcomes.get(index).expect("packaging ran") {
        Ok(packaged) => packaged,
        Err(err) => panic!("packaging failed: {err}"),
    }
}

// ---------------------------------------------------------------------------
// Step definitions
// ---------------------------------------------------------------------------

#[given("the library \"{name}\"")]
fn given_library(world: &mut PackagingWorld, name: String) {
    world.library = name.parse().expect("known library");
}

#[given("the declared targets \"{labels}\"")]
fn given_declared_targets(world: &mut PackagingWorld, labels: String) {
    world.declared = parse_tuples(&labels);
}

#[given("binaries for \"{labels}\"")]
fn given_binaries(world: &mut PackagingWorld, labels: String) {
    for tuple in parse_tuples(&labels) {
        let library = world.library;
        let path = world
            .root
            .join("target")
            .join(tuple.rust_triple())
            .join("release")
            .join(tuple.library_file_name(&library.crate_name()));
        write_fake_binary(&path, &world.interface.digest, tuple.to_string().as_bytes());
        world.binaries.push(NativeLibraryTarget {
            library,
            tuple,
            profile: Profile::Release,
            binary: path,
        });
    }
}

#[when("the library is packaged")]
fn when_packaged(world: &mut PackagingWorld) {
    run_packaging(world, "dist");
}

#[when("the library is packaged twice into separate directories")]
fn when_packaged_twice(world: &mut PackagingWorld) {
    run_packaging(world, "first");
    run_packaging(world, "second");
}

#[then("the archive \"{file}\" is produced")]
fn then_archive_produced(world: &mut PackagingWorld, file: String) {
    let packaged = packaged(world, 0);
    assert_eq!(packaged.file_name, file);
    assert!(packaged.archive_path.is_file(), "archive must exist");
}

#[then("the archive manifest lists {count} targets")]
fn then_manifest_lists(world: &mut PackagingWorld, count: usize) {
    assert_eq!(packaged(world, 0).manifest.targets().len(), count);
}

#[then("the manifest places \"{label}\" at \"{path}\"")]
fn then_manifest_places(world: &mut PackagingWorld, label: String, path: String) {
    let tuple: TargetTuple = label.parse().expect("valid tuple");
    let entry = packaged(world, 0)
        .manifest
        .entry(tuple)
        .unwrap_or_else(|| panic!("no manifest entry for {label}"));
    assert_eq!(entry.path, path);
}

#[then("packaging fails because \"{label}\" is missing")]
fn then_incomplete(world: &mut PackagingWorld, label: String) {
    match world.outcomes.first().expect("packaging ran") {
        Err(PackagingError::IncompleteMatrix { library, tuple }) => {
            assert_eq!(*library, world.library);
            assert_eq!(tuple.to_string(), label);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("packaging succeeded with an incomplete matrix"),
    }
}

#[then("no archive is written")]
fn then_no_archive(world: &mut PackagingWorld) {
    let name = ArtefactName::new(world.library, ArchiveFormat::XcframeworkZip);
    assert!(!world.root.join("dist").join(name.filename()).exists());
}

#[then("both archives have the same checksum")]
fn then_same_checksum(world: &mut PackagingWorld) {
    let first = packaged(world, 0);
    let second = packaged(world, 1);
    assert_ne!(first.archive_path, second.archive_path);
    assert_eq!(first.checksum, second.checksum);
    assert_eq!(
        Checksum::of_file(&second.archive_path).expect("readable"),
        first.checksum
    );
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(
    path = "tests/features/packaging.feature",
    name = "Packaging a complete matrix produces one archive"
)]
fn scenario_complete_matrix(world: PackagingWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/packaging.feature",
    name = "Packaging the ledger client for desktop and simulator targets"
)]
fn scenario_ledger_client_matrix(world: PackagingWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/packaging.feature",
    name = "Packaging fails on an incomplete matrix"
)]
fn scenario_incomplete_matrix(world: PackagingWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/packaging.feature",
    name = "Repackaging identical inputs yields an identical checksum"
)]
fn scenario_deterministic_checksum(world: PackagingWorld) {
    let _ = world;
}
