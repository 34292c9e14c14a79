//! Unit tests for the artefact packaging module.

use super::*;
use crate::artefact::extraction;
use crate::interface::BindingError;
use crate::test_utils::write_fake_binary;
use bindkit_common::Profile;
use object::read::macho::{FatArch, FatHeader};
use rstest::{fixture, rstest};
use std::io::Read;
use tempfile::TempDir;

const MATRIX: [&str; 3] = ["macos-x64", "macos-arm64", "ios-simulator-arm64"];

struct Fixture {
    _dir: TempDir,
    root: Utf8PathBuf,
    interface: InterfaceStamp,
}

impl Fixture {
    fn binary(&self, library: WrappedLibrary, label: &str) -> NativeLibraryTarget {
        let tuple: TargetTuple = label.parse().expect("valid tuple");
        let path = self
            .root
            .join("target")
            .join(tuple.rust_triple())
            .join("release")
            .join(tuple.library_file_name(&library.crate_name()));
        write_fake_binary(&path, &self.interface.digest, label.as_bytes());
        NativeLibraryTarget {
            library,
            tuple,
            profile: Profile::Release,
            binary: path,
        }
    }

    fn params(&self, labels: &[&str], format: ArchiveFormat, out: &str) -> PackageParams {
        PackageParams {
            library: WrappedLibrary::Askar,
            release_tag: ReleaseTag::try_from("0.2.2-binary").expect("valid tag"),
            format,
            declared: tuples(&MATRIX),
            binaries: labels
                .iter()
                .map(|l| self.binary(WrappedLibrary::Askar, l))
                .collect(),
            interface: self.interface.clone(),
            output_dir: self.root.join(out),
            generated_at: GeneratedAt::new("2026-02-03T00:00:00Z"),
            ffi_header: None,
        }
    }
}

fn zip_names(archive: &Utf8Path) -> Vec<String> {
    let zip = zip::ZipArchive::new(fs::File::open(archive).expect("open")).expect("zip");
    zip.file_names().map(str::to_owned).collect()
}

fn zip_entry(archive: &Utf8Path, name: &str) -> Vec<u8> {
    let mut zip = zip::ZipArchive::new(fs::File::open(archive).expect("open")).expect("zip");
    let mut entry = zip.by_name(name).expect("entry present");
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).expect("read entry");
    bytes
}

fn tuples(labels: &[&str]) -> Vec<TargetTuple> {
    labels
        .iter()
        .map(|l| l.parse().expect("valid tuple"))
        .collect()
}

#[fixture]
fn fixture() -> Fixture {
    let dir = TempDir::new().expect("temp dir creation succeeds");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 path");
    Fixture {
        _dir: dir,
        root,
        interface: InterfaceStamp {
            version: "0.2.2".to_owned(),
            digest: Checksum::of_bytes(b"askar interface"),
        },
    }
}

#[rstest]
fn packages_complete_matrix(fixture: Fixture) {
    let params = fixture.params(&MATRIX, ArchiveFormat::XcframeworkZip, "dist");
    let packaged = package_artefact(&params).expect("packaging succeeds");

    assert_eq!(packaged.file_name, "askar_uniffiFFI.xcframework.zip");
    assert!(packaged.archive_path.is_file());
    assert_eq!(packaged.manifest.targets(), tuples(&MATRIX));
    let entry = packaged
        .manifest
        .entry("ios-simulator-arm64".parse().expect("valid tuple"))
        .expect("entry present");
    assert_eq!(
        entry.path,
        "askar_uniffiFFI.xcframework/ios-arm64-simulator/libaskar_uniffi.a"
    );
    assert_eq!(
        extraction::read_manifest(&packaged.archive_path, ArchiveFormat::XcframeworkZip)
            .expect("manifest readable"),
        packaged.manifest
    );
}

#[rstest]
fn missing_tuple_fails_naming_first_gap(fixture: Fixture) {
    let params = fixture.params(
        &["macos-x64", "ios-simulator-arm64"],
        ArchiveFormat::XcframeworkZip,
        "dist",
    );
    let err = package_artefact(&params).expect_err("incomplete matrix");
    match err {
        PackagingError::IncompleteMatrix { library, tuple } => {
            assert_eq!(library, WrappedLibrary::Askar);
            assert_eq!(tuple.to_string(), "macos-arm64");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!params.output_dir.join("askar_uniffiFFI.xcframework.zip").exists());
}

#[rstest]
fn duplicate_binary_is_rejected(fixture: Fixture) {
    let mut params = fixture.params(&MATRIX, ArchiveFormat::XcframeworkZip, "dist");
    params
        .binaries
        .push(fixture.binary(WrappedLibrary::Askar, "macos-arm64"));
    assert!(matches!(
        package_artefact(&params),
        Err(PackagingError::DuplicateTarget { .. })
    ));
}

#[rstest]
fn undeclared_binary_is_rejected(fixture: Fixture) {
    let mut params = fixture.params(&MATRIX, ArchiveFormat::XcframeworkZip, "dist");
    params
        .binaries
        .push(fixture.binary(WrappedLibrary::Askar, "ios-arm64"));
    assert!(matches!(
        package_artefact(&params),
        Err(PackagingError::UndeclaredTarget { .. })
    ));
}

#[rstest]
fn foreign_binary_is_rejected(fixture: Fixture) {
    let mut params = fixture.params(&MATRIX[..2], ArchiveFormat::XcframeworkZip, "dist");
    params
        .binaries
        .push(fixture.binary(WrappedLibrary::IndyVdr, "ios-simulator-arm64"));
    assert!(matches!(
        package_artefact(&params),
        Err(PackagingError::ForeignBinary { .. })
    ));
}

#[rstest]
fn binary_from_other_interface_is_rejected(fixture: Fixture) {
    let mut params = fixture.params(&MATRIX, ArchiveFormat::XcframeworkZip, "dist");
    params.interface.digest = Checksum::of_bytes(b"newer interface");
    assert!(matches!(
        package_artefact(&params),
        Err(PackagingError::Binding(BindingError::AbiMismatch { .. }))
    ));
}

#[rstest]
#[case::zip(ArchiveFormat::XcframeworkZip)]
#[case::tar_zst(ArchiveFormat::TarZst)]
fn identical_inputs_give_identical_checksums(fixture: Fixture, #[case] format: ArchiveFormat) {
    let first = package_artefact(&fixture.params(&MATRIX, format, "one")).expect("first");
    let second = package_artefact(&fixture.params(&MATRIX, format, "two")).expect("second");
    assert_eq!(first.checksum, second.checksum);
    assert_eq!(
        fs::read(&first.archive_path).expect("read first"),
        fs::read(&second.archive_path).expect("read second")
    );
}

#[rstest]
fn tar_zst_uses_flat_layout_and_unpacks(fixture: Fixture) {
    let params = fixture.params(&MATRIX, ArchiveFormat::TarZst, "dist");
    let packaged = package_artefact(&params).expect("packaging succeeds");
    assert_eq!(packaged.file_name, "askar_uniffiFFI.tar.zst");

    let unpack_dir = fixture.root.join("unpacked");
    let (manifest, binaries) =
        extraction::extract(&packaged.archive_path, ArchiveFormat::TarZst, &unpack_dir)
            .expect("extract");
    assert_eq!(manifest, packaged.manifest);
    assert_eq!(binaries.len(), MATRIX.len());
    assert!(
        binaries
            .first()
            .is_some_and(|p| p.as_str().ends_with("macos-x64/libaskar_uniffi.a"))
    );
}

#[rstest]
fn empty_matrix_is_rejected(fixture: Fixture) {
    let mut params = fixture.params(&[], ArchiveFormat::XcframeworkZip, "dist");
    params.declared.clear();
    assert!(matches!(
        package_artefact(&params),
        Err(PackagingError::EmptyMatrix { .. })
    ));
}

#[rstest]
fn macos_architectures_share_one_universal_slice(fixture: Fixture) {
    let params = fixture.params(&MATRIX, ArchiveFormat::XcframeworkZip, "dist");
    let packaged = package_artefact(&params).expect("packaging succeeds");

    let slice = "askar_uniffiFFI.xcframework/macos-arm64_x86_64/libaskar_uniffi.a";
    let x64 = packaged
        .manifest
        .entry("macos-x64".parse().expect("valid tuple"))
        .expect("x64 entry");
    let arm64 = packaged
        .manifest
        .entry("macos-arm64".parse().expect("valid tuple"))
        .expect("arm64 entry");
    assert_eq!(x64.path, slice);
    assert_eq!(arm64, &ManifestEntry {
        target: arm64.target,
        ..x64.clone()
    });

    let universal = zip_entry(&packaged.archive_path, slice);
    assert_eq!(Checksum::of_bytes(&universal), x64.sha256);
    let arches = FatHeader::parse_arch32(universal.as_slice()).expect("fat header");
    let contents: Vec<&[u8]> = arches
        .iter()
        .map(|arch| arch.data(universal.as_slice()).expect("in bounds"))
        .collect();
    let expected_arm64 = fs::read(&params.binaries[1].binary).expect("read arm64");
    let expected_x64 = fs::read(&params.binaries[0].binary).expect("read x64");
    assert_eq!(contents, vec![expected_arm64.as_slice(), expected_x64.as_slice()]);

    let unpacked = fixture.root.join("unpacked");
    let (_, binaries) =
        extraction::extract(&packaged.archive_path, ArchiveFormat::XcframeworkZip, &unpacked)
            .expect("slices verify against the manifest");
    assert_eq!(binaries.len(), MATRIX.len());
}

#[rstest]
fn bundle_carries_info_plist_and_headers(fixture: Fixture) {
    let mut params = fixture.params(&MATRIX, ArchiveFormat::XcframeworkZip, "dist");
    params.ffi_header = Some("#pragma once\n".to_owned());
    let packaged = package_artefact(&params).expect("packaging succeeds");

    assert_eq!(
        zip_names(&packaged.archive_path),
        vec![
            "artifact-manifest.json",
            "askar_uniffiFFI.xcframework/Info.plist",
            "askar_uniffiFFI.xcframework/ios-arm64-simulator/Headers/askar_uniffiFFI.h",
            "askar_uniffiFFI.xcframework/ios-arm64-simulator/Headers/module.modulemap",
            "askar_uniffiFFI.xcframework/ios-arm64-simulator/libaskar_uniffi.a",
            "askar_uniffiFFI.xcframework/macos-arm64_x86_64/Headers/askar_uniffiFFI.h",
            "askar_uniffiFFI.xcframework/macos-arm64_x86_64/Headers/module.modulemap",
            "askar_uniffiFFI.xcframework/macos-arm64_x86_64/libaskar_uniffi.a",
        ]
    );
    let plist = String::from_utf8(zip_entry(
        &packaged.archive_path,
        "askar_uniffiFFI.xcframework/Info.plist",
    ))
    .expect("utf8 plist");
    assert!(plist.contains("<string>ios-arm64-simulator</string>"));
    assert!(plist.contains("<string>macos-arm64_x86_64</string>"));
    assert!(plist.contains("<key>SupportedPlatformVariant</key>\n\t\t\t<string>simulator</string>"));
    let module_map = String::from_utf8(zip_entry(
        &packaged.archive_path,
        "askar_uniffiFFI.xcframework/macos-arm64_x86_64/Headers/module.modulemap",
    ))
    .expect("utf8 module map");
    assert!(module_map.starts_with("module askar_uniffiFFI {"));
}

#[rstest]
fn non_apple_binaries_sit_beside_the_bundle(fixture: Fixture) {
    let labels = ["linux-x64", "ios-simulator-arm64"];
    let mut params = fixture.params(&labels, ArchiveFormat::XcframeworkZip, "dist");
    params.declared = tuples(&labels);
    let packaged = package_artefact(&params).expect("packaging succeeds");

    assert_eq!(packaged.manifest.targets(), tuples(&labels));
    let linux = packaged
        .manifest
        .entry("linux-x64".parse().expect("valid tuple"))
        .expect("linux entry");
    assert_eq!(linux.path, "linux-x64/libaskar_uniffi.so");
    assert!(zip_names(&packaged.archive_path).contains(&linux.path));
}
