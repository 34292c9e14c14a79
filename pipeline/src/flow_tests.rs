//! Tests for the command flows, run against stub compilers and fetchers.

use super::*;
use crate::artefact::checksum::Checksum;
use crate::artefact::fetch::FetchError;
use crate::consumer::ArtifactSource;
use crate::error::ErrorKind;
use crate::publish::MockRegistryTransport;
use crate::test_utils::{ExpectedCall, StubExecutor, StubFetcher, fake_binary, success_output};
use rstest::{fixture, rstest};
use std::fs;
use tempfile::TempDir;

const ASKAR_INTERFACE: &str = r#"{
  "namespace": "askar",
  "interface_version": "0.2.2",
  "records": [{"name": "EntryTag", "fields": [{"name": "name", "type": "string"}, {"name": "value", "type": "string"}]}],
  "functions": [{"name": "version", "returns": "string"}]
}"#;

const EPOCH: &str = "1767225600";

struct Project {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Project {
    fn workspace(&self) -> Workspace {
        self.workspace_for(&["macos-arm64", "ios-simulator-arm64"])
    }

    fn workspace_for(&self, targets: &[&str]) -> Workspace {
        let targets = targets
            .iter()
            .map(|label| format!("\"{label}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let toml = format!(
            r#"
[release]
repository = "example/wrappers"
registry = "https://maven.example.com/releases/"
group = "org.example"

[matrix]
targets = [{targets}]

[paths]
cache_dir = "cache"

[library.askar]
tag = "0.2.2-binary"
checksum = "{checksum}"
interface = "interfaces/askar.json"
local_archive = "out/askar/askar_uniffiFFI.xcframework.zip"
"#,
            checksum = Checksum::of_bytes(b"remote askar archive")
        );
        let config = PipelineConfig::from_toml_str(&toml, Utf8Path::new("bindkit.toml"))
            .expect("valid configuration");
        Workspace::new(config, self.root.clone(), false)
    }

    fn write_interface(&self, json: &str) {
        let path = self.root.join("interfaces/askar.json");
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, json).expect("write interface");
    }

    fn digest(&self) -> Checksum {
        InterfaceDescription::load(&self.root.join("interfaces/askar.json"))
            .expect("interface loads")
            .digest()
            .expect("digest")
    }

    fn compiler(&self, workspace: &Workspace, labels: &[&str]) -> StubExecutor {
        let config = workspace.build_config();
        let digest = self.digest();
        let calls = labels
            .iter()
            .map(|label| {
                let tuple: TargetTuple = label.parse().expect("valid tuple");
                let manifest = self
                    .root
                    .join(WrappedLibrary::Askar.descriptor().crate_dir)
                    .join("Cargo.toml");
                let args = [
                    "build",
                    "--lib",
                    "--manifest-path",
                    manifest.as_str(),
                    "--target",
                    tuple.rust_triple(),
                    "--target-dir",
                    config.target_dir.as_str(),
                    "--release",
                ];
                ExpectedCall::new("cargo", &args, Ok(success_output()))
                    .with_env(&config.build_env(tuple))
                    .producing(
                        config.binary_path(WrappedLibrary::Askar, tuple),
                        fake_binary(&digest, label.as_bytes()),
                    )
            })
            .collect();
        StubExecutor::new(calls)
    }
}

#[fixture]
fn project() -> Project {
    let dir = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 path");
    let project = Project { _dir: dir, root };
    project.write_interface(ASKAR_INTERFACE);
    project
}

fn build_args() -> BuildArgs {
    BuildArgs {
        selection: crate::cli::SelectionArgs {
            library: Vec::new(),
            host: Some(HostOs::MacOs),
        },
        no_package: false,
    }
}

fn full_build(project: &Project, workspace: &Workspace) -> BuildReport {
    let executor = project.compiler(workspace, &["macos-arm64", "ios-simulator-arm64"]);
    let mut stderr = Vec::new();
    let report = temp_env::with_var(SOURCE_DATE_EPOCH, Some(EPOCH), || {
        build(workspace, &build_args(), &executor, &mut stderr)
    })
    .expect("build succeeds");
    executor.assert_finished();
    report
}

#[rstest]
fn plan_lists_targets_and_stages(project: Project) {
    let workspace = project.workspace();
    let mut stderr = Vec::new();
    let args = PlanArgs {
        selection: crate::cli::SelectionArgs {
            library: Vec::new(),
            host: Some(HostOs::MacOs),
        },
    };
    plan(&workspace, &args, &mut stderr).expect("plan succeeds");

    let text = String::from_utf8(stderr).expect("utf8");
    assert!(text.contains("Build host: macos"));
    assert!(text.contains("compile askar for ios-simulator-arm64 (cargo)"));
    assert!(text.contains("Stage 3:"));
    assert!(text.contains("package askar"));
}

#[rstest]
fn selecting_an_undeclared_library_is_a_configuration_error(project: Project) {
    let workspace = project.workspace();
    let err = workspace
        .libraries(&[WrappedLibrary::IndyVdr])
        .expect_err("indy-vdr is not declared");
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[rstest]
fn build_compiles_generates_and_packages(project: Project) {
    let workspace = project.workspace();
    let report = full_build(&project, &workspace);

    assert_eq!(
        report
            .binaries
            .get(&WrappedLibrary::Askar)
            .map(Vec::len),
        Some(2)
    );
    assert_eq!(report.written_bindings.len(), 2);
    let (packaged, stored) = report.stored.first().expect("one archive");
    assert!(stored.newly_written);
    assert_eq!(
        packaged.archive_path,
        project.root.join("out/askar/askar_uniffiFFI.xcframework.zip")
    );
    assert_eq!(packaged.manifest.interface.digest, project.digest());
    assert!(
        project
            .root
            .join("out/releases/0.2.2-binary/askar_uniffiFFI.xcframework.zip")
            .is_file()
    );
}

#[rstest]
fn repackaging_identical_binaries_reuses_the_stored_archive(project: Project) {
    let workspace = project.workspace();
    let report = full_build(&project, &workspace);
    let first = &report.stored.first().expect("archive").0;

    let mut stderr = Vec::new();
    let again = temp_env::with_var(SOURCE_DATE_EPOCH, Some(EPOCH), || {
        package(&workspace, &PackageArgs::default(), &mut stderr)
    })
    .expect("package succeeds");
    let (packaged, stored) = again.first().expect("archive");
    assert_eq!(packaged.checksum, first.checksum);
    assert!(!stored.newly_written);
}

#[rstest]
fn repackaging_without_source_date_epoch_is_reproducible(project: Project) {
    let workspace = project.workspace();
    let executor = project.compiler(&workspace, &["macos-arm64", "ios-simulator-arm64"]);
    let mut stderr = Vec::new();
    let (built, again) = temp_env::with_var_unset(SOURCE_DATE_EPOCH, || {
        let built = build(&workspace, &build_args(), &executor, &mut stderr);
        let again = package(&workspace, &PackageArgs::default(), &mut stderr);
        (built, again)
    });
    let built = built.expect("build succeeds");
    let again = again.expect("unchanged binaries repackage without conflict");

    let (first, _) = built.stored.first().expect("archive");
    let (second, stored) = again.first().expect("archive");
    assert_eq!(second.checksum, first.checksum);
    assert!(!stored.newly_written);
    assert_eq!(second.manifest.generated_at, GeneratedAt::from_unix_seconds(0));
}

#[rstest]
fn build_packages_only_targets_this_host_can_build(project: Project) {
    let workspace = project.workspace_for(&["macos-arm64", "ios-simulator-arm64", "linux-x64"]);
    let executor = project.compiler(&workspace, &["macos-arm64", "ios-simulator-arm64"]);
    let mut stderr = Vec::new();
    let report = temp_env::with_var(SOURCE_DATE_EPOCH, Some(EPOCH), || {
        build(&workspace, &build_args(), &executor, &mut stderr)
    })
    .expect("linux-x64 is excluded on macOS, not missing");
    executor.assert_finished();

    let (packaged, _) = report.stored.first().expect("archive");
    let targets: Vec<String> = packaged
        .manifest
        .targets()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(targets, ["macos-arm64", "ios-simulator-arm64"]);

    let err = package(&workspace, &PackageArgs::default(), &mut stderr)
        .expect_err("explicit packaging demands the declared matrix");
    assert_eq!(err.kind(), ErrorKind::IncompleteMatrix);
}

#[rstest]
fn package_without_binaries_reports_incomplete_matrix(project: Project) {
    let workspace = project.workspace();
    let mut stderr = Vec::new();
    let err = package(&workspace, &PackageArgs::default(), &mut stderr)
        .expect_err("nothing was built");
    assert_eq!(err.kind(), ErrorKind::IncompleteMatrix);
}

#[rstest]
fn failed_compile_stops_before_packaging(project: Project) {
    let workspace = project.workspace();
    let executor = project.compiler(&workspace, &["macos-arm64"]);
    let mut stderr = Vec::new();
    let err = build(&workspace, &build_args(), &executor, &mut stderr)
        .expect_err("ios-simulator compile is unexpected");
    assert!(matches!(err, PipelineError::Build(_)));
    assert!(!project.root.join("out/askar").exists());
}

#[rstest]
fn generate_is_idempotent_and_check_detects_staleness(project: Project) {
    let workspace = project.workspace();
    let mut stderr = Vec::new();
    let args = GenerateArgs::default();

    let first = generate_bindings(&workspace, &args, &mut stderr).expect("generate");
    assert!(first.iter().all(|(_, outcome)| *outcome == WriteOutcome::Written));
    let second = generate_bindings(&workspace, &args, &mut stderr).expect("regenerate");
    assert!(second.iter().all(|(_, outcome)| *outcome == WriteOutcome::Unchanged));

    project.write_interface(&ASKAR_INTERFACE.replace("0.2.2", "0.2.3"));
    let check = GenerateArgs {
        check: true,
        ..GenerateArgs::default()
    };
    let err = generate_bindings(&workspace, &check, &mut stderr).expect_err("stale bindings");
    assert_eq!(err.kind(), ErrorKind::AbiMismatch);
}

#[rstest]
fn generate_rejects_unsupported_types(project: Project) {
    project.write_interface(
        r#"{"namespace":"askar","interface_version":"0.2.2","functions":[{"name":"size","returns":"u128"}]}"#,
    );
    let workspace = project.workspace();
    let mut stderr = Vec::new();
    let err = generate_bindings(&workspace, &GenerateArgs::default(), &mut stderr)
        .expect_err("u128 cannot be expressed");
    assert_eq!(err.kind(), ErrorKind::UnsupportedType);
    assert!(!workspace.bindings_dir().exists());
}

#[rstest]
fn local_mode_resolves_the_built_archive(project: Project) {
    let workspace = project.workspace();
    full_build(&project, &workspace);
    let fetcher = StubFetcher::new();
    let mut stderr = Vec::new();

    let resolved = resolve(
        &workspace,
        OverrideMode::Local,
        &ResolveArgs::default(),
        &fetcher,
        &CancellationToken::new(),
        &mut stderr,
    )
    .expect("resolves locally");
    assert_eq!(fetcher.calls(), 0);
    assert!(matches!(
        &resolved.first().expect("askar").source,
        ArtifactSource::Local { path } if path.ends_with("askar_uniffiFFI.xcframework.zip")
    ));
    assert!(String::from_utf8(stderr).expect("utf8").contains("askar: local"));
}

#[rstest]
fn remote_mode_uses_configured_cache(project: Project) {
    let workspace = project.workspace();
    let fetcher = StubFetcher::new().serving(
        "https://github.com/example/wrappers/releases/download/0.2.2-binary/askar_uniffiFFI.xcframework.zip",
        b"remote askar archive".to_vec(),
    );
    let mut stderr = Vec::new();
    let resolved = resolve(
        &workspace,
        OverrideMode::Remote,
        &ResolveArgs::default(),
        &fetcher,
        &CancellationToken::new(),
        &mut stderr,
    )
    .expect("resolves remotely");
    let ArtifactSource::Remote { path, .. } = &resolved.first().expect("askar").source else {
        panic!("expected remote source");
    };
    assert!(path.starts_with(project.root.join("cache")));
}

#[rstest]
fn cancelled_resolution_downloads_nothing(project: Project) {
    let workspace = project.workspace();
    let fetcher = StubFetcher::new().serving(
        "https://github.com/example/wrappers/releases/download/0.2.2-binary/askar_uniffiFFI.xcframework.zip",
        b"remote askar archive".to_vec(),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut stderr = Vec::new();
    let err = resolve(
        &workspace,
        OverrideMode::Remote,
        &ResolveArgs::default(),
        &fetcher,
        &cancel,
        &mut stderr,
    )
    .expect_err("cancelled before the download");
    assert!(
        matches!(
            &err,
            PipelineError::Resolve(ResolveError::Fetch {
                library: WrappedLibrary::Askar,
                source: FetchError::Cancelled { .. },
            })
        ),
        "unexpected error: {err}"
    );
    let cached = project
        .root
        .join("cache")
        .join(Checksum::of_bytes(b"remote askar archive").as_str());
    assert!(!cached.exists());
}

#[rstest]
fn render_writes_manifests_once(project: Project) {
    let workspace = project.workspace();
    let fetcher = StubFetcher::new().serving(
        "https://github.com/example/wrappers/releases/download/0.2.2-binary/askar_uniffiFFI.xcframework.zip",
        b"remote askar archive".to_vec(),
    );
    let mut stderr = Vec::new();
    let args = RenderArgs::default();

    let written = render(
        &workspace,
        OverrideMode::Remote,
        &args,
        &fetcher,
        &CancellationToken::new(),
        &mut stderr,
    )
    .expect("render succeeds");
    assert_eq!(written.len(), 2);
    let package_swift =
        fs::read_to_string(project.root.join(PACKAGE_SWIFT)).expect("Package.swift");
    assert!(package_swift.contains("url: \"https://github.com/example/wrappers/releases/download/"));
    assert!(package_swift.contains("checksum:"));
    assert!(!package_swift.contains(project.root.as_str()));

    let again = render(
        &workspace,
        OverrideMode::Remote,
        &args,
        &fetcher,
        &CancellationToken::new(),
        &mut stderr,
    )
    .expect("render succeeds");
    assert!(again.is_empty());
}

#[rstest]
#[case::workspace_root(None, "out/askar/askar_uniffiFFI.xcframework.zip")]
#[case::nested_output(Some("site"), "../out/askar/askar_uniffiFFI.xcframework.zip")]
fn local_render_points_at_the_archive_relative_to_the_manifest(
    project: Project,
    #[case] output: Option<&str>,
    #[case] expected: &str,
) {
    let workspace = project.workspace();
    full_build(&project, &workspace);
    let args = RenderArgs {
        output: output.map(Utf8PathBuf::from),
        ..RenderArgs::default()
    };
    let mut stderr = Vec::new();
    render(
        &workspace,
        OverrideMode::Local,
        &args,
        &StubFetcher::new(),
        &CancellationToken::new(),
        &mut stderr,
    )
    .expect("render succeeds");

    let package_dir = output.map_or_else(|| project.root.clone(), |dir| project.root.join(dir));
    let package_swift =
        fs::read_to_string(package_dir.join(PACKAGE_SWIFT)).expect("Package.swift");
    assert!(package_swift.contains(&format!("      path: \"{expected}\"),")));
    assert!(!package_swift.contains(project.root.as_str()));
    assert!(package_dir.join(expected).is_file());
}

#[rstest]
fn publish_uploads_archive_and_checksum(project: Project) {
    let workspace = project.workspace();
    full_build(&project, &workspace);

    let mut transport = MockRegistryTransport::new();
    transport
        .expect_put()
        .withf(|url, _| {
            url.starts_with("https://maven.example.com/releases/org/example/askar_uniffi/0.2.2-binary/")
        })
        .times(2)
        .returning(|_, _| Ok(()));
    let mut stderr = Vec::new();
    let urls = publish_with(&workspace, &PublishArgs::default(), &transport, &mut stderr)
        .expect("publish succeeds");
    assert_eq!(
        urls,
        vec![
            "https://maven.example.com/releases/org/example/askar_uniffi/0.2.2-binary/askar_uniffi-0.2.2-binary.xcframework.zip"
                .to_owned()
        ]
    );
}

#[rstest]
fn publish_requires_a_stored_archive(project: Project) {
    let workspace = project.workspace();
    let transport = MockRegistryTransport::new();
    let mut stderr = Vec::new();
    let err = publish_with(&workspace, &PublishArgs::default(), &transport, &mut stderr)
        .expect_err("nothing packaged");
    assert!(matches!(err, PipelineError::NotPackaged { .. }));
}

#[rstest]
fn publish_without_registry_fails_before_credentials(project: Project) {
    let mut workspace = project.workspace();
    workspace.config.release.registry = None;
    let mut stderr = Vec::new();
    let err = temp_env::with_vars_unset(["GITHUB_ACTOR", "GITHUB_TOKEN"], || {
        publish(&workspace, &PublishArgs::default(), &mut stderr)
    })
    .expect_err("no registry");
    assert!(matches!(err, PipelineError::Publish(PublishError::NoRegistry)));
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[rstest]
#[case::pinned(Some(EPOCH), 1_767_225_600)]
#[case::garbage(Some("yesterday"), 0)]
#[case::unset(None, 0)]
fn generated_at_honours_source_date_epoch(#[case] value: Option<&str>, #[case] expected: u64) {
    let stamp = temp_env::with_var(SOURCE_DATE_EPOCH, value, generated_at);
    assert_eq!(stamp, GeneratedAt::from_unix_seconds(expected));
}

#[rstest]
fn quiet_workspace_prints_nothing(project: Project) {
    let mut workspace = project.workspace();
    workspace.quiet = true;
    let mut stderr = Vec::new();
    generate_bindings(&workspace, &GenerateArgs::default(), &mut stderr).expect("generate");
    assert!(stderr.is_empty());
}
