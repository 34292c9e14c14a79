//! Unit tests for native build units.

use super::*;
use crate::test_utils::{ExpectedCall, StubExecutor, failure_output, success_output};
use bindkit_common::BuildTool;
use rstest::{fixture, rstest};
use tempfile::TempDir;

struct Workspace {
    _dir: TempDir,
    config: BuildConfig,
}

#[fixture]
fn workspace() -> Workspace {
    let dir = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 path");
    let config = BuildConfig {
        workspace_root: root.clone(),
        target_dir: root.join("target"),
        profile: Profile::Release,
        macos_deployment_target: "14.5".to_owned(),
        ios_deployment_target: "17.5".to_owned(),
    };
    Workspace { _dir: dir, config }
}

fn planned(label: &str, tool: BuildTool) -> PlannedTarget {
    PlannedTarget {
        tuple: label.parse().expect("valid tuple"),
        tool,
    }
}

fn expected_args(config: &BuildConfig, library: WrappedLibrary, triple: &str) -> Vec<String> {
    let manifest = config
        .workspace_root
        .join(library.descriptor().crate_dir)
        .join("Cargo.toml");
    vec![
        "build".to_owned(),
        "--lib".to_owned(),
        "--manifest-path".to_owned(),
        manifest.to_string(),
        "--target".to_owned(),
        triple.to_owned(),
        "--target-dir".to_owned(),
        config.target_dir.to_string(),
        "--release".to_owned(),
    ]
}

#[rstest]
fn build_returns_binary_produced_by_compiler(workspace: Workspace) {
    let target = planned("macos-arm64", BuildTool::Cargo);
    let binary = workspace
        .config
        .binary_path(WrappedLibrary::Askar, target.tuple);
    assert!(binary.as_str().ends_with("aarch64-apple-darwin/release/libaskar_uniffi.a"));

    let args = expected_args(&workspace.config, WrappedLibrary::Askar, "aarch64-apple-darwin");
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    let executor = StubExecutor::new(vec![
        ExpectedCall::new("cargo", &arg_refs, Ok(success_output()))
            .with_env(&[("MACOSX_DEPLOYMENT_TARGET", "14.5")])
            .producing(binary.clone(), b"lib".to_vec()),
    ]);

    let built = NativeBuilder::new(&workspace.config, &executor)
        .build(WrappedLibrary::Askar, target)
        .expect("build succeeds");
    assert_eq!(built.binary, binary);
    assert_eq!(built.tuple, target.tuple);
    executor.assert_finished();
}

#[rstest]
fn cross_targets_use_cross(workspace: Workspace) {
    let target = planned("linux-x64", BuildTool::Cross);
    let mut executor = MockCommandExecutor::new();
    executor
        .expect_run()
        .withf(|cmd, args, env| {
            cmd == "cross" && args.contains(&"x86_64-unknown-linux-gnu") && env.is_empty()
        })
        .times(1)
        .returning(|_, _, _| Ok(success_output()));

    let result = NativeBuilder::new(&workspace.config, &executor).build(WrappedLibrary::IndyVdr, target);
    // The mock produces no file, so the build reports the missing library.
    assert!(matches!(result, Err(BuildError::MissingBinary { .. })));
}

#[rstest]
#[case::macos("macos-x64", Some(("MACOSX_DEPLOYMENT_TARGET", "14.5")))]
#[case::ios_device("ios-arm64", Some(("IPHONEOS_DEPLOYMENT_TARGET", "17.5")))]
#[case::ios_simulator("ios-simulator-arm64", Some(("IPHONEOS_DEPLOYMENT_TARGET", "17.5")))]
#[case::linux("linux-arm64", None)]
#[case::android("android-arm64", None)]
fn apple_targets_receive_their_deployment_minimum(
    workspace: Workspace,
    #[case] label: &str,
    #[case] expected: Option<(&'static str, &'static str)>,
) {
    let wanted: Vec<(String, String)> = expected
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect();
    let mut executor = MockCommandExecutor::new();
    executor
        .expect_run()
        .withf(move |_, _, env| {
            env.len() == wanted.len()
                && env
                    .iter()
                    .zip(&wanted)
                    .all(|((k, v), (wk, wv))| k == wk && v == wv)
        })
        .times(1)
        .returning(|_, _, _| Ok(success_output()));

    let result = NativeBuilder::new(&workspace.config, &executor)
        .build(WrappedLibrary::Askar, planned(label, BuildTool::Cargo));
    assert!(matches!(result, Err(BuildError::MissingBinary { .. })));
}

#[cfg(unix)]
#[test]
fn system_executor_passes_environment() {
    let executor = SystemCommandExecutor::default();
    let output = executor
        .run(
            "sh",
            &["-c", "printf %s \"$MACOSX_DEPLOYMENT_TARGET\""],
            &[("MACOSX_DEPLOYMENT_TARGET", "14.5")],
        )
        .expect("sh runs");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "14.5");
}

#[rstest]
fn compiler_failure_names_library_and_tuple(workspace: Workspace) {
    let mut executor = MockCommandExecutor::new();
    executor
        .expect_run()
        .returning(|_, _, _| Ok(failure_output("error: linker `cc` not found\n")));

    let err = NativeBuilder::new(&workspace.config, &executor)
        .build(
            WrappedLibrary::Anoncreds,
            planned("android-arm64", BuildTool::Cargo),
        )
        .expect_err("build fails");
    let message = err.to_string();
    assert!(message.contains("anoncreds"));
    assert!(message.contains("android-arm64"));
    assert!(message.contains("linker `cc` not found"));
}

#[rstest]
fn debug_profile_omits_release_flag(mut workspace: Workspace) {
    workspace.config.profile = Profile::Debug;
    let mut executor = MockCommandExecutor::new();
    executor
        .expect_run()
        .withf(|_, args, _| !args.contains(&"--release"))
        .returning(|_, _, _| Ok(success_output()));
    let result = NativeBuilder::new(&workspace.config, &executor)
        .build(WrappedLibrary::Askar, planned("linux-arm64", BuildTool::Cargo));
    assert!(matches!(result, Err(BuildError::MissingBinary { .. })));
}

#[cfg(unix)]
#[test]
fn system_executor_times_out() {
    let executor = SystemCommandExecutor::new(Duration::from_millis(100));
    let result = executor.run("sleep", &["5"], &[]);
    assert!(matches!(result, Err(BuildError::Timeout { .. })));
}

#[test]
fn system_executor_reports_missing_program() {
    let executor = SystemCommandExecutor::default();
    let result = executor.run("bindkit-definitely-not-a-program", &[], &[]);
    assert!(matches!(result, Err(BuildError::Spawn { .. })));
}
