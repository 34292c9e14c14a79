//! Behaviour-driven tests for binding generation.
//!
//! Uses the rstest-bdd v0.5.0 mutable world pattern.

use bindkit_common::WrappedLibrary;
use bindkit_pipeline::interface::{
    BindingError, BindingModule, HostLanguage, InterfaceDescription, WriteOutcome, binding_path,
    generate, verify_up_to_date,
};
use camino::Utf8PathBuf;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

const ASKAR_INTERFACE: &str = r#"{
  "namespace": "askar",
  "interface_version": "0.2.2",
  "records": [{"name": "EntryTag", "fields": [{"name": "name", "type": "string"}]}],
  "functions": [{"name": "version", "returns": "string"}]
}"#;

// ---------------------------------------------------------------------------
// World types
// ---------------------------------------------------------------------------

struct BindingWorld {
    _dir: TempDir,
    root: Utf8PathBuf,
    json: String,
    writes: Vec<WriteOutcome>,
    generated: Option<Result<BindingModule, BindingError>>,
}

#[fixture]
fn world() -> BindingWorld {
    let dir = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 path");
    BindingWorld {
        _dir: dir,
        root,
        json: String::new(),
        writes: Vec::new(),
        generated: None,
    }
}

fn description(world: &BindingWorld) -> InterfaceDescription {
    InterfaceDescription::from_json_str(&world.json, "askar.json").expect("valid description")
}

fn write_swift(world: &mut BindingWorld) {
    let module = generate(&description(world), WrappedLibrary::Askar, HostLanguage::Swift)
        .expect("generation succeeds");
    let outcome = module.write_to(&world.root).expect("write succeeds");
    world.writes.push(outcome);
}

// ---------------------------------------------------------------------------
// Step definitions
// ---------------------------------------------------------------------------

#[given("an interface description for askar")]
fn given_description(world: &mut BindingWorld) {
    world.json = ASKAR_INTERFACE.to_owned();
}

#[given("an interface description for askar returning \"{ty}\"")]
fn given_description_returning(world: &mut BindingWorld, ty: String) {
    world.json = format!(
        r#"{{"namespace":"askar","interface_version":"0.2.2","functions":[{{"name":"size","returns":"{ty}"}}]}}"#
    );
}

#[given("the Swift binding has been written")]
fn given_swift_written(world: &mut BindingWorld) {
    write_swift(world);
}

#[when("the Swift binding is written")]
fn when_swift_written(world: &mut BindingWorld) {
    write_swift(world);
}

#[when("the Swift binding is written again")]
fn when_swift_written_again(world: &mut BindingWorld) {
    write_swift(world);
}

#[when("the Kotlin binding is generated")]
fn when_kotlin_generated(world: &mut BindingWorld) {
    world.generated = Some(generate(
        &description(world),
        WrappedLibrary::Askar,
        HostLanguage::Kotlin,
    ));
}

#[when("the interface version changes to \"{version}\"")]
fn when_version_changes(world: &mut BindingWorld, version: String) {
    world.json = world.json.replace("0.2.2", &version);
}

#[then("the second write reports the file unchanged")]
fn then_second_unchanged(world: &mut BindingWorld) {
    assert_eq!(
        world.writes,
        vec![WriteOutcome::Written, WriteOutcome::Unchanged]
    );
}

#[then("generation fails with an unsupported type \"{ty}\"")]
fn then_unsupported(world: &mut BindingWorld, ty: String) {
    match world.generated.as_ref().expect("generation ran") {
        Err(BindingError::UnsupportedType {
            library, ty: found, ..
        }) => {
            assert_eq!(*library, Some(WrappedLibrary::Askar));
            assert_eq!(*found, ty);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(module) => panic!("generated {} despite {ty}", module.file_name),
    }
}

#[then("the written binding is reported as an interface mismatch")]
fn then_stale(world: &mut BindingWorld) {
    let expected = description(world).digest().expect("digest");
    let path = binding_path(&world.root, WrappedLibrary::Askar, HostLanguage::Swift);
    match verify_up_to_date(&path, WrappedLibrary::Askar, &expected) {
        Err(BindingError::AbiMismatch {
            library,
            expected: wanted,
            actual,
            ..
        }) => {
            assert_eq!(library, WrappedLibrary::Askar);
            assert_eq!(wanted, expected);
            assert!(actual.is_some(), "binding carries an older stamp");
            assert_ne!(actual, Some(expected));
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(stamp) => panic!("stale binding accepted as {}", stamp.version),
    }
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(
    path = "tests/features/bindings.feature",
    name = "Regenerating an unchanged interface leaves files untouched"
)]
fn scenario_idempotent(world: BindingWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/bindings.feature",
    name = "A type the host languages cannot express is rejected"
)]
fn scenario_unsupported_type(world: BindingWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/bindings.feature",
    name = "A binding generated from an older interface is stale"
)]
fn scenario_stale_stamp(world: BindingWorld) {
    let _ = world;
}
