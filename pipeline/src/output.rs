//! User-facing output for the `bindkit` command.
//!
//! Progress goes to stderr so stdout stays free for anything a script might
//! capture. Diagnostics belong to the `log` facade instead.

use crate::consumer::{ArtifactSource, ResolvedArtifact};
use crate::graph::{BuildPlan, GraphError};
use bindkit_common::BuildMatrix;
use std::fmt::Display;
use std::io::Write;

/// Write one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort output; a closed stderr must not fail the command.
    }
}

/// Describe a build matrix and its task plan for the `plan` command.
///
/// # Example
///
/// ```
/// use bindkit_common::{CapabilityTable, HostOs, WrappedLibrary};
/// use bindkit_pipeline::graph::BuildPlan;
/// use bindkit_pipeline::output::plan_text;
///
/// let declared = vec!["macos-arm64".parse().expect("valid"), "linux-x64".parse().expect("valid")];
/// let matrix = CapabilityTable::default().plan(HostOs::MacOs, &declared);
/// let plan = BuildPlan::for_matrix(&[WrappedLibrary::Askar], &matrix, &[]);
///
/// let text = plan_text(&matrix, &plan).expect("acyclic plan");
/// assert!(text.contains("macos-arm64 (cargo)"));
/// assert!(text.contains("excluded on macos: linux-x64"));
/// ```
///
/// # Errors
///
/// Returns [`GraphError`] when the plan has a cycle.
pub fn plan_text(matrix: &BuildMatrix, plan: &BuildPlan) -> Result<String, GraphError> {
    let mut lines = vec![format!("Build host: {}", matrix.host), String::new()];
    lines.push("Targets:".to_owned());
    for target in &matrix.buildable {
        lines.push(format!("  - {} ({})", target.tuple, target.tool.program()));
    }
    if !matrix.excluded.is_empty() {
        let excluded: Vec<String> = matrix.excluded.iter().map(ToString::to_string).collect();
        lines.push(format!("  excluded on {}: {}", matrix.host, excluded.join(", ")));
    }
    lines.push(String::new());
    for (index, level) in plan.levels()?.iter().enumerate() {
        lines.push(format!("Stage {}:", index + 1));
        lines.extend(
            level
                .iter()
                .filter_map(|id| plan.task(*id))
                .map(|task| format!("  - {task}")),
        );
    }
    Ok(lines.join("\n"))
}

/// One line per resolved artefact: library, source kind, and location.
#[must_use]
pub fn resolution_line(artifact: &ResolvedArtifact) -> String {
    match &artifact.source {
        ArtifactSource::Remote { url, checksum, .. } => {
            format!("{}: remote {url} (sha256 {checksum})", artifact.library)
        }
        ArtifactSource::Local { path } => format!("{}: local {path}", artifact.library),
    }
}
