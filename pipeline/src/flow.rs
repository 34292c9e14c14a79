//! Command flows behind each `bindkit` subcommand.
//!
//! Each flow loads what it needs from a [`Workspace`], drives the pipeline
//! modules, and reports progress on stderr. External effects (compilers,
//! downloads, registry uploads) arrive as trait objects so that flows run
//! against stubs in tests.

use crate::artefact::fetch::{ArtifactFetcher, CancellationToken};
use crate::artefact::manifest::GeneratedAt;
use crate::artefact::naming::{ArchiveFormat, ArtefactName};
use crate::artefact::packaging::{PackageParams, PackagedArtifact, package_artefact};
use crate::artefact::release_tag::ReleaseTag;
use crate::artefact::store::{ArtifactStore, DirectoryStore, StoredArtifact};
use crate::builder::{BuildConfig, CommandExecutor, NativeBuilder, NativeLibraryTarget};
use crate::cli::{
    BuildArgs, GenerateArgs, PackageArgs, PlanArgs, PublishArgs, RenderArgs, ResolveArgs,
};
use crate::consumer::cache::{ArtifactCache, default_cache_dir};
use crate::consumer::{ConsumerManifest, OverrideMode, ResolveError, ResolvedArtifact, Resolver};
use crate::credentials::load_credentials;
use crate::error::{PipelineError, Result};
use crate::graph::{BuildPlan, Task};
use crate::interface::{
    HostLanguage, InterfaceDescription, WriteOutcome, binding_path, ffi_header, generate,
    verify_up_to_date,
};
use crate::output::{plan_text, resolution_line, write_stderr_line};
use crate::publish::{
    Coordinates, HttpTransport, MavenPublisher, PublishError, PublishItem, RegistryTransport,
    jvm_classifier_jars,
};
use crate::render::{
    PACKAGE_SWIFT, SETTINGS_GRADLE, render_package_swift, render_settings_gradle,
    write_if_changed,
};
use bindkit_common::{BuildMatrix, HostOs, PipelineConfig, TargetTuple, WrappedLibrary};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{Mutex, PoisonError};

/// Environment variable pinning the manifest timestamp for reproducible
/// archives.
pub const SOURCE_DATE_EPOCH: &str = "SOURCE_DATE_EPOCH";

/// A loaded configuration and the directory its relative paths resolve
/// against.
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Parsed `bindkit.toml`.
    pub config: PipelineConfig,
    /// Directory containing the configuration file.
    pub root: Utf8PathBuf,
    /// Whether progress output is suppressed.
    pub quiet: bool,
}

impl Workspace {
    /// Load `config_path` and anchor relative paths at its directory.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] when the file cannot be read or
    /// parsed.
    pub fn load(config_path: &Utf8Path, quiet: bool) -> Result<Self> {
        let config = PipelineConfig::load(config_path)?;
        let root = config_path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .map_or_else(|| Utf8PathBuf::from("."), Utf8Path::to_owned);
        debug!("loaded {config_path} (root {root})");
        Ok(Self {
            config,
            root,
            quiet,
        })
    }

    /// Wrap an already parsed configuration.
    #[must_use]
    pub fn new(config: PipelineConfig, root: impl Into<Utf8PathBuf>, quiet: bool) -> Self {
        Self {
            config,
            root: root.into(),
            quiet,
        }
    }

    /// Resolve `path` against the workspace root unless it is absolute.
    #[must_use]
    pub fn path(&self, path: &Utf8Path) -> Utf8PathBuf {
        if path.is_absolute() {
            path.to_owned()
        } else {
            self.root.join(path)
        }
    }

    /// Directory receiving generated bindings.
    #[must_use]
    pub fn bindings_dir(&self) -> Utf8PathBuf {
        self.path(&self.config.paths.bindings_dir)
    }

    /// Directory receiving packaged archives.
    #[must_use]
    pub fn out_dir(&self) -> Utf8PathBuf {
        self.path(&self.config.paths.out_dir)
    }

    /// Store holding every packaged release.
    #[must_use]
    pub fn store(&self) -> DirectoryStore {
        DirectoryStore::new(self.out_dir().join("releases"))
    }

    /// Build settings for the native build units.
    #[must_use]
    pub fn build_config(&self) -> BuildConfig {
        BuildConfig {
            workspace_root: self.root.clone(),
            target_dir: self.path(&self.config.paths.target_dir),
            profile: self.config.matrix.profile,
            macos_deployment_target: self.config.package.macos.clone(),
            ios_deployment_target: self.config.package.ios.clone(),
        }
    }

    /// Evaluate the capability table for `host` (this machine when `None`).
    #[must_use]
    pub fn matrix(&self, host: Option<HostOs>) -> BuildMatrix {
        self.config
            .matrix
            .capability_table()
            .plan(host.unwrap_or_else(HostOs::current), &self.config.matrix.targets)
    }

    /// Configured libraries, narrowed to `filter` when it is not empty.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the filter names a library that
    /// `bindkit.toml` does not declare.
    pub fn libraries(&self, filter: &[WrappedLibrary]) -> Result<Vec<WrappedLibrary>> {
        let configured: Vec<WrappedLibrary> = self
            .config
            .libraries()?
            .into_iter()
            .map(|(library, _)| library)
            .collect();
        if let Some(missing) = filter.iter().find(|lib| !configured.contains(lib)) {
            return Err(ResolveError::configuration(
                *missing,
                format!("not declared in bindkit.toml; add a [library.{missing}] table"),
            )
            .into());
        }
        Ok(configured
            .into_iter()
            .filter(|lib| filter.is_empty() || filter.contains(lib))
            .collect())
    }

    /// Load the interface description of `library`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingInterface`] when none is declared and
    /// a binding error when it cannot be loaded.
    pub fn interface(&self, library: WrappedLibrary) -> Result<InterfaceDescription> {
        let declared = self
            .config
            .library(library)
            .and_then(|cfg| cfg.interface.as_deref())
            .ok_or_else(|| PipelineError::MissingInterface {
                library: library.to_string(),
            })?;
        Ok(InterfaceDescription::load(&self.path(declared))?)
    }

    /// Release tag of `library`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingTag`] when none is declared and an
    /// artefact error when the tag is malformed.
    pub fn release_tag(&self, library: WrappedLibrary) -> Result<ReleaseTag> {
        let tag = self
            .config
            .library(library)
            .and_then(|cfg| cfg.tag.as_deref())
            .ok_or_else(|| PipelineError::MissingTag {
                library: library.to_string(),
            })?;
        Ok(ReleaseTag::try_from(tag)?)
    }

    /// Archive format for every library.
    ///
    /// # Errors
    ///
    /// Returns an artefact error for an unknown format label.
    pub fn format(&self) -> Result<ArchiveFormat> {
        Ok(self.config.release.format.parse::<ArchiveFormat>()?)
    }

    fn progress(&self, stderr: &mut dyn Write, message: impl std::fmt::Display) {
        if !self.quiet {
            write_stderr_line(stderr, message);
        }
    }
}

/// Manifest timestamp: `SOURCE_DATE_EPOCH` when set and numeric, else the
/// Unix epoch.
///
/// The timestamp is archived alongside the binaries, so it never comes from
/// the wall clock; repackaging identical binaries yields identical bytes.
#[must_use]
pub fn generated_at() -> GeneratedAt {
    let secs = std::env::var(SOURCE_DATE_EPOCH)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(0);
    GeneratedAt::from_unix_seconds(secs)
}

/// Print the build matrix and task stages.
///
/// # Errors
///
/// Returns a configuration error for unknown libraries.
pub fn plan(workspace: &Workspace, args: &PlanArgs, stderr: &mut dyn Write) -> Result<()> {
    let libraries = workspace.libraries(&args.selection.library)?;
    let matrix = workspace.matrix(args.selection.host);
    let plan = BuildPlan::for_matrix(&libraries, &matrix, &HostLanguage::ALL);
    write_stderr_line(stderr, plan_text(&matrix, &plan)?);
    Ok(())
}

/// What a full build produced.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Compiled binaries per library.
    pub binaries: BTreeMap<WrappedLibrary, Vec<NativeLibraryTarget>>,
    /// Bindings that were (re)written.
    pub written_bindings: Vec<Utf8PathBuf>,
    /// Stored archives, in completion order.
    pub stored: Vec<(PackagedArtifact, StoredArtifact)>,
}

/// Compile, generate, and package the selected libraries in dependency
/// order, running independent tasks in parallel.
///
/// Archives cover the targets this host can build; targets the capability
/// table excludes are left to a build on another host. `package` still
/// demands the full declared matrix.
///
/// # Errors
///
/// Fails fast with the first task error; tasks in later stages never start.
pub fn build(
    workspace: &Workspace,
    args: &BuildArgs,
    executor: &dyn CommandExecutor,
    stderr: &mut dyn Write,
) -> Result<BuildReport> {
    let libraries = workspace.libraries(&args.selection.library)?;
    let matrix = workspace.matrix(args.selection.host);
    report_matrix(workspace, &matrix, stderr);

    let descriptions = libraries
        .iter()
        .map(|&lib| workspace.interface(lib).map(|desc| (lib, desc)))
        .collect::<Result<BTreeMap<_, _>>>()?;
    let plan = BuildPlan::for_matrix(&libraries, &matrix, &HostLanguage::ALL);
    workspace.progress(
        stderr,
        format!("Running {} tasks for {} libraries", plan.len(), libraries.len()),
    );

    let build_config = workspace.build_config();
    let builder = NativeBuilder::new(&build_config, executor);
    let bindings_dir = workspace.bindings_dir();
    let report = Mutex::new(BuildReport::default());
    let generated_at = generated_at();
    let declared = matrix.tuples();
    if !matrix.excluded.is_empty() && !args.no_package {
        warn!(
            "archives built on this {} host omit {} excluded targets",
            matrix.host,
            matrix.excluded.len()
        );
    }

    plan.execute(|task| -> Result<()> {
        let library = task.library();
        match *task {
            Task::Compile { target, .. } => {
                let built = builder.build(library, target)?;
                lock(&report)
                    .binaries
                    .entry(library)
                    .or_default()
                    .push(built);
            }
            Task::Generate { language, .. } => {
                let description = descriptions
                    .get(&library)
                    .ok_or_else(|| missing_interface(library))?;
                let module = generate(description, library, language)?;
                if module.write_to(&bindings_dir)? == WriteOutcome::Written {
                    lock(&report)
                        .written_bindings
                        .push(module.path_under(&bindings_dir));
                }
            }
            Task::Package { .. } if args.no_package => {
                debug!("skipping packaging of {library}");
            }
            Task::Package { .. } => {
                let description = descriptions
                    .get(&library)
                    .ok_or_else(|| missing_interface(library))?;
                let binaries = lock(&report)
                    .binaries
                    .get(&library)
                    .cloned()
                    .unwrap_or_default();
                let stored = package_library(
                    workspace,
                    library,
                    description,
                    binaries,
                    &declared,
                    &generated_at,
                )?;
                lock(&report).stored.push(stored);
            }
        }
        Ok(())
    })?;

    let report = report.into_inner().unwrap_or_else(PoisonError::into_inner);
    for path in &report.written_bindings {
        workspace.progress(stderr, format!("Wrote {path}"));
    }
    for (packaged, stored) in &report.stored {
        report_stored(workspace, packaged, stored, stderr);
    }
    Ok(report)
}

/// Generate (or, with `--check`, verify) binding modules.
///
/// # Errors
///
/// Returns binding errors for invalid descriptions, unsupported types, and
/// stale files under `--check`.
pub fn generate_bindings(
    workspace: &Workspace,
    args: &GenerateArgs,
    stderr: &mut dyn Write,
) -> Result<Vec<(Utf8PathBuf, WriteOutcome)>> {
    let languages: &[HostLanguage] = if args.language.is_empty() {
        &HostLanguage::ALL
    } else {
        &args.language
    };
    let bindings_dir = workspace.bindings_dir();
    let mut outcomes = Vec::new();
    for library in workspace.libraries(&args.library)? {
        let description = workspace.interface(library)?;
        for &language in languages {
            let path = binding_path(&bindings_dir, library, language);
            if args.check {
                verify_up_to_date(&path, library, &description.digest()?)?;
                workspace.progress(stderr, format!("{path} is up to date"));
                outcomes.push((path, WriteOutcome::Unchanged));
                continue;
            }
            let outcome = generate(&description, library, language)?.write_to(&bindings_dir)?;
            let verb = match outcome {
                WriteOutcome::Written => "Wrote",
                WriteOutcome::Unchanged => "Unchanged",
            };
            workspace.progress(stderr, format!("{verb} {path}"));
            outcomes.push((path, outcome));
        }
    }
    Ok(outcomes)
}

/// Package binaries already present in the target directory.
///
/// Binaries missing for a declared target are not an error here; the
/// packager reports the first gap as an incomplete matrix.
///
/// # Errors
///
/// Returns packaging or store errors.
pub fn package(
    workspace: &Workspace,
    args: &PackageArgs,
    stderr: &mut dyn Write,
) -> Result<Vec<(PackagedArtifact, StoredArtifact)>> {
    let build_config = workspace.build_config();
    let generated_at = generated_at();
    let mut results = Vec::new();
    for library in workspace.libraries(&args.library)? {
        let description = workspace.interface(library)?;
        let binaries = existing_binaries(&build_config, library, &workspace.config.matrix.targets);
        let stored = package_library(
            workspace,
            library,
            &description,
            binaries,
            &workspace.config.matrix.targets,
            &generated_at,
        )?;
        report_stored(workspace, &stored.0, &stored.1, stderr);
        results.push(stored);
    }
    Ok(results)
}

fn existing_binaries(
    config: &BuildConfig,
    library: WrappedLibrary,
    declared: &[TargetTuple],
) -> Vec<NativeLibraryTarget> {
    declared
        .iter()
        .filter_map(|&tuple| {
            let binary = config.binary_path(library, tuple);
            binary.is_file().then(|| NativeLibraryTarget {
                library,
                tuple,
                profile: config.profile,
                binary,
            })
        })
        .collect()
}

fn package_library(
    workspace: &Workspace,
    library: WrappedLibrary,
    description: &InterfaceDescription,
    binaries: Vec<NativeLibraryTarget>,
    declared: &[TargetTuple],
    generated_at: &GeneratedAt,
) -> Result<(PackagedArtifact, StoredArtifact)> {
    let params = PackageParams {
        library,
        release_tag: workspace.release_tag(library)?,
        format: workspace.format()?,
        declared: declared.to_vec(),
        binaries,
        interface: description.stamp()?,
        output_dir: workspace.out_dir().join(library.key()),
        generated_at: generated_at.clone(),
        ffi_header: Some(ffi_header(description, library)),
    };
    let packaged = package_artefact(&params)?;
    let stored = workspace.store().publish(&packaged)?;
    Ok((packaged, stored))
}

/// Resolve every configured library under `mode`.
///
/// # Errors
///
/// Returns resolution errors: missing declarations, checksum mismatches,
/// ABI mismatches, and download failures, including downloads abandoned
/// because `cancel` fired.
pub fn resolve(
    workspace: &Workspace,
    mode: OverrideMode,
    args: &ResolveArgs,
    fetcher: &dyn ArtifactFetcher,
    cancel: &CancellationToken,
    stderr: &mut dyn Write,
) -> Result<Vec<ResolvedArtifact>> {
    let (_, resolved) =
        resolve_manifest(workspace, mode, args.cache_dir.as_deref(), fetcher, cancel)?;
    for artifact in &resolved {
        workspace.progress(stderr, resolution_line(artifact));
    }
    Ok(resolved)
}

fn resolve_manifest(
    workspace: &Workspace,
    mode: OverrideMode,
    cache_dir: Option<&Utf8Path>,
    fetcher: &dyn ArtifactFetcher,
    cancel: &CancellationToken,
) -> Result<(ConsumerManifest, Vec<ResolvedArtifact>)> {
    let manifest = ConsumerManifest::from_config(&workspace.config, &workspace.root)?;
    let cache_root = cache_dir
        .map(Utf8Path::to_owned)
        .or_else(|| workspace.config.paths.cache_dir.clone())
        .map(|dir| workspace.path(&dir))
        .or_else(default_cache_dir)
        .ok_or_else(|| ResolveError::Configuration {
            library: None,
            reason: "no cache directory available; set paths.cache_dir or pass --cache-dir"
                .to_owned(),
        })?;
    info!("resolving {} libraries from {mode} sources", manifest.entries.len());
    let resolver = Resolver::new(ArtifactCache::new(cache_root, fetcher), workspace.bindings_dir());
    let resolved = resolver.resolve(&manifest, mode, cancel)?;
    Ok((manifest, resolved))
}

/// Resolve, then write `Package.swift` and `settings.gradle.kts`.
///
/// Files whose content is unchanged are left untouched.
///
/// # Errors
///
/// Returns resolution or render errors.
pub fn render(
    workspace: &Workspace,
    mode: OverrideMode,
    args: &RenderArgs,
    fetcher: &dyn ArtifactFetcher,
    cancel: &CancellationToken,
    stderr: &mut dyn Write,
) -> Result<Vec<Utf8PathBuf>> {
    let (manifest, resolved) =
        resolve_manifest(workspace, mode, args.cache_dir.as_deref(), fetcher, cancel)?;
    let output = args
        .output
        .as_deref()
        .map_or_else(|| workspace.root.clone(), |dir| workspace.path(dir));
    let rendered = [
        (PACKAGE_SWIFT, render_package_swift(&manifest, &resolved, &output)?),
        (SETTINGS_GRADLE, render_settings_gradle(&manifest)),
    ];
    let mut written = Vec::new();
    for (name, contents) in rendered {
        let path = output.join(name);
        if write_if_changed(&path, &contents)? {
            workspace.progress(stderr, format!("Wrote {path} ({mode} artefacts)"));
            written.push(path);
        } else {
            workspace.progress(stderr, format!("{path} is up to date"));
        }
    }
    Ok(written)
}

/// Upload stored archives and classifier jars with credentials from
/// `local.properties` or the environment.
///
/// # Errors
///
/// Returns [`PublishError::NoRegistry`] before reading credentials when no
/// registry is configured, then credential and upload errors.
pub fn publish(
    workspace: &Workspace,
    args: &PublishArgs,
    stderr: &mut dyn Write,
) -> Result<Vec<String>> {
    if workspace.config.release.registry.is_none() {
        return Err(PublishError::NoRegistry.into());
    }
    let credentials = load_credentials(&workspace.root)?;
    info!("publishing as {} ({})", credentials.username, credentials.source);
    publish_with(workspace, args, &HttpTransport::new(&credentials), stderr)
}

/// Upload through an explicit transport.
///
/// # Errors
///
/// Returns [`PipelineError::NotPackaged`] for a library with no stored
/// archive, and upload errors.
pub fn publish_with(
    workspace: &Workspace,
    args: &PublishArgs,
    transport: &dyn RegistryTransport,
    stderr: &mut dyn Write,
) -> Result<Vec<String>> {
    let registry = workspace
        .config
        .release
        .registry
        .as_deref()
        .ok_or(PublishError::NoRegistry)?;
    let publisher = MavenPublisher::new(registry, transport);
    let format = workspace.format()?;
    let store = workspace.store();
    let libs_dir = args
        .libs_dir
        .as_deref()
        .map_or_else(|| workspace.out_dir().join("libs"), |dir| workspace.path(dir));

    let mut urls = Vec::new();
    for library in workspace.libraries(&args.library)? {
        let tag = workspace.release_tag(library)?;
        let file_name = ArtefactName::new(library, format).filename();
        let Some((archive, _)) = store.locate(&tag, &file_name)? else {
            return Err(PipelineError::NotPackaged {
                library: library.to_string(),
                tag: tag.to_string(),
            });
        };
        let coordinates = Coordinates {
            group: workspace.config.release.group.clone(),
            artifact: library.crate_name(),
            version: tag.to_string(),
        };
        let mut items = vec![PublishItem {
            path: archive,
            classifier: None,
            extension: format.extension().to_owned(),
        }];
        items.extend(jvm_classifier_jars(
            &libs_dir,
            &coordinates,
            &workspace.config.matrix.targets,
        ));
        let published = publisher.publish(&coordinates, &items)?;
        workspace.progress(
            stderr,
            format!("Published {library} {tag} ({} files)", published.len()),
        );
        urls.extend(published);
    }
    Ok(urls)
}

fn report_matrix(workspace: &Workspace, matrix: &BuildMatrix, stderr: &mut dyn Write) {
    if matrix.buildable.is_empty() {
        warn!("no declared target can be built on {}", matrix.host);
    }
    for tuple in &matrix.excluded {
        workspace.progress(stderr, format!("Skipping {tuple} on {} host", matrix.host));
    }
}

fn report_stored(
    workspace: &Workspace,
    packaged: &PackagedArtifact,
    stored: &StoredArtifact,
    stderr: &mut dyn Write,
) {
    let state = if stored.newly_written {
        "stored"
    } else {
        "already stored"
    };
    workspace.progress(
        stderr,
        format!(
            "Packaged {} ({state}, sha256 {})",
            stored.path, packaged.checksum
        ),
    );
}

fn missing_interface(library: WrappedLibrary) -> PipelineError {
    PipelineError::MissingInterface {
        library: library.to_string(),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "flow_tests.rs"]
mod tests;
