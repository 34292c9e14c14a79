//! Native library build units.
//!
//! Compiles one wrapper crate for one target tuple with `cargo` or `cross`
//! and locates the resulting library. Commands go through the
//! [`CommandExecutor`] seam so that tests never spawn a compiler.

use bindkit_common::{Platform, PlannedTarget, Profile, TargetTuple, WrappedLibrary};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use std::io;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use wait_timeout::ChildExt;

/// Variable holding the minimum macOS version for Apple toolchains.
pub const MACOS_DEPLOYMENT_VAR: &str = "MACOSX_DEPLOYMENT_TARGET";

/// Variable holding the minimum iOS version for Apple toolchains.
pub const IOS_DEPLOYMENT_VAR: &str = "IPHONEOS_DEPLOYMENT_TARGET";

/// Default time allowed for one compiler invocation (30 minutes).
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(1800);

/// Errors raised while compiling native libraries.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The compiler could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Executable name.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The compiler did not finish in time and was killed.
    #[error("{program} timed out after {seconds} seconds")]
    Timeout {
        /// Executable name.
        program: String,
        /// Timeout that elapsed.
        seconds: u64,
    },

    /// The compiler exited unsuccessfully.
    #[error("build of {library} for {tuple} failed: {message}")]
    CompileFailed {
        /// Library being built.
        library: WrappedLibrary,
        /// Target being built.
        tuple: TargetTuple,
        /// Trimmed compiler stderr.
        message: String,
    },

    /// The compiler succeeded but the expected library is absent.
    #[error("build of {library} for {tuple} produced no library at {path}")]
    MissingBinary {
        /// Library being built.
        library: WrappedLibrary,
        /// Target being built.
        tuple: TargetTuple,
        /// Path that was expected to exist.
        path: Utf8PathBuf,
    },

    /// Test stub received an unexpected command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of the unexpected invocation.
        message: String,
    },
}

/// Abstraction over running external commands.
#[cfg_attr(test, mockall::automock)]
pub trait CommandExecutor: Send + Sync {
    /// Run `cmd` with `args`, adding `env` to the inherited environment,
    /// and capture its output.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Spawn`] or [`BuildError::Timeout`].
    fn run<'a, 'b, 'c>(
        &self,
        cmd: &str,
        args: &[&'a str],
        env: &[(&'b str, &'c str)],
    ) -> Result<Output, BuildError>;
}

/// Runs commands on the host, killing any that exceed the timeout.
#[derive(Debug, Clone, Copy)]
pub struct SystemCommandExecutor {
    timeout: Duration,
}

impl SystemCommandExecutor {
    /// Create an executor with the given per-command timeout.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemCommandExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_BUILD_TIMEOUT)
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, cmd: &str, args: &[&str], env: &[(&str, &str)]) -> Result<Output, BuildError> {
        let spawn_err = |source| BuildError::Spawn {
            program: cmd.to_owned(),
            source,
        };
        let mut child = Command::new(cmd)
            .args(args)
            .envs(env.iter().copied())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;

        // Drain both pipes while waiting so a chatty compiler cannot block
        // on a full pipe.
        let stdout = child
            .stdout
            .take()
            .map(|pipe| thread::spawn(move || io::read_to_string(pipe)));
        let stderr = child
            .stderr
            .take()
            .map(|pipe| thread::spawn(move || io::read_to_string(pipe)));

        let Some(status) = child.wait_timeout(self.timeout).map_err(spawn_err)? else {
            if let Err(err) = child.kill().and_then(|()| child.wait().map(drop)) {
                debug!("failed to reap timed-out {cmd}: {err}");
            }
            return Err(BuildError::Timeout {
                program: cmd.to_owned(),
                seconds: self.timeout.as_secs(),
            });
        };
        Ok(Output {
            status,
            stdout: collect(stdout).into_bytes(),
            stderr: collect(stderr).into_bytes(),
        })
    }
}

fn collect(reader: Option<thread::JoinHandle<io::Result<String>>>) -> String {
    reader
        .and_then(|handle| handle.join().ok())
        .and_then(Result::ok)
        .unwrap_or_default()
}

/// A compiled native library for one (library, target, profile).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeLibraryTarget {
    /// Library the binary implements.
    pub library: WrappedLibrary,
    /// Target it was compiled for.
    pub tuple: TargetTuple,
    /// Build profile.
    pub profile: Profile,
    /// Path of the compiled library.
    pub binary: Utf8PathBuf,
}

/// Configuration shared by every build unit.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Root of the workspace holding the wrapper crates.
    pub workspace_root: Utf8PathBuf,
    /// Cargo target directory.
    pub target_dir: Utf8PathBuf,
    /// Build profile.
    pub profile: Profile,
    /// Minimum macOS version passed to the compiler for macOS targets.
    pub macos_deployment_target: String,
    /// Minimum iOS version passed to the compiler for iOS device and
    /// simulator targets.
    pub ios_deployment_target: String,
}

impl BuildConfig {
    /// Path where cargo places the library for `library` on `tuple`.
    #[must_use]
    pub fn binary_path(&self, library: WrappedLibrary, tuple: TargetTuple) -> Utf8PathBuf {
        self.target_dir
            .join(tuple.rust_triple())
            .join(self.profile.dir_name())
            .join(tuple.library_file_name(&library.crate_name()))
    }

    /// Environment variables the compiler needs for `tuple`.
    ///
    /// Apple targets carry their deployment minimum so that rustc and any
    /// C dependencies built through `cc` agree on it; other targets need
    /// nothing extra.
    #[must_use]
    pub fn build_env(&self, tuple: TargetTuple) -> Vec<(&'static str, &str)> {
        match tuple.platform() {
            Platform::MacOs => vec![(MACOS_DEPLOYMENT_VAR, self.macos_deployment_target.as_str())],
            Platform::Ios | Platform::IosSimulator => {
                vec![(IOS_DEPLOYMENT_VAR, self.ios_deployment_target.as_str())]
            }
            Platform::Linux | Platform::Windows | Platform::Android => Vec::new(),
        }
    }

    fn manifest_path(&self, library: WrappedLibrary) -> Utf8PathBuf {
        self.workspace_root
            .join(library.descriptor().crate_dir)
            .join("Cargo.toml")
    }
}

/// Compiles wrapper crates through a [`CommandExecutor`].
pub struct NativeBuilder<'a> {
    config: &'a BuildConfig,
    executor: &'a dyn CommandExecutor,
}

impl<'a> NativeBuilder<'a> {
    /// Create a builder.
    #[must_use]
    pub fn new(config: &'a BuildConfig, executor: &'a dyn CommandExecutor) -> Self {
        Self { config, executor }
    }

    /// Compile `library` for one planned target.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::CompileFailed`] when the compiler exits
    /// unsuccessfully, [`BuildError::MissingBinary`] when no library was
    /// produced, and spawn or timeout errors from the executor.
    pub fn build(
        &self,
        library: WrappedLibrary,
        target: PlannedTarget,
    ) -> Result<NativeLibraryTarget, BuildError> {
        let tuple = target.tuple;
        let manifest = self.config.manifest_path(library);
        let args = build_args(&manifest, &self.config.target_dir, tuple, self.config.profile);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let env = self.config.build_env(tuple);
        let program = target.tool.program();
        debug!("{program} {} (env: {env:?})", arg_refs.join(" "));

        let output = self.executor.run(program, &arg_refs, &env)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BuildError::CompileFailed {
                library,
                tuple,
                message: stderr.trim().to_owned(),
            });
        }

        let binary = self.config.binary_path(library, tuple);
        if !binary.is_file() {
            return Err(BuildError::MissingBinary {
                library,
                tuple,
                path: binary,
            });
        }
        info!("built {library} for {tuple} with {program}");
        Ok(NativeLibraryTarget {
            library,
            tuple,
            profile: self.config.profile,
            binary,
        })
    }
}

/// Arguments passed to `cargo`/`cross` for one target.
fn build_args(
    manifest: &Utf8Path,
    target_dir: &Utf8Path,
    tuple: TargetTuple,
    profile: Profile,
) -> Vec<String> {
    let mut args = vec![
        "build".to_owned(),
        "--lib".to_owned(),
        "--manifest-path".to_owned(),
        manifest.to_string(),
        "--target".to_owned(),
        tuple.rust_triple().to_owned(),
        "--target-dir".to_owned(),
        target_dir.to_string(),
    ];
    if profile == Profile::Release {
        args.push("--release".to_owned());
    }
    args
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
