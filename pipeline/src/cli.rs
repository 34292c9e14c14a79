//! CLI argument definitions for `bindkit`.
//!
//! This module defines the command-line interface using clap. It is
//! separated from the main entrypoint so the binary stays small and focused
//! on orchestration.

use crate::consumer::RequestedSource;
use crate::interface::HostLanguage;
use bindkit_common::{CONFIG_FILE_NAME, HostOs, WrappedLibrary};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Build, package, and wire native libraries with generated bindings.
#[derive(Parser, Debug)]
#[command(name = "bindkit")]
#[command(version, about)]
#[command(long_about = concat!(
    "Build, package, and wire native libraries with generated bindings.\n\n",
    "bindkit compiles the anoncreds, askar, and indy-vdr wrapper crates for every ",
    "target the host can build, generates Swift and Kotlin bindings from each ",
    "library's interface description, packages the binaries into checksummed ",
    "archives, and renders consumer manifests that link the bindings against ",
    "either a pinned remote release or a locally built archive.\n\n",
    "Set USE_LOCAL_XCFRAMEWORK (any value) to resolve every library from its ",
    "local archive instead of the pinned release.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Show what this host will build:\n",
    "    $ bindkit plan\n\n",
    "  Build, generate, and package askar only:\n",
    "    $ bindkit build --library askar\n\n",
    "  Check that committed Swift bindings are current:\n",
    "    $ bindkit generate --language swift --check\n\n",
    "  Render Package.swift against local archives:\n",
    "    $ USE_LOCAL_XCFRAMEWORK=1 bindkit render\n\n",
    "  Publish packaged archives to the configured registry:\n",
    "    $ bindkit publish",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Configuration file [default: ./bindkit.toml].
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet",
        global = true
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, conflicts_with = "verbosity", global = true)]
    pub quiet: bool,

    /// Use local archives, as if USE_LOCAL_XCFRAMEWORK were set.
    #[arg(long, conflicts_with = "remote", global = true)]
    pub local: bool,

    /// Use pinned remote releases; rejected while USE_LOCAL_XCFRAMEWORK is set.
    #[arg(long, conflicts_with = "local", global = true)]
    pub remote: bool,
}

impl GlobalArgs {
    /// Configuration path, falling back to `bindkit.toml` in the working
    /// directory.
    ///
    /// # Examples
    ///
    /// ```
    /// use bindkit_pipeline::cli::GlobalArgs;
    ///
    /// assert_eq!(GlobalArgs::default().config_path(), "bindkit.toml");
    /// ```
    #[must_use]
    pub fn config_path(&self) -> Utf8PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| Utf8PathBuf::from(CONFIG_FILE_NAME))
    }

    /// The source the user asked for explicitly, if any.
    #[must_use]
    pub const fn requested_source(&self) -> Option<RequestedSource> {
        match (self.local, self.remote) {
            (true, _) => Some(RequestedSource::Local),
            (_, true) => Some(RequestedSource::Remote),
            _ => None,
        }
    }

    /// Log level implied by `-v`/`--quiet`.
    #[must_use]
    pub const fn log_level(&self) -> log::LevelFilter {
        if self.quiet {
            return log::LevelFilter::Error;
        }
        match self.verbosity {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show the build matrix and task stages for this host.
    Plan(PlanArgs),

    /// Compile, generate bindings, and package in dependency order.
    Build(BuildArgs),

    /// Generate Swift and Kotlin bindings from interface descriptions.
    Generate(GenerateArgs),

    /// Package previously built binaries and store the archives.
    Package(PackageArgs),

    /// Resolve every library to a verified remote or local artefact.
    Resolve(ResolveArgs),

    /// Render Package.swift and settings.gradle.kts.
    Render(RenderArgs),

    /// Upload packaged archives to the configured registry.
    Publish(PublishArgs),
}

/// Library and host selection shared by the producer commands.
#[derive(Args, Debug, Clone, Default)]
pub struct SelectionArgs {
    /// Restrict to one library (repeatable) [default: every configured one].
    #[arg(short, long, value_name = "LIB")]
    pub library: Vec<WrappedLibrary>,

    /// Plan for another build host [default: this machine].
    #[arg(long, value_name = "OS")]
    pub host: Option<HostOs>,
}

/// Arguments for `plan`.
#[derive(Args, Debug, Clone, Default)]
pub struct PlanArgs {
    /// Libraries and host.
    #[command(flatten)]
    pub selection: SelectionArgs,
}

/// Arguments for `build`.
#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Libraries and host.
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Compile and generate only; skip packaging.
    #[arg(long)]
    pub no_package: bool,
}

/// Arguments for `generate`.
#[derive(Args, Debug, Clone, Default)]
pub struct GenerateArgs {
    /// Restrict to one library (repeatable).
    #[arg(short, long, value_name = "LIB")]
    pub library: Vec<WrappedLibrary>,

    /// Restrict to one host language (repeatable).
    #[arg(long, value_enum, value_name = "LANG")]
    pub language: Vec<HostLanguage>,

    /// Verify existing files instead of writing them.
    #[arg(long)]
    pub check: bool,
}

/// Arguments for `package`.
#[derive(Args, Debug, Clone, Default)]
pub struct PackageArgs {
    /// Restrict to one library (repeatable).
    #[arg(short, long, value_name = "LIB")]
    pub library: Vec<WrappedLibrary>,
}

/// Arguments for `resolve`.
#[derive(Args, Debug, Clone, Default)]
pub struct ResolveArgs {
    /// Remote artefact cache [default: platform cache directory].
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<Utf8PathBuf>,
}

/// Arguments for `render`.
#[derive(Args, Debug, Clone, Default)]
pub struct RenderArgs {
    /// Remote artefact cache [default: platform cache directory].
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<Utf8PathBuf>,

    /// Directory receiving the manifests [default: configuration directory].
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<Utf8PathBuf>,
}

/// Arguments for `publish`.
#[derive(Args, Debug, Clone, Default)]
pub struct PublishArgs {
    /// Restrict to one library (repeatable).
    #[arg(short, long, value_name = "LIB")]
    pub library: Vec<WrappedLibrary>,

    /// Directory holding JVM classifier jars [default: OUT_DIR/libs].
    #[arg(long, value_name = "DIR")]
    pub libs_dir: Option<Utf8PathBuf>,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
