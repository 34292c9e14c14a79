//! bindkit CLI entrypoint.
//!
//! Parses arguments, initialises logging, reads the local-override switch
//! once, and dispatches to the command flows. The first Ctrl-C cancels
//! in-flight downloads; a second one exits immediately.

use bindkit_pipeline::artefact::fetch::{CancellationToken, HttpFetcher};
use bindkit_pipeline::builder::SystemCommandExecutor;
use bindkit_pipeline::cli::{Cli, Command};
use bindkit_pipeline::consumer::OverrideMode;
use bindkit_pipeline::error::{PipelineError, Result};
use bindkit_pipeline::flow::{self, Workspace};
use bindkit_pipeline::output::write_stderr_line;
use clap::Parser;
use log::warn;
use std::io::Write;

/// Conventional exit status for a process stopped by SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);
    let cancel = CancellationToken::new();
    install_interrupt_handler(&cancel);
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, OverrideMode::from_env(), &cancel, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

/// `-v`/`--quiet` set the default level; `RUST_LOG` overrides it.
fn init_logging(cli: &Cli) {
    env_logger::Builder::new()
        .filter_level(cli.global.log_level())
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn install_interrupt_handler(cancel: &CancellationToken) {
    let token = cancel.clone();
    let installed = ctrlc::set_handler(move || {
        if token.is_cancelled() {
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
        token.cancel();
    });
    if let Err(err) = installed {
        warn!("Ctrl-C will not cancel downloads: {err}");
    }
}

fn run(
    cli: &Cli,
    env_mode: OverrideMode,
    cancel: &CancellationToken,
    stderr: &mut dyn Write,
) -> Result<()> {
    // Step 1: Load configuration
    let workspace = Workspace::load(&cli.global.config_path(), cli.global.quiet)?;

    // Step 2: Combine the environment switch with --local/--remote
    let mode = OverrideMode::resolve(env_mode, cli.global.requested_source())?;

    // Step 3: Dispatch
    match &cli.command {
        Command::Plan(args) => flow::plan(&workspace, args, stderr),
        Command::Build(args) => {
            flow::build(&workspace, args, &SystemCommandExecutor::default(), stderr).map(drop)
        }
        Command::Generate(args) => flow::generate_bindings(&workspace, args, stderr).map(drop),
        Command::Package(args) => flow::package(&workspace, args, stderr).map(drop),
        Command::Resolve(args) => {
            flow::resolve(&workspace, mode, args, &HttpFetcher, cancel, stderr).map(drop)
        }
        Command::Render(args) => {
            flow::render(&workspace, mode, args, &HttpFetcher, cancel, stderr).map(drop)
        }
        Command::Publish(args) => flow::publish(&workspace, args, stderr).map(drop),
    }
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, format!("error ({}): {err}", err.kind()));
            1
        }
    }
}
