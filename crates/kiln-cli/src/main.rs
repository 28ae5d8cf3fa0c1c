use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use kiln_build::BuildError;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::GlobalArgs;

/// Kiln native build orchestrator.
///
/// Kiln turns a workspace of C++ projects into Ninja build descriptions,
/// runs the reflection codegen stages and drives the executor over every
/// project in dependency order. Without a command it builds everything and
/// then runs the default executable.
///
/// EXAMPLES:
///     kiln                         Build everything, then run
///     kiln build engine            Build one project
///     kiln build --release         Build with the release profile
///     kiln regen                   Rewrite every build.ninja
///     kiln codegen --norun         Build the metaprogram only
///     kiln clean                   Clean every project
///
/// ENVIRONMENT VARIABLES:
///     KILN_TOOLCHAIN    Compiler family (gcc, clang, msvc)
///     KILN_PROFILE      Build profile
///     KILN_EXECUTOR     Executor program (default: ninja)
///     KILN_JSON         Set to '1' for JSON output by default
///     RUST_LOG          Log filter, overrides -v/-q
#[derive(Parser)]
#[command(name = "kiln")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    global: GlobalArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Build projects
    ///
    /// Runs the codegen stages when a selected project compiles generated
    /// sources, then writes each project's description, runs the executor
    /// and publishes the artifact into the bin directory. With a project
    /// name only that project is built; its dependencies must already be
    /// published.
    ///
    /// EXAMPLES:
    ///     kiln build                 Build all projects in order
    ///     kiln build game            Build only 'game'
    ///     kiln build --force         Rewrite descriptions first
    #[command(visible_alias = "b")]
    Build {
        /// Project to build (default: all)
        project: Option<String>,
    },

    /// Rewrite build descriptions without running the executor
    ///
    /// EXAMPLES:
    ///     kiln regen                 Rewrite every description
    ///     kiln regen engine          Rewrite one description
    Regen {
        /// Project to regenerate (default: all)
        project: Option<String>,
    },

    /// Remove build outputs
    ///
    /// Runs the executor's clean tool over each existing description.
    /// Without a project the codegen stages and generated sources go too.
    /// Projects that were never configured are skipped with a warning.
    Clean {
        /// Project to clean (default: all)
        project: Option<String>,
    },

    /// Run a published executable
    ///
    /// Runs from the bin directory with the project's `run_args`.
    ///
    /// EXAMPLES:
    ///     kiln run                   Run the default executable
    ///     kiln run editor            Run 'editor'
    #[command(visible_alias = "r")]
    Run {
        /// Executable project (default: the last one in build order)
        project: Option<String>,
    },

    /// Build precompiled headers only
    Pch {
        /// Project whose header to build (default: every project with one)
        project: Option<String>,
    },

    /// Run the reflection codegen stages
    ///
    /// Builds the metaprogram, then runs it once per descriptor.
    ///
    /// EXAMPLES:
    ///     kiln codegen               Both stages
    ///     kiln codegen norun         Build the metaprogram only
    ///     kiln codegen --norun       Same as above
    Codegen {
        /// 'norun' builds the metaprogram without generating sources
        #[arg(value_parser = ["norun"])]
        mode: Option<String>,
        /// Build the metaprogram without generating sources
        #[arg(long)]
        norun: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.global.verbose, cli.global.quiet);

    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::from(exit_code(&err))
        }
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    let global = cli.global;
    match cli.command {
        None => commands::build::build_and_run(&global),
        Some(Commands::Build { project }) => commands::build::run(&global, project.as_deref()),
        Some(Commands::Regen { project }) => commands::regen::run(&global, project.as_deref()),
        Some(Commands::Clean { project }) => commands::clean::run(&global, project.as_deref()),
        Some(Commands::Run { project }) => commands::run::run(&global, project.as_deref()),
        Some(Commands::Pch { project }) => commands::pch::run(&global, project.as_deref()),
        Some(Commands::Codegen { mode, norun }) => {
            commands::codegen::run(&global, norun || mode.is_some())
        }
    }
}

/// Install the stderr subscriber; RUST_LOG wins over the flags
fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();
}

fn report_error(err: &anyhow::Error) {
    // The executor already echoed its output; don't print it twice
    if let Some(BuildError::ExternalToolFailure { tool, code, .. }) =
        err.downcast_ref::<BuildError>()
    {
        eprintln!(
            "{} {} failed with exit code {}",
            "error:".red().bold(),
            tool,
            code
        );
        return;
    }
    eprintln!("{} {:#}", "error:".red().bold(), err);
}

/// A failing child's exit code passes through, everything else is 1
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<BuildError>()
        .map(BuildError::exit_code)
        .and_then(|code| u8::try_from(code).ok())
        .filter(|code| *code != 0)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_exit_code_through_context() {
        let err: anyhow::Error = Err::<(), _>(BuildError::tool_failure("ninja", 7, ""))
            .context("Build failed")
            .unwrap_err();
        assert_eq!(exit_code(&err), 7);
        assert_eq!(exit_code(&anyhow::anyhow!("no manifest")), 1);
    }

    #[test]
    fn test_exit_code_out_of_range() {
        let err = anyhow::Error::new(BuildError::tool_failure("ninja", 300, ""));
        assert_eq!(exit_code(&err), 1);
    }

    #[test]
    fn test_no_command_parses() {
        let cli = Cli::try_parse_from(["kiln", "--release", "-C", "ws"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.global.release);
        assert_eq!(cli.global.dir, std::path::PathBuf::from("ws"));
    }

    #[test]
    fn test_codegen_norun_forms() {
        for args in [&["kiln", "codegen", "norun"][..], &["kiln", "codegen", "--norun"]] {
            let cli = Cli::try_parse_from(args.iter().copied()).unwrap();
            assert!(matches!(
                cli.command,
                Some(Commands::Codegen { mode, norun }) if norun || mode.is_some()
            ));
        }
        let cli = Cli::try_parse_from(["kiln", "codegen"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Codegen { mode: None, norun: false })
        ));
        assert!(Cli::try_parse_from(["kiln", "codegen", "run"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["kiln", "build", "engine", "--force", "-v"]).unwrap();
        assert!(cli.global.force);
        assert!(cli.global.verbose);
        assert!(matches!(cli.command, Some(Commands::Build { project: Some(p) }) if p == "engine"));
    }
}
