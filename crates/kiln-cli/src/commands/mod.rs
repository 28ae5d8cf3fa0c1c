//! CLI command implementations

pub mod build;
pub mod clean;
pub mod codegen;
pub mod pch;
pub mod regen;
pub mod run;

use anyhow::{Context, Result};
use kiln_build::{Builder, SettingsOverrides};
use kiln_config::{ConfigLoader, MANIFEST_FILE};
use std::path::PathBuf;

/// Options shared by every command
#[derive(clap::Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Start directory; kiln.toml is searched upwards from here
    #[arg(short = 'C', long = "dir", global = true, default_value = ".")]
    pub dir: PathBuf,
    /// Compiler family (gcc, clang, msvc)
    #[arg(long, global = true)]
    pub toolchain: Option<String>,
    /// Build profile (dev, release, or custom)
    #[arg(long, global = true)]
    pub profile: Option<String>,
    /// Shorthand for --profile=release
    #[arg(long, global = true, conflicts_with = "profile")]
    pub release: bool,
    /// Executor program
    #[arg(long, global = true)]
    pub executor: Option<PathBuf>,
    /// Rewrite descriptions even when up to date
    #[arg(long, global = true)]
    pub force: bool,
    /// Debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
    /// Warnings and errors only
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,
    /// Print results as JSON
    #[arg(long, global = true, env = "KILN_JSON")]
    pub json: bool,
}

impl GlobalArgs {
    fn overrides(&self) -> SettingsOverrides {
        let profile = if self.release {
            Some("release".to_string())
        } else {
            self.profile.clone()
        };
        SettingsOverrides {
            toolchain: self.toolchain.clone(),
            profile,
            executor: self.executor.clone(),
            ..Default::default()
        }
    }

    /// Human-readable output is wanted
    pub fn chatty(&self) -> bool {
        !self.json && !self.quiet
    }
}

/// Load the workspace and resolve a builder for it
pub fn load_builder(args: &GlobalArgs) -> Result<Builder> {
    // Absolute, so the manifest search can walk past the start directory
    let start = args
        .dir
        .canonicalize()
        .with_context(|| format!("Directory not found: {}", args.dir.display()))?;
    let config = ConfigLoader::new()
        .load_from_directory(&start)
        .with_context(|| {
            format!(
                "Failed to load {} from {}",
                MANIFEST_FILE,
                args.dir.display()
            )
        })?;

    let builder = Builder::from_config(&config, &args.overrides())
        .context("Failed to resolve build settings")?;

    // Executor output would corrupt JSON on stdout
    Ok(builder.with_force(args.force).with_echo(!args.json))
}

/// Print a JSON value on stdout
pub fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
