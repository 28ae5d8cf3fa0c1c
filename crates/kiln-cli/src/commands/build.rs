//! Build command - codegen, then describe, execute and publish each project

use super::{load_builder, print_json, GlobalArgs};
use anyhow::{Context, Result};
use colored::Colorize;
use kiln_build::{BuildOutcome, Builder, WriteResult};

/// Run the build command
pub fn run(args: &GlobalArgs, project: Option<&str>) -> Result<()> {
    let builder = load_builder(args)?;
    let outcome = builder.build(project).context("Build failed")?;
    report(args, &builder, &outcome)
}

/// Full build followed by running the default executable
pub fn build_and_run(args: &GlobalArgs) -> Result<()> {
    let builder = load_builder(args)?;
    let outcome = builder.build(None).context("Build failed")?;
    report(args, &builder, &outcome)?;

    let program = builder.run(None).context("Run failed")?;
    if args.json {
        print_json(&serde_json::json!({ "ran": program }))?;
    }
    Ok(())
}

fn report(args: &GlobalArgs, builder: &Builder, outcome: &BuildOutcome) -> Result<()> {
    let settings = builder.settings();

    if args.json {
        return print_json(&serde_json::json!({
            "success": true,
            "profile": settings.profile.name,
            "toolchain": settings.toolchain.family().to_string(),
            "platform": settings.platform.to_string(),
            "codegen": outcome.codegen,
            "projects": outcome.projects,
            "total_time": outcome.stats.total_time.as_secs_f64(),
            "codegen_time": outcome.stats.codegen_time.as_secs_f64(),
            "descriptions_written": outcome.stats.descriptions_written,
        }));
    }
    if !args.chatty() {
        return Ok(());
    }

    if let Some(codegen) = &outcome.codegen {
        println!(
            "{:>12} {} sources from {}",
            "Generated".green().bold(),
            codegen.generated.len(),
            codegen.generator.display()
        );
    }
    for project in &outcome.projects {
        let description = match project.write {
            WriteResult::Skipped => "up to date".to_string(),
            WriteResult::Written(reason) => format!("description {}", reason),
        };
        println!(
            "{:>12} {} ({}, {:.2}s)",
            "Built".green().bold(),
            project.name,
            description,
            project.duration.as_secs_f64()
        );
    }

    println!("\n{}", "=".repeat(60));
    println!(
        "Build succeeded in {:.2}s",
        outcome.stats.total_time.as_secs_f64()
    );
    println!("{}", "=".repeat(60));
    println!("  Profile: {}", settings.profile.name);
    println!(
        "  Toolchain: {} on {}",
        settings.toolchain.family(),
        settings.platform
    );
    println!("  Projects: {} built", outcome.stats.projects_built);
    println!(
        "  Descriptions: {} written",
        outcome.stats.descriptions_written
    );
    println!("  Bin dir: {}", settings.bin_dir.display());
    println!("{}", "=".repeat(60));
    Ok(())
}
