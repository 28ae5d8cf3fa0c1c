//! Regen command - force-rewrite build descriptions

use super::{load_builder, print_json, GlobalArgs};
use anyhow::{Context, Result};
use colored::Colorize;

/// Run the regen command
pub fn run(args: &GlobalArgs, project: Option<&str>) -> Result<()> {
    let builder = load_builder(args)?;
    let written = builder
        .regen(project)
        .context("Failed to regenerate build descriptions")?;

    if args.json {
        let projects: Vec<_> = written
            .iter()
            .map(|(name, result)| serde_json::json!({ "name": name, "write": result }))
            .collect();
        return print_json(&serde_json::json!({ "success": true, "projects": projects }));
    }

    if args.chatty() {
        for (name, _) in &written {
            let description = builder.projects().project(name)?.description_path();
            println!(
                "{:>12} {} ({})",
                "Wrote".green().bold(),
                description.display(),
                name
            );
        }
    }
    Ok(())
}
