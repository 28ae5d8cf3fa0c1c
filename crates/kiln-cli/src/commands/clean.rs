//! Clean command - remove build outputs through the executor

use super::{load_builder, print_json, GlobalArgs};
use anyhow::{Context, Result};
use colored::Colorize;

/// Run the clean command
pub fn run(args: &GlobalArgs, project: Option<&str>) -> Result<()> {
    let builder = load_builder(args)?;
    let cleaned = builder.clean(project).context("Clean failed")?;

    if args.json {
        return print_json(&serde_json::json!({ "success": true, "cleaned": cleaned }));
    }
    if args.chatty() {
        for name in &cleaned {
            println!("{:>12} {}", "Cleaned".green().bold(), name);
        }
    }
    Ok(())
}
