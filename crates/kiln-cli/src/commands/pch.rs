//! Pch command - build precompiled headers only

use super::{load_builder, print_json, GlobalArgs};
use anyhow::{Context, Result};
use colored::Colorize;

/// Run the pch command
pub fn run(args: &GlobalArgs, project: Option<&str>) -> Result<()> {
    let builder = load_builder(args)?;
    let headers = builder
        .pch(project)
        .context("Failed to build precompiled headers")?;

    if args.json {
        return print_json(&serde_json::json!({ "success": true, "pch": headers }));
    }
    if args.chatty() {
        if headers.is_empty() {
            println!("No project declares a precompiled header");
        }
        for header in &headers {
            println!("{:>12} {}", "Compiled".green().bold(), header.display());
        }
    }
    Ok(())
}
