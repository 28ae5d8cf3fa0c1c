//! Codegen command - build the metaprogram and generate sources

use super::{load_builder, print_json, GlobalArgs};
use anyhow::{Context, Result};
use colored::Colorize;
use kiln_build::CodegenStage;

/// Run the codegen command
///
/// With `norun` only the metaprogram is built.
pub fn run(args: &GlobalArgs, norun: bool) -> Result<()> {
    let builder = load_builder(args)?;
    let stage = if norun {
        CodegenStage::MetaprogramOnly
    } else {
        CodegenStage::Full
    };
    let report = builder.codegen(stage).context("Codegen failed")?;

    if args.json {
        return print_json(&serde_json::json!({ "success": true, "codegen": report }));
    }
    if args.chatty() {
        println!(
            "{:>12} {}",
            "Built".green().bold(),
            report.generator.display()
        );
        if !norun {
            for source in &report.generated {
                println!("{:>12} {}", "Generated".green().bold(), source.display());
            }
        }
    }
    Ok(())
}
