//! Run command - execute a published executable

use super::{load_builder, print_json, GlobalArgs};
use anyhow::{Context, Result};

/// Run the run command
///
/// The program inherits stdio; a non-zero exit surfaces as its exit code.
pub fn run(args: &GlobalArgs, project: Option<&str>) -> Result<()> {
    let builder = load_builder(args)?;
    let program = builder.run(project).context("Run failed")?;

    if args.json {
        print_json(&serde_json::json!({ "success": true, "ran": program }))?;
    }
    Ok(())
}
