//! Pack command

use std::path::Path;

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use jarjar_core::io::jar::write_jar;
use jarjar_core::{BuildFile, Planner};

/// Write a jar with every declared dependency embedded
pub fn pack(build: &Path, input: Option<&Path>, output: &Path) -> Result<()> {
    let build_file = BuildFile::load(build)
        .with_context(|| format!("Failed to load {}", build.display()))?;
    let plan = Planner::new(&build_file.package).plan(&build_file.declarations())?;

    write_jar(input, &plan, output)?;

    println!(
        "{} Packed {} jars ({} constraints) into {}",
        "✓".green(),
        plan.writes.len(),
        plan.metadata.len() - plan.writes.len(),
        output.display().to_string().bold()
    );
    Ok(())
}
