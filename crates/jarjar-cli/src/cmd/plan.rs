//! Plan command

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use jarjar_core::{BuildFile, Planner};

/// Print (or write) the manifest a build would produce
pub fn plan(build: &Path, out: Option<&Path>) -> Result<()> {
    let build_file = BuildFile::load(build)
        .with_context(|| format!("Failed to load {}", build.display()))?;
    let plan = Planner::new(&build_file.package).plan(&build_file.declarations())?;
    let manifest = plan.metadata.encode()?;

    match out {
        Some(path) => {
            fs::write(path, &manifest)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{} Wrote manifest to {}", "✓".green(), path.display());
        }
        None => print!("{}", String::from_utf8_lossy(&manifest)),
    }

    for write in &plan.writes {
        eprintln!(
            "  {} {} {}",
            write.source.display().to_string().dark_grey(),
            "→".dark_grey(),
            write.destination
        );
    }
    let constraints = plan.metadata.len() - plan.writes.len();
    if constraints > 0 {
        eprintln!("  {constraints} constraint-only entries");
    }
    Ok(())
}
