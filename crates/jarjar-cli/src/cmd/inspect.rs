//! Inspect command

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Result, bail};
use crossterm::style::Stylize;
use jarjar_core::io::jar;

use super::COORD_WIDTH;

/// Show the manifest stored in a jar
pub fn inspect(path: &Path, json: bool) -> Result<()> {
    let Some(metadata) = jar::read_metadata(path)? else {
        bail!("{} has no jar-in-jar manifest", path.display());
    };

    if json {
        print!("{}", String::from_utf8_lossy(&metadata.encode()?));
        return Ok(());
    }

    let names = jar::entry_names(path)?;
    let present: HashSet<&str> = names.iter().map(String::as_str).collect();

    println!();
    println!(
        "  {} {}",
        path.display().to_string().white().bold(),
        format!("{} entries", metadata.len()).dark_grey()
    );
    println!();

    for entry in metadata.entries() {
        let version = entry
            .artifact_version()
            .map_or_else(|| "?".to_string(), ToString::to_string);
        let range = entry
            .range()
            .map_or_else(String::new, ToString::to_string);

        let mut flags = Vec::new();
        if entry.constraint {
            flags.push("constraint".yellow().to_string());
        } else if !present.contains(entry.path.as_str()) {
            flags.push("missing".red().to_string());
        }
        if entry.obfuscated {
            flags.push("obfuscated".dark_grey().to_string());
        }

        println!(
            "  {:<COORD_WIDTH$} {} {} {}",
            entry.coordinate.to_string(),
            format!("{version:<12}").cyan(),
            range.dark_grey(),
            flags.join(" ")
        );
        println!("  {:<COORD_WIDTH$} {}", "", entry.path.as_str().dark_grey());
    }
    Ok(())
}
