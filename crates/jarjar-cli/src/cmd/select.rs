//! Select command

use std::path::PathBuf;

use anyhow::Result;
use crossterm::style::Stylize;
use jarjar_core::SelectionPolicy;
use serde_json::json;

use super::{COORD_WIDTH, jar_name, reconcile};

/// Reconcile several jars and print what would be used
pub fn select(jars: &[PathBuf], policy: SelectionPolicy, as_json: bool) -> Result<()> {
    let selection = reconcile(jars, policy)?;

    if as_json {
        let items: Vec<_> = selection
            .iter()
            .map(|(coordinate, jar)| {
                json!({
                    "identifier": coordinate,
                    "version": jar.version,
                    "source": jar.source.as_str(),
                    "path": jar.path,
                    "isObfuscated": jar.obfuscated,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if selection.is_empty() {
        println!("{}", "Nothing to select".dark_grey());
        return Ok(());
    }

    for (coordinate, jar) in selection.iter() {
        println!(
            "  {:<COORD_WIDTH$} {} {}",
            coordinate.to_string(),
            format!("{:<12}", jar.version.as_str()).cyan(),
            format!("from {}", jar_name(&jar.source)).dark_grey()
        );
    }
    Ok(())
}
