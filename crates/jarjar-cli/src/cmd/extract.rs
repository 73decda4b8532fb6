//! Extract command

use std::path::PathBuf;

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use jarjar_core::{Resolver, SelectionPolicy, Settings, cache_path};

use super::COORD_WIDTH;

/// Materialize every selected jar and print where it landed
pub async fn extract(
    jars: &[PathBuf],
    cache: Option<PathBuf>,
    policy: SelectionPolicy,
) -> Result<()> {
    let root = match cache {
        Some(root) => root,
        None => cache_path().context("Could not determine home directory; pass --cache")?,
    };

    let settings = Settings {
        policy,
        ..Settings::default()
    };
    let resolver = Resolver::open(jars, &settings, &root)?;
    let materialized = resolver.resolve_all().await?;

    for (coordinate, path) in &materialized {
        println!(
            "  {:<COORD_WIDTH$} {}",
            coordinate.to_string(),
            path.display()
        );
    }
    eprintln!(
        "{} {} jars in {}",
        "✓".green(),
        materialized.len(),
        root.display().to_string().dark_grey()
    );
    Ok(())
}
