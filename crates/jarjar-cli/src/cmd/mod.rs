//! Command modules - one file per CLI command

pub mod extract;
pub mod inspect;
pub mod pack;
pub mod plan;
pub mod select;

use std::path::PathBuf;

use anyhow::{Context, Result};
use jarjar_core::io::jar;
use jarjar_core::{ArchiveId, Selection, SelectionPolicy};
use tracing::debug;

/// Display width of a coordinate column.
pub(crate) const COORD_WIDTH: usize = 40;

/// Read every jar's manifest and reconcile them.
pub(crate) fn reconcile(jars: &[PathBuf], policy: SelectionPolicy) -> Result<Selection> {
    let mut manifests = Vec::with_capacity(jars.len());
    for path in jars {
        match jar::read_metadata(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
        {
            Some(metadata) => manifests.push((ArchiveId::from(path.as_path()), metadata)),
            None => debug!("{} has no jar-in-jar manifest, skipping", path.display()),
        }
    }
    Ok(jarjar_core::select(&manifests, policy)?)
}

/// Short display name for an outer jar.
pub(crate) fn jar_name(id: &ArchiveId) -> String {
    id.as_path()
        .file_name()
        .map_or_else(|| id.to_string(), |n| n.to_string_lossy().into_owned())
}

