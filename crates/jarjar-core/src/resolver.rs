//! Runtime resolution
//!
//! Reads the manifests of a set of outer jars, reconciles them once, and
//! answers "where on disk is the jar for this coordinate?" by materializing
//! the selected copy through the extraction cache.

use std::fmt;
use std::path::{Path, PathBuf};

use jarjar_schema::ArtifactCoordinate;
use thiserror::Error;
use tracing::debug;

use crate::cache::{ArchiveSource, ExtractionCache, ExtractionError, ExtractionKey, JarSource};
use crate::config::Settings;
use crate::io::jar::{self, JarError};
use crate::selection::{self, ArchiveId, Selection, SelectionError};

/// Errors from opening or querying a [`Resolver`].
#[derive(Error, Debug)]
pub enum ResolveError {
    /// An outer jar or its manifest could not be read.
    #[error(transparent)]
    Jar(#[from] JarError),

    /// The manifests could not be reconciled.
    #[error(transparent)]
    Selection(#[from] SelectionError),

    /// Nothing embedded was selected for the coordinate.
    #[error("No embedded jar is selected for {0}")]
    NotFound(ArtifactCoordinate),

    /// The selected copy could not be materialized.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

/// A reconciled selection backed by an extraction cache.
pub struct Resolver<S = JarSource> {
    selection: Selection,
    cache: ExtractionCache<S>,
}

impl<S> fmt::Debug for Resolver<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("selection", &self.selection)
            .field("cache", &self.cache)
            .finish()
    }
}

impl Resolver<JarSource> {
    /// Read manifests from `jars` and reconcile them. Jars without a
    /// manifest take no part.
    pub fn open(
        jars: &[PathBuf],
        settings: &Settings,
        cache_root: &Path,
    ) -> Result<Self, ResolveError> {
        let mut manifests = Vec::with_capacity(jars.len());
        for path in jars {
            match jar::read_metadata(path)? {
                Some(metadata) => manifests.push((ArchiveId::from(path.as_path()), metadata)),
                None => debug!("{} has no jar-in-jar manifest", path.display()),
            }
        }

        let selection = selection::select(&manifests, settings.policy)?;
        Ok(Self::new(selection, ExtractionCache::open(cache_root)))
    }
}

impl<S: ArchiveSource> Resolver<S> {
    /// Wrap an existing selection and cache.
    pub fn new(selection: Selection, cache: ExtractionCache<S>) -> Self {
        Self { selection, cache }
    }

    /// The reconciled selection.
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Path of the materialized jar selected for `coordinate`.
    pub async fn resolve(&self, coordinate: &ArtifactCoordinate) -> Result<PathBuf, ResolveError> {
        let jar = self
            .selection
            .get(coordinate)
            .ok_or_else(|| ResolveError::NotFound(coordinate.clone()))?;
        Ok(self.cache.materialize(&ExtractionKey::from(jar)).await?)
    }

    /// Materialize every selected jar, concurrently, in selection order.
    pub async fn resolve_all(&self) -> Result<Vec<(ArtifactCoordinate, PathBuf)>, ResolveError> {
        let mut tasks = tokio::task::JoinSet::new();
        for (index, (coordinate, jar)) in self.selection.iter().enumerate() {
            let cache = self.cache.clone();
            let key = ExtractionKey::from(jar);
            let coordinate = coordinate.clone();
            tasks.spawn(async move { (index, coordinate, cache.materialize(&key).await) });
        }

        let mut resolved = Vec::with_capacity(self.selection.len());
        while let Some(joined) = tasks.join_next().await {
            let Ok((index, coordinate, result)) = joined else {
                return Err(ExtractionError::Abandoned("resolve task".into()).into());
            };
            resolved.push((index, coordinate, result?));
        }
        resolved.sort_by_key(|(index, _, _)| *index);
        Ok(resolved
            .into_iter()
            .map(|(_, coordinate, path)| (coordinate, path))
            .collect())
    }
}
