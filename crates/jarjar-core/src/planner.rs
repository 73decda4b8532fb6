//! Packaging planner
//!
//! Turns one build's dependency declarations into the manifest that ships
//! inside the jar, plus the list of archives the jar writer must copy.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use jarjar_schema::{
    ArtifactCoordinate, ArtifactVersion, ContainedJarEntry, ContainedVersion, JARJAR_DIR, Metadata,
    MetadataError, RangeError, VersionRange,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Settings;

/// Errors that abort planning (and therefore the build).
#[derive(Error, Debug)]
pub enum PlanError {
    /// The same coordinate was declared twice.
    #[error("Duplicate declaration for {0}")]
    DuplicateCoordinate(ArtifactCoordinate),

    /// A declared range could not be parsed.
    #[error("Invalid range for {coordinate}: {source}")]
    MalformedRange {
        /// Declaration with the bad range.
        coordinate: ArtifactCoordinate,
        /// Parser error.
        source: RangeError,
    },

    /// The resolved version cannot be written into a manifest range.
    #[error("Invalid version {version:?} for {coordinate}")]
    MalformedVersion {
        /// Offending declaration.
        coordinate: ArtifactCoordinate,
        /// The literal as declared.
        version: String,
    },

    /// The resolved version is not inside the declared range.
    #[error("{coordinate} resolves to {version}, which is outside its declared range {range}")]
    VersionOutOfRange {
        /// Offending declaration.
        coordinate: ArtifactCoordinate,
        /// Version the build resolved.
        version: ArtifactVersion,
        /// Range the build claims to support.
        range: VersionRange,
    },

    /// An embedded dependency has no archive to copy from.
    #[error("{0} is embedded but declares no source archive")]
    MissingSource(ArtifactCoordinate),

    /// Two declarations would be written to the same place in the jar.
    #[error("{first} and {second} would both be embedded at {path}")]
    PathCollision {
        /// The shared internal path.
        path: String,
        /// Coordinate declared first.
        first: ArtifactCoordinate,
        /// Coordinate declared second.
        second: ArtifactCoordinate,
    },

    /// The assembled manifest failed validation.
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

/// One dependency as declared by the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Dependency identity.
    pub coordinate: ArtifactCoordinate,
    /// Requested range in bracket notation. `None` or a bare version means
    /// "this version or newer".
    pub range: Option<String>,
    /// Version the build resolved.
    pub resolved: ArtifactVersion,
    /// Record in the manifest without embedding bytes.
    pub constraint: bool,
    /// Mark the entry as binary-obfuscated.
    pub obfuscated: bool,
    /// Archive to embed; required unless `constraint` is set.
    pub source: Option<PathBuf>,
}

impl Declaration {
    /// An embedded dependency copied from `source`.
    pub fn embedded(
        coordinate: ArtifactCoordinate,
        resolved: impl Into<ArtifactVersion>,
        source: impl Into<PathBuf>,
    ) -> Self {
        Self {
            coordinate,
            range: None,
            resolved: resolved.into(),
            constraint: false,
            obfuscated: false,
            source: Some(source.into()),
        }
    }

    /// A constraint-only dependency.
    pub fn constraint(coordinate: ArtifactCoordinate, resolved: impl Into<ArtifactVersion>) -> Self {
        Self {
            coordinate,
            range: None,
            resolved: resolved.into(),
            constraint: true,
            obfuscated: false,
            source: None,
        }
    }

    /// Set the requested range.
    pub fn with_range(mut self, range: impl Into<String>) -> Self {
        self.range = Some(range.into());
        self
    }
}

/// An archive the jar writer must copy into the output jar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteInstruction {
    /// Archive on disk.
    pub source: PathBuf,
    /// Path inside the output jar.
    pub destination: String,
}

/// Result of planning a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Manifest to store at [`jarjar_schema::METADATA_PATH`].
    pub metadata: Metadata,
    /// Archives to copy, one per non-constraint entry, in declaration order.
    pub writes: Vec<WriteInstruction>,
}

/// Plans jar-in-jar builds.
#[derive(Debug, Clone)]
pub struct Planner {
    directory: String,
}

impl Default for Planner {
    fn default() -> Self {
        Self::with_directory(JARJAR_DIR)
    }
}

impl Planner {
    /// A planner using the directory configured in `settings`.
    pub fn new(settings: &Settings) -> Self {
        Self::with_directory(&settings.directory)
    }

    /// A planner embedding jars under `directory`.
    pub fn with_directory(directory: &str) -> Self {
        Self {
            directory: directory.trim_matches('/').to_string(),
        }
    }

    /// Internal path for an embedded jar: `<directory>/<artifact>-<version>.jar`.
    pub fn embedded_path(&self, coordinate: &ArtifactCoordinate, version: &ArtifactVersion) -> String {
        let file_name = format!("{}-{}.jar", coordinate.artifact(), version);
        if self.directory.is_empty() {
            file_name
        } else {
            format!("{}/{file_name}", self.directory)
        }
    }

    /// Validate `declarations` and build the manifest and write list.
    ///
    /// # Errors
    ///
    /// Returns a [`PlanError`] for duplicate coordinates, unparsable ranges or
    /// versions, resolved versions outside their range, embedded declarations
    /// without a source, or two entries sharing an internal path.
    pub fn plan(&self, declarations: &[Declaration]) -> Result<Plan, PlanError> {
        let mut seen = HashSet::with_capacity(declarations.len());
        for declaration in declarations {
            if !seen.insert(&declaration.coordinate) {
                return Err(PlanError::DuplicateCoordinate(declaration.coordinate.clone()));
            }
        }

        let mut entries = Vec::with_capacity(declarations.len());
        let mut writes = Vec::new();
        let mut paths: HashMap<String, &ArtifactCoordinate> = HashMap::new();

        for declaration in declarations {
            let coordinate = &declaration.coordinate;
            if !declaration.resolved.is_well_formed() {
                return Err(PlanError::MalformedVersion {
                    coordinate: coordinate.clone(),
                    version: declaration.resolved.as_str().to_string(),
                });
            }
            let range = requested_range(declaration)?;
            if !range.contains(&declaration.resolved) {
                return Err(PlanError::VersionOutOfRange {
                    coordinate: coordinate.clone(),
                    version: declaration.resolved.clone(),
                    range,
                });
            }

            let path = self.embedded_path(coordinate, &declaration.resolved);
            if let Some(first) = paths.insert(path.clone(), coordinate) {
                return Err(PlanError::PathCollision {
                    path,
                    first: first.clone(),
                    second: coordinate.clone(),
                });
            }

            if declaration.constraint {
                debug!(%coordinate, %range, "recording constraint");
            } else {
                let source = declaration
                    .source
                    .clone()
                    .ok_or_else(|| PlanError::MissingSource(coordinate.clone()))?;
                debug!(%coordinate, %range, path = %path, "embedding {}", source.display());
                writes.push(WriteInstruction {
                    source,
                    destination: path.clone(),
                });
            }

            entries.push(ContainedJarEntry {
                coordinate: coordinate.clone(),
                version: Some(ContainedVersion::new(
                    range,
                    Some(declaration.resolved.clone()),
                )),
                path,
                obfuscated: declaration.obfuscated,
                constraint: declaration.constraint,
            });
        }

        let metadata = Metadata::new(entries)?;
        info!(
            entries = metadata.len(),
            embedded = writes.len(),
            "planned jar-in-jar layout"
        );
        Ok(Plan { metadata, writes })
    }
}

/// The declared range, defaulting to `[resolved,)` when absent or a bare version.
fn requested_range(declaration: &Declaration) -> Result<VersionRange, PlanError> {
    let Some(spec) = &declaration.range else {
        return Ok(VersionRange::at_least(declaration.resolved.clone()));
    };
    let range = VersionRange::parse(spec).map_err(|source| PlanError::MalformedRange {
        coordinate: declaration.coordinate.clone(),
        source,
    })?;
    Ok(match range.recommended_version() {
        Some(recommended) => VersionRange::at_least(recommended.clone()),
        None => range,
    })
}
