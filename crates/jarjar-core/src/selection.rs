//! Reconciliation of jar-in-jar manifests.
//!
//! Every outer jar on the runtime path ships its own manifest. For each
//! coordinate the declared ranges are intersected and one embedded copy is
//! chosen to satisfy all of them.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use jarjar_schema::{ArtifactCoordinate, ArtifactVersion, Metadata, VersionRange};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Identifies an outer jar that contributed a manifest.
///
/// For jars on disk this is the jar's path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchiveId(String);

impl ArchiveId {
    /// Wrap an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identifier read as a filesystem path.
    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl From<&Path> for ArchiveId {
    fn from(path: &Path) -> Self {
        Self(path.display().to_string())
    }
}

impl fmt::Display for ArchiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How to choose among candidates that satisfy every range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    /// Greatest resolved version; ties go to the first source.
    #[default]
    Highest,
    /// First candidate in input order.
    FirstDeclared,
}

impl FromStr for SelectionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "highest" => Ok(Self::Highest),
            "first-declared" => Ok(Self::FirstDeclared),
            other => Err(format!(
                "unknown selection policy '{other}' (expected 'highest' or 'first-declared')"
            )),
        }
    }
}

/// The embedded jar chosen for one coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedJar {
    /// Outer jar holding the bytes.
    pub source: ArchiveId,
    /// Path of the embedded jar inside `source`.
    pub path: String,
    /// Resolved version of the embedded jar.
    pub version: ArtifactVersion,
    /// Whether the embedded jar is obfuscated.
    pub obfuscated: bool,
}

/// Outcome of reconciliation, in first-appearance order of coordinates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    jars: Vec<(ArtifactCoordinate, SelectedJar)>,
}

impl Selection {
    /// The jar chosen for `coordinate`, if any.
    pub fn get(&self, coordinate: &ArtifactCoordinate) -> Option<&SelectedJar> {
        self.jars
            .iter()
            .find(|(c, _)| c == coordinate)
            .map(|(_, jar)| jar)
    }

    /// Iterate over coordinates and their chosen jars.
    pub fn iter(&self) -> impl Iterator<Item = (&ArtifactCoordinate, &SelectedJar)> {
        self.jars.iter().map(|(c, jar)| (c, jar))
    }

    /// Number of selected coordinates.
    pub fn len(&self) -> usize {
        self.jars.len()
    }

    /// True if nothing was selected.
    pub fn is_empty(&self) -> bool {
        self.jars.is_empty()
    }
}

/// Reconciliation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    /// The declared ranges for a coordinate have no version in common.
    #[error("No version of {coordinate} satisfies every declared range: {}", list_ranges(.declared))]
    Unsatisfiable {
        /// Coordinate in conflict.
        coordinate: ArtifactCoordinate,
        /// Each declaring source and its range, in input order.
        declared: Vec<(ArchiveId, VersionRange)>,
    },

    /// The ranges intersect, but no embedded copy lies inside the intersection.
    #[error("No embedded copy of {coordinate} is within {range} (offered: {})", list_offered(.offered))]
    NoSatisfyingVersion {
        /// Coordinate without a usable copy.
        coordinate: ArtifactCoordinate,
        /// Intersection of all declared ranges.
        range: VersionRange,
        /// Each candidate source and its version.
        offered: Vec<(ArchiveId, ArtifactVersion)>,
    },
}

fn list_ranges(declared: &[(ArchiveId, VersionRange)]) -> String {
    declared
        .iter()
        .map(|(source, range)| format!("{range} from {source}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn list_offered(offered: &[(ArchiveId, ArtifactVersion)]) -> String {
    if offered.is_empty() {
        return "none".to_string();
    }
    offered
        .iter()
        .map(|(source, version)| format!("{version} in {source}"))
        .collect::<Vec<_>>()
        .join(", ")
}

struct Candidate<'a> {
    source: &'a ArchiveId,
    path: &'a str,
    version: &'a ArtifactVersion,
    obfuscated: bool,
}

#[derive(Default)]
struct Contributions<'a> {
    declared: Vec<(ArchiveId, VersionRange)>,
    candidates: Vec<Candidate<'a>>,
    embedded: bool,
}

/// Reconcile the manifests of several outer jars.
///
/// Coordinates are processed in the order they first appear. A coordinate
/// that only constraint entries mention is left out of the selection.
///
/// # Errors
///
/// Fails on the first coordinate whose ranges do not intersect, or whose
/// intersection contains none of the embedded copies.
pub fn select(
    manifests: &[(ArchiveId, Metadata)],
    policy: SelectionPolicy,
) -> Result<Selection, SelectionError> {
    let mut order: Vec<&ArtifactCoordinate> = Vec::new();
    let mut grouped: Vec<Contributions<'_>> = Vec::new();

    for (source, metadata) in manifests {
        for entry in metadata.entries() {
            let index = match order.iter().position(|c| *c == &entry.coordinate) {
                Some(index) => index,
                None => {
                    order.push(&entry.coordinate);
                    grouped.push(Contributions::default());
                    order.len() - 1
                }
            };
            let slot = &mut grouped[index];
            if let Some(range) = entry.range() {
                slot.declared.push((source.clone(), range.clone()));
            }
            if entry.constraint {
                continue;
            }
            slot.embedded = true;
            if let Some(version) = entry.artifact_version() {
                slot.candidates.push(Candidate {
                    source,
                    path: &entry.path,
                    version,
                    obfuscated: entry.obfuscated,
                });
            }
        }
    }

    let mut selection = Selection::default();
    for (coordinate, contributions) in order.into_iter().zip(grouped) {
        if !contributions.embedded {
            debug!(%coordinate, "only constraint entries, skipping");
            continue;
        }

        let range = intersect_all(coordinate, &contributions.declared)?;
        let chosen = choose(&contributions.candidates, &range, policy).ok_or_else(|| {
            SelectionError::NoSatisfyingVersion {
                coordinate: coordinate.clone(),
                range: range.clone(),
                offered: contributions
                    .candidates
                    .iter()
                    .map(|c| (c.source.clone(), c.version.clone()))
                    .collect(),
            }
        })?;

        debug!(
            %coordinate,
            %range,
            version = %chosen.version,
            source = %chosen.source,
            "selected"
        );
        selection.jars.push((
            coordinate.clone(),
            SelectedJar {
                source: chosen.source.clone(),
                path: chosen.path.to_string(),
                version: chosen.version.clone(),
                obfuscated: chosen.obfuscated,
            },
        ));
    }

    info!(
        manifests = manifests.len(),
        selected = selection.len(),
        "reconciled jar-in-jar manifests"
    );
    Ok(selection)
}

fn intersect_all(
    coordinate: &ArtifactCoordinate,
    declared: &[(ArchiveId, VersionRange)],
) -> Result<VersionRange, SelectionError> {
    declared
        .iter()
        .try_fold(VersionRange::unbounded(), |acc, (_, range)| acc.intersect(range))
        .ok_or_else(|| SelectionError::Unsatisfiable {
            coordinate: coordinate.clone(),
            declared: declared.to_vec(),
        })
}

fn choose<'c, 'a>(
    candidates: &'c [Candidate<'a>],
    range: &VersionRange,
    policy: SelectionPolicy,
) -> Option<&'c Candidate<'a>> {
    let mut satisfying = candidates.iter().filter(|c| range.contains(c.version));
    match policy {
        SelectionPolicy::FirstDeclared => satisfying.next(),
        // `max_by` keeps the last maximum, so fold to keep the first.
        SelectionPolicy::Highest => satisfying.fold(None, |best: Option<&Candidate<'a>>, c| {
            match best {
                Some(b) if b.version >= c.version => Some(b),
                _ => Some(c),
            }
        }),
    }
}
