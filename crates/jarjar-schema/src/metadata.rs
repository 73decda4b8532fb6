//! The jar-in-jar manifest (`META-INF/jarjar/metadata.json`).
//!
//! ```json
//! {
//!   "jars": [
//!     {
//!       "identifier": { "group": "org.apache.maven", "artifact": "maven-artifact" },
//!       "version": { "range": "[3.9.11,)", "artifactVersion": "3.9.11" },
//!       "path": "META-INF/jarjar/maven-artifact-3.9.11.jar",
//!       "isObfuscated": false
//!     }
//!   ]
//! }
//! ```
//!
//! `isConstraint` is only written for constraint entries and defaults to
//! `false` when absent. Unknown fields are ignored on decode.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::coordinate::ArtifactCoordinate;
use crate::range::VersionRange;
use crate::version::ArtifactVersion;

/// Errors raised when a manifest violates its own invariants.
#[derive(thiserror::Error, Debug)]
pub enum MetadataError {
    /// The document is not valid JSON or does not match the schema
    /// (including unparsable range syntax).
    #[error("Malformed metadata: {0}")]
    Json(#[from] serde_json::Error),

    /// Two entries share a coordinate.
    #[error("Malformed metadata: duplicate entry for {0}")]
    DuplicateCoordinate(ArtifactCoordinate),

    /// An entry's resolved version is outside its own declared range.
    #[error("Malformed metadata: {coordinate} packages {version}, outside its range {range}")]
    VersionOutOfRange {
        /// Offending entry.
        coordinate: ArtifactCoordinate,
        /// The resolved version it records.
        version: ArtifactVersion,
        /// The range it declares.
        range: VersionRange,
    },

    /// A version literal that cannot be written back into a range string.
    #[error("Malformed metadata: {coordinate} records unusable version {version:?}")]
    MalformedVersion {
        /// Offending entry.
        coordinate: ArtifactCoordinate,
        /// The literal as written.
        version: String,
    },
}

/// The compatible range and the concrete version of an embedded dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainedVersion {
    /// Versions the host artifact works with.
    pub range: VersionRange,
    /// Version actually packaged; may be absent for constraint entries.
    #[serde(
        rename = "artifactVersion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub artifact_version: Option<ArtifactVersion>,
}

impl ContainedVersion {
    /// A range with the version packaged inside it.
    pub fn new(range: VersionRange, artifact_version: Option<ArtifactVersion>) -> Self {
        Self {
            range,
            artifact_version,
        }
    }

    /// True unless the packaged version lies outside the range.
    pub fn is_consistent(&self) -> bool {
        self.artifact_version
            .as_ref()
            .is_none_or(|v| self.range.contains(v))
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)] // signature required by serde
fn is_false(value: &bool) -> bool {
    !*value
}

/// One embedded (or merely constrained) dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainedJarEntry {
    /// Which dependency this is.
    #[serde(rename = "identifier")]
    pub coordinate: ArtifactCoordinate,
    /// Range and packaged version, absent when unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<ContainedVersion>,
    /// Location of the embedded jar inside the host archive.
    pub path: String,
    /// Whether the embedded jar is binary-obfuscated.
    #[serde(rename = "isObfuscated", default)]
    pub obfuscated: bool,
    /// Constraint entries carry compatibility information but no bytes.
    #[serde(rename = "isConstraint", default, skip_serializing_if = "is_false")]
    pub constraint: bool,
}

impl ContainedJarEntry {
    /// Declared range, if any.
    pub fn range(&self) -> Option<&VersionRange> {
        self.version.as_ref().map(|v| &v.range)
    }

    /// Packaged version, if any.
    pub fn artifact_version(&self) -> Option<&ArtifactVersion> {
        self.version.as_ref()?.artifact_version.as_ref()
    }
}

/// Everything a single artifact embeds.
///
/// Entries keep their insertion order and never share a coordinate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    #[serde(rename = "jars")]
    entries: Vec<ContainedJarEntry>,
}

#[derive(Deserialize)]
struct RawMetadata {
    jars: Vec<ContainedJarEntry>,
}

impl Metadata {
    /// Build a manifest, validating coordinate uniqueness and version consistency.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::DuplicateCoordinate`] if two entries share a
    /// coordinate, [`MetadataError::MalformedVersion`] if a version literal
    /// is not well formed, or [`MetadataError::VersionOutOfRange`] if an
    /// entry's packaged version is outside its own range.
    pub fn new(entries: Vec<ContainedJarEntry>) -> Result<Self, MetadataError> {
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if !seen.insert(&entry.coordinate) {
                return Err(MetadataError::DuplicateCoordinate(entry.coordinate.clone()));
            }
            if let Some(version) = &entry.version {
                let mut written = version.range.versions().chain(&version.artifact_version);
                if let Some(bad) = written.find(|v| !v.is_well_formed()) {
                    return Err(MetadataError::MalformedVersion {
                        coordinate: entry.coordinate.clone(),
                        version: bad.as_str().to_string(),
                    });
                }
            }
            if let Some(ContainedVersion {
                range,
                artifact_version: Some(resolved),
            }) = &entry.version
            {
                if !range.contains(resolved) {
                    return Err(MetadataError::VersionOutOfRange {
                        coordinate: entry.coordinate.clone(),
                        version: resolved.clone(),
                        range: range.clone(),
                    });
                }
            }
        }
        Ok(Self { entries })
    }

    /// Entries in declaration order.
    pub fn entries(&self) -> &[ContainedJarEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is embedded or constrained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize to pretty-printed JSON with a trailing newline.
    ///
    /// Identical manifests always encode to identical bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Json`] if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>, MetadataError> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Parse and validate a manifest.
    ///
    /// # Errors
    ///
    /// Returns a [`MetadataError`] if the bytes are not a valid manifest, a
    /// range is unparsable, a coordinate repeats, or a packaged version sits
    /// outside its own range.
    pub fn decode(bytes: &[u8]) -> Result<Self, MetadataError> {
        let raw: RawMetadata = serde_json::from_slice(bytes)?;
        Self::new(raw.jars)
    }
}
