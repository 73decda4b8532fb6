//! `group:artifact` identity of a dependency.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors that can occur when parsing an [`ArtifactCoordinate`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinateError {
    /// The string is not of the form `group:artifact`.
    #[error("Invalid coordinate '{0}': expected 'group:artifact'")]
    Malformed(String),
}

/// The `(group, artifact)` identity of a dependency, independent of version.
///
/// Equality is exact and case-sensitive on both fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactCoordinate {
    group: String,
    artifact: String,
}

impl ArtifactCoordinate {
    /// Create a coordinate from its group and artifact ids.
    pub fn new(group: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
        }
    }

    /// Group id (e.g. `org.apache.maven`).
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Artifact id (e.g. `maven-artifact`).
    pub fn artifact(&self) -> &str {
        &self.artifact
    }
}

impl fmt::Display for ArtifactCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.artifact)
    }
}

impl FromStr for ArtifactCoordinate {
    type Err = CoordinateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((group, artifact))
                if !group.is_empty() && !artifact.is_empty() && !artifact.contains(':') =>
            {
                Ok(Self::new(group, artifact))
            }
            _ => Err(CoordinateError::Malformed(s.to_string())),
        }
    }
}
