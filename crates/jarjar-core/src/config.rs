//! Build configuration (`jarjar.toml`)
//!
//! ```toml
//! [package]
//! directory = "META-INF/jarjar"
//! policy = "highest"
//!
//! [[dependency]]
//! group = "org.apache.maven"
//! artifact = "maven-artifact"
//! version = "3.9.11"
//! source = "libs/maven-artifact-3.9.11.jar"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use jarjar_schema::{ArtifactCoordinate, ArtifactVersion, JARJAR_DIR};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::planner::Declaration;
use crate::selection::SelectionPolicy;

/// Errors loading a build file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The build file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML content does not match the build file schema.
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Options shared by planning and selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Directory inside the jar that receives embedded jars.
    pub directory: String,
    /// How runtime selection picks among satisfying copies.
    pub policy: SelectionPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            directory: JARJAR_DIR.to_string(),
            policy: SelectionPolicy::default(),
        }
    }
}

/// One `[[dependency]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DependencySpec {
    /// Maven group id.
    pub group: String,
    /// Maven artifact id.
    pub artifact: String,
    /// Resolved version.
    pub version: String,
    /// Supported range; defaults to `[version,)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    /// Record the dependency without embedding it.
    #[serde(default)]
    pub constraint: bool,
    /// The embedded jar is binary-obfuscated.
    #[serde(default)]
    pub obfuscated: bool,
    /// Jar to embed. Relative paths are relative to the build file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
}

impl DependencySpec {
    fn declaration(&self) -> Declaration {
        Declaration {
            coordinate: ArtifactCoordinate::new(&self.group, &self.artifact),
            range: self.range.clone(),
            resolved: ArtifactVersion::new(&self.version),
            constraint: self.constraint,
            obfuscated: self.obfuscated,
            source: self.source.clone(),
        }
    }
}

/// A parsed `jarjar.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildFile {
    /// The `[package]` table.
    #[serde(default)]
    pub package: Settings,
    /// The `[[dependency]]` tables, in file order.
    #[serde(default, rename = "dependency")]
    pub dependencies: Vec<DependencySpec>,
}

impl BuildFile {
    /// Parse a build file from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load a build file from disk, anchoring relative `source` paths at
    /// the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let mut build = Self::parse(&content)?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        for dependency in &mut build.dependencies {
            if let Some(source) = &dependency.source {
                if source.is_relative() {
                    dependency.source = Some(base.join(source));
                }
            }
        }
        Ok(build)
    }

    /// Declarations in file order.
    pub fn declarations(&self) -> Vec<Declaration> {
        self.dependencies
            .iter()
            .map(DependencySpec::declaration)
            .collect()
    }
}

impl FromStr for BuildFile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
