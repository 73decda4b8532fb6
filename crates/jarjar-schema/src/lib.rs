//! Shared types and wire format for jar-in-jar packaging.
//!
//! - [`ArtifactCoordinate`]: the `group:artifact` identity of a dependency.
//! - [`ArtifactVersion`]: Maven-style ordered version.
//! - [`VersionRange`]: interval algebra over versions in bracket notation.
//! - [`Metadata`]: the `META-INF/jarjar/metadata.json` manifest and its codec.

pub mod coordinate;
pub mod metadata;
pub mod range;
pub mod version;

// Re-exports
pub use coordinate::{ArtifactCoordinate, CoordinateError};
pub use metadata::{ContainedJarEntry, ContainedVersion, Metadata, MetadataError};
pub use range::{Bound, Interval, RangeError, VersionRange};
pub use version::ArtifactVersion;

/// Directory inside a jar that holds embedded jars and the manifest.
pub const JARJAR_DIR: &str = "META-INF/jarjar";

/// Well-known location of the manifest inside a jar.
pub const METADATA_PATH: &str = "META-INF/jarjar/metadata.json";
