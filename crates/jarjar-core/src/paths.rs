//! Well-known locations under the jarjar home directory.

use dirs::home_dir;
use std::path::PathBuf;

/// Returns the jarjar home directory, or None if the user's home cannot be resolved.
///
/// `JARJAR_HOME` overrides the default of `~/.jarjar`.
pub fn try_jarjar_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("JARJAR_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".jarjar"))
}

/// Extraction cache root: ~/.jarjar/cache
pub fn cache_path() -> Option<PathBuf> {
    try_jarjar_home().map(|home| home.join("cache"))
}
