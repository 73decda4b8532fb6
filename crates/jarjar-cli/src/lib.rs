//! jarjar - jar-in-jar packaging and reconciliation
//!
//! Build side: `plan` and `pack` turn a `jarjar.toml` into a jar that
//! carries its dependencies under `META-INF/jarjar/` together with a
//! manifest describing them.
//!
//! Runtime side: `select` reconciles the manifests of several jars, and
//! `extract` materializes the selected copies in the extraction cache.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.jarjar/
//! └── cache/      # Extracted jars by key hash
//! ```

#![allow(missing_docs)]

pub mod cmd;

pub use jarjar_core::paths::*;

use clap::{Parser, Subcommand};
use jarjar_core::SelectionPolicy;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "jarjar")]
#[command(author, version, about = "jarjar - jar-in-jar packaging and reconciliation")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compute the manifest for a build file
    Plan {
        /// Build file (jarjar.toml)
        #[arg(default_value = "jarjar.toml")]
        build: PathBuf,
        /// Write the manifest here instead of stdout
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },
    /// Produce a jar with its dependencies embedded
    Pack {
        /// Build file (jarjar.toml)
        #[arg(default_value = "jarjar.toml")]
        build: PathBuf,
        /// Host jar whose entries are carried over
        #[arg(long, short = 'i')]
        input: Option<PathBuf>,
        /// Jar to write
        #[arg(long, short = 'o')]
        output: PathBuf,
    },
    /// Show the jar-in-jar manifest of a jar
    Inspect {
        /// Jar to inspect
        jar: PathBuf,
        /// Print the raw manifest JSON
        #[arg(long)]
        json: bool,
    },
    /// Reconcile the manifests of several jars
    Select {
        /// Outer jars, in priority order
        #[arg(required = true)]
        jars: Vec<PathBuf>,
        /// How to choose among satisfying copies (highest, first-declared)
        #[arg(long, default_value = "highest")]
        policy: SelectionPolicy,
        /// Print the selection as JSON
        #[arg(long)]
        json: bool,
    },
    /// Extract every selected jar into the cache
    Extract {
        /// Outer jars, in priority order
        #[arg(required = true)]
        jars: Vec<PathBuf>,
        /// Cache directory (defaults to $JARJAR_HOME/cache)
        #[arg(long)]
        cache: Option<PathBuf>,
        /// How to choose among satisfying copies (highest, first-declared)
        #[arg(long, default_value = "highest")]
        policy: SelectionPolicy,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_policy_flag() {
        let cli = Cli::parse_from(["jarjar", "select", "a.jar", "--policy", "first-declared"]);
        match cli.command {
            Commands::Select { jars, policy, json } => {
                assert_eq!(jars, vec![PathBuf::from("a.jar")]);
                assert_eq!(policy, SelectionPolicy::FirstDeclared);
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_policy_rejected() {
        assert!(Cli::try_parse_from(["jarjar", "select", "a.jar", "--policy", "newest"]).is_err());
    }
}
