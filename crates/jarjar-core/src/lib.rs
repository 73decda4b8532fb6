//! Core library for jarjar.
//!
//! Build side: [`config::BuildFile`] declarations feed the
//! [`planner::Planner`], whose [`planner::Plan`] is written into a jar by
//! [`io::jar::write_jar`].
//!
//! Runtime side: manifests read with [`io::jar::read_metadata`] are
//! reconciled by [`selection::select`], and the chosen jars are
//! materialized on disk through the [`cache::ExtractionCache`]. The
//! [`resolver::Resolver`] ties the two together behind a single
//! `resolve(coordinate)` query.

pub mod cache;
pub mod config;
pub mod io;
pub mod paths;
pub mod planner;
pub mod resolver;
pub mod selection;

pub use cache::{ArchiveSource, ExtractionCache, ExtractionError, ExtractionKey, JarSource};
pub use config::{BuildFile, ConfigError, Settings};
pub use paths::*;
pub use planner::{Declaration, Plan, PlanError, Planner, WriteInstruction};
pub use resolver::{ResolveError, Resolver};
pub use selection::{ArchiveId, SelectedJar, Selection, SelectionError, SelectionPolicy, select};
