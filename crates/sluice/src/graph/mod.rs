//! Dependency graphs of stylesheet and script sources.
//!
//! Given a root file and its content, [`DependencyGraphBuilder`] finds every
//! file the root transitively imports. The result is an ordered
//! [`DependencyCollection`]: translators use it to know what to compile
//! against, the asset server uses it to decide when cached output is stale.

mod builder;
mod dependency;
pub mod scanner;

pub use builder::{DependencyGraphBuilder, MAX_DEPTH};
pub use dependency::{
    Dependency, DependencyCollection, DependencyContent, ReferenceKind, ScanDiagnostic,
};
