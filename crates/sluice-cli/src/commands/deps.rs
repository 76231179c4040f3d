use console::style;
use serde::Serialize;
use sluice::{
    Dependency, DependencyCollection, DependencyGraphBuilder, FileStore, NativeFileStore,
    PathResolver, ReferenceKind,
};

use crate::cli::DepsArgs;
use crate::commands::{asset_path, load_config};
use crate::error::Result;

/// One line of `sluice deps --json` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyReport {
    pub path: String,
    pub reference: String,
    pub remote: bool,
    pub missing: bool,
    pub optional: bool,
}

impl From<&Dependency> for DependencyReport {
    fn from(dependency: &Dependency) -> Self {
        Self {
            path: dependency.canonical_path.clone(),
            reference: dependency.reference.clone(),
            remote: dependency.kind == ReferenceKind::Remote,
            missing: dependency.kind != ReferenceKind::Remote && !dependency.is_present(),
            optional: dependency.optional,
        }
    }
}

impl DependencyReport {
    /// `path`, with `(remote)` or `(missing)` appended where it applies.
    pub fn line(&self) -> String {
        if self.remote {
            format!("{} {}", self.path, style("(remote)").dim())
        } else if self.missing {
            format!("{} {}", self.path, style("(missing)").yellow())
        } else {
            self.path.clone()
        }
    }
}

/// Execute `sluice deps`.
pub fn execute(args: DepsArgs) -> Result<()> {
    let config = load_config(&args.project.overrides())?;
    let store = NativeFileStore::new(&config.root);
    let resolver = PathResolver::with_application_root(&config.application_root);

    let collection = resolve(&store, &resolver, &args.path)?;
    for diagnostic in collection.diagnostics() {
        tracing::warn!(
            "{}:{}: {} ({})",
            diagnostic.file,
            diagnostic.line,
            diagnostic.message,
            diagnostic.reference
        );
    }

    let reports: Vec<DependencyReport> = collection.iter().map(DependencyReport::from).collect();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            println!("{}", report.line());
        }
    }
    Ok(())
}

/// Resolve the dependency list of the asset at virtual `path`.
pub fn resolve(
    store: &dyn FileStore,
    resolver: &PathResolver,
    path: &str,
) -> Result<DependencyCollection> {
    let (path, kind) = asset_path(path)?;
    let content = store.read_text(&path).map_err(sluice::Error::from)?;
    let builder = DependencyGraphBuilder::new(store, resolver);
    let collection = builder
        .resolve(&path, &content, kind)
        .map_err(sluice::Error::from)?;
    Ok(collection)
}
