use std::sync::Arc;

use super::dependency::{
    Dependency, DependencyCollection, DependencyContent, ReferenceKind, ScanDiagnostic,
};
use super::scanner::{self, ScannedReference};
use crate::asset::AssetKind;
use crate::error::GraphError;
use crate::paths::{
    dependency_key, extension_of, file_path_of, is_observable, with_extension, PathResolver,
};
use crate::vfs::FileStore;

/// Maximum nesting of imports followed from a single root.
pub const MAX_DEPTH: usize = 256;

/// Builds the transitive dependency list of a root asset.
///
/// Traversal is depth-first and pre-order. A cursor tracks where the next
/// newly discovered dependency goes; re-encountering an entry that sits at or
/// after the cursor pulls it forward to the cursor, so a file always precedes
/// the first consumer that reaches it through the current walk.
///
/// The builder only reads from the file store and keeps no state between
/// calls, so independent roots can be resolved concurrently.
pub struct DependencyGraphBuilder<'a> {
    store: &'a dyn FileStore,
    resolver: &'a PathResolver,
}

struct Walk<'c> {
    collection: &'c mut DependencyCollection,
    root_key: String,
    kind: AssetKind,
    cursor: usize,
}

impl<'a> DependencyGraphBuilder<'a> {
    pub fn new(store: &'a dyn FileStore, resolver: &'a PathResolver) -> Self {
        Self { store, resolver }
    }

    /// Resolve every dependency of `root_path` into a fresh collection.
    pub fn resolve(
        &self,
        root_path: &str,
        root_content: &str,
        kind: AssetKind,
    ) -> Result<DependencyCollection, GraphError> {
        let mut collection = DependencyCollection::new();
        self.resolve_into(&mut collection, root_path, root_content, kind)?;
        Ok(collection)
    }

    /// Resolve into an existing collection, starting the cursor at its front.
    ///
    /// Entries already present are reordered rather than duplicated.
    pub fn resolve_into(
        &self,
        collection: &mut DependencyCollection,
        root_path: &str,
        root_content: &str,
        kind: AssetKind,
    ) -> Result<(), GraphError> {
        tracing::debug!("Resolving dependencies of {}", root_path);
        let mut walk = Walk {
            collection,
            root_key: dependency_key(root_path),
            kind,
            cursor: 0,
        };
        self.visit(&mut walk, root_path, root_content, 0)?;
        tracing::debug!(
            root = root_path,
            count = walk.collection.len(),
            "Resolved dependencies"
        );
        Ok(())
    }

    fn visit(
        &self,
        walk: &mut Walk<'_>,
        current_path: &str,
        content: &str,
        depth: usize,
    ) -> Result<(), GraphError> {
        if depth > MAX_DEPTH {
            return Err(GraphError::MaxDepthExceeded {
                path: current_path.to_string(),
                depth,
            });
        }

        let scanned = scanner::scan(content, walk.kind);
        for malformed in scanned.malformed {
            tracing::warn!(
                "Malformed import in {} (line {}): {}",
                current_path,
                malformed.line,
                malformed.text
            );
            walk.collection.push_diagnostic(ScanDiagnostic {
                file: current_path.to_string(),
                reference: malformed.text,
                line: malformed.line,
                message: "import is not followed by a quoted path or url()".to_string(),
            });
        }

        for reference in scanned.references {
            self.visit_reference(walk, current_path, reference, depth)?;
        }
        Ok(())
    }

    fn visit_reference(
        &self,
        walk: &mut Walk<'_>,
        current_path: &str,
        reference: ScannedReference,
        depth: usize,
    ) -> Result<(), GraphError> {
        let canonical = match self
            .resolver
            .resolve_relative_path(current_path, &reference.reference)
        {
            Ok(path) => path,
            Err(err) => {
                tracing::warn!("Skipping reference in {}: {}", current_path, err);
                walk.collection.push_diagnostic(ScanDiagnostic {
                    file: current_path.to_string(),
                    reference: reference.reference,
                    line: reference.line,
                    message: err.to_string(),
                });
                return Ok(());
            }
        };
        let canonical = if reference.kind.is_traversable() && extension_of(&canonical).is_none() {
            let extension = extension_of(current_path)
                .unwrap_or_else(|| walk.kind.base_extension().to_string());
            with_extension(&canonical, &extension)
        } else {
            canonical
        };

        let key = dependency_key(&canonical);
        if key == walk.root_key {
            tracing::debug!("Ignoring self-import of {} in {}", canonical, current_path);
            return Ok(());
        }

        if let Some(index) = walk.collection.index_of_key(&key) {
            if index >= walk.cursor {
                walk.collection.move_index(index, walk.cursor);
                walk.cursor += 1;
            }
            return Ok(());
        }

        let observable = is_observable(&canonical);
        let mut dependency = Dependency {
            reference: reference.reference.clone(),
            canonical_path: canonical.clone(),
            observable,
            optional: reference.optional,
            kind: reference.kind,
            content: None,
        };

        if reference.kind == ReferenceKind::Remote || !observable {
            dependency.kind = ReferenceKind::Remote;
            self.insert(walk, dependency);
            return Ok(());
        }

        // `?query` and `#fragment` stay in the canonical path only.
        let file = file_path_of(&canonical);
        if !self.store.file_exists(file) {
            if reference.optional {
                tracing::debug!("Optional import {} is missing", canonical);
                self.insert(walk, dependency);
                return Ok(());
            }
            return Err(GraphError::DependencyNotFound {
                reference: reference.reference,
                referenced_from: current_path.to_string(),
            });
        }

        if reference.kind == ReferenceKind::Embedded {
            let bytes = self.store.read_binary(file)?;
            dependency.content = Some(DependencyContent::Binary(Arc::from(bytes)));
            self.insert(walk, dependency);
            return Ok(());
        }

        let text: Arc<str> = Arc::from(self.store.read_text(file)?);
        dependency.content = Some(DependencyContent::Text(Arc::clone(&text)));
        tracing::debug!("Found {} (depth {})", canonical, depth + 1);
        let file = file.to_string();
        self.insert(walk, dependency);
        self.visit(walk, &file, &text, depth + 1)
    }

    fn insert(&self, walk: &mut Walk<'_>, dependency: Dependency) {
        walk.collection.insert_at(walk.cursor, dependency);
        walk.cursor += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemoryFileStore;

    fn resolve(store: &MemoryFileStore, root: &str) -> Result<DependencyCollection, GraphError> {
        let resolver = PathResolver::new();
        let builder = DependencyGraphBuilder::new(store, &resolver);
        let content = store.read_text(root).unwrap();
        builder.resolve(root, &content, AssetKind::Stylesheet)
    }

    #[test]
    fn test_shared_import_precedes_consumer() {
        let store = MemoryFileStore::new()
            .with_file("/a.less", "@import \"b\";\n@import \"c\";")
            .with_file("/b.less", ".b {}")
            .with_file("/c.less", "@import \"b\";\n.c {}");

        let collection = resolve(&store, "/a.less").unwrap();
        assert_eq!(collection.paths(), vec!["/b.less", "/c.less"]);
    }

    #[test]
    fn test_nested_imports_are_pre_order() {
        let store = MemoryFileStore::new()
            .with_file("/site.less", "@import \"x\";\n@import \"y\";")
            .with_file("/x.less", "@import \"x1\";")
            .with_file("/x1.less", "")
            .with_file("/y.less", "");

        let collection = resolve(&store, "/site.less").unwrap();
        assert_eq!(collection.paths(), vec!["/x.less", "/x1.less", "/y.less"]);
    }

    #[test]
    fn test_missing_required_import() {
        let store = MemoryFileStore::new().with_file("/site.less", "@import \"gone.less\";");

        let err = resolve(&store, "/site.less").unwrap_err();
        match err {
            GraphError::DependencyNotFound {
                reference,
                referenced_from,
            } => {
                assert_eq!(reference, "gone.less");
                assert_eq!(referenced_from, "/site.less");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_optional_import_is_recorded() {
        let store = MemoryFileStore::new()
            .with_file("/site.less", "@import (optional) \"theme.less\";\n@import \"b\";")
            .with_file("/b.less", "");

        let collection = resolve(&store, "/site.less").unwrap();
        assert_eq!(collection.paths(), vec!["/theme.less", "/b.less"]);
        let theme = collection.get("/theme.less").unwrap();
        assert!(theme.observable);
        assert!(!theme.is_present());
        assert_eq!(collection.observable_paths().len(), 2);
    }

    #[test]
    fn test_self_import_and_cycles_terminate() {
        let store = MemoryFileStore::new()
            .with_file("/a.less", "@import \"a\";\n@import \"b\";")
            .with_file("/b.less", "@import \"c\";")
            .with_file("/c.less", "@import \"b\";\n@import \"a.less\";");

        let collection = resolve(&store, "/a.less").unwrap();
        assert_eq!(collection.paths(), vec!["/b.less", "/c.less"]);
    }

    #[test]
    fn test_remote_and_embedded_references() {
        let store = MemoryFileStore::new()
            .with_file(
                "/styles/site.less",
                "@import url(https://fonts.example.com/a.css);\n.l { background: data-uri(\"../img/logo.png\"); }",
            )
            .with_file("/img/logo.png", [0x89u8, 0x50, 0x4e, 0x47]);

        let collection = resolve(&store, "/styles/site.less").unwrap();
        let deps: Vec<_> = collection.iter().collect();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].kind, ReferenceKind::Remote);
        assert!(!deps[0].observable);
        assert_eq!(deps[1].kind, ReferenceKind::Embedded);
        assert_eq!(
            deps[1].content,
            Some(DependencyContent::Binary(Arc::from(vec![0x89u8, 0x50, 0x4e, 0x47])))
        );
        assert_eq!(collection.observable_paths(), vec!["/img/logo.png"]);
    }

    #[test]
    fn test_malformed_reference_does_not_abort_siblings() {
        let store = MemoryFileStore::new()
            .with_file("/site.less", "@import ;\n@import \"ok\";")
            .with_file("/ok.less", "");

        let collection = resolve(&store, "/site.less").unwrap();
        assert_eq!(collection.paths(), vec!["/ok.less"]);
        assert_eq!(collection.diagnostics().len(), 1);
        assert_eq!(collection.diagnostics()[0].file, "/site.less");
    }

    #[test]
    fn test_resolve_into_reorders_existing_entries() {
        let store = MemoryFileStore::new()
            .with_file("/first.less", "@import \"x\";\n@import \"b\";")
            .with_file("/second.less", "@import \"b\";\n@import \"y\";")
            .with_file("/x.less", "")
            .with_file("/b.less", "")
            .with_file("/y.less", "");
        let resolver = PathResolver::new();
        let builder = DependencyGraphBuilder::new(&store, &resolver);

        let mut collection = DependencyCollection::new();
        builder
            .resolve_into(&mut collection, "/first.less", "@import \"x\";\n@import \"b\";", AssetKind::Stylesheet)
            .unwrap();
        assert_eq!(collection.paths(), vec!["/x.less", "/b.less"]);

        builder
            .resolve_into(&mut collection, "/second.less", "@import \"b\";\n@import \"y\";", AssetKind::Stylesheet)
            .unwrap();
        assert_eq!(collection.paths(), vec!["/b.less", "/y.less", "/x.less"]);
    }

    #[test]
    fn test_script_references_use_referencing_extension() {
        let store = MemoryFileStore::new()
            .with_file("/scripts/app.ts", "import { a } from \"./lib/a\";")
            .with_file("/scripts/lib/a.ts", "/// <reference path=\"../types.d.ts\" />")
            .with_file("/scripts/types.d.ts", "");
        let resolver = PathResolver::new();
        let builder = DependencyGraphBuilder::new(&store, &resolver);

        let collection = builder
            .resolve(
                "/scripts/app.ts",
                "import { a } from \"./lib/a\";",
                AssetKind::Script,
            )
            .unwrap();
        assert_eq!(
            collection.paths(),
            vec!["/scripts/lib/a.ts", "/scripts/types.d.ts"]
        );
    }

    #[test]
    fn test_depth_limit() {
        let mut store = MemoryFileStore::new();
        for i in 0..=MAX_DEPTH + 1 {
            store = store.with_file(&format!("/d{i}.less"), format!("@import \"d{}\";", i + 1));
        }
        store = store.with_file(&format!("/d{}.less", MAX_DEPTH + 2), "");

        let err = resolve(&store, "/d0.less").unwrap_err();
        assert!(matches!(err, GraphError::MaxDepthExceeded { .. }));
    }

    #[test]
    fn test_non_ascii_file_names_resolve() {
        let store = MemoryFileStore::new()
            .with_file("/site.less", "@import \"é€.less\";\n@import \"ñandú.min.less\";")
            .with_file("/é€.less", "")
            .with_file("/ñandú.min.less", "");

        let collection = resolve(&store, "/site.less").unwrap();
        assert_eq!(collection.paths(), vec!["/é€.less", "/ñandú.min.less"]);
    }

    #[test]
    fn test_query_and_fragment_references_read_the_plain_file() {
        let store = MemoryFileStore::new()
            .with_file(
                "/styles/site.less",
                "@import \"x.less?v=2\";\n@import \"y?v=3\";\n.f { filter: data-uri(\"img/f.svg#blur\"); }",
            )
            .with_file("/styles/x.less", "@import \"z\";")
            .with_file("/styles/y.less", "")
            .with_file("/styles/z.less", "")
            .with_file("/styles/img/f.svg", "<svg/>");

        let collection = resolve(&store, "/styles/site.less").unwrap();
        assert_eq!(
            collection.paths(),
            vec![
                "/styles/x.less?v=2",
                "/styles/z.less",
                "/styles/y.less?v=3",
                "/styles/img/f.svg#blur",
            ]
        );
        let svg = collection.get("/styles/img/f.svg#blur").unwrap();
        assert!(svg.is_present());
        assert_eq!(svg.reference, "img/f.svg#blur");
        assert_eq!(store.read_count("/styles/img/f.svg"), 1);
    }

    #[test]
    fn test_each_dependency_is_read_once() {
        let store = MemoryFileStore::new()
            .with_file("/site.less", "@import \"a\";\n@import \"b\";")
            .with_file("/a.less", "@import \"b\";\n@import \"c\";")
            .with_file("/b.less", "@import \"c\";")
            .with_file("/c.less", "@import \"a\";");

        let collection = resolve(&store, "/site.less").unwrap();
        assert_eq!(collection.len(), 3);
        for path in ["/a.less", "/b.less", "/c.less"] {
            assert_eq!(store.read_count(path), 1, "{path} read more than once");
        }
    }
}
