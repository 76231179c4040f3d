use std::sync::Arc;

use indexmap::IndexMap;

use crate::paths::dependency_key;

/// How a reference relates to the file that contains it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// Import of another source in the same dialect; traversed recursively.
    SameKind,
    /// A script referencing another script through a directive.
    CrossReference,
    /// Scheme-qualified URL or data URI; recorded, never traversed.
    Remote,
    /// Binary resource inlined into the output, e.g. `data-uri(...)`.
    Embedded,
}

impl ReferenceKind {
    pub fn is_traversable(&self) -> bool {
        matches!(self, Self::SameKind | Self::CrossReference)
    }
}

/// Content loaded for a dependency during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyContent {
    Text(Arc<str>),
    Binary(Arc<[u8]>),
}

/// One file (or remote resource) a root asset depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Reference text as it appeared in the source.
    pub reference: String,
    pub canonical_path: String,
    /// Whether the file lives in the file store and can be stat-ed.
    pub observable: bool,
    pub optional: bool,
    pub kind: ReferenceKind,
    /// `None` for remote references and for optional imports that were missing.
    pub content: Option<DependencyContent>,
}

impl Dependency {
    pub fn key(&self) -> String {
        dependency_key(&self.canonical_path)
    }

    /// Whether the file was present when the collection was built.
    pub fn is_present(&self) -> bool {
        self.content.is_some()
    }

    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Some(DependencyContent::Text(text)) => Some(text),
            _ => None,
        }
    }
}

/// A reference that could not be interpreted. Reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanDiagnostic {
    pub file: String,
    pub reference: String,
    pub line: usize,
    pub message: String,
}

/// Ordered set of dependencies keyed by [`dependency_key`].
///
/// Keeps insertion order, supports constant-time lookup by key, and lets the
/// builder move an existing entry to a cursor position.
#[derive(Debug, Clone, Default)]
pub struct DependencyCollection {
    entries: IndexMap<String, Dependency>,
    diagnostics: Vec<ScanDiagnostic>,
}

impl DependencyCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(&dependency_key(path))
    }

    pub fn get(&self, path: &str) -> Option<&Dependency> {
        self.entries.get(&dependency_key(path))
    }

    /// Position of the entry for `key`, if present.
    pub fn index_of_key(&self, key: &str) -> Option<usize> {
        self.entries.get_index_of(key)
    }

    /// Insert a new dependency at `index`, shifting later entries.
    pub fn insert_at(&mut self, index: usize, dependency: Dependency) {
        let index = index.min(self.entries.len());
        self.entries
            .shift_insert(index, dependency.key(), dependency);
    }

    /// Move the entry at `from` so it ends up at `to`.
    pub fn move_index(&mut self, from: usize, to: usize) {
        if from != to && from < self.entries.len() && to < self.entries.len() {
            self.entries.move_index(from, to);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dependency> {
        self.entries.values()
    }

    /// Canonical paths in order.
    pub fn paths(&self) -> Vec<String> {
        self.iter().map(|d| d.canonical_path.clone()).collect()
    }

    /// Canonical paths of dependencies whose modification time can be tracked.
    pub fn observable_paths(&self) -> Vec<String> {
        self.iter()
            .filter(|d| d.observable)
            .map(|d| d.canonical_path.clone())
            .collect()
    }

    pub fn diagnostics(&self) -> &[ScanDiagnostic] {
        &self.diagnostics
    }

    pub(crate) fn push_diagnostic(&mut self, diagnostic: ScanDiagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

impl<'a> IntoIterator for &'a DependencyCollection {
    type Item = &'a Dependency;
    type IntoIter = indexmap::map::Values<'a, String, Dependency>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}
