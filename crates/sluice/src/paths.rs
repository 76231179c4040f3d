//! Reference canonicalization.
//!
//! Turns the raw text of an `@import`, `url(...)` or `/// <reference>` into
//! a canonical virtual path used as the identity of a dependency.
//!
//! Resolution rules, in order:
//!
//! 1. Root-relative (`/x`, `//host/x`) or scheme-qualified (`https:`,
//!    `data:` ...) references are returned as-is, only normalized.
//! 2. Application-root references (`~/x`) expand against the application root.
//! 3. Anything else is combined with the directory of the referencing file.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::PathResolutionError;

/// Marker that anchors a reference at the application root.
pub const APPLICATION_ROOT_MARKER: &str = "~/";

/// Auxiliary file-name markers that do not change asset identity.
pub const AUXILIARY_MARKERS: &[&str] = &[".min", ".debug"];

// Two or more characters so Windows drive letters are not taken for schemes.
static SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]+:").expect("valid scheme regex"));

/// Canonicalizes references relative to the file that contains them.
#[derive(Debug, Clone)]
pub struct PathResolver {
    application_root: String,
    require_containment: bool,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl PathResolver {
    /// Resolver whose application root is `/`.
    pub fn new() -> Self {
        Self {
            application_root: "/".to_string(),
            require_containment: false,
        }
    }

    /// Resolver with a virtual application root such as `/app/`.
    pub fn with_application_root(root: &str) -> Self {
        let mut normalized = root.replace('\\', "/");
        if !normalized.starts_with('/') {
            normalized.insert(0, '/');
        }
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        Self {
            application_root: normalized,
            require_containment: false,
        }
    }

    /// Reject references that climb above `/` instead of passing them through.
    pub fn require_containment(mut self, require: bool) -> Self {
        self.require_containment = require;
        self
    }

    pub fn application_root(&self) -> &str {
        &self.application_root
    }

    /// Resolve `relative` against the location of `base`.
    pub fn resolve_relative_path(
        &self,
        base: &str,
        relative: &str,
    ) -> Result<String, PathResolutionError> {
        let trimmed = relative.trim();
        if trimmed.is_empty() {
            return Err(PathResolutionError::Malformed {
                reference: relative.to_string(),
                reason: "empty reference".to_string(),
            });
        }
        if trimmed.contains('\0') {
            return Err(PathResolutionError::Malformed {
                reference: relative.to_string(),
                reason: "reference contains a NUL character".to_string(),
            });
        }

        let reference = trimmed.replace('\\', "/");
        if is_remote(&reference) || is_data_uri(&reference) {
            return Ok(reference);
        }
        if reference.starts_with('/') {
            return self.normalize(&reference, relative, base);
        }
        if let Some(rest) = reference.strip_prefix(APPLICATION_ROOT_MARKER) {
            let expanded = format!("{}{}", self.application_root, rest);
            return self.normalize(&expanded, relative, base);
        }

        let base = base.replace('\\', "/");
        let combined = format!("{}{}", directory_of(&base), reference);
        self.normalize(&combined, relative, base.as_str())
    }

    /// Collapse `.` and `..` segments. Query strings and fragments are kept
    /// verbatim.
    fn normalize(
        &self,
        path: &str,
        reference: &str,
        base: &str,
    ) -> Result<String, PathResolutionError> {
        let (path_part, suffix) = split_suffix(path);
        let mut segments: Vec<&str> = Vec::new();
        for segment in path_part.split('/') {
            match segment {
                "" | "." => {}
                ".." => match segments.last() {
                    Some(last) if *last != ".." => {
                        segments.pop();
                    }
                    _ if self.require_containment => {
                        return Err(PathResolutionError::EscapesRoot {
                            reference: reference.to_string(),
                            base: base.to_string(),
                        });
                    }
                    _ => segments.push(".."),
                },
                other => segments.push(other),
            }
        }
        Ok(format!("/{}{}", segments.join("/"), suffix))
    }
}

fn split_suffix(path: &str) -> (&str, &str) {
    match path.find(['?', '#']) {
        Some(index) => path.split_at(index),
        None => (path, ""),
    }
}

/// The file a canonical path names: the path without any `?query` or
/// `#fragment`. This is what the file store is asked about.
pub fn file_path_of(path: &str) -> &str {
    split_suffix(path).0
}

/// Whether the reference points at a network resource (scheme-qualified or
/// protocol-relative).
pub fn is_remote(reference: &str) -> bool {
    let reference = reference.trim();
    if reference.starts_with("//") {
        return true;
    }
    SCHEME.is_match(reference) && !is_data_uri(reference)
}

/// Whether the reference is an inline `data:` URI.
pub fn is_data_uri(reference: &str) -> bool {
    reference
        .trim()
        .get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("data:"))
}

/// Whether a canonical path refers to a local, stat-able file.
pub fn is_observable(path: &str) -> bool {
    !is_remote(path) && !is_data_uri(path)
}

/// Directory part of a virtual path, including the trailing slash.
pub fn directory_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[..=index],
        None => "",
    }
}

/// File name part of a virtual path.
pub fn file_name_of(path: &str) -> &str {
    let (path, _) = split_suffix(path);
    match path.rfind('/') {
        Some(index) => &path[index + 1..],
        None => path,
    }
}

/// Lowercased final extension including the dot, e.g. `.less`.
pub fn extension_of(path: &str) -> Option<String> {
    let name = file_name_of(path);
    let index = name.rfind('.')?;
    if index == 0 && name.len() == 1 {
        return None;
    }
    Some(name[index..].to_ascii_lowercase())
}

/// Replace (or add) the final extension of a path.
pub fn with_extension(path: &str, extension: &str) -> String {
    let (path_part, suffix) = split_suffix(path);
    let name_start = path_part.rfind('/').map(|i| i + 1).unwrap_or(0);
    let stem_end = path_part[name_start..]
        .rfind('.')
        .map(|i| name_start + i)
        .unwrap_or(path_part.len());
    format!("{}{}{}", &path_part[..stem_end], extension, suffix)
}

/// Path without its final extension and without any auxiliary marker.
///
/// `/scripts/app.min.js` and `/scripts/app.js` both become `/scripts/app`.
pub fn strip_extension_and_marker(path: &str) -> &str {
    let (path_part, _) = split_suffix(path);
    let name_start = path_part.rfind('/').map(|i| i + 1).unwrap_or(0);
    let stem = match path_part[name_start..].rfind('.') {
        Some(i) if i > 0 => &path_part[..name_start + i],
        _ => path_part,
    };
    for marker in AUXILIARY_MARKERS {
        if stem.len() <= name_start + marker.len() {
            continue;
        }
        let cut = stem.len() - marker.len();
        if stem
            .get(cut..)
            .is_some_and(|tail| tail.eq_ignore_ascii_case(marker))
        {
            return &stem[..cut];
        }
    }
    stem
}

/// Identity key of a canonical path.
///
/// Case-insensitive, and blind to auxiliary markers, so `/a/Site.min.css`
/// and `/a/site.css` are the same dependency.
pub fn dependency_key(path: &str) -> String {
    if !is_observable(path) {
        return path.trim().to_ascii_lowercase();
    }
    let extension = extension_of(path).unwrap_or_default();
    format!("{}{}", strip_extension_and_marker(path), extension).to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_reference_combines_with_base_directory() {
        let resolver = PathResolver::new();
        assert_eq!(
            resolver
                .resolve_relative_path("/styles/site.less", "mixins/colors.less")
                .unwrap(),
            "/styles/mixins/colors.less"
        );
    }

    #[test]
    fn test_dot_segments_are_collapsed() {
        let resolver = PathResolver::new();
        assert_eq!(
            resolver
                .resolve_relative_path("/styles/themes/dark.less", "./../base/./reset.less")
                .unwrap(),
            "/styles/base/reset.less"
        );
    }

    #[test]
    fn test_root_relative_ignores_base() {
        let resolver = PathResolver::new();
        assert_eq!(
            resolver
                .resolve_relative_path("/styles/site.less", "\\shared\\vars.less")
                .unwrap(),
            "/shared/vars.less"
        );
    }

    #[test]
    fn test_application_root_marker() {
        let resolver = PathResolver::with_application_root("/app");
        assert_eq!(
            resolver
                .resolve_relative_path("/app/styles/site.less", "~/content/vars.less")
                .unwrap(),
            "/app/content/vars.less"
        );
    }

    #[test]
    fn test_remote_and_data_references_are_untouched() {
        let resolver = PathResolver::new();
        assert_eq!(
            resolver
                .resolve_relative_path("/styles/site.less", "https://cdn.example.com/a.css")
                .unwrap(),
            "https://cdn.example.com/a.css"
        );
        assert_eq!(
            resolver
                .resolve_relative_path("/styles/site.less", "//cdn.example.com/a.css")
                .unwrap(),
            "//cdn.example.com/a.css"
        );
        assert_eq!(
            resolver
                .resolve_relative_path("/styles/site.less", "data:image/png;base64,AAA")
                .unwrap(),
            "data:image/png;base64,AAA"
        );
    }

    #[test]
    fn test_climbing_above_root_passes_through_by_default() {
        let resolver = PathResolver::new();
        assert_eq!(
            resolver
                .resolve_relative_path("/site.less", "../outside.less")
                .unwrap(),
            "/../outside.less"
        );
    }

    #[test]
    fn test_climbing_above_root_fails_with_containment() {
        let resolver = PathResolver::new().require_containment(true);
        let err = resolver
            .resolve_relative_path("/site.less", "../outside.less")
            .unwrap_err();
        assert!(matches!(err, PathResolutionError::EscapesRoot { .. }));
    }

    #[test]
    fn test_empty_reference_is_malformed() {
        let resolver = PathResolver::new();
        assert!(matches!(
            resolver.resolve_relative_path("/site.less", "  "),
            Err(PathResolutionError::Malformed { .. })
        ));
    }

    #[test]
    fn test_query_and_fragment_are_preserved() {
        let resolver = PathResolver::new();
        assert_eq!(
            resolver
                .resolve_relative_path("/styles/site.css", "../fonts/icons.eot?#iefix")
                .unwrap(),
            "/fonts/icons.eot?#iefix"
        );
    }

    #[test]
    fn test_drive_letter_is_not_a_scheme() {
        assert!(!is_remote("C:/styles/a.css"));
        assert!(is_remote("http://example.com/a.css"));
        assert!(!is_remote("data:font/woff;base64,AA"));
        assert!(is_data_uri("DATA:image/gif;base64,R0"));
    }

    #[test]
    fn test_dependency_key_ignores_case_and_min_marker() {
        assert_eq!(dependency_key("/Styles/Site.min.css"), "/styles/site.css");
        assert_eq!(dependency_key("/styles/site.css"), "/styles/site.css");
        assert_eq!(dependency_key("/scripts/App.debug.js"), "/scripts/app.js");
        assert_ne!(dependency_key("/scripts/app.ts"), dependency_key("/scripts/app.js"));
    }

    #[test]
    fn test_extension_helpers() {
        assert_eq!(extension_of("/a/b.LESS"), Some(".less".to_string()));
        assert_eq!(extension_of("/a/b"), None);
        assert_eq!(with_extension("/a/b.less", ".css"), "/a/b.css");
        assert_eq!(with_extension("/a/b", ".less"), "/a/b.less");
        assert_eq!(strip_extension_and_marker("/a/jquery.min.js"), "/a/jquery");
        assert_eq!(strip_extension_and_marker("/a/.min"), "/a/.min");
        assert_eq!(file_name_of("/a/b.css?v=1"), "b.css");
        assert_eq!(directory_of("/a/b.css"), "/a/");
    }

    #[test]
    fn test_non_ascii_stems_keep_char_boundaries() {
        assert_eq!(dependency_key("/styles/é€.css"), "/styles/é€.css");
        assert_eq!(dependency_key("/styles/é€.min.css"), "/styles/é€.css");
        assert_eq!(strip_extension_and_marker("/scripts/ñandú.js"), "/scripts/ñandú");
        assert_eq!(strip_extension_and_marker("/a/€.debug.js"), "/a/€");
    }

    #[test]
    fn test_file_path_drops_query_and_fragment() {
        assert_eq!(file_path_of("/img/f.svg#blur"), "/img/f.svg");
        assert_eq!(file_path_of("/styles/x.less?v=2"), "/styles/x.less");
        assert_eq!(file_path_of("/styles/x.less"), "/styles/x.less");
    }
}
