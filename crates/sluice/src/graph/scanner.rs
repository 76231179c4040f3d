//! Reference scanning for stylesheet and script sources.
//!
//! The scanner is deliberately shallow: it finds import-like constructs
//! with regular expressions after comments have been blanked out, and
//! leaves path resolution to the builder.

use once_cell::sync::Lazy;
use regex::Regex;

use super::dependency::ReferenceKind;
use crate::asset::AssetKind;
use crate::paths::{is_data_uri, is_remote};

static LESS_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)@import\s*(?:\(\s*([a-z,\s]*)\)\s*)?(?:url\(\s*(?:"([^"]*)"|'([^']*)'|([^)'"\s]*))\s*\)|"([^"]*)"|'([^']*)')"#,
    )
    .expect("valid import regex")
});

static IMPORT_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)@import\b").expect("valid import keyword regex"));

static DATA_URI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\bdata-uri\(\s*(?:(?:"[^"]*"|'[^']*')\s*,\s*)?(?:"([^"]*)"|'([^']*)')\s*\)"#,
    )
    .expect("valid data-uri regex")
});

static TRIPLE_SLASH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^[ \t]*///[ \t]*<reference\s+path\s*=\s*(?:"([^"]*)"|'([^']*)')[^>]*/?>"#)
        .expect("valid reference directive regex")
});

static ES_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\b(?:import|export)\s+(?:[\w*{}\s,$]+?\s+from\s+)?(?:"([^"]+)"|'([^']+)')"#)
        .expect("valid module import regex")
});

/// A reference found in a source file, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedReference {
    pub reference: String,
    pub kind: ReferenceKind,
    pub optional: bool,
    /// 1-based line number in the scanned file.
    pub line: usize,
}

/// An import-like construct that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedReference {
    pub text: String,
    pub line: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub references: Vec<ScannedReference>,
    pub malformed: Vec<MalformedReference>,
}

/// Find every reference in `content`, in source order.
pub fn scan(content: &str, kind: AssetKind) -> ScanResult {
    let masked = mask_comments(content, kind);
    match kind {
        AssetKind::Stylesheet => scan_stylesheet(&masked),
        AssetKind::Script => scan_script(&masked),
    }
}

fn scan_stylesheet(masked: &str) -> ScanResult {
    let mut result = ScanResult::default();
    let mut found: Vec<(usize, ScannedReference)> = Vec::new();
    let mut import_starts = Vec::new();

    for caps in LESS_IMPORT.captures_iter(masked) {
        let Some(whole) = caps.get(0) else { continue };
        import_starts.push(whole.start());

        let optional = caps
            .get(1)
            .map(|options| {
                options
                    .as_str()
                    .split(',')
                    .any(|o| o.trim().eq_ignore_ascii_case("optional"))
            })
            .unwrap_or(false);
        let reference = (2..=6)
            .find_map(|i| caps.get(i))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();

        if reference.is_empty() {
            result.malformed.push(MalformedReference {
                text: whole.as_str().to_string(),
                line: line_of(masked, whole.start()),
            });
            continue;
        }

        let kind = if is_remote(&reference) || is_data_uri(&reference) {
            ReferenceKind::Remote
        } else {
            ReferenceKind::SameKind
        };
        found.push((
            whole.start(),
            ScannedReference {
                reference,
                kind,
                optional,
                line: line_of(masked, whole.start()),
            },
        ));
    }

    for keyword in IMPORT_KEYWORD.find_iter(masked) {
        if !import_starts.contains(&keyword.start()) {
            result.malformed.push(MalformedReference {
                text: snippet(masked, keyword.start()),
                line: line_of(masked, keyword.start()),
            });
        }
    }

    for caps in DATA_URI.captures_iter(masked) {
        let Some(whole) = caps.get(0) else { continue };
        let Some(reference) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };
        let reference = reference.as_str().trim();
        if reference.is_empty() || is_remote(reference) || is_data_uri(reference) {
            continue;
        }
        found.push((
            whole.start(),
            ScannedReference {
                reference: reference.to_string(),
                kind: ReferenceKind::Embedded,
                optional: false,
                line: line_of(masked, whole.start()),
            },
        ));
    }

    found.sort_by_key(|(offset, _)| *offset);
    result.references = found.into_iter().map(|(_, r)| r).collect();
    result.malformed.sort_by_key(|m| m.line);
    result
}

fn scan_script(masked: &str) -> ScanResult {
    let mut found: Vec<(usize, ScannedReference)> = Vec::new();

    for caps in TRIPLE_SLASH.captures_iter(masked) {
        let Some(whole) = caps.get(0) else { continue };
        let reference = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        let kind = if is_remote(&reference) {
            ReferenceKind::Remote
        } else {
            ReferenceKind::CrossReference
        };
        found.push((
            whole.start(),
            ScannedReference {
                reference,
                kind,
                optional: false,
                line: line_of(masked, whole.start()),
            },
        ));
    }

    for caps in ES_IMPORT.captures_iter(masked) {
        let Some(whole) = caps.get(0) else { continue };
        let Some(specifier) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };
        let specifier = specifier.as_str().trim();
        // bare package specifiers belong to a package manager, not the store
        if !is_local_specifier(specifier) {
            continue;
        }
        found.push((
            whole.start(),
            ScannedReference {
                reference: specifier.to_string(),
                kind: ReferenceKind::SameKind,
                optional: false,
                line: line_of(masked, whole.start()),
            },
        ));
    }

    found.sort_by_key(|(offset, _)| *offset);
    ScanResult {
        references: found.into_iter().map(|(_, r)| r).collect(),
        malformed: Vec::new(),
    }
}

fn is_local_specifier(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || (specifier.starts_with('/') && !specifier.starts_with("//"))
}

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].bytes().filter(|b| *b == b'\n').count() + 1
}

fn snippet(text: &str, offset: usize) -> String {
    text[offset..]
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Blank out `//` and `/* */` comments, preserving line structure.
///
/// String literals are copied verbatim so `"http://x"` survives, and so is
/// the body of an unquoted `url(...)`. For scripts, lines whose first token
/// is `///` are kept because they carry reference directives.
pub fn mask_comments(content: &str, kind: AssetKind) -> String {
    let chars: Vec<char> = content.chars().collect();
    let mut out = String::with_capacity(content.len());
    let mut i = 0;
    let mut at_line_start = true;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match c {
            '"' | '\'' | '`' if c != '`' || kind == AssetKind::Script => {
                let end = string_end(&chars, i);
                out.extend(&chars[i..end]);
                at_line_start = false;
                i = end;
            }
            '/' if next == Some('/') => {
                let triple = chars.get(i + 2) == Some(&'/');
                let end = chars[i..]
                    .iter()
                    .position(|ch| *ch == '\n')
                    .map(|p| i + p)
                    .unwrap_or(chars.len());
                if kind == AssetKind::Script && triple && at_line_start {
                    out.extend(&chars[i..end]);
                } else {
                    out.extend(std::iter::repeat_n(' ', end - i));
                }
                i = end;
            }
            '/' if next == Some('*') => {
                let mut j = i + 2;
                while j < chars.len() && !(chars[j] == '*' && chars.get(j + 1) == Some(&'/')) {
                    j += 1;
                }
                let end = (j + 2).min(chars.len());
                for ch in &chars[i..end] {
                    out.push(if *ch == '\n' { '\n' } else { ' ' });
                }
                i = end;
            }
            'u' | 'U' if kind == AssetKind::Stylesheet && starts_unquoted_url(&chars, i) => {
                let end = chars[i..]
                    .iter()
                    .position(|ch| *ch == ')' || *ch == '\n')
                    .map(|p| i + p)
                    .unwrap_or(chars.len());
                out.extend(&chars[i..end]);
                at_line_start = false;
                i = end;
            }
            '\n' => {
                out.push('\n');
                at_line_start = true;
                i += 1;
            }
            _ => {
                if !c.is_whitespace() {
                    at_line_start = false;
                }
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Index one past the closing quote of the string starting at `start`.
fn string_end(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut j = start + 1;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            '\n' if quote != '`' => return j,
            ch if ch == quote => return j + 1,
            _ => j += 1,
        }
    }
    chars.len()
}

fn starts_unquoted_url(chars: &[char], i: usize) -> bool {
    let word: String = chars[i..].iter().take(4).collect();
    if !word.eq_ignore_ascii_case("url(") {
        return false;
    }
    if i > 0 && (chars[i - 1].is_alphanumeric() || chars[i - 1] == '-') {
        return false;
    }
    chars[i + 4..]
        .iter()
        .find(|ch| !ch.is_whitespace())
        .is_some_and(|ch| *ch != '"' && *ch != '\'')
}
