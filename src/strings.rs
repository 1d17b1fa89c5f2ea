//! Identifier and string-literal index
//!
//! Maps case-folded tokens to every place they occur. Each source file is
//! scanned as raw text, independently of parsing, for:
//! - identifiers: letter or underscore first, at least 3 characters
//! - double-quoted literal bodies (escape aware), at least 2 characters
//!
//! A token is recorded once per file, kind and owning component.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use strum::Display;

const MIN_IDENTIFIER_LEN: usize = 3;
const MIN_LITERAL_LEN: usize = 2;

static IDENTIFIER_RE: OnceLock<Regex> = OnceLock::new();
static LITERAL_RE: OnceLock<Regex> = OnceLock::new();

fn identifier_re() -> &'static Regex {
    IDENTIFIER_RE.get_or_init(|| {
        Regex::new(r"\b[\p{L}_][\p{L}\p{N}_]*\b").expect("identifier pattern is valid")
    })
}

fn literal_re() -> &'static Regex {
    LITERAL_RE.get_or_init(|| {
        Regex::new(r#""((?:\\.|[^"\\])*)""#).expect("literal pattern is valid")
    })
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum HitKind {
    Identifier,
    Literal,
}

/// One occurrence of an indexed token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StringHit {
    /// First top-level component of the file, if it declared any
    pub component: Option<String>,
    pub path: PathBuf,
    /// Token as written
    pub original: String,
    pub kind: HitKind,
}

/// Case-folded token -> occurrences
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StringIndex {
    entries: HashMap<String, Vec<StringHit>>,
}

impl StringIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add hits produced by [`scan`]
    pub fn extend(&mut self, hits: impl IntoIterator<Item = (String, StringHit)>) {
        for (key, hit) in hits {
            self.entries.entry(key).or_default().push(hit);
        }
    }

    /// Exact case-folded lookup; unknown terms yield an empty slice
    pub fn lookup(&self, term: &str) -> &[StringHit] {
        self.entries
            .get(&term.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Scan one file's text into `(key, hit)` pairs
///
/// Every token is attributed to each component declared in the file,
/// nested ones included. A file without components yields ownerless hits.
pub fn scan(text: &str, path: &Path, components: &[&str]) -> Vec<(String, StringHit)> {
    let mut seen: HashSet<(&str, HitKind)> = HashSet::new();
    let mut tokens: Vec<(&str, HitKind)> = Vec::new();

    for m in identifier_re().find_iter(text) {
        let token = m.as_str();
        if token.chars().count() >= MIN_IDENTIFIER_LEN && seen.insert((token, HitKind::Identifier)) {
            tokens.push((token, HitKind::Identifier));
        }
    }

    for caps in literal_re().captures_iter(text) {
        let Some(body) = caps.get(1) else {
            continue;
        };
        let token = body.as_str();
        if token.chars().count() >= MIN_LITERAL_LEN && seen.insert((token, HitKind::Literal)) {
            tokens.push((token, HitKind::Literal));
        }
    }

    let owners: Vec<Option<&str>> = if components.is_empty() {
        vec![None]
    } else {
        components.iter().copied().map(Some).collect()
    };

    let mut out = Vec::with_capacity(tokens.len() * owners.len());
    for owner in &owners {
        for (token, kind) in &tokens {
            out.push((
                token.to_lowercase(),
                StringHit {
                    component: owner.map(str::to_string),
                    path: path.to_path_buf(),
                    original: token.to_string(),
                    kind: *kind,
                },
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(text: &str) -> StringIndex {
        let mut index = StringIndex::new();
        index.extend(scan(text, Path::new("A.java"), &["com.acme.A"]));
        index
    }

    #[test]
    fn test_identifiers_are_case_folded() {
        let idx = index("class UserService { int id; void findUser() {} }");

        let hits = idx.lookup("USERSERVICE");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].original, "UserService");
        assert_eq!(hits[0].kind, HitKind::Identifier);
        assert_eq!(hits[0].component.as_deref(), Some("com.acme.A"));

        assert!(idx.lookup("findUser").len() == 1);
        // too short
        assert!(idx.lookup("id").is_empty());
    }

    #[test]
    fn test_literals_are_escape_aware() {
        let idx = index(r#"String a = "/api/users"; String b = "say \"hi\""; String c = "x";"#);

        let hits = idx.lookup("/api/users");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, HitKind::Literal);

        assert_eq!(idx.lookup(r#"say \"hi\""#).len(), 1);
        assert!(idx.lookup("x").is_empty());
    }

    #[test]
    fn test_numbers_are_not_identifiers() {
        let idx = index("int x = 12345; long m = 0xFFFF; int _tmp1 = 0;");
        assert!(idx.lookup("12345").is_empty());
        assert!(idx.lookup("xffff").is_empty());
        assert_eq!(idx.lookup("_tmp1").len(), 1);
    }

    #[test]
    fn test_one_hit_per_file_and_kind() {
        let idx = index(r#"void save() { save(); log("save"); }"#);
        let hits = idx.lookup("save");
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().any(|h| h.kind == HitKind::Identifier));
        assert!(hits.iter().any(|h| h.kind == HitKind::Literal));
    }

    #[test]
    fn test_hits_belong_to_every_component_in_the_file() {
        let mut idx = StringIndex::new();
        idx.extend(scan(
            r#"class A { } class B { String r = "/only/b"; static class C { } }"#,
            Path::new("A.java"),
            &["p.A", "p.B", "p.B$C"],
        ));

        let owners: Vec<_> = idx.lookup("/only/b").iter().map(|h| h.component.as_deref()).collect();
        assert_eq!(owners, vec![Some("p.A"), Some("p.B"), Some("p.B$C")]);
    }

    #[test]
    fn test_file_without_components_has_no_owner() {
        let mut idx = StringIndex::new();
        idx.extend(scan("package p;", Path::new("package-info.java"), &[]));
        assert_eq!(idx.lookup("package")[0].component, None);
    }

    #[test]
    fn test_unknown_term_is_empty() {
        assert!(StringIndex::new().lookup("anything").is_empty());
    }
}
