//! Heuristic type-name resolution
//!
//! Rewrites simple or partially qualified type names into FQNs using only
//! what the source itself says: nesting, imports, the package, and the set
//! of components extracted from the project. First match wins:
//!
//! 1. already qualified (contains `.` or `$`): kept verbatim
//! 2. a nested type of the current component or any enclosing one
//! 3. a single-type import ending in the name
//! 4. a component in the same package
//! 5. a component under a wildcard import's package
//! 6. the implicit `java.lang` table, then common `java.util` types
//! 7. unchanged
//!
//! Generic arguments and array suffixes are carried over untouched.
//! Resolution is idempotent: feeding a result back in returns it unchanged.

use std::collections::HashSet;

use crate::models::{enclosing_fqn, Component};

/// Implicitly imported root-namespace types
const JAVA_LANG: &[&str] = &[
    "String", "Object", "Integer", "Boolean", "Long", "Double", "Float", "Character", "Byte",
    "Short", "Void", "Class", "System", "Math", "Thread", "Runnable", "Exception",
    "RuntimeException", "Error", "Throwable", "Override", "Deprecated", "SuppressWarnings",
];

/// Container types common enough to resolve without an import
const JAVA_UTIL: &[&str] = &[
    "List", "Map", "Set", "Collection", "Optional", "ArrayList", "HashMap", "HashSet",
];

/// Root of every class hierarchy
pub const ROOT_OBJECT: &str = "java.lang.Object";

/// Split `List<String>[]` into (`List`, `<String>[]`)
pub fn split_type(name: &str) -> (&str, &str) {
    let cut = name
        .find(['<', '['])
        .or_else(|| name.strip_suffix("...").map(|base| base.len()))
        .unwrap_or(name.len());
    name.split_at(cut)
}

/// Type name with generic and array suffixes removed
pub fn base_type(name: &str) -> &str {
    split_type(name.trim()).0
}

/// Resolver over a fixed set of known component FQNs
#[derive(Debug, Default)]
pub struct Resolver {
    known: HashSet<String>,
}

impl Resolver {
    pub fn new<'a>(fqns: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            known: fqns.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn is_known(&self, fqn: &str) -> bool {
        self.known.contains(fqn)
    }

    /// Resolve `name` as seen from inside `ctx`
    pub fn resolve(&self, ctx: &Component, name: &str) -> String {
        let name = name.trim();
        let (base, suffix) = split_type(name);
        if base.is_empty() {
            return name.to_string();
        }

        match self.resolve_base(ctx, base) {
            Some(resolved) => format!("{}{}", resolved, suffix),
            None => {
                if !ctx.generics.iter().any(|g| g == base) {
                    log::trace!("Unresolved type {} in {}", base, ctx.fqn);
                }
                name.to_string()
            }
        }
    }

    fn resolve_base(&self, ctx: &Component, base: &str) -> Option<String> {
        if base.contains('.') || base.contains('$') {
            return Some(base.to_string());
        }

        // Nested types, innermost scope first
        let mut scope = Some(ctx.fqn.as_str());
        while let Some(current) = scope {
            let candidate = format!("{}${}", current, base);
            if self.known.contains(&candidate) {
                return Some(candidate);
            }
            scope = enclosing_fqn(current);
        }

        let single = ctx
            .imports
            .iter()
            .filter(|import| !import.ends_with(".*"))
            .find(|import| import.rsplit('.').next() == Some(base));
        if let Some(import) = single {
            return Some(import.clone());
        }

        let same_package = if ctx.package.is_empty() {
            base.to_string()
        } else {
            format!("{}.{}", ctx.package, base)
        };
        if self.known.contains(&same_package) {
            return Some(same_package);
        }

        let wildcard = ctx
            .imports
            .iter()
            .filter_map(|import| import.strip_suffix(".*"))
            .map(|prefix| format!("{}.{}", prefix, base))
            .find(|candidate| self.known.contains(candidate));
        if wildcard.is_some() {
            return wildcard;
        }

        if JAVA_LANG.contains(&base) {
            return Some(format!("java.lang.{}", base));
        }
        if JAVA_UTIL.contains(&base) {
            return Some(format!("java.util.{}", base));
        }

        None
    }
}

/// Qualify every component's `extends` / `implements` in place
pub fn resolve_supertypes<'a>(resolver: &Resolver, components: impl IntoIterator<Item = &'a mut Component>) {
    for component in components {
        let extends: Vec<String> = component.extends.iter().map(|t| resolver.resolve(component, t)).collect();
        let implements: Vec<String> = component.implements.iter().map(|t| resolver.resolve(component, t)).collect();
        component.extends = extends;
        component.implements = implements;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ComponentKind;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn component(fqn: &str, package: &str, imports: &[&str]) -> Component {
        Component {
            name: fqn.rsplit(['.', '$']).next().unwrap().to_string(),
            fqn: fqn.to_string(),
            kind: ComponentKind::Class,
            file_path: PathBuf::from("X.java"),
            package: package.to_string(),
            imports: imports.iter().map(|s| s.to_string()).collect(),
            annotations: vec![],
            generics: vec!["T".to_string()],
            extends: vec![],
            implements: vec![],
            line: 1,
            fields: BTreeMap::new(),
            methods: BTreeMap::new(),
        }
    }

    fn resolver() -> Resolver {
        Resolver::new([
            "com.acme.web.UserController",
            "com.acme.web.UserController$Request",
            "com.acme.web.UserController$Request$Body",
            "com.acme.web.Helper",
            "com.acme.service.UserService",
            "com.acme.model.User",
            "Standalone",
        ])
    }

    #[test]
    fn test_resolution_order() {
        let r = resolver();
        let ctx = component(
            "com.acme.web.UserController$Request$Body",
            "com.acme.web",
            &["com.acme.service.UserService", "com.acme.model.*"],
        );

        assert_eq!(r.resolve(&ctx, "java.util.Date"), "java.util.Date");
        assert_eq!(r.resolve(&ctx, "Request"), "com.acme.web.UserController$Request");
        assert_eq!(r.resolve(&ctx, "UserService"), "com.acme.service.UserService");
        assert_eq!(r.resolve(&ctx, "Helper"), "com.acme.web.Helper");
        assert_eq!(r.resolve(&ctx, "User"), "com.acme.model.User");
        assert_eq!(r.resolve(&ctx, "String"), "java.lang.String");
        assert_eq!(r.resolve(&ctx, "Optional"), "java.util.Optional");
        assert_eq!(r.resolve(&ctx, "Frobnicator"), "Frobnicator");
    }

    #[test]
    fn test_import_beats_same_package() {
        let r = Resolver::new(["com.a.Thing", "com.b.Thing"]);
        let ctx = component("com.a.User", "com.a", &["com.b.Thing"]);
        assert_eq!(r.resolve(&ctx, "Thing"), "com.b.Thing");
    }

    #[test]
    fn test_suffix_preserved() {
        let r = resolver();
        let ctx = component("com.acme.web.Helper", "com.acme.web", &["com.acme.model.*"]);

        assert_eq!(r.resolve(&ctx, "List<User>"), "java.util.List<User>");
        assert_eq!(r.resolve(&ctx, "User[][]"), "com.acme.model.User[][]");
        assert_eq!(r.resolve(&ctx, "String..."), "java.lang.String...");
    }

    #[test]
    fn test_idempotent() {
        let r = resolver();
        let ctx = component("com.acme.web.UserController", "com.acme.web", &["com.acme.model.*"]);
        let default_ctx = component("Standalone", "", &[]);

        for name in ["Request", "User", "Map<String,User>", "T", "int", "Nope"] {
            let once = r.resolve(&ctx, name);
            assert_eq!(r.resolve(&ctx, &once), once, "re-resolving {}", name);
        }
        let once = r.resolve(&default_ctx, "Standalone");
        assert_eq!(once, "Standalone");
        assert_eq!(r.resolve(&default_ctx, &once), once);
    }

    #[test]
    fn test_resolve_supertypes() {
        let r = resolver();
        let mut comp = component("com.acme.web.UserController", "com.acme.web", &["com.acme.service.UserService"]);
        comp.extends = vec!["Helper".to_string()];
        comp.implements = vec!["UserService".to_string(), "Runnable".to_string()];

        resolve_supertypes(&r, std::iter::once(&mut comp));

        assert_eq!(comp.extends, vec!["com.acme.web.Helper"]);
        assert_eq!(comp.implements, vec!["com.acme.service.UserService", "java.lang.Runnable"]);
    }

    #[test]
    fn test_split_type() {
        assert_eq!(split_type("Map<K,V>[]"), ("Map", "<K,V>[]"));
        assert_eq!(split_type("int[]"), ("int", "[]"));
        assert_eq!(split_type("Foo"), ("Foo", ""));
        assert_eq!(base_type(" java.util.List<String> "), "java.util.List");
    }
}
