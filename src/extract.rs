//! Declaration extraction
//!
//! Turns one parsed compilation unit into flat [`Component`] records.
//! Nested declarations are emitted after their enclosing type with an
//! `Outer$Inner` FQN. Type references are stored as written; the resolver
//! qualifies supertypes once the whole project has been extracted.

use std::collections::BTreeMap;
use std::path::Path;

use crate::models::{
    method_key, Component, ComponentKind, Field, LineSpan, Method, Parameter, Stereotype,
    CONSTRUCTOR_NAME,
};
use crate::syntax::{CompilationUnit, DeclKind, FieldDecl, Member, MethodDecl, TypeDecl};

/// Lines scanned for an opening brace before giving up on a body
const OPENING_BRACE_WINDOW: usize = 10;

/// Line count assumed for a body whose braces never balance
const APPROXIMATE_BODY_LINES: usize = 20;

/// Extract every component declared in `unit`, outermost first
pub fn extract(path: &Path, source: &str, unit: &CompilationUnit, source_window: usize) -> Vec<Component> {
    let lines: Vec<&str> = source.lines().collect();
    let package = unit.package.clone().unwrap_or_default();

    let ctx = Context {
        path,
        package: &package,
        imports: &unit.imports,
        lines: &lines,
        source_window,
    };

    let mut out = Vec::new();
    for decl in &unit.types {
        ctx.component(decl, None, &mut out);
    }
    out
}

struct Context<'a> {
    path: &'a Path,
    package: &'a str,
    imports: &'a [String],
    lines: &'a [&'a str],
    source_window: usize,
}

impl Context<'_> {
    fn component(&self, decl: &TypeDecl, outer: Option<&str>, out: &mut Vec<Component>) {
        let fqn = match outer {
            Some(outer) => format!("{}${}", outer, decl.name),
            None if self.package.is_empty() => decl.name.clone(),
            None => format!("{}.{}", self.package, decl.name),
        };

        let mut component = Component {
            name: decl.name.clone(),
            fqn: fqn.clone(),
            kind: component_kind(decl),
            file_path: self.path.to_path_buf(),
            package: self.package.to_string(),
            imports: self.imports.to_vec(),
            annotations: decl.annotations.clone(),
            generics: decl.type_params.clone(),
            extends: decl.extends.iter().map(|t| t.to_string()).collect(),
            implements: decl.implements.iter().map(|t| t.to_string()).collect(),
            line: decl.line,
            fields: BTreeMap::new(),
            methods: BTreeMap::new(),
        };

        let mut nested = Vec::new();
        for member in &decl.members {
            match member {
                Member::Field(field) => self.add_field(&mut component, field),
                Member::Method(method) => self.add_method(&mut component, method, false),
                Member::Constructor(ctor) => self.add_method(&mut component, ctor, true),
                Member::Type(inner) => nested.push(inner),
            }
        }

        out.push(component);

        for inner in nested {
            self.component(inner, Some(&fqn), out);
        }
    }

    fn add_field(&self, component: &mut Component, decl: &FieldDecl) {
        if component.fields.contains_key(&decl.name) {
            log::debug!("Duplicate field {} in {}", decl.name, component.fqn);
            return;
        }
        component.fields.insert(
            decl.name.clone(),
            Field {
                name: decl.name.clone(),
                type_name: decl.ty.to_string(),
                modifiers: decl.modifiers.clone(),
                annotations: decl.annotations.clone(),
                parent: component.fqn.clone(),
            },
        );
    }

    fn add_method(&self, component: &mut Component, decl: &MethodDecl, is_constructor: bool) {
        let parameters: Vec<Parameter> = decl
            .params
            .iter()
            .map(|p| Parameter {
                type_name: if p.varargs { format!("{}...", p.ty) } else { p.ty.to_string() },
                name: p.name.clone(),
            })
            .collect();

        let signature = format!(
            "({})",
            parameters.iter().map(Parameter::display).collect::<Vec<_>>().join(", ")
        );
        let key_signature = format!(
            "({})",
            parameters.iter().map(|p| p.type_name.as_str()).collect::<Vec<_>>().join(",")
        );

        let (name, return_type) = if is_constructor {
            (CONSTRUCTOR_NAME.to_string(), component.name.clone())
        } else {
            let return_type = decl.return_type.as_ref().map(|t| t.to_string()).unwrap_or_default();
            (decl.name.clone(), return_type)
        };

        let method = Method {
            key: method_key(&component.fqn, &name, &key_signature),
            name,
            signature,
            key_signature,
            modifiers: decl.modifiers.clone(),
            return_type,
            parameters,
            throws: decl.throws.iter().map(|t| t.to_string()).collect(),
            annotations: decl.annotations.clone(),
            lines: brace_span(self.lines, decl.line, decl.has_body, self.source_window),
            invocations: decl.invocations.clone(),
            calls: Vec::new(),
            called_by: Vec::new(),
            parent: component.fqn.clone(),
        };

        let member_key = method.member_key(&component.name);
        if component.methods.contains_key(&member_key) {
            log::debug!("Duplicate method {} in {}", member_key, component.fqn);
            return;
        }
        component.methods.insert(member_key, method);
    }
}

/// Structural kind, overridden by the first catalog annotation
fn component_kind(decl: &TypeDecl) -> ComponentKind {
    if let Some(stereotype) = decl.annotations.iter().find_map(|a| Stereotype::from_annotation(a)) {
        return ComponentKind::Stereotype(stereotype);
    }
    match decl.kind {
        DeclKind::Class => ComponentKind::Class,
        DeclKind::Interface => ComponentKind::Interface,
        DeclKind::Enum => ComponentKind::Enum,
        DeclKind::AnnotationType => ComponentKind::Annotation,
    }
}

/// Best-effort line range by brace counting from the declaration line
///
/// Closing braces before the first `{` belong to an earlier member and are
/// skipped. Braces inside string literals and comments are counted too.
pub fn brace_span(lines: &[&str], start: usize, has_body: bool, window: usize) -> LineSpan {
    if start == 0 || start > lines.len() {
        return LineSpan::default();
    }

    // Bodiless declarations end at their terminating semicolon
    if !has_body {
        let end = lines[start - 1..]
            .iter()
            .take(OPENING_BRACE_WINDOW)
            .position(|line| line.contains(';'))
            .map(|offset| start + offset);
        return match end {
            Some(end) => LineSpan { start, end, approximate: false },
            None => LineSpan { start, end: start, approximate: true },
        };
    }

    let mut depth: i64 = 0;
    let mut opened = false;

    for (offset, line) in lines[start - 1..].iter().take(window.max(1)).enumerate() {
        for ch in line.chars() {
            match ch {
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' if opened => depth -= 1,
                _ => {}
            }
            if opened && depth <= 0 {
                return LineSpan { start, end: start + offset, approximate: false };
            }
        }

        if !opened && offset + 1 >= OPENING_BRACE_WINDOW {
            return LineSpan { start, end: start, approximate: true };
        }
    }

    LineSpan {
        start,
        end: (start + APPROXIMATE_BODY_LINES).min(lines.len()).max(start),
        approximate: true,
    }
}
