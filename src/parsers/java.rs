//! Java source adapter using Tree-sitter
//!
//! Folds the tree-sitter Java grammar into the closed declaration model:
//! - package and imports (via a query over the compilation unit)
//! - classes, records, interfaces, enums, annotation types (nested recursively)
//! - fields, one per declarator
//! - methods and constructors with parameters, throws and annotations
//! - raw invocation captures from method and constructor bodies
//!
//! A file the grammar rejects is skipped with a syntax error. A declaration
//! missing a required part is skipped with a structural error while the
//! rest of the file is kept.

use anyhow::{Context, Result};
use std::path::Path;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Parser, Query, QueryCursor};

use super::ParseOutcome;
use crate::models::{Invocation, ParseError, ParseErrorKind, CONSTRUCTOR_NAME};
use crate::syntax::{
    CompilationUnit, DeclKind, FieldDecl, Member, MethodDecl, ParamDecl, TypeDecl, TypeRef,
    WildcardBound,
};

/// Parse Java source into a compilation unit
///
/// Only adapter setup failures are returned as `Err`; per-file faults are
/// reported through [`ParseOutcome::errors`].
pub fn parse(path: &Path, source: &str) -> Result<ParseOutcome> {
    let mut parser = Parser::new();
    let language = tree_sitter_java::LANGUAGE;

    parser
        .set_language(&language.into())
        .context("Failed to set Java language")?;

    let Some(tree) = parser.parse(source, None) else {
        return Ok(ParseOutcome {
            unit: None,
            errors: vec![ParseError::new(path, ParseErrorKind::Syntax, None, "parser produced no tree")],
        });
    };

    let root = tree.root_node();

    if root.has_error() {
        let (line, message) = describe_first_error(root, source.as_bytes());
        return Ok(ParseOutcome {
            unit: None,
            errors: vec![ParseError::new(path, ParseErrorKind::Syntax, Some(line), message)],
        });
    }

    let mut adapter = Adapter {
        path,
        source: source.as_bytes(),
        errors: Vec::new(),
    };

    let (package, imports) = extract_header(source, &root, &language.into())?;

    let mut types = Vec::new();
    for node in named_children(root) {
        if let Some(decl) = adapter.type_decl(node) {
            types.push(decl);
        }
    }

    Ok(ParseOutcome {
        unit: Some(CompilationUnit { package, imports, types }),
        errors: adapter.errors,
    })
}

/// Extract the package name and import paths
fn extract_header(
    source: &str,
    root: &Node,
    language: &tree_sitter::Language,
) -> Result<(Option<String>, Vec<String>)> {
    let query_str = r#"
        (package_declaration) @package
        (import_declaration) @import
    "#;

    let query = Query::new(language, query_str)
        .context("Failed to create header query")?;

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, *root, source.as_bytes());

    let mut package = None;
    let mut imports = Vec::new();

    while let Some(match_) = matches.next() {
        for capture in match_.captures {
            let capture_name: &str = &query.capture_names()[capture.index as usize];
            let text = capture.node.utf8_text(source.as_bytes()).unwrap_or("");
            match capture_name {
                "package" => {
                    if let Some(name) = header_path(text, "package") {
                        package = Some(name);
                    }
                }
                "import" => {
                    // Static imports name members, not types
                    match header_path(text, "import") {
                        Some(path) if !path.starts_with("static ") => imports.push(path),
                        _ => {}
                    }
                }
                _ => {}
            }
        }
    }

    Ok((package, imports))
}

/// `import  com.acme .Foo ;` -> `com.acme.Foo`
fn header_path(text: &str, keyword: &str) -> Option<String> {
    let rest = text.trim().strip_prefix(keyword)?.trim().trim_end_matches(';').trim();
    let (is_static, rest) = match rest.strip_prefix("static") {
        Some(r) if r.starts_with(char::is_whitespace) => (true, r.trim_start()),
        _ => (false, rest),
    };
    let path: String = rest.chars().filter(|c| !c.is_whitespace()).collect();
    if path.is_empty() {
        return None;
    }
    Some(if is_static { format!("static {}", path) } else { path })
}

/// Line and message of the first error or missing node in pre-order
fn describe_first_error(root: Node, source: &[u8]) -> (usize, String) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_missing() {
            return (line_of(node), format!("missing `{}`", node.kind()));
        }
        if node.is_error() {
            let text = node.utf8_text(source).unwrap_or("");
            let snippet: String = text.split_whitespace().next().unwrap_or("").chars().take(40).collect();
            return (line_of(node), format!("unexpected `{}`", snippet));
        }
        if node.has_error() {
            stack.extend(children(node).into_iter().rev());
        }
    }
    (line_of(root), "unparseable source".to_string())
}

fn line_of(node: Node) -> usize {
    node.start_position().row + 1
}

fn children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

fn named_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|n| !is_comment(n))
        .collect()
}

fn is_comment(node: &Node) -> bool {
    matches!(node.kind(), "line_comment" | "block_comment")
}

fn is_type_node(node: &Node) -> bool {
    matches!(
        node.kind(),
        "void_type"
            | "integral_type"
            | "floating_point_type"
            | "boolean_type"
            | "type_identifier"
            | "scoped_type_identifier"
            | "generic_type"
            | "array_type"
            | "annotated_type"
    )
}

struct Adapter<'a> {
    path: &'a Path,
    source: &'a [u8],
    errors: Vec<ParseError>,
}

impl<'a> Adapter<'a> {
    fn text(&self, node: Node) -> String {
        node.utf8_text(self.source).unwrap_or("").to_string()
    }

    fn structural(&mut self, node: Node, message: impl Into<String>) {
        let err = ParseError::new(self.path, ParseErrorKind::Structural, Some(line_of(node)), message);
        log::debug!("{}", err);
        self.errors.push(err);
    }

    /// Required `name` field, or a structural error
    fn required_name(&mut self, node: Node, what: &str) -> Option<(String, usize)> {
        match node.child_by_field_name("name") {
            Some(name) if !self.text(name).is_empty() => Some((self.text(name), line_of(name))),
            _ => {
                self.structural(node, format!("{} without a name", what));
                None
            }
        }
    }

    /// Type declarations; `None` for non-type nodes and skipped declarations
    fn type_decl(&mut self, node: Node) -> Option<TypeDecl> {
        let kind = match node.kind() {
            "class_declaration" | "record_declaration" => DeclKind::Class,
            "interface_declaration" => DeclKind::Interface,
            "enum_declaration" => DeclKind::Enum,
            "annotation_type_declaration" => DeclKind::AnnotationType,
            _ => return None,
        };

        let (name, line) = self.required_name(node, "type declaration")?;
        let (modifiers, annotations) = self.modifiers(node);

        let mut decl = TypeDecl {
            kind,
            name,
            line,
            modifiers,
            annotations,
            type_params: self.type_params(node),
            extends: Vec::new(),
            implements: Vec::new(),
            members: Vec::new(),
        };

        for child in named_children(node) {
            match child.kind() {
                "superclass" => decl.extends.extend(self.type_list(child)),
                "extends_interfaces" => decl.extends.extend(self.type_list(child)),
                "super_interfaces" => decl.implements.extend(self.type_list(child)),
                _ => {}
            }
        }

        if node.kind() == "record_declaration" {
            decl.members.extend(self.record_components(node));
        }

        if let Some(body) = node.child_by_field_name("body") {
            self.body_members(body, &mut decl.members);
        }

        Some(decl)
    }

    fn body_members(&mut self, body: Node, members: &mut Vec<Member>) {
        for child in named_children(body) {
            match child.kind() {
                "field_declaration" | "constant_declaration" => {
                    members.extend(self.fields(child).into_iter().map(Member::Field));
                }
                "method_declaration" | "annotation_type_element_declaration" => {
                    if let Some(method) = self.method(child, false) {
                        members.push(Member::Method(method));
                    }
                }
                "constructor_declaration" => {
                    if let Some(ctor) = self.method(child, true) {
                        members.push(Member::Constructor(ctor));
                    }
                }
                // Enum members live one level down
                "enum_body_declarations" => self.body_members(child, members),
                _ => {
                    if let Some(nested) = self.type_decl(child) {
                        members.push(Member::Type(nested));
                    }
                }
            }
        }
    }

    /// Modifier keywords and annotation names of a declaration
    fn modifiers(&self, node: Node) -> (Vec<String>, Vec<String>) {
        let mut modifiers = Vec::new();
        let mut annotations = Vec::new();

        let Some(mods) = named_children(node).into_iter().find(|n| n.kind() == "modifiers") else {
            return (modifiers, annotations);
        };

        for child in children(mods) {
            match child.kind() {
                "marker_annotation" | "annotation" => {
                    if let Some(name) = child.child_by_field_name("name") {
                        annotations.push(format!("@{}", self.text(name)));
                    }
                }
                "line_comment" | "block_comment" => {}
                _ => modifiers.push(self.text(child)),
            }
        }

        (modifiers, annotations)
    }

    fn type_params(&self, node: Node) -> Vec<String> {
        let Some(params) = node.child_by_field_name("type_parameters") else {
            return Vec::new();
        };

        named_children(params)
            .into_iter()
            .filter(|p| p.kind() == "type_parameter")
            .filter_map(|p| {
                named_children(p)
                    .into_iter()
                    .find(|n| matches!(n.kind(), "type_identifier" | "identifier"))
                    .map(|n| self.text(n))
            })
            .collect()
    }

    /// Types under `superclass`, `super_interfaces`, `extends_interfaces` or `throws`
    fn type_list(&self, node: Node) -> Vec<TypeRef> {
        let mut out = Vec::new();
        for child in named_children(node) {
            if child.kind() == "type_list" {
                out.extend(self.type_list(child));
            } else if is_type_node(&child) {
                out.push(self.type_ref(child));
            }
        }
        out
    }

    fn type_ref(&self, node: Node) -> TypeRef {
        match node.kind() {
            "void_type" => TypeRef::Void,
            "integral_type" | "floating_point_type" | "boolean_type" => TypeRef::Primitive(self.text(node)),
            "type_identifier" | "identifier" => TypeRef::named(&self.text(node)),
            "scoped_type_identifier" => TypeRef::Named {
                segments: self.scoped_segments(node),
                args: Vec::new(),
            },
            "generic_type" => {
                let mut segments = Vec::new();
                let mut args = Vec::new();
                for child in named_children(node) {
                    match child.kind() {
                        "type_identifier" => segments = vec![self.text(child)],
                        "scoped_type_identifier" => segments = self.scoped_segments(child),
                        "type_arguments" => {
                            args = named_children(child)
                                .into_iter()
                                .filter(|a| a.kind() == "wildcard" || is_type_node(a))
                                .map(|a| self.type_ref(a))
                                .collect();
                        }
                        _ => {}
                    }
                }
                if segments.is_empty() {
                    TypeRef::Other(self.text(node))
                } else {
                    TypeRef::Named { segments, args }
                }
            }
            "array_type" => {
                let elem = node
                    .child_by_field_name("element")
                    .map(|e| self.type_ref(e))
                    .unwrap_or_else(|| TypeRef::Other(self.text(node)));
                let dims = node
                    .child_by_field_name("dimensions")
                    .map(|d| self.dimension_count(d))
                    .unwrap_or(1);
                with_dims(elem, dims)
            }
            "annotated_type" => named_children(node)
                .into_iter()
                .find(is_type_node)
                .map(|inner| self.type_ref(inner))
                .unwrap_or_else(|| TypeRef::Other(self.text(node))),
            "wildcard" => {
                let bound_kind = if children(node).iter().any(|c| c.kind() == "super") {
                    WildcardBound::Super
                } else {
                    WildcardBound::Extends
                };
                let bound = named_children(node)
                    .into_iter()
                    .find(is_type_node)
                    .map(|ty| (bound_kind, Box::new(self.type_ref(ty))));
                TypeRef::Wildcard { bound }
            }
            _ => TypeRef::Other(self.text(node)),
        }
    }

    /// `Map.Entry` -> `["Map", "Entry"]`; generic args on outer parts are dropped
    fn scoped_segments(&self, node: Node) -> Vec<String> {
        let mut segments = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "type_identifier" => segments.push(self.text(child)),
                "scoped_type_identifier" => segments.extend(self.scoped_segments(child)),
                "generic_type" => {
                    if let TypeRef::Named { segments: inner, .. } = self.type_ref(child) {
                        segments.extend(inner);
                    }
                }
                _ => {}
            }
        }
        segments
    }

    fn dimension_count(&self, node: Node) -> usize {
        self.text(node).matches('[').count().max(1)
    }

    fn fields(&mut self, node: Node) -> Vec<FieldDecl> {
        let (modifiers, annotations) = self.modifiers(node);

        let Some(ty_node) = node.child_by_field_name("type") else {
            self.structural(node, "field declaration without a type");
            return Vec::new();
        };
        let ty = self.type_ref(ty_node);

        let mut cursor = node.walk();
        let declarators: Vec<Node> = node.children_by_field_name("declarator", &mut cursor).collect();

        let mut fields = Vec::new();
        for declarator in declarators {
            let Some((name, line)) = self.required_name(declarator, "field declarator") else {
                continue;
            };
            let ty = match declarator.child_by_field_name("dimensions") {
                Some(dims) => with_dims(ty.clone(), self.dimension_count(dims)),
                None => ty.clone(),
            };
            fields.push(FieldDecl {
                name,
                ty,
                modifiers: modifiers.clone(),
                annotations: annotations.clone(),
                line,
            });
        }
        fields
    }

    /// Record components become private final fields
    fn record_components(&mut self, node: Node) -> Vec<Member> {
        let Some(params) = node.child_by_field_name("parameters") else {
            return Vec::new();
        };

        self.params(params)
            .into_iter()
            .map(|p| {
                Member::Field(FieldDecl {
                    name: p.name,
                    ty: p.ty,
                    modifiers: vec!["private".to_string(), "final".to_string()],
                    annotations: Vec::new(),
                    line: line_of(params),
                })
            })
            .collect()
    }

    fn method(&mut self, node: Node, is_constructor: bool) -> Option<MethodDecl> {
        let (name, line) = self.required_name(node, if is_constructor { "constructor" } else { "method" })?;
        let (modifiers, annotations) = self.modifiers(node);

        let return_type = if is_constructor {
            None
        } else {
            match node.child_by_field_name("type") {
                Some(ty) => {
                    let ty = self.type_ref(ty);
                    // `int foo()[]` legacy array syntax
                    Some(match node.child_by_field_name("dimensions") {
                        Some(dims) => with_dims(ty, self.dimension_count(dims)),
                        None => ty,
                    })
                }
                None => {
                    self.structural(node, format!("method `{}` without a return type", name));
                    return None;
                }
            }
        };

        let params = node
            .child_by_field_name("parameters")
            .map(|p| self.params(p))
            .unwrap_or_default();

        let throws = named_children(node)
            .into_iter()
            .find(|n| n.kind() == "throws")
            .map(|t| self.type_list(t))
            .unwrap_or_default();

        let body = node.child_by_field_name("body");
        let invocations = body.map(|b| self.invocations(b)).unwrap_or_default();

        Some(MethodDecl {
            name: if is_constructor { String::new() } else { name },
            modifiers,
            annotations,
            type_params: self.type_params(node),
            return_type,
            params,
            throws,
            line,
            has_body: body.is_some(),
            invocations,
        })
    }

    fn params(&mut self, node: Node) -> Vec<ParamDecl> {
        let mut params = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "formal_parameter" => {
                    let Some((name, _)) = self.required_name(child, "parameter") else {
                        continue;
                    };
                    let Some(ty) = child.child_by_field_name("type") else {
                        self.structural(child, format!("parameter `{}` without a type", name));
                        continue;
                    };
                    let ty = match child.child_by_field_name("dimensions") {
                        Some(dims) => with_dims(self.type_ref(ty), self.dimension_count(dims)),
                        None => self.type_ref(ty),
                    };
                    params.push(ParamDecl { name, ty, varargs: false });
                }
                "spread_parameter" => {
                    let parts = named_children(child);
                    let ty = parts.iter().find(|n| is_type_node(n)).map(|t| self.type_ref(*t));
                    let name = parts
                        .iter()
                        .find(|n| n.kind() == "variable_declarator")
                        .and_then(|d| d.child_by_field_name("name"))
                        .map(|n| self.text(n));
                    match (ty, name) {
                        (Some(ty), Some(name)) => params.push(ParamDecl { name, ty, varargs: true }),
                        _ => self.structural(child, "malformed varargs parameter"),
                    }
                }
                _ => {}
            }
        }
        params
    }

    /// Invocation captures in source order
    ///
    /// Anonymous and local class bodies belong to other declarations and
    /// are not entered.
    fn invocations(&self, body: Node) -> Vec<Invocation> {
        let mut out = Vec::new();
        let mut stack = vec![body];

        while let Some(node) = stack.pop() {
            match node.kind() {
                "class_body" | "class_declaration" | "interface_declaration" | "enum_declaration"
                | "record_declaration" => continue,
                "method_invocation" => {
                    if let Some(name) = node.child_by_field_name("name") {
                        out.push(Invocation {
                            qualifier: node.child_by_field_name("object").map(|o| self.text(o)),
                            member: self.text(name),
                            arg_count: node.child_by_field_name("arguments").map(argument_count),
                            line: line_of(node),
                        });
                    }
                }
                "explicit_constructor_invocation" => {
                    out.push(Invocation {
                        qualifier: node.child_by_field_name("constructor").map(|c| self.text(c)),
                        member: CONSTRUCTOR_NAME.to_string(),
                        arg_count: node.child_by_field_name("arguments").map(argument_count),
                        line: line_of(node),
                    });
                }
                _ => {}
            }
            stack.extend(children(node).into_iter().rev());
        }

        out
    }
}

fn argument_count(arguments: Node) -> usize {
    named_children(arguments).len()
}

fn with_dims(ty: TypeRef, dims: usize) -> TypeRef {
    match ty {
        TypeRef::Array { elem, dims: inner } => TypeRef::Array { elem, dims: inner + dims },
        other => TypeRef::Array { elem: Box::new(other), dims },
    }
}
