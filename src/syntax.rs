//! Closed declaration model produced by the source adapter
//!
//! The tree-sitter grammar exposes dozens of node kinds; the adapter folds
//! them into the handful of shapes the extractor cares about. Every shape is
//! a plain enum or struct so the extractor matches exhaustively instead of
//! probing node kinds at runtime.

use std::fmt;

use crate::models::Invocation;

/// One parsed source file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompilationUnit {
    pub package: Option<String>,
    /// Import paths; static imports are dropped, wildcards keep `.*`
    pub imports: Vec<String>,
    pub types: Vec<TypeDecl>,
}

/// Structural category of a type declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Class,
    Interface,
    Enum,
    AnnotationType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub kind: DeclKind,
    pub name: String,
    /// 1-based
    pub line: usize,
    pub modifiers: Vec<String>,
    /// Annotation names with `@`
    pub annotations: Vec<String>,
    pub type_params: Vec<String>,
    pub extends: Vec<TypeRef>,
    pub implements: Vec<TypeRef>,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Field(FieldDecl),
    Method(MethodDecl),
    Constructor(MethodDecl),
    Type(TypeDecl),
}

/// A field declaration; `int a, b;` yields one per declarator
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeRef,
    pub modifiers: Vec<String>,
    pub annotations: Vec<String>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    /// Empty for constructors
    pub name: String,
    pub modifiers: Vec<String>,
    pub annotations: Vec<String>,
    pub type_params: Vec<String>,
    /// `None` for constructors
    pub return_type: Option<TypeRef>,
    pub params: Vec<ParamDecl>,
    pub throws: Vec<TypeRef>,
    pub line: usize,
    pub has_body: bool,
    pub invocations: Vec<Invocation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub name: String,
    pub ty: TypeRef,
    pub varargs: bool,
}

/// A type reference as written in source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Primitive(String),
    Void,
    /// `Map.Entry<K, V>`: one segment per dotted part, generic args on the last
    Named { segments: Vec<String>, args: Vec<TypeRef> },
    Array { elem: Box<TypeRef>, dims: usize },
    /// `?`, `? extends T`, `? super T`
    Wildcard { bound: Option<(WildcardBound, Box<TypeRef>)> },
    /// Anything the adapter could not classify, kept verbatim
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WildcardBound {
    Extends,
    Super,
}

impl TypeRef {
    pub fn named(name: &str) -> Self {
        TypeRef::Named {
            segments: name.split('.').map(str::to_string).collect(),
            args: Vec::new(),
        }
    }

    /// Dotted name without generic arguments, for named types only
    pub fn base_name(&self) -> Option<String> {
        match self {
            TypeRef::Named { segments, .. } => Some(segments.join(".")),
            _ => None,
        }
    }
}

/// Canonical rendering: `Map.Entry<String,Integer>[]`
impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Primitive(name) => f.write_str(name),
            TypeRef::Void => f.write_str("void"),
            TypeRef::Named { segments, args } => {
                f.write_str(&segments.join("."))?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(",")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
            TypeRef::Array { elem, dims } => {
                write!(f, "{}", elem)?;
                for _ in 0..*dims {
                    f.write_str("[]")?;
                }
                Ok(())
            }
            TypeRef::Wildcard { bound: None } => f.write_str("?"),
            TypeRef::Wildcard { bound: Some((WildcardBound::Extends, ty)) } => write!(f, "? extends {}", ty),
            TypeRef::Wildcard { bound: Some((WildcardBound::Super, ty)) } => write!(f, "? super {}", ty),
            TypeRef::Other(raw) => f.write_str(raw),
        }
    }
}
