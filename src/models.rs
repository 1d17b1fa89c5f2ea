//! Core data models for the explorer
//!
//! These structures are the normalized output of every analysis pass: the
//! file tree, the extracted components with their fields and methods, and
//! the per-file parse errors. All of them are serializable so the cache
//! can persist them wholesale.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use strum::{Display, EnumString};

/// Synthetic method name used for constructors
pub const CONSTRUCTOR_NAME: &str = "<init>";

/// Classification of a file tree entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum FileKind {
    Directory,
    Source,
    Config,
    Markup,
    WebAsset,
    Doc,
    Image,
    Build,
    Other,
}

impl FileKind {
    /// Classify a file by its extension (without the leading dot)
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "java" => FileKind::Source,
            "properties" | "yml" | "yaml" => FileKind::Config,
            "xml" => FileKind::Markup,
            "html" | "css" | "js" | "jsp" | "ts" | "tsx" | "jsx" => FileKind::WebAsset,
            "md" | "txt" => FileKind::Doc,
            "png" | "jpg" | "jpeg" | "gif" | "svg" => FileKind::Image,
            "gradle" | "kts" | "mvn" => FileKind::Build,
            _ => FileKind::Other,
        }
    }
}

/// One entry of the indexed project tree
///
/// `index` is the dotted positional address of the node: the root is `"0"`
/// and each child appends its 1-based position, e.g. `"0.2.1"`. Parents are
/// derived from the index rather than stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileNode {
    pub index: String,
    pub path: PathBuf,
    pub name: String,
    pub kind: FileKind,
    /// Always empty for files
    pub children: Vec<FileNode>,
}

impl FileNode {
    pub fn new(index: String, path: PathBuf, name: String, kind: FileKind) -> Self {
        Self {
            index,
            path,
            name,
            kind,
            children: Vec::new(),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }
}

/// Marker annotations that promote a component to a named stereotype
///
/// Matching is case-insensitive on the annotation's simple name.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum Stereotype {
    Controller,
    RestController,
    Service,
    Repository,
    Component,
    Configuration,
    Bean,
    Entity,
    Autowired,
    ControllerAdvice,
    RestControllerAdvice,
    RequestMapping,
    GetMapping,
    PostMapping,
    PutMapping,
    DeleteMapping,
    ExceptionHandler,
    PathVariable,
    RequestParam,
    RequestBody,
    ResponseBody,
    Valid,
    Qualifier,
    Scope,
    Lazy,
    Conditional,
    Profile,
    Primary,
    Order,
}

impl Stereotype {
    /// Look up an annotation (with or without `@`, possibly qualified)
    pub fn from_annotation(annotation: &str) -> Option<Self> {
        let name = annotation.trim_start_matches('@');
        let simple = name.rsplit('.').next().unwrap_or(name);
        simple.parse().ok()
    }
}

/// Declaration category of a component
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Class,
    Interface,
    Enum,
    Annotation,
    Stereotype(Stereotype),
}

impl ComponentKind {
    pub fn is_stereotype(&self) -> bool {
        matches!(self, ComponentKind::Stereotype(_))
    }

    /// Case-insensitive kind filter; `controller` also admits `RestController`
    pub fn matches_filter(&self, filter: &str) -> bool {
        let own = self.to_string();
        if own.eq_ignore_ascii_case(filter) {
            return true;
        }
        filter.eq_ignore_ascii_case("controller")
            && *self == ComponentKind::Stereotype(Stereotype::RestController)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentKind::Class => f.write_str("Class"),
            ComponentKind::Interface => f.write_str("Interface"),
            ComponentKind::Enum => f.write_str("Enum"),
            ComponentKind::Annotation => f.write_str("Annotation"),
            ComponentKind::Stereotype(s) => write!(f, "{}", s),
        }
    }
}

/// One extracted type declaration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Component {
    /// Simple name (`Inner` for `pkg.Outer$Inner`)
    pub name: String,
    /// Fully qualified name, `$` separating nested types
    pub fqn: String,
    pub kind: ComponentKind,
    pub file_path: PathBuf,
    pub package: String,
    /// Import paths as written, wildcard imports keep their trailing `.*`
    pub imports: Vec<String>,
    /// Annotation names with a leading `@`
    pub annotations: Vec<String>,
    pub generics: Vec<String>,
    pub extends: Vec<String>,
    pub implements: Vec<String>,
    /// 1-based declaration line
    pub line: usize,
    pub fields: BTreeMap<String, Field>,
    /// Keyed by display signature: `name(Type arg)`, constructors use the
    /// component name in place of the synthetic method name
    pub methods: BTreeMap<String, Method>,
}

impl Component {
    pub fn is_nested(&self) -> bool {
        self.fqn.contains('$')
    }

    /// FQN of the directly enclosing component, if nested
    pub fn enclosing_fqn(&self) -> Option<&str> {
        enclosing_fqn(&self.fqn)
    }

    /// Supertypes in walk order: extends first, then implements
    pub fn supertypes(&self) -> impl Iterator<Item = &String> {
        self.extends.iter().chain(self.implements.iter())
    }

    /// Find a method by its global key
    pub fn method_by_key(&self, key: &str) -> Option<&Method> {
        self.methods.values().find(|m| m.key == key)
    }

    pub fn method_by_key_mut(&mut self, key: &str) -> Option<&mut Method> {
        self.methods.values_mut().find(|m| m.key == key)
    }
}

/// Strip the innermost `$Nested` segment from an FQN
pub fn enclosing_fqn(fqn: &str) -> Option<&str> {
    fqn.rsplit_once('$').map(|(outer, _)| outer)
}

/// A field declared on a component
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub type_name: String,
    pub modifiers: Vec<String>,
    pub annotations: Vec<String>,
    /// FQN of the owning component
    pub parent: String,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for modifier in &self.modifiers {
            write!(f, "{} ", modifier)?;
        }
        write!(f, "{} {}", self.type_name, self.name)
    }
}

/// A formal parameter; varargs keep their `...` on the type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Parameter {
    pub type_name: String,
    pub name: String,
}

impl Parameter {
    pub fn display(&self) -> String {
        format!("{} {}", self.type_name, self.name)
    }
}

/// Source line range of a method (1-indexed, inclusive)
///
/// Derived by brace counting, so `approximate` marks ranges where the scan
/// gave up before the braces balanced. Zero means unknown.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineSpan {
    pub start: usize,
    pub end: usize,
    pub approximate: bool,
}

impl LineSpan {
    pub fn is_known(&self) -> bool {
        self.start > 0 && self.end >= self.start
    }
}

/// A raw method invocation captured from a body, pending resolution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Invocation {
    /// Qualifier text as written (`this`, `super`, `repo`, `Util`), if any
    pub qualifier: Option<String>,
    pub member: String,
    pub arg_count: Option<usize>,
    pub line: usize,
}

/// A method or constructor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Method {
    pub name: String,
    /// Global key: `FQN.name(Type,Type)`
    pub key: String,
    /// Display signature with parameter names: `(String name, int age)`
    pub signature: String,
    /// Parameter types only: `(String,int)`
    pub key_signature: String,
    pub modifiers: Vec<String>,
    pub return_type: String,
    pub parameters: Vec<Parameter>,
    pub throws: Vec<String>,
    pub annotations: Vec<String>,
    pub lines: LineSpan,
    /// Raw captures, consumed by the call graph builder and never persisted
    #[serde(skip)]
    pub invocations: Vec<Invocation>,
    /// Keys of resolved callees
    pub calls: Vec<String>,
    /// Keys of resolved callers
    pub called_by: Vec<String>,
    /// FQN of the owning component
    pub parent: String,
}

impl Method {
    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_NAME
    }

    /// Key inside the owning component's method map
    pub fn member_key(&self, component_name: &str) -> String {
        if self.is_constructor() {
            format!("{}{}", component_name, self.signature)
        } else {
            format!("{}{}", self.name, self.signature)
        }
    }

    /// Human-readable name: `Component.name(Type arg)`
    pub fn display_name(&self, component_name: &str) -> String {
        format!("{}.{}{}", component_name, self.name, self.signature)
    }
}

/// Build a global method key
pub fn method_key(fqn: &str, name: &str, key_signature: &str) -> String {
    format!("{}.{}{}", fqn, name, key_signature)
}

/// Split a method key into `(component FQN, method name)`
///
/// Only the part before the parameter list is inspected, so dotted
/// parameter types never confuse the split.
pub fn split_method_key(key: &str) -> Option<(&str, &str)> {
    let open = key.find('(')?;
    let (fqn, name) = key[..open].rsplit_once('.')?;
    if fqn.is_empty() || name.is_empty() {
        return None;
    }
    Some((fqn, name))
}

/// Category of a per-file fault
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
pub enum ParseErrorKind {
    /// Unreadable under every tried encoding
    #[strum(to_string = "ReadError")]
    Read,
    /// Rejected by the parser; the file is skipped
    #[strum(to_string = "SyntaxError")]
    Syntax,
    /// Malformed declaration skipped; the rest of the file is kept
    #[strum(to_string = "StructuralError")]
    Structural,
}

/// A recorded per-file fault
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParseError {
    pub path: PathBuf,
    pub kind: ParseErrorKind,
    pub line: Option<usize>,
    pub message: String,
}

impl ParseError {
    pub fn new(path: impl Into<PathBuf>, kind: ParseErrorKind, line: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{} at L{} in {}: {}", self.kind, line, self.path.display(), self.message),
            None => write!(f, "{} in {}: {}", self.kind, self.path.display(), self.message),
        }
    }
}

/// Summary counts returned after an analysis run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisStats {
    pub files_parsed: usize,
    pub components: usize,
    pub methods: usize,
    pub call_edges: usize,
    pub string_terms: usize,
    pub parse_errors: usize,
    pub from_cache: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_kind_from_extension() {
        assert_eq!(FileKind::from_extension("java"), FileKind::Source);
        assert_eq!(FileKind::from_extension("YML"), FileKind::Config);
        assert_eq!(FileKind::from_extension("xml"), FileKind::Markup);
        assert_eq!(FileKind::from_extension("tsx"), FileKind::WebAsset);
        assert_eq!(FileKind::from_extension("gradle"), FileKind::Build);
        assert_eq!(FileKind::from_extension("sql"), FileKind::Other);
        assert_eq!(FileKind::WebAsset.to_string(), "web-asset");
    }

    #[test]
    fn test_stereotype_lookup() {
        assert_eq!(Stereotype::from_annotation("@Service"), Some(Stereotype::Service));
        assert_eq!(Stereotype::from_annotation("restcontroller"), Some(Stereotype::RestController));
        assert_eq!(
            Stereotype::from_annotation("@org.springframework.stereotype.Repository"),
            Some(Stereotype::Repository)
        );
        assert_eq!(Stereotype::from_annotation("@Override"), None);
    }

    #[test]
    fn test_kind_filter() {
        let rest = ComponentKind::Stereotype(Stereotype::RestController);
        assert!(rest.matches_filter("restcontroller"));
        assert!(rest.matches_filter("Controller"));
        assert!(!ComponentKind::Stereotype(Stereotype::Service).matches_filter("controller"));
        assert!(ComponentKind::Interface.matches_filter("INTERFACE"));
        assert_eq!(rest.to_string(), "RestController");
    }

    #[test]
    fn test_split_method_key() {
        assert_eq!(
            split_method_key("com.acme.Foo$Bar.run(java.util.List<java.lang.String>,int)"),
            Some(("com.acme.Foo$Bar", "run"))
        );
        assert_eq!(split_method_key("Foo.<init>()"), Some(("Foo", "<init>")));
        assert_eq!(split_method_key("noparens"), None);
        assert_eq!(split_method_key(".x()"), None);
    }

    #[test]
    fn test_enclosing_fqn() {
        assert_eq!(enclosing_fqn("a.B$C$D"), Some("a.B$C"));
        assert_eq!(enclosing_fqn("a.B"), None);
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new("A.java", ParseErrorKind::Syntax, Some(3), "unexpected `}`");
        assert_eq!(err.to_string(), "SyntaxError at L3 in A.java: unexpected `}`");
    }
}
