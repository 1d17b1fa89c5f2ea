//! User-facing terminal output
//!
//! Colored messages for the user (kept apart from `log` output) and the
//! plain-text renderers behind the CLI's non-JSON modes.

use owo_colors::OwoColorize;

use crate::models::FileNode;
use crate::query::CallNode;

/// Display a warning message to the user in yellow with padding
///
/// # Example
/// ```ignore
/// output::warn("3 files could not be parsed. Run 'spx errors' for details.");
/// ```
pub fn warn(message: &str) {
    eprintln!("\n{}\n", message.yellow());
}

/// Display an error message to the user in red with padding
pub fn error(message: &str) {
    eprintln!("\n{}\n", message.red());
}

/// Display an informational message to the user with padding
pub fn info(message: &str) {
    eprintln!("\n{}\n", message);
}

/// Render a file tree, one node per line, prefixed by its index
pub fn render_tree(node: &FileNode) -> String {
    let mut out = String::new();
    push_tree_line(&mut out, node, 0);
    out
}

fn push_tree_line(out: &mut String, node: &FileNode, depth: usize) {
    let suffix = if node.is_dir() { "/" } else { "" };
    out.push_str(&format!(
        "{}{} {}{}\n",
        "  ".repeat(depth),
        node.index,
        node.name,
        suffix
    ));
    for child in &node.children {
        push_tree_line(out, child, depth + 1);
    }
}

/// Render a call tree with box-drawing guides
///
/// Nodes already on the path from the root are marked `(recursive)`.
pub fn render_call_tree(nodes: &[CallNode]) -> String {
    let mut out = String::new();
    push_call_nodes(&mut out, nodes, "");
    out
}

fn push_call_nodes(out: &mut String, nodes: &[CallNode], prefix: &str) {
    for (i, node) in nodes.iter().enumerate() {
        let last = i + 1 == nodes.len();
        let branch = if last { "└── " } else { "├── " };
        let marker = if node.recursive { " (recursive)" } else { "" };
        out.push_str(&format!("{}{}{}{}\n", prefix, branch, node.display_name, marker));

        let next = format!("{}{}", prefix, if last { "    " } else { "│   " });
        push_call_nodes(out, &node.children, &next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileKind;
    use std::path::PathBuf;

    fn call(name: &str, recursive: bool, children: Vec<CallNode>) -> CallNode {
        CallNode {
            key: name.to_string(),
            display_name: name.to_string(),
            recursive,
            children,
        }
    }

    #[test]
    fn test_render_call_tree() {
        let tree = vec![
            call("A.b()", false, vec![call("A.a()", true, vec![])]),
            call("A.c()", false, vec![]),
        ];
        let rendered = render_call_tree(&tree);
        assert_eq!(
            rendered,
            "├── A.b()\n│   └── A.a() (recursive)\n└── A.c()\n"
        );
        assert!(render_call_tree(&[]).is_empty());
    }

    #[test]
    fn test_render_tree() {
        let mut root = FileNode::new("0".into(), PathBuf::from("/p"), "p".into(), FileKind::Directory);
        root.children.push(FileNode::new(
            "0.1".into(),
            PathBuf::from("/p/App.java"),
            "App.java".into(),
            FileKind::Source,
        ));
        assert_eq!(render_tree(&root), "0 p/\n  0.1 App.java\n");
    }
}
