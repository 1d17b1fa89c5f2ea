//! Project tree indexing
//!
//! Walks the project root once and builds an addressable [`FileNode`] tree.
//! Every node carries a dotted positional index (`"0"` for the root,
//! `"0.2.1"` for the first child of the root's second child) that is
//! assigned during the walk and never renumbered. Parents are derived from
//! the index string, so the tree only ever owns downward.

use ignore::{Walk, WalkBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::EngineConfig;
use crate::models::{FileKind, FileNode};

/// Directory basenames skipped at any depth
pub const IGNORED_DIRS: &[&str] = &[
    ".git",
    "target",
    "build",
    "node_modules",
    ".idea",
    ".gradle",
    ".settings",
    ".classpath",
    ".project",
    "__pycache__",
    ".DS_Store",
    ".explorer_cache",
    "dist",
    "out",
];

/// Extensions whose modification time can invalidate a snapshot
pub const TRACKED_EXTENSIONS: &[&str] = &["java", "properties", "yml", "yaml", "xml"];

/// Build a sorted, blocklist-aware walker over `root`
///
/// Standard ignore-file filters are off: the blocklist is the only
/// exclusion rule, so `.gitignore`d sources are still analyzed.
pub fn build_walker(root: &Path, config: &EngineConfig) -> Walk {
    let blocked: HashSet<String> = IGNORED_DIRS
        .iter()
        .map(|s| s.to_string())
        .chain(config.extra_ignored_dirs.iter().cloned())
        .collect();

    WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(config.follow_symlinks)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |entry| {
            if entry.depth() == 0 {
                return true;
            }
            let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
            !(is_dir && blocked.contains(entry.file_name().to_string_lossy().as_ref()))
        })
        .build()
}

/// Whether a path has one of the tracked extensions
pub fn is_tracked(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| TRACKED_EXTENSIONS.iter().any(|t| t.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Walk `root` and build the file tree
///
/// Unlistable directories are logged and kept as leaves with no children.
pub fn index_tree(root: &Path, config: &EngineConfig) -> FileNode {
    let root_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string());

    // Open nodes along the current walk path; stack[d] is at depth d
    let mut stack: Vec<FileNode> = vec![FileNode::new(
        "0".to_string(),
        root.to_path_buf(),
        root_name,
        FileKind::Directory,
    )];

    for entry in build_walker(root, config) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        let depth = entry.depth();
        if depth == 0 {
            continue;
        }

        // Close finished siblings and subtrees
        while stack.len() > depth {
            close_top(&mut stack);
        }

        let Some(parent) = stack.last() else {
            continue;
        };
        let index = format!("{}.{}", parent.index, parent.children.len() + 1);

        let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
        let kind = if is_dir {
            FileKind::Directory
        } else {
            entry
                .path()
                .extension()
                .map(|ext| FileKind::from_extension(&ext.to_string_lossy()))
                .unwrap_or(FileKind::Other)
        };

        stack.push(FileNode::new(
            index,
            entry.path().to_path_buf(),
            entry.file_name().to_string_lossy().into_owned(),
            kind,
        ));
    }

    while stack.len() > 1 {
        close_top(&mut stack);
    }

    stack.pop().unwrap_or_else(|| {
        FileNode::new("0".to_string(), root.to_path_buf(), String::new(), FileKind::Directory)
    })
}

fn close_top(stack: &mut Vec<FileNode>) {
    if let Some(node) = stack.pop() {
        if let Some(parent) = stack.last_mut() {
            parent.children.push(node);
        }
    }
}

/// Look up a node by its dotted index
///
/// Malformed or out-of-range parts yield `None`.
pub fn find<'a>(root: &'a FileNode, index: &str) -> Option<&'a FileNode> {
    let mut parts = index.split('.');
    if parts.next()? != "0" {
        return None;
    }

    let mut node = root;
    for part in parts {
        let position: usize = part.parse().ok()?;
        node = node.children.get(position.checked_sub(1)?)?;
    }
    Some(node)
}

/// Index of the parent node, `None` for the root
pub fn parent_index(index: &str) -> Option<&str> {
    index.rsplit_once('.').map(|(parent, _)| parent)
}

/// All nodes under `node` (inclusive) in walk order
pub fn descendants(node: &FileNode) -> Vec<&FileNode> {
    let mut out = Vec::new();
    let mut pending = vec![node];
    while let Some(current) = pending.pop() {
        out.push(current);
        pending.extend(current.children.iter().rev());
    }
    out
}

/// Files of one classification under `node`
pub fn files_of_kind(node: &FileNode, kind: FileKind) -> Vec<&FileNode> {
    descendants(node)
        .into_iter()
        .filter(|n| !n.is_dir() && n.kind == kind)
        .collect()
}

/// Paths of every source file under `node`
pub fn source_files(node: &FileNode) -> Vec<PathBuf> {
    files_of_kind(node, FileKind::Source)
        .into_iter()
        .map(|n| n.path.clone())
        .collect()
}
