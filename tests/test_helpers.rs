//! Shared fixtures for the integration tests
//!
//! Every test analyzes its own copy of the corpus (or its own temp tree) so
//! cache files never leak between tests.

#![allow(dead_code)]

use explorer::{CacheMode, Indexer, ProjectStore};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Location of the checked-in Java corpus
pub fn corpus_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("corpus")
}

/// Copy the corpus into a fresh temp directory
pub fn corpus_project() -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp dir");
    copy_dir(&corpus_dir(), temp.path());
    temp
}

fn copy_dir(from: &Path, to: &Path) {
    fs::create_dir_all(to).unwrap();
    for entry in fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let target = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), &target).unwrap();
        }
    }
}

/// Build a temp project from `(relative path, content)` pairs
pub fn project(files: &[(&str, &str)]) -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp dir");
    for (rel, content) in files {
        write_file(temp.path(), rel, content);
    }
    temp
}

pub fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Full analysis, ignoring any snapshot
pub fn analyze_fresh(root: &Path) -> ProjectStore {
    Indexer::new(root)
        .analyze(CacheMode::Ignore, false)
        .expect("Analysis failed")
}

/// Analysis that may be served from the snapshot
pub fn analyze_cached(root: &Path) -> ProjectStore {
    Indexer::new(root)
        .analyze(CacheMode::Use, false)
        .expect("Analysis failed")
}

/// Keys of the methods called by `key`
pub fn calls_of<'a>(store: &'a ProjectStore, key: &str) -> Vec<&'a str> {
    store
        .method(key)
        .unwrap_or_else(|| panic!("Expected method '{}' in store", key))
        .calls
        .iter()
        .map(String::as_str)
        .collect()
}

/// Keys of the methods calling `key`
pub fn callers_of<'a>(store: &'a ProjectStore, key: &str) -> Vec<&'a str> {
    store
        .method(key)
        .unwrap_or_else(|| panic!("Expected method '{}' in store", key))
        .called_by
        .iter()
        .map(String::as_str)
        .collect()
}
