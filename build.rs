//! Build-time schema hash for automatic snapshot invalidation
//!
//! Hashes every source file whose types end up inside the persisted
//! snapshot. The hash is exported as `CACHE_SCHEMA_HASH` and written into
//! the snapshot header; a snapshot produced by a binary with a different
//! hash is discarded on load and the project is re-analyzed.
//!
//! ## Cache-critical files:
//! - src/cache.rs: snapshot header and record layout
//! - src/models.rs: Component, Method, Field, FileNode, ParseError
//! - src/strings.rs: string index entries
//! - src/store.rs: store layout projected into the snapshot

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Source files that affect snapshot compatibility
const CACHE_CRITICAL_FILES: &[&str] = &[
    "src/cache.rs",
    "src/models.rs",
    "src/strings.rs",
    "src/store.rs",
];

fn main() {
    let schema_hash = compute_schema_hash();

    println!("cargo:rustc-env=CACHE_SCHEMA_HASH={}", schema_hash);

    for file in CACHE_CRITICAL_FILES {
        println!("cargo:rerun-if-changed={}", file);
    }
}

/// Compute a deterministic hash of all cache-critical source files
fn compute_schema_hash() -> String {
    let mut hasher = blake3::Hasher::new();

    // BTreeSet keeps the hashing order stable
    let files: BTreeSet<&str> = CACHE_CRITICAL_FILES.iter().copied().collect();

    for file_path in &files {
        let path = Path::new(file_path);

        if !path.exists() {
            panic!("Cache-critical file not found: {}", file_path);
        }

        let content = fs::read(path)
            .unwrap_or_else(|e| panic!("Failed to read {}: {}", file_path, e));

        hasher.update(file_path.as_bytes());
        hasher.update(&content);
    }

    // First 8 bytes are plenty to tell schema revisions apart
    let hash = hasher.finalize();
    hash.as_bytes()[..8]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<String>()
}
