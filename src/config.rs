//! Engine configuration
//!
//! Settings live in `.explorer_cache/config.toml` next to the snapshot. The
//! file is created with defaults when the cache directory is initialized;
//! a missing file or section falls back to the built-in defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables for indexing and queries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Files above this count are parsed on the worker pool
    pub parallel_threshold: usize,
    /// Upper bound on parse workers (0 = auto, 80% of available cores)
    pub max_workers: usize,
    /// Follow symbolic links while walking the tree
    pub follow_symlinks: bool,
    /// Maximum source file size to parse (bytes)
    pub max_file_size: u64,
    /// Directory basenames skipped in addition to the built-in blocklist
    pub extra_ignored_dirs: Vec<String>,
    /// Default depth of the outgoing call tree in method flow queries
    pub callee_depth: usize,
    /// Default depth of the incoming caller tree in method flow queries
    pub caller_depth: usize,
    /// Lines scanned past a declaration before a line range is marked approximate
    pub source_window: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: 50,
            max_workers: 12,
            follow_symlinks: false,
            max_file_size: 10 * 1024 * 1024, // 10 MB
            extra_ignored_dirs: Vec::new(),
            callee_depth: 3,
            caller_depth: 1,
            source_window: 2000,
        }
    }
}

impl EngineConfig {
    /// Worker count for the parse pool: 80% of cores, capped by `max_workers`
    pub fn worker_count(&self) -> usize {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let auto = ((available as f64 * 0.8).ceil() as usize).max(1);

        if self.max_workers == 0 {
            auto
        } else {
            auto.min(self.max_workers)
        }
    }

    /// Hash of the settings that change what an analysis produces
    ///
    /// Worker counts and query depths are left out; they never change the
    /// derived state.
    pub fn index_fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[self.follow_symlinks as u8]);
        hasher.update(&self.max_file_size.to_le_bytes());
        hasher.update(&(self.source_window as u64).to_le_bytes());
        for dir in &self.extra_ignored_dirs {
            hasher.update(dir.as_bytes());
            hasher.update(&[0]);
        }
        hasher.finalize().to_hex()[..16].to_string()
    }
}

/// Default contents written on cache init
pub const DEFAULT_CONFIG_TOML: &str = r#"[index]
parallel_threshold = 50   # parse sequentially at or below this many files
max_workers = 12          # 0 = auto (80% of available cores)
follow_symlinks = false
max_file_size = 10485760  # 10 MB
extra_ignored_dirs = []
source_window = 2000

[query]
callee_depth = 3
caller_depth = 1
"#;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IndexSection {
    parallel_threshold: Option<usize>,
    max_workers: Option<usize>,
    follow_symlinks: Option<bool>,
    max_file_size: Option<u64>,
    extra_ignored_dirs: Option<Vec<String>>,
    source_window: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuerySection {
    callee_depth: Option<usize>,
    caller_depth: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    index: IndexSection,
    query: QuerySection,
}

/// Load config from `<cache_dir>/config.toml`
///
/// Falls back to defaults if the file doesn't exist.
pub fn load_config(cache_dir: &Path) -> Result<EngineConfig> {
    let config_path = cache_dir.join("config.toml");

    if !config_path.exists() {
        log::debug!("No config.toml found, using default engine config");
        return Ok(EngineConfig::default());
    }

    let config_str = std::fs::read_to_string(&config_path)
        .context("Failed to read config.toml")?;

    parse_config(&config_str)
}

/// Load config, downgrading a malformed file to a warning
pub fn load_config_or_default(cache_dir: &Path) -> EngineConfig {
    load_config(cache_dir).unwrap_or_else(|e| {
        log::warn!("Ignoring unreadable config.toml: {:#}", e);
        EngineConfig::default()
    })
}

fn parse_config(config_str: &str) -> Result<EngineConfig> {
    let file: ConfigFile = toml::from_str(config_str)
        .context("Failed to parse config.toml")?;

    let mut config = EngineConfig::default();
    let index = file.index;
    if let Some(v) = index.parallel_threshold {
        config.parallel_threshold = v;
    }
    if let Some(v) = index.max_workers {
        config.max_workers = v;
    }
    if let Some(v) = index.follow_symlinks {
        config.follow_symlinks = v;
    }
    if let Some(v) = index.max_file_size {
        config.max_file_size = v;
    }
    if let Some(v) = index.extra_ignored_dirs {
        config.extra_ignored_dirs = v;
    }
    if let Some(v) = index.source_window {
        config.source_window = v;
    }
    if let Some(v) = file.query.callee_depth {
        config.callee_depth = v;
    }
    if let Some(v) = file.query.caller_depth {
        config.caller_depth = v;
    }

    Ok(config)
}
