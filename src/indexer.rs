//! Analysis pipeline
//!
//! Validates the project root, then either loads a valid snapshot or runs
//! the full pass: walk the tree, parse and extract every source file,
//! merge the per-file fragments, resolve supertypes, build the call graph
//! and save a fresh snapshot.
//!
//! Parsing is the only parallel stage. Small projects are parsed on the
//! calling thread; above `parallel_threshold` files a dedicated rayon pool
//! is used. Either way each file yields an owned [`FileFragment`] and only
//! this thread merges them.

use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::cache::CacheManager;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::extract::extract;
use crate::models::{ParseError, ParseErrorKind};
use crate::parsers::{self, java};
use crate::store::{FileFragment, ProjectStore};
use crate::strings;
use crate::tree;

/// Whether an existing snapshot may be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Load a valid snapshot if there is one
    #[default]
    Use,
    /// Always re-analyze; the result still replaces the snapshot
    Ignore,
}

/// Runs analysis for one project root
pub struct Indexer {
    root: PathBuf,
    config: Option<EngineConfig>,
}

impl Indexer {
    /// Settings come from the project's config.toml
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config: None,
        }
    }

    /// Use explicit settings instead of the project's config.toml
    pub fn with_config(root: impl AsRef<Path>, config: EngineConfig) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config: Some(config),
        }
    }

    /// Load or build the project store
    ///
    /// Fails only when the root does not exist or is not a directory.
    pub fn analyze(&self, mode: CacheMode, show_progress: bool) -> Result<ProjectStore> {
        // Anything modified after this instant invalidates the snapshot
        let started_at = Utc::now();
        let start = Instant::now();

        let root = validate_root(&self.root)?;
        let cache = CacheManager::new(&root);
        let config = self.config.clone().unwrap_or_else(|| cache.config());

        match mode {
            CacheMode::Use => {
                if let Some(store) = cache.load(&root, &config) {
                    return Ok(store);
                }
            }
            CacheMode::Ignore => log::info!("Ignoring existing snapshot for this run"),
        }

        log::info!("Analyzing {}", root.display());

        let file_tree = tree::index_tree(&root, &config);
        let files = tree::source_files(&file_tree);
        log::info!("Found {} source files", files.len());

        let fragments = parse_files(&files, &config, show_progress)?;

        let mut store = ProjectStore::new(root, file_tree, started_at);
        for fragment in fragments {
            store.merge(fragment);
        }
        store.link();

        let stats = store.stats();
        log::info!(
            "Analyzed {} files in {:?}: {} components, {} methods, {} call edges, {} parse errors",
            stats.files_parsed,
            start.elapsed(),
            stats.components,
            stats.methods,
            stats.call_edges,
            stats.parse_errors
        );

        // A failed save only costs the next run a re-analysis
        if let Err(e) = cache.save(&store, &config) {
            log::warn!("Failed to save snapshot: {:#}", e);
        }

        Ok(store)
    }
}

/// Check the root exists and is a directory, then canonicalize it
pub fn validate_root(root: &Path) -> Result<PathBuf> {
    if !root.exists() {
        return Err(EngineError::ProjectNotFound(root.to_path_buf()).into());
    }
    if !root.is_dir() {
        return Err(EngineError::ProjectNotDirectory(root.to_path_buf()).into());
    }
    root.canonicalize()
        .with_context(|| format!("Failed to resolve {}", root.display()))
}

fn parse_files(files: &[PathBuf], config: &EngineConfig, show_progress: bool) -> Result<Vec<FileFragment>> {
    let pb = if show_progress {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_draw_target(ProgressDrawTarget::stderr());
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg}")
                .context("Invalid progress bar template")?
                .progress_chars("=>-"),
        );
        pb.set_message("Parsing...");
        pb
    } else {
        ProgressBar::hidden()
    };

    let fragments: Vec<FileFragment> = if files.len() <= config.parallel_threshold {
        log::debug!("Parsing {} files sequentially", files.len());
        files
            .iter()
            .map(|path| {
                let fragment = process_file(path, config);
                pb.inc(1);
                fragment
            })
            .collect()
    } else {
        let num_threads = config.worker_count();
        log::debug!("Parsing {} files on {} workers", files.len(), num_threads);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .context("Failed to create thread pool")?;

        // Indexed collect keeps file order, so merging is deterministic
        pool.install(|| {
            files
                .par_iter()
                .map(|path| {
                    let fragment = process_file(path, config);
                    pb.inc(1);
                    fragment
                })
                .collect()
        })
    };

    pb.finish_and_clear();
    Ok(fragments)
}

/// Read, parse, extract and scan one file
///
/// Never fails: every fault becomes a [`ParseError`] in the fragment.
fn process_file(path: &Path, config: &EngineConfig) -> FileFragment {
    let mut fragment = FileFragment {
        path: path.to_path_buf(),
        ..Default::default()
    };

    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > config.max_file_size => {
            let message = format!("file is {} bytes, limit is {}", meta.len(), config.max_file_size);
            log::warn!("Skipping {}: {}", path.display(), message);
            fragment.errors.push(ParseError::new(path, ParseErrorKind::Read, None, message));
            return fragment;
        }
        _ => {}
    }

    let source = match parsers::read_source(path) {
        Ok(source) => source,
        Err(e) => {
            let err = ParseError::new(path, ParseErrorKind::Read, None, format!("{:#}", e));
            log::warn!("{}", err);
            fragment.errors.push(err);
            return fragment;
        }
    };

    match java::parse(path, &source) {
        Ok(outcome) => {
            for err in &outcome.errors {
                log::warn!("{}", err);
            }
            fragment.errors.extend(outcome.errors);
            if let Some(unit) = outcome.unit {
                fragment.components = extract(path, &source, &unit, config.source_window);
            }
        }
        Err(e) => {
            let err = ParseError::new(path, ParseErrorKind::Syntax, None, format!("{:#}", e));
            log::warn!("{}", err);
            fragment.errors.push(err);
        }
    }

    let owners: Vec<&str> = fragment.components.iter().map(|c| c.fqn.as_str()).collect();
    fragment.strings = strings::scan(&source, path, &owners);

    fragment
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let err = Indexer::new("/definitely/not/a/project")
            .analyze(CacheMode::Use, false)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::ProjectNotFound(_))
        ));
    }

    #[test]
    fn test_file_root_is_fatal() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "A.java", "class A {}");

        let err = Indexer::new(temp.path().join("A.java"))
            .analyze(CacheMode::Use, false)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::ProjectNotDirectory(_))
        ));
    }

    #[test]
    fn test_bad_file_does_not_block_others() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/Good.java", "package p; class Good { void ok(){} }");
        write(temp.path(), "src/Bad.java", "package p; class Bad { void broken( { }");

        let store = Indexer::new(temp.path()).analyze(CacheMode::Ignore, false).unwrap();

        assert!(store.component("p.Good").is_some());
        assert!(store.component("p.Bad").is_none());
        assert_eq!(store.parse_errors.len(), 1);
        assert_eq!(store.parse_errors[0].kind, ParseErrorKind::Syntax);
        assert!(store.parse_errors[0].path.ends_with("Bad.java"));
        assert_eq!(store.files_parsed, 2);
    }

    #[test]
    fn test_oversized_file_is_skipped() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "Big.java", "class Big { }");

        let config = EngineConfig { max_file_size: 4, ..Default::default() };
        let store = Indexer::with_config(temp.path(), config).analyze(CacheMode::Ignore, false).unwrap();

        assert!(store.components.is_empty());
        assert_eq!(store.parse_errors[0].kind, ParseErrorKind::Read);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let temp = TempDir::new().unwrap();
        for i in 0..12 {
            write(
                temp.path(),
                &format!("src/p/C{}.java", i),
                &format!("package p; class C{i} {{ void run(){{ helper(); }} void helper(){{}} }}"),
            );
        }

        let sequential = Indexer::with_config(temp.path(), EngineConfig::default())
            .analyze(CacheMode::Ignore, false)
            .unwrap();
        let parallel_config = EngineConfig { parallel_threshold: 0, max_workers: 4, ..Default::default() };
        let parallel = Indexer::with_config(temp.path(), parallel_config)
            .analyze(CacheMode::Ignore, false)
            .unwrap();

        assert_eq!(sequential.components, parallel.components);
        assert_eq!(sequential.graph.edges(), parallel.graph.edges());
        assert_eq!(parallel.graph.edge_count(), 12);
    }

    #[test]
    fn test_second_run_uses_snapshot() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "A.java", "class A { void a(){ b(); } void b(){} }");

        let first = Indexer::new(temp.path()).analyze(CacheMode::Use, false).unwrap();
        assert!(!first.from_cache);

        let second = Indexer::new(temp.path()).analyze(CacheMode::Use, false).unwrap();
        assert!(second.from_cache);
        assert_eq!(second.components, first.components);

        let ignored = Indexer::new(temp.path()).analyze(CacheMode::Ignore, false).unwrap();
        assert!(!ignored.from_cache);
    }

    #[test]
    fn test_string_hits_credit_every_class_in_the_file() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "Api.java",
            "package p; class A { void a(){} } class B { String route(){ return \"/only/b\"; } class Inner { } }",
        );

        let store = Indexer::new(temp.path()).analyze(CacheMode::Ignore, false).unwrap();
        let owners: Vec<_> = store
            .strings
            .lookup("/ONLY/B")
            .iter()
            .map(|h| h.component.as_deref())
            .collect();
        assert_eq!(owners, vec![Some("p.A"), Some("p.B"), Some("p.B$Inner")]);
    }
}
