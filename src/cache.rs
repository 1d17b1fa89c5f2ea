//! Snapshot cache
//!
//! The cache lives in a hidden `.explorer_cache/` directory at the project
//! root:
//! - `explorer_cache.bin`: the full derived state of the last analysis
//! - `config.toml`: engine settings (see [`crate::config`])
//!
//! Snapshot layout:
//!
//! ```text
//! magic "SPXC" | version u32 LE | schema hash (16 hex bytes) | blake3 (32 bytes) | zstd(bincode(Snapshot))
//! ```
//!
//! A snapshot is only used when it was built for the same root with the
//! same indexing settings, and no tracked file has been modified since the
//! analysis started. Anything
//! unreadable is treated as corruption: the file is deleted and the caller
//! re-analyzes.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::callgraph::{apply_call_lists, CallGraph};
use crate::config::{load_config_or_default, EngineConfig, DEFAULT_CONFIG_TOML};
use crate::models::{
    split_method_key, Component, ComponentKind, Field, FileNode, LineSpan, Method, Parameter,
    ParseError,
};
use crate::store::ProjectStore;
use crate::strings::StringIndex;
use crate::tree::{build_walker, is_tracked};

/// Default cache directory name
pub const CACHE_DIR: &str = ".explorer_cache";

/// File names within the cache directory
pub const SNAPSHOT_BIN: &str = "explorer_cache.bin";
pub const CONFIG_TOML: &str = "config.toml";

const MAGIC: &[u8; 4] = b"SPXC";
const VERSION: u32 = 2;
const SCHEMA_HASH: &str = env!("CACHE_SCHEMA_HASH");
const ZSTD_LEVEL: i32 = 3;
const HEADER_LEN: usize = 4 + 4 + 16 + 32;

/// Component without its methods; those are stored by key
#[derive(Debug, Serialize, Deserialize)]
struct ComponentRecord {
    name: String,
    fqn: String,
    kind: ComponentKind,
    file_path: PathBuf,
    package: String,
    imports: Vec<String>,
    annotations: Vec<String>,
    generics: Vec<String>,
    extends: Vec<String>,
    implements: Vec<String>,
    line: usize,
    fields: BTreeMap<String, Field>,
}

/// Method without name, parent and call lists; all three are re-derived
#[derive(Debug, Serialize, Deserialize)]
struct MethodRecord {
    signature: String,
    key_signature: String,
    modifiers: Vec<String>,
    return_type: String,
    parameters: Vec<Parameter>,
    throws: Vec<String>,
    annotations: Vec<String>,
    lines: LineSpan,
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    root: PathBuf,
    /// [`EngineConfig::index_fingerprint`] of the settings used to build it
    config_fingerprint: String,
    built_at: DateTime<Utc>,
    files_parsed: usize,
    tree: FileNode,
    components: Vec<ComponentRecord>,
    methods: BTreeMap<String, MethodRecord>,
    edges: Vec<(String, String)>,
    packages: BTreeMap<String, Vec<String>>,
    strings: StringIndex,
    parse_errors: Vec<ParseError>,
}

impl Snapshot {
    fn capture(store: &ProjectStore, config: &EngineConfig) -> Self {
        let mut components = Vec::with_capacity(store.components.len());
        let mut methods = BTreeMap::new();

        for component in store.components.values() {
            for method in component.methods.values() {
                methods.insert(
                    method.key.clone(),
                    MethodRecord {
                        signature: method.signature.clone(),
                        key_signature: method.key_signature.clone(),
                        modifiers: method.modifiers.clone(),
                        return_type: method.return_type.clone(),
                        parameters: method.parameters.clone(),
                        throws: method.throws.clone(),
                        annotations: method.annotations.clone(),
                        lines: method.lines,
                    },
                );
            }
            components.push(ComponentRecord {
                name: component.name.clone(),
                fqn: component.fqn.clone(),
                kind: component.kind,
                file_path: component.file_path.clone(),
                package: component.package.clone(),
                imports: component.imports.clone(),
                annotations: component.annotations.clone(),
                generics: component.generics.clone(),
                extends: component.extends.clone(),
                implements: component.implements.clone(),
                line: component.line,
                fields: component.fields.clone(),
            });
        }

        Self {
            root: store.root.clone(),
            config_fingerprint: config.index_fingerprint(),
            built_at: store.built_at,
            files_parsed: store.files_parsed,
            tree: store.tree.clone(),
            components,
            methods,
            edges: store.graph.edges(),
            packages: store.packages.clone(),
            strings: store.strings.clone(),
            parse_errors: store.parse_errors.clone(),
        }
    }

    /// Components first, then methods, then the graph, then call lists
    fn restore(self) -> ProjectStore {
        let mut components: BTreeMap<String, Component> = self
            .components
            .into_iter()
            .map(|r| {
                (
                    r.fqn.clone(),
                    Component {
                        name: r.name,
                        fqn: r.fqn,
                        kind: r.kind,
                        file_path: r.file_path,
                        package: r.package,
                        imports: r.imports,
                        annotations: r.annotations,
                        generics: r.generics,
                        extends: r.extends,
                        implements: r.implements,
                        line: r.line,
                        fields: r.fields,
                        methods: BTreeMap::new(),
                    },
                )
            })
            .collect();

        for (key, record) in self.methods {
            let Some((fqn, name)) = split_method_key(&key) else {
                log::debug!("Dropping cached method with malformed key {}", key);
                continue;
            };
            let Some(component) = components.get_mut(fqn) else {
                log::debug!("Dropping cached method {} with unknown owner", key);
                continue;
            };
            let method = Method {
                name: name.to_string(),
                parent: fqn.to_string(),
                signature: record.signature,
                key_signature: record.key_signature,
                modifiers: record.modifiers,
                return_type: record.return_type,
                parameters: record.parameters,
                throws: record.throws,
                annotations: record.annotations,
                lines: record.lines,
                invocations: Vec::new(),
                calls: Vec::new(),
                called_by: Vec::new(),
                key,
            };
            let member_key = method.member_key(&component.name);
            component.methods.insert(member_key, method);
        }

        let mut store = ProjectStore::new(self.root, self.tree, self.built_at);
        for component in components.into_values() {
            store.insert_component(component);
        }
        store.packages = self.packages;
        store.strings = self.strings;
        store.parse_errors = self.parse_errors;
        store.files_parsed = self.files_parsed;
        store.from_cache = true;

        let mut graph = CallGraph::with_nodes(store.method_keys().cloned());
        let total = self.edges.len();
        let mut kept = 0usize;
        for (from, to) in &self.edges {
            if graph.add_edge(from, to) {
                kept += 1;
            }
        }
        if kept < total {
            log::debug!("Dropped {} cached edges with unknown endpoints", total - kept);
        }

        apply_call_lists(&mut store.components, &graph);
        store.graph = graph;
        store
    }
}

/// Manages the project cache directory
pub struct CacheManager {
    cache_path: PathBuf,
}

impl CacheManager {
    /// Create a cache manager for the given project root
    pub fn new(root: impl AsRef<Path>) -> Self {
        let cache_path = root.as_ref().join(CACHE_DIR);
        Self { cache_path }
    }

    /// Create the cache directory and default config.toml if missing
    pub fn init(&self) -> Result<()> {
        if !self.cache_path.exists() {
            log::info!("Initializing cache at {:?}", self.cache_path);
            std::fs::create_dir_all(&self.cache_path)
                .with_context(|| format!("Failed to create {}", self.cache_path.display()))?;
        }

        let config_path = self.cache_path.join(CONFIG_TOML);
        if !config_path.exists() {
            std::fs::write(&config_path, DEFAULT_CONFIG_TOML)
                .context("Failed to write default config.toml")?;
            log::debug!("Created default config.toml");
        }

        Ok(())
    }

    /// Whether a snapshot file is present (not whether it is valid)
    pub fn exists(&self) -> bool {
        self.snapshot_path().exists()
    }

    /// Get the path to the cache directory
    pub fn path(&self) -> &Path {
        &self.cache_path
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.cache_path.join(SNAPSHOT_BIN)
    }

    /// Engine settings from this cache's config.toml
    pub fn config(&self) -> EngineConfig {
        load_config_or_default(&self.cache_path)
    }

    /// Clear the entire cache
    pub fn clear(&self) -> Result<()> {
        if self.cache_path.exists() {
            log::warn!("Clearing cache at {:?}", self.cache_path);
            std::fs::remove_dir_all(&self.cache_path)
                .with_context(|| format!("Failed to remove {}", self.cache_path.display()))?;
        }
        Ok(())
    }

    /// Persist the full store, tagged with the settings it was built with
    pub fn save(&self, store: &ProjectStore, config: &EngineConfig) -> Result<()> {
        self.init()?;

        let snapshot = Snapshot::capture(store, config);
        let encoded = bincode::serialize(&snapshot).context("Failed to serialize snapshot")?;
        let compressed = zstd::encode_all(&encoded[..], ZSTD_LEVEL).context("Failed to compress snapshot")?;
        let checksum = blake3::hash(&compressed);

        // Write to a sibling file and rename so readers never see a partial snapshot
        let final_path = self.snapshot_path();
        let tmp_path = self.cache_path.join(format!("{}.tmp", SNAPSHOT_BIN));
        {
            let mut file = std::fs::File::create(&tmp_path)
                .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
            file.write_all(MAGIC)?;
            file.write_all(&VERSION.to_le_bytes())?;
            file.write_all(SCHEMA_HASH.as_bytes())?;
            file.write_all(checksum.as_bytes())?;
            file.write_all(&compressed)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &final_path)
            .with_context(|| format!("Failed to move snapshot into {}", final_path.display()))?;

        log::info!(
            "Saved snapshot: {} components, {} edges ({} bytes)",
            snapshot.components.len(),
            snapshot.edges.len(),
            compressed.len() + HEADER_LEN
        );
        Ok(())
    }

    /// Load a valid snapshot for `root`, or `None` if a fresh analysis is needed
    ///
    /// Corrupt snapshots are deleted. Stale or foreign ones are left in place
    /// to be overwritten by the next save.
    pub fn load(&self, root: &Path, config: &EngineConfig) -> Option<ProjectStore> {
        let path = self.snapshot_path();
        if !path.exists() {
            log::debug!("No snapshot at {}", path.display());
            return None;
        }

        let snapshot = match std::fs::read(&path).context("Failed to read snapshot").and_then(|b| decode(&b)) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("Discarding corrupt snapshot: {:#}", e);
                if let Err(e) = std::fs::remove_file(&path) {
                    log::warn!("Failed to delete corrupt snapshot: {}", e);
                }
                return None;
            }
        };

        if snapshot.root != root {
            log::info!(
                "Snapshot was built for {}, not {}",
                snapshot.root.display(),
                root.display()
            );
            return None;
        }

        let fingerprint = config.index_fingerprint();
        if snapshot.config_fingerprint != fingerprint {
            log::info!(
                "Snapshot was built with different index settings ({} vs {})",
                snapshot.config_fingerprint,
                fingerprint
            );
            return None;
        }

        if let Some(changed) = first_modified_since(root, snapshot.built_at, config) {
            log::info!("Snapshot is stale: {} changed since {}", changed.display(), snapshot.built_at);
            return None;
        }

        log::info!("Loaded snapshot built at {}", snapshot.built_at);
        Some(snapshot.restore())
    }
}

fn decode(bytes: &[u8]) -> Result<Snapshot> {
    if bytes.len() < HEADER_LEN {
        anyhow::bail!("snapshot is too small ({} bytes)", bytes.len());
    }
    if &bytes[0..4] != MAGIC {
        anyhow::bail!("invalid magic bytes");
    }

    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[4..8]);
    let version = u32::from_le_bytes(version);
    if version != VERSION {
        anyhow::bail!("unsupported snapshot version {} (expected {})", version, VERSION);
    }

    if &bytes[8..24] != SCHEMA_HASH.as_bytes() {
        anyhow::bail!("schema hash mismatch");
    }

    let payload = &bytes[HEADER_LEN..];
    if blake3::hash(payload).as_bytes() != &bytes[24..HEADER_LEN] {
        anyhow::bail!("checksum mismatch");
    }

    let encoded = zstd::decode_all(payload).context("Failed to decompress snapshot")?;
    bincode::deserialize(&encoded).context("Failed to deserialize snapshot")
}

/// First tracked file under `root` modified after `since`
fn first_modified_since(root: &Path, since: DateTime<Utc>, config: &EngineConfig) -> Option<PathBuf> {
    for entry in build_walker(root, config).flatten() {
        let is_file = entry.file_type().map(|ft| ft.is_file()).unwrap_or(false);
        if !is_file || !is_tracked(entry.path()) {
            continue;
        }
        let modified = match entry.metadata().ok().and_then(|m| m.modified().ok()) {
            Some(time) => DateTime::<Utc>::from(time),
            None => continue,
        };
        if modified > since {
            return Some(entry.into_path());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::{CacheMode, Indexer};
    use std::fs;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn project() -> TempDir {
        let temp = TempDir::new().unwrap();
        let pkg = temp.path().join("src/main/java/p");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(
            pkg.join("Foo.java"),
            "package p;\npublic class Foo {\n    void bar() { this.baz(); }\n    void baz() { }\n}\n",
        )
        .unwrap();
        temp
    }

    fn analyze(root: &Path) -> ProjectStore {
        Indexer::new(root).analyze(CacheMode::Ignore, false).unwrap()
    }

    #[test]
    fn test_init_writes_config() {
        let temp = TempDir::new().unwrap();
        let cache = CacheManager::new(temp.path());
        cache.init().unwrap();

        assert!(cache.path().join(CONFIG_TOML).exists());
        assert!(!cache.exists());
        assert_eq!(cache.config(), EngineConfig::default());
    }

    #[test]
    fn test_round_trip() {
        let temp = project();
        let fresh = analyze(temp.path());
        let cache = CacheManager::new(&fresh.root);
        assert!(cache.exists());

        let loaded = cache.load(&fresh.root, &EngineConfig::default()).unwrap();
        assert!(loaded.from_cache);
        assert_eq!(loaded.components, fresh.components);
        assert_eq!(loaded.graph.edges(), fresh.graph.edges());
        assert_eq!(loaded.packages, fresh.packages);
        assert_eq!(loaded.tree, fresh.tree);
        assert_eq!(loaded.built_at, fresh.built_at);

        let baz = loaded.method("p.Foo.baz()").unwrap();
        assert_eq!(baz.parent, "p.Foo");
        assert_eq!(baz.called_by, vec!["p.Foo.bar()"]);
    }

    #[test]
    fn test_root_mismatch_is_rejected() {
        let temp = project();
        let fresh = analyze(temp.path());
        let cache = CacheManager::new(&fresh.root);

        assert!(cache.load(Path::new("/somewhere/else"), &EngineConfig::default()).is_none());
        assert!(cache.exists());
    }

    #[test]
    fn test_changed_index_settings_are_rejected() {
        let temp = project();
        let fresh = analyze(temp.path());
        let cache = CacheManager::new(&fresh.root);

        let narrow = EngineConfig { source_window: 10, ..Default::default() };
        assert!(cache.load(&fresh.root, &narrow).is_none());
        assert!(cache.exists());

        let deeper = EngineConfig { callee_depth: 9, ..Default::default() };
        assert!(cache.load(&fresh.root, &deeper).is_some());
    }

    #[test]
    fn test_touched_file_invalidates() {
        let temp = project();
        let fresh = analyze(temp.path());
        let cache = CacheManager::new(&fresh.root);

        let file = fs::File::options()
            .write(true)
            .open(fresh.root.join("src/main/java/p/Foo.java"))
            .unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(60)).unwrap();

        assert!(cache.load(&fresh.root, &EngineConfig::default()).is_none());
    }

    #[test]
    fn test_untracked_file_does_not_invalidate() {
        let temp = project();
        let fresh = analyze(temp.path());
        let cache = CacheManager::new(&fresh.root);

        let notes = fresh.root.join("NOTES.md");
        fs::write(&notes, "notes").unwrap();
        let file = fs::File::options().write(true).open(&notes).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(60)).unwrap();

        assert!(cache.load(&fresh.root, &EngineConfig::default()).is_some());
    }

    #[test]
    fn test_corrupt_snapshot_is_deleted() {
        let temp = project();
        let fresh = analyze(temp.path());
        let cache = CacheManager::new(&fresh.root);

        let mut bytes = fs::read(cache.snapshot_path()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(cache.snapshot_path(), &bytes).unwrap();

        assert!(cache.load(&fresh.root, &EngineConfig::default()).is_none());
        assert!(!cache.exists());
    }

    #[test]
    fn test_garbage_snapshot_is_deleted() {
        let temp = project();
        let cache = CacheManager::new(temp.path());
        cache.init().unwrap();
        fs::write(cache.snapshot_path(), b"not a snapshot").unwrap();

        assert!(cache.load(temp.path(), &EngineConfig::default()).is_none());
        assert!(!cache.exists());
    }

    #[test]
    fn test_clear() {
        let temp = project();
        let fresh = analyze(temp.path());
        let cache = CacheManager::new(&fresh.root);

        cache.clear().unwrap();
        assert!(!cache.path().exists());
        // Clearing twice is fine
        cache.clear().unwrap();
    }
}
