//! CLI argument parsing and command handlers

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::cache::CacheManager;
use crate::indexer::{validate_root, CacheMode, Indexer};
use crate::output;
use crate::query::{ComponentFilter, ComponentSummary, FlowLookup, FlowOptions, MethodFlow, QueryEngine};
use crate::store::ProjectStore;
use crate::strings::StringHit;

/// Spring Explorer: structural analysis of Java/Spring projects
#[derive(Parser, Debug)]
#[command(
    name = "spx",
    version,
    about = "Explore the components, methods and call flow of a Java/Spring project",
    long_about = "Spring Explorer parses every Java source in a project, classifies components by \
                  their Spring stereotypes, resolves method calls into a call graph and caches the \
                  result in .explorer_cache/ for fast repeated queries."
)]
pub struct Cli {
    /// Enable verbose logging (can be repeated for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze a project (or load its cached analysis) and print a summary
    Analyze {
        /// Project root (defaults to current directory)
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,

        /// Delete the cache and re-analyze from scratch
        #[arg(long)]
        no_cache: bool,

        /// Show a progress bar while parsing
        #[arg(short, long)]
        progress: bool,
    },

    /// List components, optionally filtered by kind and name
    ///
    /// Examples:
    ///   spx components --kind service
    ///   spx components --kind controller --name user   # includes RestControllers
    ///   spx components --spring                         # stereotyped components only
    Components {
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,

        /// Component kind (class, interface, enum, annotation or a stereotype)
        #[arg(short, long)]
        kind: Option<String>,

        /// Case-insensitive substring of the component's simple name
        #[arg(short, long)]
        name: Option<String>,

        /// Only list components with a Spring stereotype
        #[arg(short, long)]
        spring: bool,

        /// Output format as JSON
        #[arg(long)]
        json: bool,
    },

    /// Find methods whose name contains a substring (case-insensitive)
    Methods {
        /// Substring of a method name such as `find`
        pattern: String,

        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Look up an identifier or string literal
    Search {
        /// Identifier or literal body (matched case-insensitively)
        term: String,

        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Show a method with its callee and caller trees
    ///
    /// The key is resolved exactly, then case-insensitively, then by
    /// substring. If several methods match, they are listed instead.
    ///
    /// Examples:
    ///   spx flow "com.acme.UserController.getUser(Long)"
    ///   spx flow getuser --depth 5 --callers-depth 2
    Flow {
        /// Method key or a fragment of one
        key: String,

        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,

        /// Levels of outgoing calls below the direct callees (defaults to config)
        #[arg(short, long)]
        depth: Option<usize>,

        /// Levels of incoming calls above the direct callers (defaults to config)
        #[arg(long)]
        callers_depth: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// List files that could not be read or parsed
    Errors {
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Summarize annotations and component kinds
    Annotations {
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Print the project file tree, or one node of it
    Tree {
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,

        /// Dotted node index such as `0.2.1`
        #[arg(short, long)]
        index: Option<String>,
    },

    /// Delete the project cache directory
    Clear {
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,
    },
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        let log_level = match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
            .init();

        match self.command {
            None => {
                Cli::command().print_help()?;
                Ok(())
            }
            Some(Command::Analyze { path, no_cache, progress }) => handle_analyze(&path, no_cache, progress),
            Some(Command::Components { path, kind, name, spring, json }) => {
                handle_components(&path, ComponentFilter { kind, name, spring_only: spring }, json)
            }
            Some(Command::Methods { pattern, path, json }) => handle_methods(&path, &pattern, json),
            Some(Command::Search { term, path, json }) => handle_search(&path, &term, json),
            Some(Command::Flow { key, path, depth, callers_depth, json }) => {
                handle_flow(&path, &key, depth, callers_depth, json)
            }
            Some(Command::Errors { path, json }) => handle_errors(&path, json),
            Some(Command::Annotations { path, json }) => handle_annotations(&path, json),
            Some(Command::Tree { path, index }) => handle_tree(&path, index.as_deref()),
            Some(Command::Clear { path }) => handle_clear(&path),
        }
    }
}

/// Load the cached analysis, or analyze the project if there is none
fn load_store(path: &Path) -> Result<ProjectStore> {
    Indexer::new(path).analyze(CacheMode::Use, false)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to serialize output")?);
    Ok(())
}

fn handle_analyze(path: &Path, no_cache: bool, progress: bool) -> Result<()> {
    let start = Instant::now();

    let mode = if no_cache {
        let root = validate_root(path)?;
        CacheManager::new(&root).clear()?;
        CacheMode::Ignore
    } else {
        CacheMode::Use
    };

    let store = Indexer::new(path).analyze(mode, progress)?;
    let stats = store.stats();

    println!("Analysis {}", if stats.from_cache { "loaded from cache" } else { "complete" });
    println!("  Project:      {}", store.root.display());
    println!("  Files parsed: {}", stats.files_parsed);
    println!("  Components:   {}", stats.components);
    println!("  Methods:      {}", stats.methods);
    println!("  Call edges:   {}", stats.call_edges);
    println!("  Terms:        {}", stats.string_terms);
    println!("  Built at:     {}", store.built_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  Elapsed:      {:.2?}", start.elapsed());

    if stats.parse_errors > 0 {
        output::warn(&format!(
            "{} file(s) could not be parsed. Run 'spx errors' for details.",
            stats.parse_errors
        ));
    }

    Ok(())
}

fn handle_components(path: &Path, filter: ComponentFilter, json: bool) -> Result<()> {
    let store = load_store(path)?;
    let engine = QueryEngine::new(&store);
    let components: Vec<ComponentSummary> = engine
        .components(&filter)
        .into_iter()
        .map(ComponentSummary::from)
        .collect();

    if json {
        return print_json(&components);
    }

    if components.is_empty() {
        println!("No components found.");
        return Ok(());
    }

    let kind_width = components.iter().map(|c| c.kind.len()).max().unwrap_or(4).max(4);
    for c in &components {
        println!(
            "{:<width$}  {}  ({}:{})",
            c.kind,
            c.fqn,
            relative(&store.root, &c.file_path).display(),
            c.line,
            width = kind_width
        );
    }
    println!("\n{} component(s)", components.len());

    Ok(())
}

fn handle_methods(path: &Path, pattern: &str, json: bool) -> Result<()> {
    let store = load_store(path)?;
    let methods = QueryEngine::new(&store).search_methods(pattern);

    if json {
        return print_json(&methods);
    }

    if methods.is_empty() {
        println!("No methods matching '{}'.", pattern);
        return Ok(());
    }

    for m in &methods {
        println!("{}  -> {}", m.key, m.return_type);
    }
    println!("\n{} method(s)", methods.len());

    Ok(())
}

fn handle_search(path: &Path, term: &str, json: bool) -> Result<()> {
    let store = load_store(path)?;
    let hits: &[StringHit] = QueryEngine::new(&store).search_string(term);

    if json {
        return print_json(hits);
    }

    if hits.is_empty() {
        println!("No occurrences of '{}'.", term);
        return Ok(());
    }

    for hit in hits {
        println!(
            "{:<10}  {}  {}  [{}]",
            hit.kind.to_string(),
            hit.original,
            relative(&store.root, &hit.path).display(),
            hit.component.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}

fn handle_flow(
    path: &Path,
    key: &str,
    depth: Option<usize>,
    callers_depth: Option<usize>,
    json: bool,
) -> Result<()> {
    let store = load_store(path)?;
    let config = CacheManager::new(&store.root).config();
    let options = FlowOptions {
        callee_depth: depth.unwrap_or(config.callee_depth),
        caller_depth: callers_depth.unwrap_or(config.caller_depth),
    };

    let lookup = QueryEngine::new(&store).method_flow(key, options);

    if json {
        return print_json(&lookup);
    }

    match lookup {
        FlowLookup::Found(flow) => {
            print_flow(&store, &flow);
            Ok(())
        }
        FlowLookup::Ambiguous(candidates) => {
            output::warn(&format!("'{}' matches {} methods; use one of these keys:", key, candidates.len()));
            for c in &candidates {
                println!("  {}", c.key);
            }
            Ok(())
        }
        FlowLookup::NotFound => anyhow::bail!(
            "No method matching '{}'.\n\
             \n\
             Try 'spx methods {}' to search method keys by substring.",
            key,
            key
        ),
    }
}

fn print_flow(store: &ProjectStore, flow: &MethodFlow) {
    println!("{}", flow.display_name);
    println!("  Key:        {}", flow.key);
    println!("  Component:  {} ({})", flow.component_fqn, flow.component_kind);
    println!("  Returns:    {}", flow.return_type);
    if !flow.modifiers.is_empty() {
        println!("  Modifiers:  {}", flow.modifiers.join(" "));
    }
    if !flow.annotations.is_empty() {
        println!("  Annotations: {}", flow.annotations.join(" "));
    }
    if !flow.throws.is_empty() {
        println!("  Throws:     {}", flow.throws.join(", "));
    }

    let approx = if flow.lines.approximate { " (approximate)" } else { "" };
    println!(
        "  Location:   {}:{}-{}{}",
        relative(&store.root, &flow.file_path).display(),
        flow.lines.start,
        flow.lines.end,
        approx
    );

    if !flow.source.is_empty() {
        println!("\nSource:");
        for (offset, line) in flow.source.iter().enumerate() {
            println!("{:>5} | {}", flow.lines.start + offset, line);
        }
    }

    println!("\nCalls:");
    if flow.callees.is_empty() {
        println!("  (none)");
    } else {
        print!("{}", output::render_call_tree(&flow.callees));
    }

    println!("\nCalled by:");
    if flow.callers.is_empty() {
        println!("  (none)");
    } else {
        print!("{}", output::render_call_tree(&flow.callers));
    }
}

fn handle_errors(path: &Path, json: bool) -> Result<()> {
    let store = load_store(path)?;
    let errors = QueryEngine::new(&store).parse_errors();

    if json {
        return print_json(errors);
    }

    if errors.is_empty() {
        println!("No parse errors.");
        return Ok(());
    }

    for err in errors {
        println!("{}", err);
    }
    println!("\n{} error(s)", errors.len());

    Ok(())
}

fn handle_annotations(path: &Path, json: bool) -> Result<()> {
    let store = load_store(path)?;
    let summary = QueryEngine::new(&store).annotation_summary();

    if json {
        return print_json(&summary);
    }

    println!("Components by kind:");
    for (kind, count) in &summary.kinds {
        println!("  {:<20} {:>5}", kind, count);
    }

    println!("\nAnnotations ({}):", summary.annotations.len());
    for annotation in &summary.annotations {
        println!("  {}", annotation);
    }

    Ok(())
}

fn handle_tree(path: &Path, index: Option<&str>) -> Result<()> {
    let store = load_store(path)?;
    let engine = QueryEngine::new(&store);

    let node = match index {
        Some(index) => engine
            .node(index)
            .with_context(|| format!("No tree node with index {}", index))?,
        None => &store.tree,
    };

    print!("{}", output::render_tree(node));
    Ok(())
}

fn handle_clear(path: &Path) -> Result<()> {
    let root = validate_root(path)?;
    let cache = CacheManager::new(&root);

    if !cache.path().exists() {
        println!("No cache to clear.");
        return Ok(());
    }

    cache.clear()?;
    println!("Cache cleared successfully.");
    Ok(())
}

fn relative<'a>(root: &Path, path: &'a Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}
