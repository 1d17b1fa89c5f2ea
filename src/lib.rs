//! Spring Explorer: structural analysis engine for Java/Spring projects
//!
//! Walks a project, parses every Java source with Tree-sitter, classifies
//! components by their Spring stereotypes, resolves type names and method
//! calls into a call graph, and indexes identifiers and string literals.
//! The result is cached in `.explorer_cache/` and reused until a tracked
//! file changes.
//!
//! # Architecture
//!
//! - **Indexer**: walks the tree, parses files in parallel, merges and links
//! - **Store**: owns components, methods, indexes and the call graph
//! - **Query Engine**: read-only lookups over a populated store
//! - **Cache**: versioned, checksummed snapshot of the store
//!
//! # Example Usage
//!
//! ```no_run
//! use explorer::{CacheMode, Indexer, QueryEngine};
//! use explorer::query::FlowOptions;
//!
//! let store = Indexer::new(".").analyze(CacheMode::Use, false).unwrap();
//! let engine = QueryEngine::new(&store);
//!
//! for method in engine.search_methods("findById") {
//!     println!("{}", method.display_name);
//! }
//! let flow = engine.method_flow("UserController.getUser", FlowOptions::default());
//! ```

pub mod cache;
pub mod callgraph;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod indexer;
pub mod models;
pub mod output;
pub mod parsers;
pub mod query;
pub mod resolver;
pub mod store;
pub mod strings;
pub mod syntax;
pub mod tree;

// Re-export commonly used types
pub use cache::CacheManager;
pub use config::EngineConfig;
pub use error::EngineError;
pub use indexer::{CacheMode, Indexer};
pub use models::{Component, ComponentKind, FileKind, FileNode, Method, ParseError, ParseErrorKind, Stereotype};
pub use query::{FlowLookup, QueryEngine};
pub use store::ProjectStore;
