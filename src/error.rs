//! Typed engine errors
//!
//! Only a bad project root is fatal. Everything else is absorbed locally
//! and reported as data (see [`crate::models::ParseError`]).

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("project path not found: {}", .0.display())]
    ProjectNotFound(PathBuf),

    #[error("project path is not a directory: {}", .0.display())]
    ProjectNotDirectory(PathBuf),
}
