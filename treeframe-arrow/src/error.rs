use std::path::PathBuf;

use arrow::error::ArrowError;
use treeframe_common::ColumnSelectionError;
use treeframe_store::{InvalidWriteMode, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum TreeFrameError {
    #[error("Expected exactly one tree in {}, found {trees:?}", .path.display())]
    AmbiguousTree { path: PathBuf, trees: Vec<String> },
    #[error("Pattern '{0}' didn't match any branch")]
    PatternNotFound(String),
    #[error("Invalid column pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("Branch '{0}' holds the table index and cannot be ignored or used as a regular column")]
    ReservedColumn(String),
    #[error(transparent)]
    InvalidMode(#[from] InvalidWriteMode),
    #[error("Missing dependency: {0}")]
    MissingDependency(String),
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),
    #[error(transparent)]
    Store(StoreError),
}

impl From<ColumnSelectionError> for TreeFrameError {
    fn from(err: ColumnSelectionError) -> Self {
        match err {
            ColumnSelectionError::PatternNotFound(pattern) => TreeFrameError::PatternNotFound(pattern),
            ColumnSelectionError::InvalidPattern { pattern, source } => {
                TreeFrameError::InvalidPattern { pattern, source }
            }
        }
    }
}

impl From<StoreError> for TreeFrameError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MissingBackend(format) => TreeFrameError::MissingDependency(format!(
                "no backend for {} tree files is compiled into this build",
                format
            )),
            err => TreeFrameError::Store(err),
        }
    }
}
