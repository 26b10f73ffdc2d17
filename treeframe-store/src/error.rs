use std::path::PathBuf;

use arrow::{datatypes::DataType, error::ArrowError};
use datafusion::error::DataFusionError;

use crate::infer_format::TreeFileFormat;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),
    #[error("No tree file found at {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("Tree '{tree}' not found in {}", .path.display())]
    TreeNotFound { path: PathBuf, tree: String },
    #[error("Branch '{branch}' not found in tree '{tree}'")]
    BranchNotFound { tree: String, branch: String },
    #[error("Invalid tree key '{0}'")]
    InvalidTreeKey(String),
    #[error("Destination {} is not a directory", .0.display())]
    InvalidDestination(PathBuf),
    #[error("Invalid row selection: {0}")]
    Selection(#[from] SelectionError),
    #[error("No backend available for {0} files")]
    MissingBackend(TreeFileFormat),
    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("Invalid row selection '{source_text}': {source}")]
    Invalid {
        source_text: String,
        source: DataFusionError,
    },
    #[error("Row selection '{source_text}' evaluates to {data_type}, not a boolean")]
    NotAPredicate {
        source_text: String,
        data_type: DataType,
    },
    #[error("Failed to evaluate row selection: {0}")]
    Evaluation(#[from] DataFusionError),
    #[error("Failed to filter rows: {0}")]
    Filter(#[from] ArrowError),
}
