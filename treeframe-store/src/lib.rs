//! Access to files holding named trees of equally long branches.
//!
//! [`TreeStore`] is the seam between the table conversions in
//! `treeframe-arrow` and whatever library owns the on-disk format.

use std::{fmt, ops::Range, path::Path, str::FromStr, sync::Arc};

use arrow::record_batch::RecordBatch;
use indexmap::IndexMap;

pub mod error;
pub mod infer_format;
#[cfg(feature = "ipc")]
pub mod ipc;
pub mod memory;
pub mod selection;

pub use error::{SelectionError, StoreError};
pub use infer_format::{infer_from_path, open_store, TreeFileFormat};
#[cfg(feature = "ipc")]
pub use ipc::ArrowIpcTreeStore;
pub use memory::InMemoryTreeStore;
pub use selection::Selection;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Extra key/value arguments handed to a store untouched.
pub type BackendOptions = IndexMap<String, String>;

/// How a write treats the destination file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteMode {
    /// Discard everything in the destination, then write the tree.
    Recreate,
    /// Keep other trees in the destination and add or replace this one.
    Update,
}

impl WriteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::Recreate => "w",
            WriteMode::Update => "a",
        }
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown mode: {0}. Must be \"a\" or \"w\".")]
pub struct InvalidWriteMode(pub String);

impl FromStr for WriteMode {
    type Err = InvalidWriteMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "w" => Ok(WriteMode::Recreate),
            "a" => Ok(WriteMode::Update),
            other => Err(InvalidWriteMode(other.to_string())),
        }
    }
}

/// Parameters of a single [`TreeStore::read`].
#[derive(Debug, Clone)]
pub struct ReadRequest<'a> {
    /// Branches to return, in this order.
    pub columns: &'a [String],
    /// Entry range to read. `None` reads every entry.
    pub range: Option<Range<usize>>,
    /// Row filter in the expression language of [`Selection`], applied to
    /// the entries inside `range`.
    pub selection: Option<&'a str>,
    pub options: &'a BackendOptions,
}

impl<'a> ReadRequest<'a> {
    pub fn new(columns: &'a [String], options: &'a BackendOptions) -> Self {
        Self {
            columns,
            range: None,
            selection: None,
            options,
        }
    }

    pub fn with_range(mut self, range: Range<usize>) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_selection(mut self, selection: Option<&'a str>) -> Self {
        self.selection = selection;
        self
    }
}

/// The five operations the table conversions need from a tree file library.
pub trait TreeStore {
    /// Keys of every tree in the file.
    fn list_trees(&self, path: &Path) -> StoreResult<Vec<String>>;

    /// Branch names of a tree, in storage order.
    fn list_branches(&self, path: &Path, tree: &str) -> StoreResult<Vec<String>>;

    /// Total number of entries (rows) in a tree.
    fn num_entries(&self, path: &Path, tree: &str) -> StoreResult<usize>;

    fn read(&self, path: &Path, tree: &str, request: &ReadRequest<'_>) -> StoreResult<RecordBatch>;

    fn write(
        &self,
        path: &Path,
        tree: &str,
        batch: &RecordBatch,
        mode: WriteMode,
        options: &BackendOptions,
    ) -> StoreResult<()>;
}

impl<S: TreeStore + ?Sized> TreeStore for &S {
    fn list_trees(&self, path: &Path) -> StoreResult<Vec<String>> {
        (**self).list_trees(path)
    }

    fn list_branches(&self, path: &Path, tree: &str) -> StoreResult<Vec<String>> {
        (**self).list_branches(path, tree)
    }

    fn num_entries(&self, path: &Path, tree: &str) -> StoreResult<usize> {
        (**self).num_entries(path, tree)
    }

    fn read(&self, path: &Path, tree: &str, request: &ReadRequest<'_>) -> StoreResult<RecordBatch> {
        (**self).read(path, tree, request)
    }

    fn write(
        &self,
        path: &Path,
        tree: &str,
        batch: &RecordBatch,
        mode: WriteMode,
        options: &BackendOptions,
    ) -> StoreResult<()> {
        (**self).write(path, tree, batch, mode, options)
    }
}

impl<S: TreeStore + ?Sized> TreeStore for Box<S> {
    fn list_trees(&self, path: &Path) -> StoreResult<Vec<String>> {
        (**self).list_trees(path)
    }

    fn list_branches(&self, path: &Path, tree: &str) -> StoreResult<Vec<String>> {
        (**self).list_branches(path, tree)
    }

    fn num_entries(&self, path: &Path, tree: &str) -> StoreResult<usize> {
        (**self).num_entries(path, tree)
    }

    fn read(&self, path: &Path, tree: &str, request: &ReadRequest<'_>) -> StoreResult<RecordBatch> {
        (**self).read(path, tree, request)
    }

    fn write(
        &self,
        path: &Path,
        tree: &str,
        batch: &RecordBatch,
        mode: WriteMode,
        options: &BackendOptions,
    ) -> StoreResult<()> {
        (**self).write(path, tree, batch, mode, options)
    }
}

/// Clamps an entry range to a tree of `len` entries.
pub(crate) fn clamp_range(range: Option<&Range<usize>>, len: usize) -> Range<usize> {
    match range {
        Some(range) => {
            let start = range.start.min(len);
            start..range.end.clamp(start, len)
        }
        None => 0..len,
    }
}

/// Applies the row filter, then keeps only the requested branches in order.
pub(crate) fn filter_and_project(
    tree: &str,
    batch: RecordBatch,
    columns: &[String],
    selection: Option<&Selection>,
) -> StoreResult<RecordBatch> {
    let batch = match selection {
        Some(selection) => selection.filter(&batch)?,
        None => batch,
    };

    let schema = batch.schema();
    let indices = columns
        .iter()
        .map(|column| {
            schema
                .index_of(column)
                .map_err(|_| StoreError::BranchNotFound {
                    tree: tree.to_string(),
                    branch: column.clone(),
                })
        })
        .collect::<StoreResult<Vec<_>>>()?;

    Ok(batch.project(&indices)?)
}

/// Records backend options as schema metadata of the batch to be written.
pub(crate) fn with_options_metadata(
    batch: &RecordBatch,
    options: &BackendOptions,
) -> StoreResult<RecordBatch> {
    if options.is_empty() {
        return Ok(batch.clone());
    }

    let schema = batch.schema();
    let mut metadata = schema.metadata().clone();
    metadata.extend(options.iter().map(|(k, v)| (k.clone(), v.clone())));
    let schema = Arc::new(schema.as_ref().clone().with_metadata(metadata));

    Ok(batch.clone().with_schema(schema)?)
}
