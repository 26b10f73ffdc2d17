//! Conversions between tree files and Arrow backed tables.
//!
//! [`load`] and [`save`] work against any [`TreeStore`]; [`load_path`] and
//! [`save_path`] pick the store from the file name.

use std::path::Path;

pub mod error;
pub mod reader;
pub mod table;
pub mod writer;

pub use error::TreeFrameError;
pub use reader::{load, resolve_columns, Loaded, ReadOptions, TableChunks};
pub use table::{Table, TableIndex};
pub use treeframe_common::{expand_braces, INDEX_COLUMN};
pub use treeframe_store::{BackendOptions, TreeStore, WriteMode};
pub use writer::{save, WriteOptions};

pub type TreeFrameResult<T> = std::result::Result<T, TreeFrameError>;

/// Reads a tree file with the store matching its format.
pub fn load_path<P: AsRef<Path>>(
    path: P,
    options: ReadOptions,
) -> TreeFrameResult<Loaded<Box<dyn TreeStore>>> {
    let store = treeframe_store::open_store(path.as_ref())?;
    load(store, path, options)
}

/// Writes a table with the store matching the destination's format.
pub fn save_path<P: AsRef<Path>>(
    table: &Table,
    path: P,
    options: &WriteOptions,
) -> TreeFrameResult<()> {
    let store = treeframe_store::open_store(path.as_ref())?;
    save(store.as_ref(), table, path, options)
}
