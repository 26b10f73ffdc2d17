use std::{fmt, path::Path};

use crate::{StoreError, StoreResult, TreeStore};

/// Tree file formats known to [`open_store`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeFileFormat {
    /// A directory of Arrow IPC files, one per tree.
    ArrowIpc,
    /// CERN ROOT files. Recognised, but no backend ships for them.
    Root,
    Unknown,
}

impl fmt::Display for TreeFileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeFileFormat::ArrowIpc => f.write_str("Arrow IPC"),
            TreeFileFormat::Root => f.write_str("ROOT"),
            TreeFileFormat::Unknown => f.write_str("unknown"),
        }
    }
}

/// Infers the format of a tree file from its path.
///
/// Existing directories and paths without an extension are Arrow IPC
/// stores, so new destinations can be named freely.
pub fn infer_from_path<P: AsRef<Path>>(path: P) -> TreeFileFormat {
    let path = path.as_ref();
    if path.is_dir() {
        return TreeFileFormat::ArrowIpc;
    }

    match path.extension() {
        None => TreeFileFormat::ArrowIpc,
        Some(ext) => match ext.to_ascii_lowercase().to_str() {
            Some("root") => TreeFileFormat::Root,
            Some("arrow" | "arrows" | "ipc") => TreeFileFormat::ArrowIpc,
            Some(ext) if ext == treeframe_config::CONFIG.ipc_extension => TreeFileFormat::ArrowIpc,
            _ => TreeFileFormat::Unknown,
        },
    }
}

/// Opens a store able to handle the file at `path`.
///
/// Fails with [`StoreError::MissingBackend`] when the format has no backend
/// compiled into this build.
pub fn open_store<P: AsRef<Path>>(path: P) -> StoreResult<Box<dyn TreeStore>> {
    let format = infer_from_path(path);
    tracing::debug!("Inferred tree file format: {}", format);

    match format {
        #[cfg(feature = "ipc")]
        TreeFileFormat::ArrowIpc => Ok(Box::new(crate::ipc::ArrowIpcTreeStore::new())),
        format => Err(StoreError::MissingBackend(format)),
    }
}
