use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use arrow::{
    compute::concat_batches,
    datatypes::SchemaRef,
    ipc::{reader::FileReader, writer::FileWriter},
    record_batch::RecordBatch,
};
use indexmap::IndexSet;
use tempfile::NamedTempFile;

use crate::{
    clamp_range, filter_and_project, with_options_metadata, BackendOptions, ReadRequest,
    Selection, StoreError, StoreResult, TreeStore, WriteMode,
};

/// Stores each file as a directory holding one Arrow IPC file per tree.
///
/// A tree `events` of the file `run.arrow` lives at `run.arrow/events.arrow`.
/// Record batches outside a requested entry range are skipped without being
/// decoded into the result, and only the needed branches are read.
#[derive(Debug, Clone)]
pub struct ArrowIpcTreeStore {
    extension: String,
}

impl Default for ArrowIpcTreeStore {
    fn default() -> Self {
        Self::with_extension(treeframe_config::CONFIG.ipc_extension.clone())
    }
}

impl ArrowIpcTreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extension(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    fn tree_path(&self, path: &Path, tree: &str) -> StoreResult<PathBuf> {
        let invalid = tree.is_empty()
            || tree == "."
            || tree == ".."
            || tree.contains(['/', '\\', '\0']);
        if invalid {
            return Err(StoreError::InvalidTreeKey(tree.to_string()));
        }
        Ok(path.join(format!("{}.{}", tree, self.extension)))
    }

    fn is_tree_file(&self, path: &Path) -> bool {
        path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext == self.extension.as_str())
    }

    fn open_tree(
        &self,
        path: &Path,
        tree: &str,
        projection: Option<Vec<usize>>,
    ) -> StoreResult<FileReader<BufReader<File>>> {
        if !path.is_dir() {
            return Err(StoreError::FileNotFound(path.to_path_buf()));
        }

        let tree_path = self.tree_path(path, tree)?;
        let file = File::open(&tree_path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => StoreError::TreeNotFound {
                path: path.to_path_buf(),
                tree: tree.to_string(),
            },
            _ => StoreError::Io(err),
        })?;

        Ok(FileReader::try_new(BufReader::new(file), projection)?)
    }

    /// Encodes `batch` into a temp file inside `dir`. Nothing in `dir`
    /// changes until the returned file is persisted.
    fn stage_tree(&self, dir: &Path, batch: &RecordBatch) -> StoreResult<NamedTempFile> {
        let mut staged = NamedTempFile::new_in(dir)?;
        {
            let mut writer = FileWriter::try_new(staged.as_file_mut(), &batch.schema())?;
            writer.write(batch)?;
            writer.finish()?;
        }
        Ok(staged)
    }

    fn tree_schema(&self, path: &Path, tree: &str) -> StoreResult<SchemaRef> {
        Ok(self.open_tree(path, tree, None)?.schema())
    }
}

impl TreeStore for ArrowIpcTreeStore {
    fn list_trees(&self, path: &Path) -> StoreResult<Vec<String>> {
        if !path.is_dir() {
            return Err(StoreError::FileNotFound(path.to_path_buf()));
        }

        let mut trees = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry_path = entry?.path();
            if !self.is_tree_file(&entry_path) {
                continue;
            }
            if let Some(stem) = entry_path.file_stem().and_then(|stem| stem.to_str()) {
                trees.push(stem.to_string());
            }
        }
        trees.sort();
        Ok(trees)
    }

    fn list_branches(&self, path: &Path, tree: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .tree_schema(path, tree)?
            .fields()
            .iter()
            .map(|field| field.name().to_string())
            .collect())
    }

    fn num_entries(&self, path: &Path, tree: &str) -> StoreResult<usize> {
        if self.tree_schema(path, tree)?.fields().is_empty() {
            return Ok(0);
        }

        let mut entries = 0;
        for batch in self.open_tree(path, tree, Some(vec![0]))? {
            entries += batch?.num_rows();
        }
        Ok(entries)
    }

    fn read(&self, path: &Path, tree: &str, request: &ReadRequest<'_>) -> StoreResult<RecordBatch> {
        let schema = self.tree_schema(path, tree)?;
        let selection = request
            .selection
            .map(|source| Selection::parse(source, schema.as_ref()))
            .transpose()?;

        let mut needed = request.columns.iter().cloned().collect::<IndexSet<_>>();
        if let Some(selection) = &selection {
            needed.extend(selection.columns());
        }

        let mut projection = needed
            .iter()
            .map(|column| {
                schema
                    .index_of(column)
                    .map_err(|_| StoreError::BranchNotFound {
                        tree: tree.to_string(),
                        branch: column.to_string(),
                    })
            })
            .collect::<StoreResult<Vec<_>>>()?;
        if projection.is_empty() && !schema.fields().is_empty() {
            // Still decode one branch so row counts survive.
            projection.push(0);
        }

        let reader = self.open_tree(path, tree, Some(projection))?;
        let projected_schema = reader.schema();
        let wanted = request.range.clone().unwrap_or(0..usize::MAX);

        let mut parts = Vec::new();
        let mut offset = 0;
        for batch in reader {
            let batch = batch?;
            let batch_range = offset..offset + batch.num_rows();
            offset = batch_range.end;

            if batch_range.end <= wanted.start {
                continue;
            }
            if batch_range.start >= wanted.end {
                break;
            }
            let local = clamp_range(
                Some(&(wanted.start.saturating_sub(batch_range.start)
                    ..wanted.end.saturating_sub(batch_range.start))),
                batch.num_rows(),
            );
            parts.push(batch.slice(local.start, local.len()));
        }

        let combined = concat_batches(&projected_schema, &parts)?;
        tracing::trace!(
            "Read {} entries of tree '{}' from {}",
            combined.num_rows(),
            tree,
            path.display()
        );
        filter_and_project(tree, combined, request.columns, selection.as_ref())
    }

    fn write(
        &self,
        path: &Path,
        tree: &str,
        batch: &RecordBatch,
        mode: WriteMode,
        options: &BackendOptions,
    ) -> StoreResult<()> {
        if path.exists() && !path.is_dir() {
            return Err(StoreError::InvalidDestination(path.to_path_buf()));
        }
        let tree_path = self.tree_path(path, tree)?;
        if tree_path.exists() && !tree_path.is_file() {
            return Err(StoreError::InvalidDestination(tree_path));
        }
        std::fs::create_dir_all(path)?;

        let batch = with_options_metadata(batch, options)?;
        let staged = self.stage_tree(path, &batch)?;

        if mode == WriteMode::Recreate {
            for entry in std::fs::read_dir(path)? {
                let entry_path = entry?.path();
                if self.is_tree_file(&entry_path) {
                    std::fs::remove_file(&entry_path)?;
                }
            }
        }

        staged
            .persist(&tree_path)
            .map_err(|err| StoreError::Io(err.error))?;

        Ok(())
    }
}
