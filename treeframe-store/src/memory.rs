use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use arrow::record_batch::RecordBatch;
use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::{
    clamp_range, filter_and_project, with_options_metadata, BackendOptions, ReadRequest,
    Selection, StoreError, StoreResult, TreeStore, WriteMode,
};

/// A [`TreeStore`] that keeps every file as a map of tree key to batch.
///
/// Paths are only used as keys, nothing touches the filesystem.
#[derive(Debug, Default)]
pub struct InMemoryTreeStore {
    files: RwLock<HashMap<PathBuf, IndexMap<String, RecordBatch>>>,
}

impl InMemoryTreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a tree, creating the file when needed.
    pub fn insert_tree<P: AsRef<Path>>(&self, path: P, tree: impl Into<String>, batch: RecordBatch) {
        self.files
            .write()
            .entry(path.as_ref().to_path_buf())
            .or_default()
            .insert(tree.into(), batch);
    }

    pub fn tree<P: AsRef<Path>>(&self, path: P, tree: &str) -> Option<RecordBatch> {
        self.files
            .read()
            .get(path.as_ref())
            .and_then(|trees| trees.get(tree).cloned())
    }

    fn with_tree<T>(
        &self,
        path: &Path,
        tree: &str,
        f: impl FnOnce(&RecordBatch) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let files = self.files.read();
        let trees = files
            .get(path)
            .ok_or_else(|| StoreError::FileNotFound(path.to_path_buf()))?;
        let batch = trees.get(tree).ok_or_else(|| StoreError::TreeNotFound {
            path: path.to_path_buf(),
            tree: tree.to_string(),
        })?;
        f(batch)
    }
}

impl TreeStore for InMemoryTreeStore {
    fn list_trees(&self, path: &Path) -> StoreResult<Vec<String>> {
        self.files
            .read()
            .get(path)
            .map(|trees| trees.keys().cloned().collect())
            .ok_or_else(|| StoreError::FileNotFound(path.to_path_buf()))
    }

    fn list_branches(&self, path: &Path, tree: &str) -> StoreResult<Vec<String>> {
        self.with_tree(path, tree, |batch| {
            Ok(batch
                .schema()
                .fields()
                .iter()
                .map(|field| field.name().to_string())
                .collect())
        })
    }

    fn num_entries(&self, path: &Path, tree: &str) -> StoreResult<usize> {
        self.with_tree(path, tree, |batch| Ok(batch.num_rows()))
    }

    fn read(&self, path: &Path, tree: &str, request: &ReadRequest<'_>) -> StoreResult<RecordBatch> {
        self.with_tree(path, tree, |batch| {
            let selection = request
                .selection
                .map(|source| Selection::parse(source, batch.schema().as_ref()))
                .transpose()?;
            let range = clamp_range(request.range.as_ref(), batch.num_rows());
            let sliced = batch.slice(range.start, range.len());
            filter_and_project(tree, sliced, request.columns, selection.as_ref())
        })
    }

    fn write(
        &self,
        path: &Path,
        tree: &str,
        batch: &RecordBatch,
        mode: WriteMode,
        options: &BackendOptions,
    ) -> StoreResult<()> {
        let batch = with_options_metadata(batch, options)?;
        let mut files = self.files.write();
        match mode {
            WriteMode::Recreate => {
                files.insert(
                    path.to_path_buf(),
                    IndexMap::from([(tree.to_string(), batch)]),
                );
            }
            WriteMode::Update => {
                files
                    .entry(path.to_path_buf())
                    .or_default()
                    .insert(tree.to_string(), batch);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::{
        array::{Array, Int64Array},
        datatypes::{DataType, Field, Schema},
    };

    use super::*;

    fn batch(values: Vec<i64>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("a", DataType::Int64, false),
            Field::new("b", DataType::Int64, false),
        ]));
        let doubled = values.iter().map(|v| v * 2).collect::<Vec<_>>();
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(values)),
                Arc::new(Int64Array::from(doubled)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_read_range_selection_and_projection() -> anyhow::Result<()> {
        let store = InMemoryTreeStore::new();
        store.insert_tree("f", "t", batch((0..10).collect()));

        let columns = vec!["b".to_string()];
        let options = BackendOptions::new();
        let request = ReadRequest::new(&columns, &options)
            .with_range(2..8)
            .with_selection(Some("a > 4"));
        let read = store.read(Path::new("f"), "t", &request)?;

        assert_eq!(read.num_columns(), 1);
        let b = read
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(b.values().to_vec(), vec![10, 12, 14]);
        Ok(())
    }

    #[test]
    fn test_read_range_past_end_is_clamped() -> anyhow::Result<()> {
        let store = InMemoryTreeStore::new();
        store.insert_tree("f", "t", batch((0..4).collect()));

        let columns = vec!["a".to_string()];
        let options = BackendOptions::new();
        let read = store.read(
            Path::new("f"),
            "t",
            &ReadRequest::new(&columns, &options).with_range(3..100),
        )?;
        assert_eq!(read.num_rows(), 1);
        assert_eq!(read.column(0).len(), 1);
        Ok(())
    }

    #[test]
    fn test_missing_file_tree_and_branch() {
        let store = InMemoryTreeStore::new();
        assert!(matches!(
            store.list_trees(Path::new("nope")),
            Err(StoreError::FileNotFound(_))
        ));

        store.insert_tree("f", "t", batch(vec![1]));
        assert!(matches!(
            store.num_entries(Path::new("f"), "other"),
            Err(StoreError::TreeNotFound { .. })
        ));

        let columns = vec!["zzz".to_string()];
        let options = BackendOptions::new();
        assert!(matches!(
            store.read(Path::new("f"), "t", &ReadRequest::new(&columns, &options)),
            Err(StoreError::BranchNotFound { .. })
        ));
    }

    #[test]
    fn test_write_modes() -> anyhow::Result<()> {
        let store = InMemoryTreeStore::new();
        let path = Path::new("f");
        let options = BackendOptions::new();

        store.write(path, "one", &batch(vec![1]), WriteMode::Recreate, &options)?;
        store.write(path, "two", &batch(vec![2]), WriteMode::Update, &options)?;
        assert_eq!(store.list_trees(path)?, vec!["one", "two"]);

        store.write(path, "three", &batch(vec![3]), WriteMode::Recreate, &options)?;
        assert_eq!(store.list_trees(path)?, vec!["three"]);
        Ok(())
    }

    #[test]
    fn test_write_options_become_metadata() -> anyhow::Result<()> {
        let store = InMemoryTreeStore::new();
        let options = BackendOptions::from([("title".to_string(), "events".to_string())]);
        store.write(Path::new("f"), "t", &batch(vec![1]), WriteMode::Recreate, &options)?;

        let written = store.tree("f", "t").unwrap();
        assert_eq!(
            written.schema().metadata().get("title").map(String::as_str),
            Some("events")
        );
        Ok(())
    }
}
