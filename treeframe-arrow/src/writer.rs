use std::path::Path;

use treeframe_store::{BackendOptions, TreeStore, WriteMode};

use crate::{table::Table, TreeFrameResult};

/// Where and how [`save`] writes a table.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub tree_key: String,
    pub mode: WriteMode,
    pub backend_options: BackendOptions,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            tree_key: treeframe_config::CONFIG.default_tree_key.clone(),
            mode: WriteMode::Recreate,
            backend_options: BackendOptions::new(),
        }
    }
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tree_key(mut self, tree_key: impl Into<String>) -> Self {
        self.tree_key = tree_key.into();
        self
    }

    pub fn with_mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the mode from its short form, `"w"` or `"a"`.
    pub fn with_mode_str(self, mode: &str) -> TreeFrameResult<Self> {
        Ok(self.with_mode(mode.parse()?))
    }

    pub fn with_backend_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.backend_options.insert(key.into(), value.into());
        self
    }
}

/// Writes `table` as one tree, its index stored as the leading `index`
/// branch.
pub fn save<S, P>(store: &S, table: &Table, path: P, options: &WriteOptions) -> TreeFrameResult<()>
where
    S: TreeStore + ?Sized,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let batch = table.to_record_batch()?;
    tracing::debug!(
        "Writing {} entries to tree '{}' in {} (mode '{}')",
        batch.num_rows(),
        options.tree_key,
        path.display(),
        options.mode
    );

    store.write(
        path,
        &options.tree_key,
        &batch,
        options.mode,
        &options.backend_options,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::{
        array::{Int64Array, StringArray},
        datatypes::{DataType, Field, Schema},
        record_batch::RecordBatch,
    };
    use treeframe_store::InMemoryTreeStore;

    use super::*;
    use crate::{error::TreeFrameError, table::TableIndex};

    fn table() -> Table {
        let batch = RecordBatch::try_new(
            Arc::new(Schema::new(vec![Field::new("name", DataType::Utf8, false)])),
            vec![Arc::new(StringArray::from(vec!["e", "mu", "tau"]))],
        )
        .unwrap();
        Table::try_new(batch, Some(Arc::new(Int64Array::from(vec![5, 6, 7])))).unwrap()
    }

    #[test]
    fn test_default_options() {
        let options = WriteOptions::default();
        assert_eq!(options.tree_key, "default");
        assert_eq!(options.mode, WriteMode::Recreate);
    }

    #[test]
    fn test_mode_from_str() {
        let options = WriteOptions::new().with_mode_str("a").unwrap();
        assert_eq!(options.mode, WriteMode::Update);
        assert!(matches!(
            WriteOptions::new().with_mode_str("x"),
            Err(TreeFrameError::InvalidMode(_))
        ));
    }

    #[test]
    fn test_save_writes_index_first() -> anyhow::Result<()> {
        let store = InMemoryTreeStore::new();
        save(&store, &table(), "file", &WriteOptions::new().with_tree_key("t"))?;

        let batch = store.tree("file", "t").unwrap();
        assert_eq!(batch.schema().field(0).name(), "index");
        assert_eq!(batch.schema().field(1).name(), "name");

        let read_back = Table::from_record_batch(batch);
        assert_eq!(read_back, table());
        assert_eq!(
            read_back.index(),
            &TableIndex::Column(Arc::new(Int64Array::from(vec![5, 6, 7])))
        );
        Ok(())
    }

    #[test]
    fn test_save_modes() -> anyhow::Result<()> {
        let store = InMemoryTreeStore::new();
        save(&store, &table(), "file", &WriteOptions::new().with_tree_key("a"))?;
        save(
            &store,
            &table(),
            "file",
            &WriteOptions::new().with_tree_key("b").with_mode_str("a")?,
        )?;
        assert_eq!(store.list_trees(Path::new("file"))?, vec!["a", "b"]);

        save(&store, &table(), "file", &WriteOptions::new().with_tree_key("c"))?;
        assert_eq!(store.list_trees(Path::new("file"))?, vec!["c"]);
        Ok(())
    }
}
