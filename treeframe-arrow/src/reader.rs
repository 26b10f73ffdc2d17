use std::{
    iter::FusedIterator,
    num::NonZeroUsize,
    ops::Range,
    path::{Path, PathBuf},
};

use treeframe_common::{expand_patterns, select_columns, INDEX_COLUMN};
use treeframe_store::{BackendOptions, ReadRequest, TreeStore};

use crate::{error::TreeFrameError, table::Table, TreeFrameResult};

/// What to read from a tree file and how.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Tree to read. Required when the file holds more than one tree.
    pub tree_key: Option<String>,
    /// Shell patterns (`*`, `?`, `[...]`, `{a,b}`) of branches to read.
    /// `None` or an empty list reads every branch.
    pub columns: Option<Vec<String>>,
    /// Patterns of branches to leave out, taking precedence over `columns`.
    pub ignore: Option<Vec<String>>,
    /// Read lazily in chunks of this many entries.
    pub chunk_size: Option<NonZeroUsize>,
    /// SQL predicate over the branches, e.g. `px > 2 AND charge = 1`,
    /// applied by the store to the entries it reads.
    pub row_filter: Option<String>,
    pub backend_options: BackendOptions,
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tree_key(mut self, tree_key: impl Into<String>) -> Self {
        self.tree_key = Some(tree_key.into());
        self
    }

    pub fn with_column(self, pattern: impl Into<String>) -> Self {
        self.with_columns([pattern])
    }

    pub fn with_columns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_ignore<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    /// A size of 0 reads everything at once.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = NonZeroUsize::new(chunk_size);
        self
    }

    pub fn with_row_filter(mut self, row_filter: impl Into<String>) -> Self {
        self.row_filter = Some(row_filter.into());
        self
    }

    pub fn with_backend_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.backend_options.insert(key.into(), value.into());
        self
    }
}

/// Result of [`load`]: one table, or a lazy sequence of tables when a
/// chunk size was given.
pub enum Loaded<S: TreeStore> {
    Table(Table),
    Chunks(TableChunks<S>),
}

impl<S: TreeStore> Loaded<S> {
    /// Returns the whole selection as one table, reading any remaining
    /// chunks and stacking them.
    pub fn into_table(self) -> TreeFrameResult<Table> {
        match self {
            Loaded::Table(table) => Ok(table),
            Loaded::Chunks(chunks) if chunks.num_chunks() == 0 => chunks.plan.read(&chunks.store, None),
            Loaded::Chunks(chunks) => {
                let tables = chunks.collect::<TreeFrameResult<Vec<_>>>()?;
                Table::concat(&tables)
            }
        }
    }

    pub fn is_chunked(&self) -> bool {
        matches!(self, Loaded::Chunks(_))
    }
}

/// Everything needed to repeat a read against one tree.
#[derive(Debug, Clone)]
struct ReadPlan {
    path: PathBuf,
    tree_key: String,
    columns: Vec<String>,
    row_filter: Option<String>,
    backend_options: BackendOptions,
}

impl ReadPlan {
    fn read<S: TreeStore>(&self, store: &S, range: Option<Range<usize>>) -> TreeFrameResult<Table> {
        let request = ReadRequest::new(&self.columns, &self.backend_options)
            .with_selection(self.row_filter.as_deref());
        let request = match range {
            Some(range) => request.with_range(range),
            None => request,
        };

        let batch = store.read(&self.path, &self.tree_key, &request)?;
        Ok(Table::from_record_batch(batch))
    }
}

/// Lazily reads consecutive entry ranges of a tree, one table per chunk.
///
/// Every call to `next` performs one read. Entries of chunks never pulled
/// are never read. After an error the iterator is exhausted.
pub struct TableChunks<S: TreeStore> {
    store: S,
    plan: ReadPlan,
    chunk_size: usize,
    num_entries: usize,
    next_chunk: usize,
}

impl<S: TreeStore> TableChunks<S> {
    fn new(store: S, plan: ReadPlan, chunk_size: NonZeroUsize, num_entries: usize) -> Self {
        Self {
            store,
            plan,
            chunk_size: chunk_size.get(),
            num_entries,
            next_chunk: 0,
        }
    }

    /// Total number of chunks, consumed or not.
    pub fn num_chunks(&self) -> usize {
        self.num_entries.div_ceil(self.chunk_size)
    }

    pub fn num_entries(&self) -> usize {
        self.num_entries
    }

    pub fn columns(&self) -> &[String] {
        &self.plan.columns
    }
}

impl<S: TreeStore> Iterator for TableChunks<S> {
    type Item = TreeFrameResult<Table>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_chunk >= self.num_chunks() {
            return None;
        }

        let start = self.next_chunk * self.chunk_size;
        let end = (start + self.chunk_size).min(self.num_entries);
        self.next_chunk += 1;

        tracing::debug!(
            "Reading entries {}..{} of tree '{}'",
            start,
            end,
            self.plan.tree_key
        );
        let result = self.plan.read(&self.store, Some(start..end));
        if result.is_err() {
            self.next_chunk = self.num_chunks();
        }
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.num_chunks().saturating_sub(self.next_chunk);
        (remaining, Some(remaining))
    }
}

impl<S: TreeStore> ExactSizeIterator for TableChunks<S> {}

impl<S: TreeStore> FusedIterator for TableChunks<S> {}

fn resolve_tree_key<S: TreeStore>(
    store: &S,
    path: &Path,
    tree_key: Option<String>,
) -> TreeFrameResult<String> {
    if let Some(tree_key) = tree_key.filter(|key| !key.is_empty()) {
        return Ok(tree_key);
    }

    match <[String; 1]>::try_from(store.list_trees(path)?) {
        Ok([tree_key]) => Ok(tree_key),
        Err(trees) => Err(TreeFrameError::AmbiguousTree {
            path: path.to_path_buf(),
            trees,
        }),
    }
}

/// Resolves include and exclude patterns against the branches of a tree.
///
/// Include patterns are brace expanded and must each match a branch. When
/// the tree has an `index` branch it is always included. Exclude patterns
/// may match nothing, but must not match `index`.
pub fn resolve_columns(
    branches: &[String],
    columns: Option<&[String]>,
    ignore: Option<&[String]>,
) -> TreeFrameResult<Vec<String>> {
    let mut selected = match columns {
        None | Some([]) => branches.to_vec(),
        Some(patterns) => {
            let mut patterns = patterns.to_vec();
            if branches.iter().any(|branch| branch == INDEX_COLUMN) {
                patterns.push(INDEX_COLUMN.to_string());
            }
            let expanded = expand_patterns(&patterns);
            select_columns(branches, expanded.as_slice(), true)?
        }
    };

    if let Some(ignore) = ignore.filter(|patterns| !patterns.is_empty()) {
        let expanded = expand_patterns(ignore);
        let ignored = select_columns(branches, expanded.as_slice(), false)?;
        if ignored.iter().any(|column| column == INDEX_COLUMN) {
            return Err(TreeFrameError::ReservedColumn(INDEX_COLUMN.to_string()));
        }
        selected.retain(|column| !ignored.contains(column));
    }

    Ok(selected)
}

/// Reads a tree into a [`Table`], or into lazily read chunks of tables
/// when [`ReadOptions::chunk_size`] is set.
///
/// A store given by reference (`&store`) stays usable afterwards; chunks
/// hold on to whatever store they are given.
pub fn load<S, P>(store: S, path: P, options: ReadOptions) -> TreeFrameResult<Loaded<S>>
where
    S: TreeStore,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let ReadOptions {
        tree_key,
        columns,
        ignore,
        chunk_size,
        row_filter,
        backend_options,
    } = options;

    let tree_key = resolve_tree_key(&store, path, tree_key)?;
    let branches = store.list_branches(path, &tree_key)?;
    let columns = resolve_columns(&branches, columns.as_deref(), ignore.as_deref())?;
    tracing::debug!(
        "Reading {} of {} branches from tree '{}' in {}",
        columns.len(),
        branches.len(),
        tree_key,
        path.display()
    );

    let plan = ReadPlan {
        path: path.to_path_buf(),
        tree_key,
        columns,
        row_filter,
        backend_options,
    };

    match chunk_size {
        Some(chunk_size) => {
            let num_entries = store.num_entries(&plan.path, &plan.tree_key)?;
            let chunks = TableChunks::new(store, plan, chunk_size, num_entries);
            tracing::debug!(
                "Splitting {} entries into {} chunks",
                num_entries,
                chunks.num_chunks()
            );
            Ok(Loaded::Chunks(chunks))
        }
        None => Ok(Loaded::Table(plan.read(&store, None)?)),
    }
}
