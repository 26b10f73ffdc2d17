pub mod braces;
pub mod columns;

pub use braces::{expand_braces, expand_patterns};
pub use columns::{select_columns, ColumnSelectionError};

/// Name of the branch that carries a table's row index.
///
/// A tree holding a branch with this name always has it read, and it can
/// never be excluded from a read.
pub const INDEX_COLUMN: &str = "index";
