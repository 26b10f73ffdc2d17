use std::sync::Arc;

use arrow::{
    array::{Array, ArrayRef, Int64Array},
    compute::{concat, concat_batches},
    datatypes::{Field, Schema},
    error::ArrowError,
    record_batch::RecordBatch,
};
use treeframe_common::INDEX_COLUMN;

use crate::{error::TreeFrameError, TreeFrameResult};

/// Row labels of a [`Table`].
#[derive(Debug, Clone, PartialEq)]
pub enum TableIndex {
    /// Rows are labelled `0..num_rows`.
    Positional,
    /// Explicit labels, one per row.
    Column(ArrayRef),
}

/// Named columns plus a row index.
///
/// The index is kept apart from the regular columns. When the table is
/// flattened for writing it becomes the leading `index` branch, and a
/// batch read back with such a branch turns it into the index again.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: RecordBatch,
    index: TableIndex,
}

impl Table {
    /// Creates a table from its regular columns and optional row labels.
    ///
    /// # Errors
    /// Fails when `columns` contains an `index` field, or when the labels do
    /// not match the number of rows.
    pub fn try_new(columns: RecordBatch, index: Option<ArrayRef>) -> TreeFrameResult<Self> {
        if columns.schema().column_with_name(INDEX_COLUMN).is_some() {
            return Err(TreeFrameError::ReservedColumn(INDEX_COLUMN.to_string()));
        }

        let index = match index {
            Some(index) if index.len() != columns.num_rows() => {
                return Err(ArrowError::InvalidArgumentError(format!(
                    "index has {} labels but the table has {} rows",
                    index.len(),
                    columns.num_rows()
                ))
                .into());
            }
            Some(index) => TableIndex::Column(index),
            None => TableIndex::Positional,
        };

        Ok(Self { columns, index })
    }

    /// Converts a raw batch, promoting its `index` field (if any) to the
    /// table index.
    pub fn from_record_batch(mut batch: RecordBatch) -> Self {
        match batch.schema().index_of(INDEX_COLUMN) {
            Ok(position) => {
                let index = batch.remove_column(position);
                Self {
                    columns: batch,
                    index: TableIndex::Column(index),
                }
            }
            Err(_) => Self {
                columns: batch,
                index: TableIndex::Positional,
            },
        }
    }

    /// Flattens the table into one batch whose first field is `index`.
    pub fn to_record_batch(&self) -> TreeFrameResult<RecordBatch> {
        let index = self.index_values();
        let schema = self.columns.schema();

        let mut fields = Vec::with_capacity(schema.fields().len() + 1);
        fields.push(Arc::new(Field::new(
            INDEX_COLUMN,
            index.data_type().clone(),
            index.null_count() > 0,
        )));
        fields.extend(schema.fields().iter().cloned());

        let mut arrays = Vec::with_capacity(fields.len());
        arrays.push(index);
        arrays.extend(self.columns.columns().iter().cloned());

        let schema = Schema::new_with_metadata(fields, schema.metadata().clone());
        Ok(RecordBatch::try_new(Arc::new(schema), arrays)?)
    }

    pub fn columns(&self) -> &RecordBatch {
        &self.columns
    }

    pub fn index(&self) -> &TableIndex {
        &self.index
    }

    /// The row labels as an array; positional labels are `Int64`.
    pub fn index_values(&self) -> ArrayRef {
        match &self.index {
            TableIndex::Positional => Arc::new(Int64Array::from_iter_values(
                0..self.columns.num_rows() as i64,
            )),
            TableIndex::Column(index) => index.clone(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.columns.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.num_columns()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns
            .schema()
            .fields()
            .iter()
            .map(|field| field.name().to_string())
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.columns.column_by_name(name)
    }

    pub fn into_parts(self) -> (RecordBatch, TableIndex) {
        (self.columns, self.index)
    }

    /// Stacks tables with the same columns on top of each other.
    ///
    /// The result is positional only when every input is.
    pub fn concat<'a>(tables: impl IntoIterator<Item = &'a Table>) -> TreeFrameResult<Table> {
        let tables = tables.into_iter().collect::<Vec<_>>();
        let Some(first) = tables.first() else {
            return Err(ArrowError::InvalidArgumentError(
                "cannot concatenate an empty list of tables".to_string(),
            )
            .into());
        };

        let columns = concat_batches(
            &first.columns.schema(),
            tables.iter().map(|table| &table.columns),
        )?;

        let positional = tables
            .iter()
            .all(|table| table.index == TableIndex::Positional);
        let index = if positional {
            TableIndex::Positional
        } else {
            let labels = tables
                .iter()
                .map(|table| table.index_values())
                .collect::<Vec<_>>();
            let labels = labels.iter().map(|a| a.as_ref()).collect::<Vec<&dyn Array>>();
            TableIndex::Column(concat(&labels)?)
        };

        Ok(Table { columns, index })
    }
}

#[cfg(test)]
mod tests {
    use arrow::{
        array::{Float64Array, UInt32Array},
        datatypes::DataType,
    };

    use super::*;

    fn columns(values: Vec<f64>) -> RecordBatch {
        RecordBatch::try_new(
            Arc::new(Schema::new(vec![Field::new("x", DataType::Float64, false)])),
            vec![Arc::new(Float64Array::from(values))],
        )
        .unwrap()
    }

    #[test]
    fn test_index_field_is_promoted() {
        let batch = Table::try_new(
            columns(vec![1.0, 2.0]),
            Some(Arc::new(UInt32Array::from(vec![7, 9]))),
        )
        .unwrap()
        .to_record_batch()
        .unwrap();
        assert_eq!(batch.schema().field(0).name(), INDEX_COLUMN);

        let table = Table::from_record_batch(batch);
        assert_eq!(table.column_names(), vec!["x"]);
        assert_eq!(
            table.index(),
            &TableIndex::Column(Arc::new(UInt32Array::from(vec![7, 9])))
        );
    }

    #[test]
    fn test_positional_index_is_written_as_int64() {
        let table = Table::from_record_batch(columns(vec![1.0, 2.0, 3.0]));
        assert_eq!(table.index(), &TableIndex::Positional);

        let batch = table.to_record_batch().unwrap();
        assert_eq!(batch.num_columns(), 2);
        let index = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(index.values().to_vec(), vec![0, 1, 2]);
    }

    #[test]
    fn test_rejects_index_as_regular_column() {
        let batch = Table::from_record_batch(columns(vec![1.0]))
            .to_record_batch()
            .unwrap();
        assert!(matches!(
            Table::try_new(batch, None),
            Err(TreeFrameError::ReservedColumn(_))
        ));
    }

    #[test]
    fn test_rejects_mismatched_index_length() {
        let result = Table::try_new(
            columns(vec![1.0, 2.0]),
            Some(Arc::new(Int64Array::from(vec![1]))),
        );
        assert!(matches!(result, Err(TreeFrameError::Arrow(_))));
    }

    #[test]
    fn test_concat() {
        let a = Table::from_record_batch(columns(vec![1.0, 2.0]));
        let b = Table::from_record_batch(columns(vec![3.0]));
        let both = Table::concat([&a, &b]).unwrap();
        assert_eq!(both.num_rows(), 3);
        assert_eq!(both.index(), &TableIndex::Positional);

        let labelled =
            Table::try_new(columns(vec![4.0]), Some(Arc::new(Int64Array::from(vec![10])))).unwrap();
        let mixed = Table::concat([&a, &labelled]).unwrap();
        assert_eq!(
            mixed.index(),
            &TableIndex::Column(Arc::new(Int64Array::from(vec![0, 1, 10])))
        );

        assert!(Table::concat(Vec::<&Table>::new()).is_err());
    }
}
