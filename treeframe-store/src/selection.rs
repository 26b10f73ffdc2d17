//! Row filter expressions, written as SQL predicates over the branches of a
//! tree, e.g. `ABB > 100 AND (name = 'mu' OR NOT x <= 0.5)`.
//!
//! Parsing, type coercion and evaluation are done by DataFusion. Branch
//! names are case sensitive. Rows for which the predicate is null are
//! dropped.

use std::fmt;

use arrow::{
    array::AsArray,
    compute::filter_record_batch,
    datatypes::Schema,
    record_batch::RecordBatch,
};
use datafusion::{
    common::DFSchema,
    prelude::{Expr, SessionConfig, SessionContext},
};

use crate::error::SelectionError;

/// A parsed row filter, resolved against the schema of one tree.
#[derive(Clone)]
pub struct Selection {
    source: String,
    expr: Expr,
    ctx: SessionContext,
}

impl fmt::Debug for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selection")
            .field("source", &self.source)
            .field("expr", &self.expr)
            .finish()
    }
}

fn session_context() -> SessionContext {
    let mut config = SessionConfig::new();
    config.options_mut().sql_parser.enable_ident_normalization = false;
    SessionContext::new_with_config(config)
}

impl Selection {
    /// Parses `source` against the branches of `schema`.
    ///
    /// Fails on syntax errors and on branches missing from `schema`.
    pub fn parse(source: &str, schema: &Schema) -> Result<Self, SelectionError> {
        let ctx = session_context();
        let df_schema = DFSchema::try_from(schema.clone())?;
        let expr = ctx
            .parse_sql_expr(source, &df_schema)
            .map_err(|err| SelectionError::Invalid {
                source_text: source.to_string(),
                source: err,
            })?;

        Ok(Self {
            source: source.to_string(),
            expr,
            ctx,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Every branch the expression refers to, sorted by name.
    pub fn columns(&self) -> Vec<String> {
        let mut columns = self
            .expr
            .column_refs()
            .into_iter()
            .map(|column| column.name.clone())
            .collect::<Vec<_>>();
        columns.sort();
        columns.dedup();
        columns
    }

    /// Keeps the rows of `batch` for which the expression is true.
    pub fn filter(&self, batch: &RecordBatch) -> Result<RecordBatch, SelectionError> {
        let df_schema = DFSchema::try_from(batch.schema().as_ref().clone())?;
        let predicate = self.ctx.create_physical_expr(self.expr.clone(), &df_schema)?;
        let mask = predicate.evaluate(batch)?.into_array(batch.num_rows())?;

        let Some(mask) = mask.as_boolean_opt() else {
            return Err(SelectionError::NotAPredicate {
                source_text: self.source.clone(),
                data_type: mask.data_type().clone(),
            });
        };
        Ok(filter_record_batch(batch, mask)?)
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::{
        array::{Int32Array, StringArray},
        datatypes::{DataType, Field},
    };

    use super::*;

    fn batch() -> RecordBatch {
        RecordBatch::try_new(
            Arc::new(Schema::new(vec![
                Field::new("x", DataType::Int32, true),
                Field::new("name", DataType::Utf8, true),
                Field::new("ABB", DataType::Int32, true),
            ])),
            vec![
                Arc::new(Int32Array::from(vec![Some(1), Some(5), None, Some(10)])),
                Arc::new(StringArray::from(vec!["mu", "e", "mu", "tau"])),
                Arc::new(Int32Array::from(vec![50, 150, 250, 350])),
            ],
        )
        .unwrap()
    }

    fn parse(source: &str) -> Result<Selection, SelectionError> {
        Selection::parse(source, batch().schema().as_ref())
    }

    fn x_values(batch: &RecordBatch) -> Vec<Option<i32>> {
        batch
            .column_by_name("x")
            .unwrap()
            .as_any()
            .downcast_ref::<Int32Array>()
            .unwrap()
            .iter()
            .collect()
    }

    #[test]
    fn test_columns() {
        let selection = parse("x > 1 OR (name = 'mu' AND x < 3) OR ABB = 2").unwrap();
        assert_eq!(selection.columns(), vec!["ABB", "name", "x"]);
    }

    #[test]
    fn test_branch_names_keep_case() {
        let filtered = parse("ABB > 100").unwrap().filter(&batch()).unwrap();
        assert_eq!(filtered.num_rows(), 3);
        assert!(matches!(
            parse("abb > 100"),
            Err(SelectionError::Invalid { .. })
        ));
    }

    #[test]
    fn test_parse_errors() {
        for source in ["x > ", "(x > 1", "x >> 1 AND", "name = 'mu", "y > 1"] {
            assert!(
                matches!(parse(source), Err(SelectionError::Invalid { .. })),
                "{source} should not parse"
            );
        }
    }

    #[test]
    fn test_filter_numeric_drops_nulls() {
        let filtered = parse("x >= 5").unwrap().filter(&batch()).unwrap();
        assert_eq!(x_values(&filtered), vec![Some(5), Some(10)]);

        let filtered = parse("NOT x >= 5").unwrap().filter(&batch()).unwrap();
        assert_eq!(x_values(&filtered), vec![Some(1)]);

        let filtered = parse("2.5 < x").unwrap().filter(&batch()).unwrap();
        assert_eq!(x_values(&filtered), vec![Some(5), Some(10)]);
    }

    #[test]
    fn test_filter_strings_and_logic() {
        let filtered = parse("name = 'mu' AND x < 3 OR name = 'tau'")
            .unwrap()
            .filter(&batch())
            .unwrap();
        assert_eq!(x_values(&filtered), vec![Some(1), Some(10)]);
    }

    #[test]
    fn test_filter_needs_a_boolean() {
        let err = parse("x + 1").unwrap().filter(&batch()).unwrap_err();
        assert!(matches!(err, SelectionError::NotAPredicate { .. }));
    }
}
