//! ## Schema reconciliation
//!
//! One-hot expansion creates columns from the categories present in each table, so the training
//! and forecast tables rarely end up with the same column set. [`SchemaReconciler`] appends every
//! column of a reference table that the target lacks, filled with a constant cast to the reference
//! column's type. Columns already in the target are left untouched, and the reference is only read.

use crate::exceptions::{StoreFeaturesError, StoreFeaturesResult};
use crate::impl_transformer;
use arrow::datatypes::DataType;
use datafusion_expr::{cast, ident, lit, Expr};
use datafusion::prelude::*;
use tracing::debug;

/// Adds the columns of a reference schema missing from the transformed table.
pub struct SchemaReconciler {
    /// Reference columns in reference order.
    pub reference: Vec<(String, DataType)>,
    pub fill_value: i64,
}

impl SchemaReconciler {
    /// Captures the schema of `reference`. The reference DataFrame itself is not consumed.
    pub fn from_reference(reference: &DataFrame, fill_value: i64) -> Self {
        let reference = reference
            .schema()
            .fields()
            .iter()
            .map(|f| (f.name().to_string(), f.data_type().clone()))
            .collect();
        Self {
            reference,
            fill_value,
        }
    }

    /// Reference columns that `df` does not have, in reference order.
    pub fn missing_columns(&self, df: &DataFrame) -> Vec<&str> {
        self.reference
            .iter()
            .filter(|(name, _)| df.schema().field_with_name(None, name).is_err())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Stateless: the reference schema is captured at construction.
    pub async fn fit(&mut self, _df: &DataFrame) -> StoreFeaturesResult<()> {
        Ok(())
    }

    pub fn transform(&self, df: DataFrame) -> StoreFeaturesResult<DataFrame> {
        let mut exprs: Vec<Expr> = df.schema().fields().iter().map(|f| ident(f.name())).collect();
        let mut added = 0usize;
        for (name, data_type) in &self.reference {
            if df.schema().field_with_name(None, name).is_ok() {
                continue;
            }
            exprs.push(cast(lit(self.fill_value), data_type.clone()).alias(name));
            added += 1;
        }
        debug!(added, "reconciled schema against reference");
        df.select(exprs).map_err(StoreFeaturesError::from)
    }

    fn inherent_is_stateful(&self) -> bool {
        false
    }
}

impl_transformer!(SchemaReconciler);

/// Returns `target` with every column of `reference` it lacks, filled with `fill_value`.
pub fn reconcile_schema(
    reference: &DataFrame,
    target: DataFrame,
    fill_value: i64,
) -> StoreFeaturesResult<DataFrame> {
    SchemaReconciler::from_reference(reference, fill_value).transform(target)
}
