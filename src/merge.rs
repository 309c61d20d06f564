//! ## Key merges
//!
//! [`merge_on_key`] joins the per-store tables onto the row tables. Every row of the left table
//! must match exactly one row of the right table: a result with a different row count means the
//! right table has duplicate keys or lacks a key of the left table, and is reported as
//! [`StoreFeaturesError::RowCountMismatch`] instead of being passed on.

use crate::exceptions::{StoreFeaturesError, StoreFeaturesResult};
use datafusion::common::JoinType;
use datafusion::logical_expr::{ident, Expr};
use datafusion::prelude::*;
use tracing::debug;

const RIGHT_KEY: &str = "__right_key";

fn column_names(df: &DataFrame) -> Vec<String> {
    df.schema()
        .fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect()
}

/// Inner-joins `right` onto `left` on `key`, keeping a single key column.
///
/// Non-key columns present on both sides are rejected. `table` names the result in errors.
pub async fn merge_on_key(
    left: DataFrame,
    right: DataFrame,
    key: &str,
    table: &str,
) -> StoreFeaturesResult<DataFrame> {
    let left_columns = column_names(&left);
    let right_columns = column_names(&right);
    for (side, columns) in [("left", &left_columns), ("right", &right_columns)] {
        if !columns.iter().any(|c| c == key) {
            return Err(StoreFeaturesError::MissingColumn(format!(
                "Key column '{}' not found in {} table of '{}'",
                key, side, table
            )));
        }
    }
    if let Some(shared) = right_columns
        .iter()
        .find(|c| c.as_str() != key && left_columns.contains(c))
    {
        return Err(StoreFeaturesError::InvalidParameter(format!(
            "Column '{}' exists on both sides of the '{}' merge",
            shared, table
        )));
    }

    let expected = left.clone().count().await?;
    let right_exprs: Vec<Expr> = right_columns
        .iter()
        .map(|name| {
            if name == key {
                ident(name).alias(RIGHT_KEY)
            } else {
                ident(name)
            }
        })
        .collect();
    let output: Vec<Expr> = left_columns
        .iter()
        .chain(right_columns.iter().filter(|c| c.as_str() != key))
        .map(|name| ident(name))
        .collect();
    let merged = left
        .join_on(
            right.select(right_exprs)?,
            JoinType::Inner,
            [ident(key).eq(ident(RIGHT_KEY))],
        )?
        .select(output)?;
    let actual = merged.clone().count().await?;
    if actual != expected {
        return Err(StoreFeaturesError::RowCountMismatch {
            table: table.to_string(),
            expected,
            actual,
        });
    }
    debug!(table, rows = actual, "merged on key");
    Ok(merged)
}
