//! ## Min-max scaling
//!
//! [`MinMaxScaler`] rescales numeric columns to `[0, 1]` with `(x - min) / (max - min)`, each
//! column using its own minimum and maximum.
//!
//! NaN handling is explicit:
//! - nulls and NaN values are excluded when fitting the minimum and maximum;
//! - NaN inputs stay NaN after scaling;
//! - a degenerate column (min equal to max, or no non-NaN value at all) scales to NaN on every row.
//!
//! Output columns are Float64.

use crate::exceptions::{StoreFeaturesError, StoreFeaturesResult};
use crate::impl_transformer;
use arrow::datatypes::DataType;
use datafusion::functions_aggregate::expr_fn::{max, min};
use datafusion_expr::{cast, ident, lit, Expr};
use datafusion::prelude::*;
use datafusion::scalar::ScalarValue;
use datafusion_functions::math;
use std::collections::HashMap;
use tracing::debug;

/// Fitted range of a column. `None` when the column had no usable value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnRange {
    pub min: f64,
    pub max: f64,
}

impl ColumnRange {
    /// True when scaling would divide by zero.
    pub fn is_degenerate(&self) -> bool {
        self.max == self.min
    }

    /// Scales one value; the degenerate case and NaN inputs yield NaN.
    pub fn scale(&self, value: f64) -> f64 {
        if self.is_degenerate() {
            f64::NAN
        } else {
            (value - self.min) / (self.max - self.min)
        }
    }
}

fn as_f64(name: &str) -> Expr {
    cast(ident(name), DataType::Float64)
}

fn scalar_to_f64(scalar: ScalarValue) -> Option<f64> {
    match scalar {
        ScalarValue::Float64(v) => v,
        _ => None,
    }
}

/// Computes min and max of a column over its non-null, non-NaN values.
async fn compute_range(df: &DataFrame, col_name: &str) -> StoreFeaturesResult<Option<ColumnRange>> {
    let value = as_f64(col_name);
    let is_nan = math::isnan().call(vec![value.clone()]);
    let batches = df
        .clone()
        .filter(value.clone().is_not_null().and(is_nan.is_false()))?
        .aggregate(
            vec![],
            vec![min(value.clone()).alias("min"), max(value).alias("max")],
        )?
        .collect()
        .await?;
    let Some(batch) = batches.first() else {
        return Ok(None);
    };
    if batch.num_rows() == 0 {
        return Ok(None);
    }
    let lo = scalar_to_f64(ScalarValue::try_from_array(batch.column(0), 0)?);
    let hi = scalar_to_f64(ScalarValue::try_from_array(batch.column(1), 0)?);
    Ok(match (lo, hi) {
        (Some(min), Some(max)) => Some(ColumnRange { min, max }),
        _ => None,
    })
}

/// Min-max scaler fitted independently per column.
pub struct MinMaxScaler {
    pub columns: Vec<String>,
    /// Fitted ranges; a `None` entry marks a column without any usable value.
    pub ranges: HashMap<String, Option<ColumnRange>>,
}

impl MinMaxScaler {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            ranges: HashMap::new(),
        }
    }

    /// Learns the range of each target column.
    pub async fn fit(&mut self, df: &DataFrame) -> StoreFeaturesResult<()> {
        for col_name in &self.columns {
            df.schema().field_with_name(None, col_name).map_err(|_| {
                StoreFeaturesError::MissingColumn(format!("Column '{}' not found", col_name))
            })?;
            let range = compute_range(df, col_name).await?;
            debug!(column = %col_name, ?range, "fitted min-max range");
            self.ranges.insert(col_name.clone(), range);
        }
        Ok(())
    }

    /// Scaled expression for a column according to its fitted range.
    fn scaled_expr(&self, name: &str) -> StoreFeaturesResult<Expr> {
        let range = self.ranges.get(name).ok_or(StoreFeaturesError::FitNotCalled)?;
        let expr = match range {
            Some(r) if !r.is_degenerate() => {
                (as_f64(name) - lit(r.min)) / lit(r.max - r.min)
            }
            _ => lit(f64::NAN),
        };
        Ok(expr.alias(name))
    }

    /// Replaces each target column with its scaled Float64 form, keeping column positions.
    pub fn transform(&self, df: DataFrame) -> StoreFeaturesResult<DataFrame> {
        let mut exprs = Vec::with_capacity(df.schema().fields().len());
        for field in df.schema().fields() {
            let name = field.name();
            if self.columns.contains(name) {
                exprs.push(self.scaled_expr(name)?);
            } else {
                exprs.push(ident(name));
            }
        }
        for col_name in &self.columns {
            if df.schema().field_with_name(None, col_name).is_err() {
                return Err(StoreFeaturesError::MissingColumn(format!(
                    "Column '{}' not found",
                    col_name
                )));
            }
        }
        df.select(exprs).map_err(StoreFeaturesError::from)
    }

    fn inherent_is_stateful(&self) -> bool {
        true
    }
}

impl_transformer!(MinMaxScaler);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_scale() {
        let range = ColumnRange {
            min: 10.0,
            max: 30.0,
        };
        assert_eq!(range.scale(10.0), 0.0);
        assert_eq!(range.scale(20.0), 0.5);
        assert_eq!(range.scale(30.0), 1.0);
        assert!(range.scale(f64::NAN).is_nan());
    }

    #[test]
    fn test_degenerate_range_scales_to_nan() {
        let range = ColumnRange {
            min: 5.0,
            max: 5.0,
        };
        assert!(range.is_degenerate());
        assert!(range.scale(5.0).is_nan());
    }
}
