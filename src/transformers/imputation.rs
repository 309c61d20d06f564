//! ## Transformers for imputing missing values
//!
//! Missing numeric values are never dropped by the feature build; they are filled instead.
//!
//! - **MeanImputer**: Fills numeric columns with the column mean learned in `fit`.
//! - **ArbitraryNumberImputer**: Fills numeric columns with a fixed number.
//!
//! Both keep the data type of the imputed column, so an `Int8` flag stays `Int8` and a `Float32`
//! distance stays `Float32`.

use crate::exceptions::{StoreFeaturesError, StoreFeaturesResult};
use crate::impl_transformer;
use datafusion::functions_aggregate::expr_fn::avg;
use datafusion::logical_expr::{cast, ident, lit, not, Case as DFCase, Expr};
use datafusion::prelude::*;
use datafusion::scalar::ScalarValue;
use std::collections::HashMap;
use tracing::debug;

/// Validates that every column in `target_cols` exists in the DataFrame.
fn validate_columns(df: &DataFrame, target_cols: &[String]) -> StoreFeaturesResult<()> {
    let schema = df.schema();
    for col_name in target_cols {
        if schema.field_with_name(None, col_name).is_err() {
            return Err(StoreFeaturesError::MissingColumn(format!(
                "Column '{}' not found in DataFrame",
                col_name
            )));
        }
    }
    Ok(())
}

/// `CASE WHEN col IS NOT NULL THEN col ELSE fallback END`.
fn coalesce_expr_for(name: &str, fallback: Expr) -> Expr {
    Expr::Case(DFCase {
        expr: None,
        when_then_expr: vec![(Box::new(not(ident(name).is_null())), Box::new(ident(name)))],
        else_expr: Some(Box::new(fallback)),
    })
}

/// Replaces each target column that has a fallback with its coalesced form, cast back to the
/// column's own type.
fn apply_imputation<F>(
    df: DataFrame,
    target_cols: &[String],
    get_fallback: F,
) -> StoreFeaturesResult<DataFrame>
where
    F: Fn(&str) -> Option<Expr>,
{
    let exprs: Vec<Expr> = df
        .schema()
        .fields()
        .iter()
        .map(|field| {
            let name = field.name();
            match get_fallback(name) {
                Some(fallback) if target_cols.contains(name) => {
                    cast(coalesce_expr_for(name, fallback), field.data_type().clone()).alias(name)
                }
                _ => ident(name),
            }
        })
        .collect();
    df.select(exprs).map_err(StoreFeaturesError::from)
}

/// Replaces missing values with the column mean.
pub struct MeanImputer {
    pub columns: Vec<String>,
    pub impute_values: HashMap<String, f64>,
}

impl MeanImputer {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            impute_values: HashMap::new(),
        }
    }

    /// For each target column, compute the mean value via an aggregate query.
    pub async fn fit(&mut self, df: &DataFrame) -> StoreFeaturesResult<()> {
        validate_columns(df, &self.columns)?;
        for col_name in &self.columns {
            let batches = df
                .clone()
                .aggregate(vec![], vec![avg(ident(col_name)).alias("avg")])?
                .collect()
                .await?;
            let batch = batches.first().ok_or_else(|| {
                StoreFeaturesError::DataFusionError(datafusion::error::DataFusionError::Plan(
                    "No data found".to_string(),
                ))
            })?;
            let scalar = ScalarValue::try_from_array(batch.column(0), 0)?;
            match scalar {
                ScalarValue::Float64(Some(avg_val)) => {
                    debug!(column = %col_name, mean = avg_val, "mean imputation value");
                    self.impute_values.insert(col_name.clone(), avg_val);
                }
                _ => {
                    return Err(StoreFeaturesError::InvalidParameter(format!(
                        "Failed to compute average for column {}",
                        col_name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Returns a new DataFrame where missing values of the target columns are replaced with the mean.
    pub fn transform(&self, df: DataFrame) -> StoreFeaturesResult<DataFrame> {
        validate_columns(&df, &self.columns)?;
        for col_name in &self.columns {
            if !self.impute_values.contains_key(col_name) {
                return Err(StoreFeaturesError::FitNotCalled);
            }
        }
        apply_imputation(df, &self.columns, |name| {
            self.impute_values.get(name).map(|&v| lit(v))
        })
    }

    fn inherent_is_stateful(&self) -> bool {
        true
    }
}

/// Replaces missing values with the given number.
pub struct ArbitraryNumberImputer {
    pub columns: Vec<String>,
    pub number: f64,
}

impl ArbitraryNumberImputer {
    pub fn new(columns: Vec<String>, number: f64) -> Self {
        Self { columns, number }
    }

    /// Validates the target columns and that the fixed number is finite.
    pub async fn fit(&mut self, df: &DataFrame) -> StoreFeaturesResult<()> {
        validate_columns(df, &self.columns)?;
        if !self.number.is_finite() {
            return Err(StoreFeaturesError::InvalidParameter(format!(
                "Fixed number {} must be finite",
                self.number
            )));
        }
        Ok(())
    }

    pub fn transform(&self, df: DataFrame) -> StoreFeaturesResult<DataFrame> {
        validate_columns(&df, &self.columns)?;
        apply_imputation(df, &self.columns, |_| Some(lit(self.number)))
    }

    fn inherent_is_stateful(&self) -> bool {
        false
    }
}

impl_transformer!(MeanImputer);
impl_transformer!(ArbitraryNumberImputer);
