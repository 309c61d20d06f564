//! # Categorical Encoding Transformers
//!
//! This module turns the categorical columns of the sales and store tables into numeric ones.
//!
//! The encoders include:
//! - **OneHotEncoder:** Expands each categorical column into binary indicator columns, one per
//!   distinct category found in the data (plus an optional `<col>_nan` indicator for nulls).
//! - **LookupEncoder:** Replaces each value with an integer code from an explicit, closed table.
//!   Values outside the table are rejected during `fit`.
//!
//! Both accept string and integer columns; values are compared through their string form.

use crate::exceptions::{StoreFeaturesError, StoreFeaturesResult};
use crate::impl_transformer;
use arrow::array::{Array, StringArray};
use arrow::datatypes::DataType;
use datafusion::logical_expr::{cast, ident, lit, Case as DFCase, Expr};
use datafusion::prelude::*;
use datafusion::scalar::ScalarValue;
use std::collections::HashMap;

/// `StateHoliday` codes: no holiday, public holiday, Easter, Christmas.
pub const STATE_HOLIDAY_CODES: [(&str, i8); 4] = [("0", 0), ("a", 1), ("b", 2), ("c", 3)];
/// `Assortment` codes: basic, extra, extended.
pub const ASSORTMENT_CODES: [(&str, i8); 3] = [("a", 0), ("b", 1), ("c", 2)];
/// `StoreType` codes.
pub const STORE_TYPE_CODES: [(&str, i8); 4] = [("a", 0), ("b", 1), ("c", 2), ("d", 3)];

/// Helper to build a CASE WHEN expression given a mapping from category strings to values.
/// For each pair, the expression generated is:
/// `WHEN CAST(<col> AS Utf8) = lit(<category>) THEN lit(<encoded_value>)`
/// `default` is used as the ELSE branch.
fn build_case_expr<T: Clone + 'static + datafusion::logical_expr::Literal>(
    col_name: &str,
    mapping: &[(String, T)],
    default: Expr,
) -> Expr {
    let when_then_expr = mapping
        .iter()
        .map(|(cat, val)| {
            (
                Box::new(as_text(col_name).eq(lit(cat.clone()))),
                Box::new(lit(val.clone())),
            )
        })
        .collect();
    Expr::Case(DFCase {
        expr: None,
        when_then_expr,
        else_expr: Some(Box::new(default)),
    })
}

/// The column viewed as text, so integer and string categories share one code path.
fn as_text(col_name: &str) -> Expr {
    cast(ident(col_name), DataType::Utf8)
}

fn validate_column(df: &DataFrame, col_name: &str) -> StoreFeaturesResult<()> {
    df.schema().field_with_name(None, col_name).map_err(|_| {
        StoreFeaturesError::MissingColumn(format!("Column '{}' not found", col_name))
    })?;
    Ok(())
}

/// Distinct values of a column in their string form, and whether the column holds nulls.
async fn extract_distinct_values(
    df: &DataFrame,
    col_name: &str,
) -> StoreFeaturesResult<(Vec<String>, bool)> {
    validate_column(df, col_name)?;
    let distinct_df = df
        .clone()
        .select(vec![as_text(col_name).alias(col_name)])?
        .distinct()?;
    let batches = distinct_df.collect().await?;
    let mut values = Vec::new();
    let mut has_null = false;
    for batch in batches {
        let array = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| {
                StoreFeaturesError::DataFusionError(datafusion::error::DataFusionError::Plan(
                    format!("Expected Utf8 array for column {}", col_name),
                ))
            })?;
        for i in 0..array.len() {
            if array.is_null(i) {
                has_null = true;
            } else {
                values.push(array.value(i).to_string());
            }
        }
    }
    Ok((values, has_null))
}

/// Orders categories numerically when they parse as integers, lexically otherwise.
fn sort_categories(values: &mut [String]) {
    values.sort_by_key(|v| match v.parse::<i64>() {
        Ok(n) => (0, n, String::new()),
        Err(_) => (1, 0, v.clone()),
    });
}

/// ------------------------- OneHotEncoder -------------------------
///
/// OneHotEncoder adds an Int8 indicator column per distinct category of each target column.
/// The new column names are the original column name, an underscore, and the category value.
/// With `dummy_na`, a `<col>_nan` column flags null values. The category set is learned from the
/// table the encoder is fitted on, so two tables can end up with different columns; see
/// [`crate::transformers::schema::SchemaReconciler`].
pub struct OneHotEncoder {
    pub columns: Vec<String>,
    pub dummy_na: bool,
    /// Mapping from column name to its sorted distinct category values.
    pub categories: HashMap<String, Vec<String>>,
}

impl OneHotEncoder {
    /// Create a new OneHotEncoder for the specified columns.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            dummy_na: false,
            categories: HashMap::new(),
        }
    }

    /// Also emit a `<col>_nan` indicator for every target column.
    pub fn with_dummy_na(mut self) -> Self {
        self.dummy_na = true;
        self
    }

    /// Names of the indicator columns the encoder produces, in output order.
    pub fn output_columns(&self) -> Vec<String> {
        let mut names = Vec::new();
        for col_name in &self.columns {
            if let Some(cats) = self.categories.get(col_name) {
                names.extend(cats.iter().map(|cat| format!("{}_{}", col_name, cat)));
            }
            if self.dummy_na {
                names.push(format!("{}_nan", col_name));
            }
        }
        names
    }

    /// Learn distinct category values for each target column.
    pub async fn fit(&mut self, df: &DataFrame) -> StoreFeaturesResult<()> {
        for col_name in &self.columns {
            let (mut values, _) = extract_distinct_values(df, col_name).await?;
            sort_categories(&mut values);
            self.categories.insert(col_name.clone(), values);
        }
        Ok(())
    }

    /// Transform the DataFrame by adding the indicator columns.
    pub fn transform(&self, df: DataFrame) -> StoreFeaturesResult<DataFrame> {
        let mut exprs: Vec<Expr> = df.schema().fields().iter().map(|f| ident(f.name())).collect();
        for col_name in &self.columns {
            let cats = self
                .categories
                .get(col_name)
                .ok_or(StoreFeaturesError::FitNotCalled)?;
            validate_column(&df, col_name)?;
            for cat in cats {
                let indicator =
                    build_case_expr(col_name, &[(cat.clone(), 1_i8)], lit(0_i8));
                exprs.push(indicator.alias(format!("{}_{}", col_name, cat)));
            }
            if self.dummy_na {
                let indicator = Expr::Case(DFCase {
                    expr: None,
                    when_then_expr: vec![(Box::new(ident(col_name).is_null()), Box::new(lit(1_i8)))],
                    else_expr: Some(Box::new(lit(0_i8))),
                });
                exprs.push(indicator.alias(format!("{}_nan", col_name)));
            }
        }
        df.select(exprs).map_err(StoreFeaturesError::from)
    }

    fn inherent_is_stateful(&self) -> bool {
        true
    }
}

/// ------------------------- LookupEncoder -------------------------
///
/// LookupEncoder replaces a column with Int8 codes taken from a fixed table. The table is
/// never inferred from data: `fit` fails with [`StoreFeaturesError::UnknownCategory`] on the first
/// value (null included) that the table does not contain.
pub struct LookupEncoder {
    pub column: String,
    pub mapping: Vec<(String, i8)>,
}

impl LookupEncoder {
    pub fn new(column: impl Into<String>, mapping: &[(&str, i8)]) -> Self {
        Self {
            column: column.into(),
            mapping: mapping
                .iter()
                .map(|(value, code)| (value.to_string(), *code))
                .collect(),
        }
    }

    /// Code for a single value, if the table knows it.
    pub fn code_of(&self, value: &str) -> Option<i8> {
        self.mapping
            .iter()
            .find(|(known, _)| known == value)
            .map(|(_, code)| *code)
    }

    /// Checks every distinct value of the column against the table.
    pub async fn fit(&mut self, df: &DataFrame) -> StoreFeaturesResult<()> {
        let (mut values, has_null) = extract_distinct_values(df, &self.column).await?;
        if has_null {
            return Err(StoreFeaturesError::UnknownCategory {
                column: self.column.clone(),
                value: "null".to_string(),
            });
        }
        sort_categories(&mut values);
        if let Some(unknown) = values.into_iter().find(|v| self.code_of(v).is_none()) {
            return Err(StoreFeaturesError::UnknownCategory {
                column: self.column.clone(),
                value: unknown,
            });
        }
        Ok(())
    }

    /// Replaces the column with its codes, keeping the column position.
    pub fn transform(&self, df: DataFrame) -> StoreFeaturesResult<DataFrame> {
        validate_column(&df, &self.column)?;
        let exprs: Vec<Expr> = df
            .schema()
            .fields()
            .iter()
            .map(|field| {
                let name = field.name();
                if *name == self.column {
                    let codes = build_case_expr(name, &self.mapping, lit(ScalarValue::Int8(None)));
                    cast(codes, DataType::Int8).alias(name)
                } else {
                    ident(name)
                }
            })
            .collect();
        df.select(exprs).map_err(StoreFeaturesError::from)
    }

    // The table is fixed; fit only validates.
    fn inherent_is_stateful(&self) -> bool {
        false
    }
}

impl_transformer!(OneHotEncoder);
impl_transformer!(LookupEncoder);
