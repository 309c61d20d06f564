//! ## Calendar Feature Transformers
//!
//! This module derives the calendar columns used by the store feature build from a date column.
//!
//! ### Available Transformers
//!
//! - [`CalendarFeatures`]: Appends `Year` (a small code from a closed lookup of known years),
//!   `Month` (1-12) and `WeekOfMonth` columns.
//!
//! `WeekOfMonth` is `ceil((day_of_month + weekday_of_first_of_month) / 7)` where the weekday of the
//! first of the month counts Monday as 0 and Sunday as 6. Downstream one-hot expansion relies on
//! this exact output domain.
//!
//! Errors are returned as [`StoreFeaturesError`], and results are wrapped in [`StoreFeaturesResult`].

use crate::exceptions::{StoreFeaturesError, StoreFeaturesResult};
use crate::impl_transformer;
use arrow::array::{Array, Int64Array};
use datafusion::arrow::datatypes::DataType;
use datafusion::dataframe::DataFrame;
use datafusion_expr::{cast, ident, lit, Case as DFCase, Expr};
use datafusion::scalar::ScalarValue;
use datafusion_functions::datetime::date_part;
use tracing::debug;

/// Year codes of the sales history. The lookup is closed: any other year is rejected.
pub const DEFAULT_YEAR_CODES: [(i64, i8); 3] = [(2013, 1), (2014, 2), (2015, 3)];

/// Validates that a column exists and is of a datetime type (Timestamp, Date32, or Date64).
fn validate_datetime_column(df: &DataFrame, col_name: &str) -> StoreFeaturesResult<()> {
    let field = df.schema().field_with_name(None, col_name).map_err(|_| {
        StoreFeaturesError::MissingColumn(format!("Column '{}' not found", col_name))
    })?;
    match field.data_type() {
        DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64 => Ok(()),
        dt => Err(StoreFeaturesError::InvalidParameter(format!(
            "Column '{}' must be a datetime type (Timestamp, Date32, or Date64), but found {:?}",
            col_name, dt
        ))),
    }
}

/// Extracts a date part as Int64 so the calendar arithmetic stays in integers.
fn part_expr(part: &str, base: Expr) -> Expr {
    cast(date_part().call(vec![lit(part), base]), DataType::Int64)
}

/// Week of month for a date column.
///
/// `date_part('dow')` counts Sunday as 0, so it is shifted to a Monday-based weekday first. The
/// weekday of the first of the month is recovered by stepping back `day - 1` days modulo 7.
pub fn week_of_month_expr(base: Expr) -> Expr {
    let day = part_expr("day", base.clone());
    let weekday = (part_expr("dow", base) + lit(6_i64)) % lit(7_i64);
    let first_weekday =
        ((weekday - (day.clone() - lit(1_i64))) % lit(7_i64) + lit(7_i64)) % lit(7_i64);
    // Integer ceil of (day + first_weekday) / 7.
    (day + first_weekday + lit(6_i64)) / lit(7_i64)
}

/// Appends `Year`, `Month` and `WeekOfMonth` derived from a date column.
///
/// `fit` scans the distinct years of the column and fails with
/// [`StoreFeaturesError::UnknownCategory`] on a year outside the lookup, so a pipeline stops
/// before any plan using the codes is executed. `transform` refuses to run on an unvalidated
/// transformer.
pub struct CalendarFeatures {
    pub column: String,
    pub year_codes: Vec<(i64, i8)>,
    pub year_column: String,
    pub month_column: String,
    pub week_of_month_column: String,
    validated: bool,
}

impl CalendarFeatures {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            year_codes: DEFAULT_YEAR_CODES.to_vec(),
            year_column: "Year".to_string(),
            month_column: "Month".to_string(),
            week_of_month_column: "WeekOfMonth".to_string(),
            validated: false,
        }
    }

    /// Replaces the closed year lookup.
    pub fn with_year_codes(mut self, year_codes: Vec<(i64, i8)>) -> Self {
        self.year_codes = year_codes;
        self.validated = false;
        self
    }

    fn year_code_expr(&self) -> Expr {
        let year = part_expr("year", ident(&self.column));
        let when_then_expr = self
            .year_codes
            .iter()
            .map(|(year_value, code)| {
                (
                    Box::new(year.clone().eq(lit(*year_value))),
                    Box::new(lit(*code)),
                )
            })
            .collect();
        Expr::Case(DFCase {
            expr: None,
            when_then_expr,
            else_expr: Some(Box::new(lit(ScalarValue::Int8(None)))),
        })
    }

    /// Validates the date column and checks every year present against the lookup.
    pub async fn fit(&mut self, df: &DataFrame) -> StoreFeaturesResult<()> {
        validate_datetime_column(df, &self.column)?;
        let years = df
            .clone()
            .select(vec![part_expr("year", ident(&self.column)).alias("year")])?
            .distinct()?
            .collect()
            .await?;
        for batch in years {
            let array = batch
                .column(0)
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(|| {
                    StoreFeaturesError::DataFusionError(datafusion::error::DataFusionError::Plan(
                        format!("Expected Int64 years for column {}", self.column),
                    ))
                })?;
            for i in 0..array.len() {
                let value = if array.is_null(i) {
                    None
                } else {
                    Some(array.value(i))
                };
                let known = value.is_some_and(|y| self.year_codes.iter().any(|(k, _)| *k == y));
                if !known {
                    return Err(StoreFeaturesError::UnknownCategory {
                        column: self.year_column.clone(),
                        value: value.map_or_else(|| "null".to_string(), |y| y.to_string()),
                    });
                }
            }
        }
        self.validated = true;
        debug!(column = %self.column, "calendar years validated");
        Ok(())
    }

    /// Returns a new DataFrame with the original columns plus the calendar columns.
    pub fn transform(&self, df: DataFrame) -> StoreFeaturesResult<DataFrame> {
        if !self.validated {
            return Err(StoreFeaturesError::FitNotCalled);
        }
        validate_datetime_column(&df, &self.column)?;
        let mut exprs: Vec<Expr> = df.schema().fields().iter().map(|f| ident(f.name())).collect();
        let base = ident(&self.column);
        exprs.push(cast(self.year_code_expr(), DataType::Int8).alias(&self.year_column));
        exprs.push(cast(part_expr("month", base.clone()), DataType::Int8).alias(&self.month_column));
        exprs.push(cast(week_of_month_expr(base), DataType::Int8).alias(&self.week_of_month_column));
        df.select(exprs).map_err(StoreFeaturesError::from)
    }

    // Codes are only emitted for tables whose years went through fit.
    fn inherent_is_stateful(&self) -> bool {
        true
    }
}

impl_transformer!(CalendarFeatures);
