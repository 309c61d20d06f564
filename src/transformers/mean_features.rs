//! ## Per-store mean features
//!
//! [`MeanFeatures`] turns the sales history into one row of historical averages per store:
//!
//! - `MeanSales` and `MeanVisits`: mean sales and mean customers over all of the store's rows;
//! - `MeanDayOfWeekSales<d>`: mean sales on day-of-week `d`, for every `d` present in the history;
//! - `MeanMonthSales<m>`: mean sales in month `m`, for every `m` present in the history.
//!
//! The day and month column sets come from the values actually observed (ascending), not from a
//! fixed calendar. Stores are taken from the store table in first-occurrence order, so a store
//! without any history still gets a row; every mean over an empty set of rows is NaN and stays NaN
//! through normalization. Each feature column is then min-max scaled on its own, see
//! [`crate::transformers::scaling`] for the NaN and degenerate-column policy.
//!
//! The history is grouped once per key set (store, store and day, store and month) by DataFusion's
//! hash aggregation. The wide table is then assembled row by row, one store per rayon task.

use crate::exceptions::{StoreFeaturesError, StoreFeaturesResult};
use crate::transformers::scaling::MinMaxScaler;
use arrow::array::{Array, ArrayRef, Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::functions_aggregate::expr_fn::avg;
use datafusion::logical_expr::{cast, ident, Expr};
use datafusion::prelude::*;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

const ENTITY_KEY: &str = "__entity";
const GROUP_KEY: &str = "__key";

fn downcast<'a, T: Array + 'static>(
    batch: &'a RecordBatch,
    index: usize,
    what: &str,
) -> StoreFeaturesResult<&'a T> {
    batch.column(index).as_any().downcast_ref::<T>().ok_or_else(|| {
        StoreFeaturesError::DataFusionError(datafusion::error::DataFusionError::Plan(format!(
            "Unexpected array type for {}",
            what
        )))
    })
}

fn value_or_nan(array: &Float64Array, i: usize) -> f64 {
    if array.is_null(i) {
        f64::NAN
    } else {
        array.value(i)
    }
}

fn validate_column(df: &DataFrame, col_name: &str) -> StoreFeaturesResult<()> {
    df.schema().field_with_name(None, col_name).map_err(|_| {
        StoreFeaturesError::MissingColumn(format!("Column '{}' not found", col_name))
    })?;
    Ok(())
}

/// Means of the primary quantity keyed by (entity, key), plus every key value observed.
#[derive(Debug, Default)]
struct ConditionalMeans {
    keys: BTreeSet<i64>,
    means: HashMap<(i64, i64), f64>,
}

impl ConditionalMeans {
    fn get(&self, entity: i64, key: i64) -> f64 {
        self.means.get(&(entity, key)).copied().unwrap_or(f64::NAN)
    }
}

/// Computes per-entity mean features from an observation table and an entity table.
pub struct MeanFeatures {
    pub entity_column: String,
    pub day_column: String,
    pub month_column: String,
    pub primary_column: String,
    pub secondary_column: String,
    pub primary_mean_name: String,
    pub secondary_mean_name: String,
    pub day_prefix: String,
    pub month_prefix: String,
    pub normalize: bool,
}

impl Default for MeanFeatures {
    fn default() -> Self {
        Self {
            entity_column: "Store".to_string(),
            day_column: "DayOfWeek".to_string(),
            month_column: "Month".to_string(),
            primary_column: "Sales".to_string(),
            secondary_column: "Customers".to_string(),
            primary_mean_name: "MeanSales".to_string(),
            secondary_mean_name: "MeanVisits".to_string(),
            day_prefix: "MeanDayOfWeekSales".to_string(),
            month_prefix: "MeanMonthSales".to_string(),
            normalize: true,
        }
    }
}

impl MeanFeatures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps the raw means instead of min-max scaled ones.
    pub fn without_normalization(mut self) -> Self {
        self.normalize = false;
        self
    }

    pub fn day_column_name(&self, day: i64) -> String {
        format!("{}{}", self.day_prefix, day)
    }

    pub fn month_column_name(&self, month: i64) -> String {
        format!("{}{}", self.month_prefix, month)
    }

    /// Feature column names for the given day and month values, in output order.
    ///
    /// Fails when two groups would produce the same name, e.g. with equal prefixes.
    pub fn feature_columns(&self, days: &[i64], months: &[i64]) -> StoreFeaturesResult<Vec<String>> {
        let mut names = vec![
            self.primary_mean_name.clone(),
            self.secondary_mean_name.clone(),
        ];
        names.extend(days.iter().map(|d| self.day_column_name(*d)));
        names.extend(months.iter().map(|m| self.month_column_name(*m)));
        let mut seen = HashSet::new();
        seen.insert(self.entity_column.as_str());
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(StoreFeaturesError::InvalidParameter(format!(
                    "Mean feature column '{}' is produced twice",
                    name
                )));
            }
        }
        Ok(names)
    }

    /// Distinct entity IDs of the entity table in first-occurrence order. Null IDs are skipped.
    async fn entity_ids(&self, entities: &DataFrame) -> StoreFeaturesResult<Vec<i64>> {
        let batches = entities
            .clone()
            .select(vec![cast(ident(&self.entity_column), DataType::Int64).alias(ENTITY_KEY)])?
            .collect()
            .await?;
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for batch in &batches {
            let array = downcast::<Int64Array>(batch, 0, &self.entity_column)?;
            for i in 0..array.len() {
                if !array.is_null(i) && seen.insert(array.value(i)) {
                    ids.push(array.value(i));
                }
            }
        }
        Ok(ids)
    }

    fn entity_key(&self) -> Expr {
        cast(ident(&self.entity_column), DataType::Int64).alias(ENTITY_KEY)
    }

    fn mean_of(&self, column: &str, alias: &str) -> Expr {
        avg(cast(ident(column), DataType::Float64)).alias(alias)
    }

    /// Overall (primary, secondary) means per entity.
    async fn base_means(
        &self,
        observations: &DataFrame,
    ) -> StoreFeaturesResult<HashMap<i64, (f64, f64)>> {
        let batches = observations
            .clone()
            .aggregate(
                vec![self.entity_key()],
                vec![
                    self.mean_of(&self.primary_column, "primary"),
                    self.mean_of(&self.secondary_column, "secondary"),
                ],
            )?
            .collect()
            .await?;
        let mut means = HashMap::new();
        for batch in &batches {
            let entity = downcast::<Int64Array>(batch, 0, &self.entity_column)?;
            let primary = downcast::<Float64Array>(batch, 1, &self.primary_column)?;
            let secondary = downcast::<Float64Array>(batch, 2, &self.secondary_column)?;
            for i in 0..batch.num_rows() {
                if entity.is_null(i) {
                    continue;
                }
                means.insert(
                    entity.value(i),
                    (value_or_nan(primary, i), value_or_nan(secondary, i)),
                );
            }
        }
        Ok(means)
    }

    /// Primary-quantity means per (entity, value of `key_column`).
    async fn conditional_means(
        &self,
        observations: &DataFrame,
        key_column: &str,
    ) -> StoreFeaturesResult<ConditionalMeans> {
        let batches = observations
            .clone()
            .aggregate(
                vec![
                    self.entity_key(),
                    cast(ident(key_column), DataType::Int64).alias(GROUP_KEY),
                ],
                vec![self.mean_of(&self.primary_column, "primary")],
            )?
            .collect()
            .await?;
        let mut grouped = ConditionalMeans::default();
        for batch in &batches {
            let entity = downcast::<Int64Array>(batch, 0, &self.entity_column)?;
            let key = downcast::<Int64Array>(batch, 1, key_column)?;
            let primary = downcast::<Float64Array>(batch, 2, &self.primary_column)?;
            for i in 0..batch.num_rows() {
                if key.is_null(i) {
                    continue;
                }
                // Keys seen on rows without an entity still define a column.
                grouped.keys.insert(key.value(i));
                if !entity.is_null(i) {
                    grouped
                        .means
                        .insert((entity.value(i), key.value(i)), value_or_nan(primary, i));
                }
            }
        }
        Ok(grouped)
    }

    /// Builds the mean-feature table: one row per distinct entity of `entities`.
    pub async fn compute(
        &self,
        observations: &DataFrame,
        entities: &DataFrame,
    ) -> StoreFeaturesResult<DataFrame> {
        for name in [
            &self.entity_column,
            &self.day_column,
            &self.month_column,
            &self.primary_column,
            &self.secondary_column,
        ] {
            validate_column(observations, name)?;
        }
        validate_column(entities, &self.entity_column)?;
        let entity_type = entities
            .schema()
            .field_with_name(None, &self.entity_column)?
            .data_type()
            .clone();

        let ids = self.entity_ids(entities).await?;
        let base = self.base_means(observations).await?;
        let by_day = self.conditional_means(observations, &self.day_column).await?;
        let by_month = self.conditional_means(observations, &self.month_column).await?;

        let days: Vec<i64> = by_day.keys.iter().copied().collect();
        let months: Vec<i64> = by_month.keys.iter().copied().collect();
        let names = self.feature_columns(&days, &months)?;
        info!(
            entities = ids.len(),
            days = days.len(),
            months = months.len(),
            "computing mean features"
        );

        let rows: Vec<Vec<f64>> = ids
            .par_iter()
            .map(|&entity| {
                let (primary, secondary) =
                    base.get(&entity).copied().unwrap_or((f64::NAN, f64::NAN));
                let mut row = Vec::with_capacity(names.len());
                row.push(primary);
                row.push(secondary);
                row.extend(days.iter().map(|&d| by_day.get(entity, d)));
                row.extend(months.iter().map(|&m| by_month.get(entity, m)));
                row
            })
            .collect();

        let mut fields = vec![Field::new(&self.entity_column, DataType::Int64, false)];
        let mut columns: Vec<ArrayRef> = vec![Arc::new(Int64Array::from(ids))];
        for (j, name) in names.iter().enumerate() {
            fields.push(Field::new(name, DataType::Float64, true));
            let values = Float64Array::from_iter_values(rows.iter().map(|row| row[j]));
            columns.push(Arc::new(values));
        }
        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;

        let mut exprs = vec![cast(ident(&self.entity_column), entity_type).alias(&self.entity_column)];
        exprs.extend(names.iter().map(|name| ident(name)));
        let table = SessionContext::new().read_batch(batch)?.select(exprs)?;

        if !self.normalize {
            return Ok(table);
        }
        let mut scaler = MinMaxScaler::new(names);
        scaler.fit(&table).await?;
        debug!("normalized mean feature columns");
        scaler.transform(table)
    }
}

/// Mean features of the sales history (`Store`, `DayOfWeek`, `Month`, `Sales`, `Customers`) for
/// every store of the store table, normalized.
pub async fn compute_mean_features(
    observations: &DataFrame,
    entities: &DataFrame,
) -> StoreFeaturesResult<DataFrame> {
    MeanFeatures::default().compute(observations, entities).await
}
