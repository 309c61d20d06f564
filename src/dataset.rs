//! ## Store feature build
//!
//! This module wires the transformers into the full batch build:
//!
//! 1. load the sales history, the forecast targets and the store metadata;
//! 2. derive calendar columns and one-hot indicators for both row tables;
//! 3. give the forecast table every column of the history table;
//! 4. one-hot and code the store categories, code `StateHoliday`;
//! 5. compute the per-store mean features;
//! 6. fill missing values and scale `CompetitionDistance`;
//! 7. merge store metadata and mean features onto both row tables;
//! 8. write `data_train`, `data_test` and `data_store`.
//!
//! Every stage returns new DataFrames; nothing is written unless all merges kept their row counts.

use crate::exceptions::StoreFeaturesResult;
use crate::io::{load_table, store_schema, test_schema, train_schema, write_table};
use crate::make_pipeline;
use crate::merge::merge_on_key;
use crate::settings::PipelineConfig;
use crate::transformers::categorical_encoding::{
    LookupEncoder, OneHotEncoder, ASSORTMENT_CODES, STATE_HOLIDAY_CODES, STORE_TYPE_CODES,
};
use crate::transformers::datetime::CalendarFeatures;
use crate::transformers::imputation::{ArbitraryNumberImputer, MeanImputer};
use crate::transformers::mean_features::compute_mean_features;
use crate::transformers::scaling::MinMaxScaler;
use crate::transformers::schema::reconcile_schema;
use datafusion::prelude::*;
use tracing::info;

/// Name of the join key shared by all tables.
pub const STORE_KEY: &str = "Store";
/// Output table names.
pub const TRAIN_TABLE: &str = "data_train";
pub const TEST_TABLE: &str = "data_test";
pub const STORE_TABLE: &str = "data_store";

/// Row-level columns expanded into indicators in both row tables.
const ROW_DUMMY_COLUMNS: [&str; 5] = ["StateHoliday", "WeekOfMonth", "Year", "Month", "DayOfWeek"];
/// Store columns expanded into indicators.
const STORE_DUMMY_COLUMNS: [&str; 2] = ["Assortment", "StoreType"];

fn names(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

/// The three tables of a build, raw or enriched.
#[derive(Clone)]
pub struct FeatureTables {
    pub train: DataFrame,
    pub test: DataFrame,
    pub store: DataFrame,
}

/// Row counts of the written tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
    pub train_rows: usize,
    pub test_rows: usize,
    pub store_rows: usize,
}

/// Loads the raw input files named by `config`.
pub async fn load_tables(
    ctx: &SessionContext,
    config: &PipelineConfig,
) -> StoreFeaturesResult<FeatureTables> {
    info!(dir = %config.data_dir.display(), "loading data");
    Ok(FeatureTables {
        train: load_table(ctx, &config.train_path(), &train_schema()).await?,
        test: load_table(ctx, &config.test_path(), &test_schema()).await?,
        store: load_table(ctx, &config.store_path(), &store_schema()).await?,
    })
}

/// Calendar columns and row-level indicators. Indicators are learned per table.
async fn row_features(df: &DataFrame) -> StoreFeaturesResult<DataFrame> {
    let mut pipeline = make_pipeline!(true,
        ("calendar", CalendarFeatures::new("Date")),
        ("dummies", OneHotEncoder::new(names(&ROW_DUMMY_COLUMNS)).with_dummy_na()),
    );
    pipeline.fit_transform(df).await
}

async fn encode_state_holiday(df: &DataFrame) -> StoreFeaturesResult<DataFrame> {
    let mut pipeline = make_pipeline!(true,
        ("state_holiday", LookupEncoder::new("StateHoliday", &STATE_HOLIDAY_CODES)),
    );
    pipeline.fit_transform(df).await
}

/// Runs every transformation stage on the raw tables and returns the merged tables.
pub async fn enrich(
    raw: FeatureTables,
    config: &PipelineConfig,
) -> StoreFeaturesResult<FeatureTables> {
    info!("adding calendar features");
    let train = row_features(&raw.train).await?;
    let test = row_features(&raw.test).await?;

    info!("reconciling forecast columns");
    let test = reconcile_schema(&train, test, config.reconcile_fill)?;

    info!("encoding categories");
    let mut store_pipeline = make_pipeline!(true,
        ("dummies", OneHotEncoder::new(names(&STORE_DUMMY_COLUMNS)).with_dummy_na()),
        ("assortment", LookupEncoder::new("Assortment", &ASSORTMENT_CODES)),
        ("store_type", LookupEncoder::new("StoreType", &STORE_TYPE_CODES)),
    );
    let store = store_pipeline.fit_transform(&raw.store).await?;
    let train = encode_state_holiday(&train).await?;
    let test = encode_state_holiday(&test).await?;

    info!("computing mean features");
    let means = compute_mean_features(&train, &store).await?;

    info!("handling missing values and normalizing");
    let distance = names(&["CompetitionDistance"]);
    let mut store_pipeline = make_pipeline!(true,
        ("impute_distance", MeanImputer::new(distance.clone())),
        ("scale_distance", MinMaxScaler::new(distance)),
    );
    let store = store_pipeline.fit_transform(&store).await?;
    let mut test_pipeline = make_pipeline!(true,
        ("impute_open", ArbitraryNumberImputer::new(names(&["Open"]), config.open_fill)),
    );
    let test = test_pipeline.fit_transform(&test).await?;

    info!("merging tables");
    let store = merge_on_key(store, means, STORE_KEY, STORE_TABLE).await?;
    let train = merge_on_key(train, store.clone(), STORE_KEY, TRAIN_TABLE).await?;
    let test = merge_on_key(test, store.clone(), STORE_KEY, TEST_TABLE).await?;
    Ok(FeatureTables { train, test, store })
}

/// Writes the enriched tables as Parquet files into the output directory.
pub async fn write_tables(
    tables: FeatureTables,
    config: &PipelineConfig,
) -> StoreFeaturesResult<BuildSummary> {
    std::fs::create_dir_all(&config.output_dir)?;
    info!(dir = %config.output_dir.display(), "storing data");
    Ok(BuildSummary {
        train_rows: write_table(tables.train, &config.output_path(TRAIN_TABLE)).await?,
        test_rows: write_table(tables.test, &config.output_path(TEST_TABLE)).await?,
        store_rows: write_table(tables.store, &config.output_path(STORE_TABLE)).await?,
    })
}

/// Loads, enriches and writes the three tables.
pub async fn build_features(config: &PipelineConfig) -> StoreFeaturesResult<BuildSummary> {
    let ctx = SessionContext::new();
    let raw = load_tables(&ctx, config).await?;
    let enriched = enrich(raw, config).await?;
    let summary = write_tables(enriched, config).await?;
    info!(?summary, "done");
    Ok(summary)
}
