use arrow::array::{Array, ArrayRef, Date32Array, Float64Array, Int8Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::*;
use std::sync::Arc;
use store_features::exceptions::StoreFeaturesError;
use store_features::transformers::datetime::CalendarFeatures;

/// Helper function to extract an Int8 column by name.
fn extract_i8(batch: &RecordBatch, name: &str) -> Vec<i8> {
    let idx = batch.schema().index_of(name).unwrap();
    let arr = batch
        .column(idx)
        .as_any()
        .downcast_ref::<Int8Array>()
        .expect("Expected Int8Array");
    (0..arr.len()).map(|i| arr.value(i)).collect()
}

/// Create a DataFrame with one date column "Date" (days since the epoch).
async fn create_dates_df(days: Vec<Option<i32>>) -> DataFrame {
    let schema = Arc::new(Schema::new(vec![Field::new(
        "Date",
        DataType::Date32,
        true,
    )]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![Arc::new(Date32Array::from(days)) as ArrayRef],
    )
    .unwrap();
    let mem_table = MemTable::try_new(schema, vec![vec![batch]]).unwrap();

    let ctx = SessionContext::new();
    ctx.register_table("dates", Arc::new(mem_table)).unwrap();
    ctx.table("dates").await.unwrap()
}

/// ------------------ Normal Operation Tests ------------------

#[tokio::test]
async fn test_calendar_columns() {
    // Rows:
    // 2015-06-01 (Monday)
    // 2015-06-08
    // 2015-06-30
    // 2013-01-01 (Tuesday)
    // 2014-02-28 (February 2014 starts on a Saturday)
    let df = create_dates_df(vec![
        Some(16587),
        Some(16594),
        Some(16616),
        Some(15706),
        Some(16129),
    ])
    .await;
    let mut transformer = CalendarFeatures::new("Date");
    transformer.fit(&df).await.unwrap();
    let transformed_df = transformer.transform(df).unwrap();

    let names: Vec<String> = transformed_df
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect();
    assert_eq!(names, vec!["Date", "Year", "Month", "WeekOfMonth"]);

    let batches = transformed_df.collect().await.unwrap();
    let batch = &batches[0];
    assert_eq!(extract_i8(batch, "Year"), vec![3, 3, 3, 1, 2]);
    assert_eq!(extract_i8(batch, "Month"), vec![6, 6, 6, 1, 2]);
    assert_eq!(extract_i8(batch, "WeekOfMonth"), vec![1, 2, 5, 1, 5]);
}

#[tokio::test]
async fn test_week_of_month_boundaries() {
    // 2013-01-06 is the first Sunday of a month starting on Tuesday.
    // 2013-01-07 is the following Monday.
    // 2014-06-30: June 2014 starts on a Sunday, so the month spans six weeks.
    let df = create_dates_df(vec![Some(15711), Some(15712), Some(16251)]).await;
    let mut transformer = CalendarFeatures::new("Date");
    transformer.fit(&df).await.unwrap();
    let batches = transformer.transform(df).unwrap().collect().await.unwrap();
    assert_eq!(extract_i8(&batches[0], "WeekOfMonth"), vec![1, 2, 6]);
}

#[tokio::test]
async fn test_custom_year_codes() {
    let df = create_dates_df(vec![Some(16801)]).await;
    let mut transformer = CalendarFeatures::new("Date").with_year_codes(vec![(2016, 4)]);
    transformer.fit(&df).await.unwrap();
    let batches = transformer.transform(df).unwrap().collect().await.unwrap();
    assert_eq!(extract_i8(&batches[0], "Year"), vec![4]);
}

/// ------------------ Error and Edge Case Tests ------------------

#[tokio::test]
async fn test_unknown_year() {
    // 2016-01-01 is outside the default lookup.
    let df = create_dates_df(vec![Some(16587), Some(16801)]).await;
    let mut transformer = CalendarFeatures::new("Date");
    match transformer.fit(&df).await {
        Err(StoreFeaturesError::UnknownCategory { column, value }) => {
            assert_eq!(column, "Year");
            assert_eq!(value, "2016");
        }
        other => panic!("Expected UnknownCategory, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_date_is_unknown_year() {
    let df = create_dates_df(vec![Some(16587), None]).await;
    let mut transformer = CalendarFeatures::new("Date");
    let result = transformer.fit(&df).await;
    assert!(
        matches!(result, Err(StoreFeaturesError::UnknownCategory { ref value, .. }) if value == "null")
    );
}

#[tokio::test]
async fn test_missing_column() {
    let df = create_dates_df(vec![Some(16587)]).await;
    let mut transformer = CalendarFeatures::new("nonexistent");
    let result = transformer.fit(&df).await;
    assert!(
        matches!(result, Err(StoreFeaturesError::MissingColumn(_))),
        "Expected error for missing date column"
    );
}

#[tokio::test]
async fn test_invalid_type() {
    // Create a DataFrame with a column "Date" of type Float64 (not a datetime type).
    let schema = Arc::new(Schema::new(vec![Field::new(
        "Date",
        DataType::Float64,
        false,
    )]));
    let values: ArrayRef = Arc::new(Float64Array::from(vec![1.0_f64, 2.0_f64, 3.0_f64]));
    let batch = RecordBatch::try_new(schema.clone(), vec![values]).unwrap();
    let mem_table = MemTable::try_new(schema, vec![vec![batch]]).unwrap();
    let ctx = SessionContext::new();
    ctx.register_table("t", Arc::new(mem_table)).unwrap();
    let df = ctx.table("t").await.unwrap();

    let mut transformer = CalendarFeatures::new("Date");
    let result = transformer.fit(&df).await;
    assert!(
        matches!(result, Err(StoreFeaturesError::InvalidParameter(_))),
        "Expected error for non-datetime column in CalendarFeatures"
    );
}

#[tokio::test]
async fn test_transform_requires_year_validation() {
    // 2016-01-01 would get no year code, so unvalidated tables are refused.
    let df = create_dates_df(vec![Some(16801)]).await;
    let transformer = CalendarFeatures::new("Date");
    let result = transformer.transform(df);
    assert!(matches!(result, Err(StoreFeaturesError::FitNotCalled)));
}
