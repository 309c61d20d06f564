use std::sync::Arc;

use approx::assert_abs_diff_eq;
use arrow::array::{Array, ArrayRef, Float32Array, Int8Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::*;
use store_features::exceptions::StoreFeaturesError;
use store_features::transformers::imputation::{ArbitraryNumberImputer, MeanImputer};

/// Helper function to create a DataFrame with a Float32 column "distance" and an Int8 column "open".
async fn create_missing_df() -> DataFrame {
    let schema = Arc::new(Schema::new(vec![
        Field::new("distance", DataType::Float32, true),
        Field::new("open", DataType::Int8, true),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Float32Array::from(vec![Some(100.0), None, Some(300.0)])) as ArrayRef,
            Arc::new(Int8Array::from(vec![Some(0), None, Some(1)])) as ArrayRef,
        ],
    )
    .unwrap();
    let mem_table = MemTable::try_new(schema, vec![vec![batch]]).unwrap();
    let ctx = SessionContext::new();
    ctx.register_table("missing", Arc::new(mem_table)).unwrap();
    ctx.table("missing").await.unwrap()
}

#[tokio::test]
async fn test_mean_imputer_keeps_float32() {
    let df = create_missing_df().await;
    let mut imputer = MeanImputer::new(vec!["distance".to_string()]);
    imputer.fit(&df).await.unwrap();
    assert_abs_diff_eq!(imputer.impute_values["distance"], 200.0, epsilon = 1e-9);

    let transformed = imputer.transform(df).unwrap();
    let field = transformed
        .schema()
        .field_with_name(None, "distance")
        .unwrap();
    assert_eq!(field.data_type(), &DataType::Float32);

    let batches = transformed.collect().await.unwrap();
    let distance = batches[0]
        .column(0)
        .as_any()
        .downcast_ref::<Float32Array>()
        .unwrap();
    assert_eq!(distance.null_count(), 0);
    assert_abs_diff_eq!(distance.value(0), 100.0_f32);
    assert_abs_diff_eq!(distance.value(1), 200.0_f32);
    assert_abs_diff_eq!(distance.value(2), 300.0_f32);
}

#[tokio::test]
async fn test_arbitrary_number_imputer_keeps_int8() {
    let df = create_missing_df().await;
    let mut imputer = ArbitraryNumberImputer::new(vec!["open".to_string()], 1.0);
    imputer.fit(&df).await.unwrap();
    let transformed = imputer.transform(df).unwrap();
    let field = transformed.schema().field_with_name(None, "open").unwrap();
    assert_eq!(field.data_type(), &DataType::Int8);

    let batches = transformed.collect().await.unwrap();
    let open = batches[0]
        .column(1)
        .as_any()
        .downcast_ref::<Int8Array>()
        .unwrap();
    assert_eq!(open.values().to_vec(), vec![0, 1, 1]);
    // Untouched column still has its gap.
    assert_eq!(batches[0].column(0).null_count(), 1);
}

#[tokio::test]
async fn test_arbitrary_number_must_be_finite() {
    let df = create_missing_df().await;
    let mut imputer = ArbitraryNumberImputer::new(vec!["open".to_string()], f64::NAN);
    let result = imputer.fit(&df).await;
    assert!(matches!(result, Err(StoreFeaturesError::InvalidParameter(_))));
}

#[tokio::test]
async fn test_mean_imputer_transform_before_fit() {
    let df = create_missing_df().await;
    let imputer = MeanImputer::new(vec!["distance".to_string()]);
    let result = imputer.transform(df);
    assert!(matches!(result, Err(StoreFeaturesError::FitNotCalled)));
}

#[tokio::test]
async fn test_imputer_missing_column() {
    let df = create_missing_df().await;
    let mut imputer = MeanImputer::new(vec!["CompetitionDistance".to_string()]);
    let result = imputer.fit(&df).await;
    assert!(matches!(result, Err(StoreFeaturesError::MissingColumn(_))));
}
