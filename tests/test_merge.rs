use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::logical_expr::ident;
use datafusion::prelude::*;
use store_features::exceptions::StoreFeaturesError;
use store_features::merge::merge_on_key;

async fn create_df(name: &str, fields: Vec<Field>, columns: Vec<ArrayRef>) -> DataFrame {
    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();
    let mem_table = MemTable::try_new(schema, vec![vec![batch]]).unwrap();
    let ctx = SessionContext::new();
    ctx.register_table(name, Arc::new(mem_table)).unwrap();
    ctx.table(name).await.unwrap()
}

async fn create_rows() -> DataFrame {
    create_df(
        "rows",
        vec![
            Field::new("Store", DataType::Int32, false),
            Field::new("Sales", DataType::Float64, false),
        ],
        vec![
            Arc::new(Int32Array::from(vec![1, 2, 1, 3])),
            Arc::new(Float64Array::from(vec![10.0, 20.0, 30.0, 40.0])),
        ],
    )
    .await
}

async fn create_stores(ids: Vec<i32>, values: Vec<f64>, value_name: &str) -> DataFrame {
    create_df(
        "stores",
        vec![
            Field::new("Store", DataType::Int32, false),
            Field::new(value_name, DataType::Float64, false),
        ],
        vec![
            Arc::new(Int32Array::from(ids)),
            Arc::new(Float64Array::from(values)),
        ],
    )
    .await
}

#[tokio::test]
async fn test_merge_keeps_row_count_and_single_key() {
    let rows = create_rows().await;
    let stores = create_stores(vec![1, 2, 3], vec![0.5, 0.7, 0.9], "MeanSales").await;
    let merged = merge_on_key(rows, stores, "Store", "data_train")
        .await
        .unwrap();

    let names: Vec<String> = merged
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect();
    assert_eq!(names, vec!["Store", "Sales", "MeanSales"]);

    let sorted = merged
        .sort(vec![ident("Sales").sort(true, true)])
        .unwrap()
        .collect()
        .await
        .unwrap();
    let batch = arrow::compute::concat_batches(&sorted[0].schema(), &sorted).unwrap();
    assert_eq!(batch.num_rows(), 4);
    let means = batch
        .column(2)
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap();
    assert_eq!(means.null_count(), 0);
    assert_eq!(means.values().to_vec(), vec![0.5, 0.7, 0.5, 0.9]);
}

#[tokio::test]
async fn test_missing_right_keys_are_rejected() {
    let rows = create_rows().await;
    // Store 3 has no metadata row.
    let stores = create_stores(vec![1, 2], vec![0.5, 0.7], "MeanSales").await;
    let result = merge_on_key(rows, stores, "Store", "data_test").await;
    match result {
        Err(StoreFeaturesError::RowCountMismatch {
            table,
            expected,
            actual,
        }) => {
            assert_eq!(table, "data_test");
            assert_eq!(expected, 4);
            assert_eq!(actual, 3);
        }
        other => panic!("Expected RowCountMismatch, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_duplicate_right_keys_are_rejected() {
    let rows = create_rows().await;
    let stores = create_stores(vec![1, 1, 2, 3], vec![0.5, 0.6, 0.7, 0.9], "MeanSales").await;
    let result = merge_on_key(rows, stores, "Store", "data_train").await;
    match result {
        Err(StoreFeaturesError::RowCountMismatch {
            table,
            expected,
            actual,
        }) => {
            assert_eq!(table, "data_train");
            assert_eq!(expected, 4);
            assert_eq!(actual, 6);
        }
        other => panic!("Expected RowCountMismatch, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_shared_column_is_rejected() {
    let rows = create_rows().await;
    let stores = create_stores(vec![1, 2], vec![0.5, 0.7], "Sales").await;
    let result = merge_on_key(rows, stores, "Store", "data_train").await;
    assert!(matches!(result, Err(StoreFeaturesError::InvalidParameter(_))));
}

#[tokio::test]
async fn test_missing_key_is_rejected() {
    let rows = create_rows().await;
    let stores = create_stores(vec![1, 2], vec![0.5, 0.7], "MeanSales").await;
    let result = merge_on_key(rows, stores, "Id", "data_test").await;
    assert!(matches!(result, Err(StoreFeaturesError::MissingColumn(_))));
}
