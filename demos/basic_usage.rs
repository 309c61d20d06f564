// Put train.csv, test.csv and store.csv into `data/` before running this example
// Run `cargo run --example basic_usage` to execute this example

use std::error::Error;
use datafusion::prelude::*;
use store_features::dataset::{build_features, STORE_TABLE};
use store_features::settings::PipelineConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = PipelineConfig::default();

    // Load, enrich and write the three tables
    let summary = build_features(&config).await?;
    println!("{:?}", summary);

    // Show the first 5 rows of the enriched store table
    let path = config.output_path(STORE_TABLE);
    let ctx = SessionContext::new();
    let store_df = ctx
        .read_parquet(path.to_string_lossy().as_ref(), ParquetReadOptions::default())
        .await?;
    store_df.limit(0, Some(5))?.show().await?;

    Ok(())
}
