// Run `cargo run --features binaries --bin build-features -- [DATA_DIR]`
// DATA_DIR must contain train.csv, test.csv and store.csv (defaults to `data`).

use std::error::Error;
use store_features::dataset::build_features;
use store_features::settings::PipelineConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let mut config = PipelineConfig::default();
    if let Some(dir) = std::env::args().nth(1) {
        config = config.with_data_dir(dir);
    }
    let summary = build_features(&config).await?;
    println!(
        "Wrote {} training rows, {} forecast rows and {} store rows to {}",
        summary.train_rows,
        summary.test_rows,
        summary.store_rows,
        config.output_dir.display()
    );
    Ok(())
}
