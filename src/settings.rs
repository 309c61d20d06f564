//! ## Pipeline Settings
//!
//! [`PipelineConfig`] holds the fixed locations and fill values used by
//! [`crate::dataset::build_features`]. The defaults describe the standard layout: the three raw
//! CSV files live in `data/` and the enriched Parquet tables are written back to the same directory.

use std::path::{Path, PathBuf};

/// Default directory holding the raw input files and receiving the output tables.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Locations and constants for one run of the feature pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub train_file: String,
    pub test_file: String,
    pub store_file: String,
    /// Value used for columns added to the forecast table during schema reconciliation.
    pub reconcile_fill: i64,
    /// Value used for missing `Open` flags in the forecast table.
    pub open_fill: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            output_dir: PathBuf::from(DEFAULT_DATA_DIR),
            train_file: "train.csv".to_string(),
            test_file: "test.csv".to_string(),
            store_file: "store.csv".to_string(),
            reconcile_fill: 0,
            open_fill: 1.0,
        }
    }
}

impl PipelineConfig {
    /// Uses `dir` for both the raw inputs and the written tables.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.output_dir = dir.clone();
        self.data_dir = dir;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn train_path(&self) -> PathBuf {
        self.data_dir.join(&self.train_file)
    }

    pub fn test_path(&self) -> PathBuf {
        self.data_dir.join(&self.test_file)
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(&self.store_file)
    }

    /// Path of the Parquet file holding the named output table.
    pub fn output_path(&self, table: &str) -> PathBuf {
        Path::new(&self.output_dir).join(format!("{}.parquet", table))
    }
}
