//! ## Custom Errors for Store Features
//!
//! This module defines the error types used throughout the library.
//! It uses the `thiserror` crate to derive the `Error` trait.
//! The `StoreFeaturesError` enum covers failures from the underlying query engine and storage
//! layers as well as the domain failures of the feature pipeline (unknown category codes and
//! broken join-key integrity).
//!
//! The `StoreFeaturesResult` type alias is the result type returned by the library.
//!
//! ### Example
//!
//! ```rust
//! use store_features::exceptions::{StoreFeaturesError, StoreFeaturesResult};
//!
//! fn encode_assortment(value: &str) -> StoreFeaturesResult<i8> {
//!     Err(StoreFeaturesError::UnknownCategory {
//!         column: "Assortment".into(),
//!         value: value.into(),
//!     })
//! }
//! ```

use thiserror::Error;

/// Errors specific to the Store Features library.
#[derive(Debug, Error)]
pub enum StoreFeaturesError {
    /// Wraps underlying I/O errors.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Wraps errors from DataFusion.
    #[error("DataFusion error: {0}")]
    DataFusionError(#[from] datafusion::error::DataFusionError),

    /// Wraps errors from Arrow.
    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    /// Wraps errors from Parquet.
    #[error("Parquet error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),

    /// Indicates that an invalid parameter was provided (e.g., unsupported value or incorrect data type).
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Indicates that the specified column does not exist in the DataFrame.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// A value was found that the closed lookup table of a column does not know.
    #[error("Unknown category '{value}' in column '{column}'")]
    UnknownCategory { column: String, value: String },

    /// A merge produced a different number of rows than its left input.
    #[error("Row count mismatch for '{table}': expected {expected} rows, got {actual}")]
    RowCountMismatch {
        table: String,
        expected: usize,
        actual: usize,
    },

    /// Indicates the transform method was called before calling fit for a stateful transformer.
    #[error("Transform called before fit for stateful transformer")]
    FitNotCalled,
}

/// A convenient result type for Store Features operations.
pub type StoreFeaturesResult<T> = std::result::Result<T, StoreFeaturesError>;
