//! # Store Features
//!
//! Batch feature engineering for per-store sales data, built on Apache DataFusion.
//!
//! The library turns three raw tables (the sales history, the forecast targets and the store
//! metadata) into feature-enriched tables ready for modeling:
//!
//! - [`transformers`] holds the composable steps: calendar features, categorical encoding,
//!   imputation, min-max scaling, schema reconciliation and the per-store mean features.
//! - [`pipeline`] chains transformers with the [`pipeline::Transformer`] trait.
//! - [`io`] loads typed CSV tables and writes Parquet files, [`merge`] joins tables on a key with a
//!   row-count check.
//! - [`dataset`] runs the complete build described by a [`settings::PipelineConfig`].
//!
//! Set `DEBUG_STORE_FEATURES=true` to see the progress of a build.

pub mod dataset;
pub mod exceptions;
pub mod io;
pub mod logging;
pub mod merge;
pub mod pipeline;
pub mod settings;
pub mod transformers;
