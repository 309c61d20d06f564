//! # Transformer Implementations
//!
//! The submodules contain the transformers used by the store feature build.

pub mod categorical_encoding;
pub mod datetime;
pub mod imputation;
pub mod mean_features;
pub mod scaling;
pub mod schema;
