//! ## Transformer Pipeline
//!
//! This module provides the abstractions used to chain the per-table stages of the store feature
//! build (calendar derivation, encoding, imputation, scaling) into composable pipelines.
//!
//! ### Overview
//!
//! - The [`Transformer`] trait defines a common interface for implementing data transformation steps,
//!   supporting both stateful (requiring fitting) and stateless transformations.
//! - The [`Pipeline`] struct enables chaining multiple transformers into a cohesive data transformation pipeline,
//!   supporting both fitting and transforming operations.
//! - Macros [`crate::impl_transformer`] and [`crate::make_pipeline`] simplify the creation and implementation
//!   of transformers and pipelines.

use crate::exceptions::{StoreFeaturesError, StoreFeaturesResult};
use async_trait::async_trait;
use datafusion::prelude::*;
use std::time::Instant;
use tracing::{debug, error};

/// Trait for components used in the data transformation pipeline.
///
/// Every transformer must provide a `fit` method (which may collect data to compute parameters)
/// and a `transform` method (which updates the DataFrame’s logical plan without triggering execution).
#[async_trait]
pub trait Transformer {
    /// Fit the transformer given a DataFrame.
    ///
    /// # Arguments
    ///
    /// * `df` - The input DataFrame.
    ///
    /// # Returns
    ///
    /// * `StoreFeaturesResult<()>` - Returns Ok if successful, or an error otherwise.
    async fn fit(&mut self, df: &DataFrame) -> StoreFeaturesResult<()>;

    /// Transform the input DataFrame, returning a new DataFrame with the transformation applied.
    ///
    /// # Arguments
    ///
    /// * `df` - The input DataFrame.
    ///
    /// # Returns
    ///
    /// * `StoreFeaturesResult<DataFrame>` - The transformed DataFrame or an error if transformation fails.
    fn transform(&self, df: DataFrame) -> StoreFeaturesResult<DataFrame>;

    /// Returns true if the transformer is stateful (i.e. requires a call to fit before transform can be called).
    fn is_stateful(&self) -> bool;
}

/// Macro to implement the [`Transformer`] trait for the library's transformers.
///
/// The type must already have inherent methods:
/// - `async fn fit(&mut self, &DataFrame) -> StoreFeaturesResult<()>`
/// - `fn transform(&self, DataFrame) -> StoreFeaturesResult<DataFrame>`
/// - **`fn inherent_is_stateful(&self) -> bool`**
///
/// # Example
///
/// ```rust,no_run
/// use store_features::exceptions::StoreFeaturesResult;
/// use datafusion::prelude::DataFrame;
/// // Import the macro.
/// use store_features::impl_transformer;
///
/// // Suppose you have a transformer type `MyTransformer` defined elsewhere:
/// pub struct MyTransformer { /* ... */ }
///
/// impl MyTransformer {
///     pub async fn fit(&mut self, df: &DataFrame) -> StoreFeaturesResult<()> {
///         // Validate or learn parameters here...
///         Ok(())
///     }
///
///     pub fn transform(&self, df: DataFrame) -> StoreFeaturesResult<DataFrame> {
///         // Implementation here...
///         Ok(df)
///     }
///
///     // Note the different name for the inherent method.
///     pub fn inherent_is_stateful(&self) -> bool {
///         true // or false
///     }
/// }
///
/// // Then simply invoke the macro to implement the Transformer trait:
/// impl_transformer!(MyTransformer);
/// ```
#[macro_export]
macro_rules! impl_transformer {
    ($ty:ty) => {
        #[async_trait::async_trait]
        impl $crate::pipeline::Transformer for $ty {
            async fn fit(
                &mut self,
                df: &datafusion::prelude::DataFrame,
            ) -> $crate::exceptions::StoreFeaturesResult<()> {
                <$ty>::fit(self, df).await
            }
            fn transform(
                &self,
                df: datafusion::prelude::DataFrame,
            ) -> $crate::exceptions::StoreFeaturesResult<datafusion::prelude::DataFrame> {
                <$ty>::transform(self, df)
            }
            fn is_stateful(&self) -> bool {
                <$ty>::inherent_is_stateful(self)
            }
        }
    };
}

/// A pipeline that chains a sequence of transformers.
///
/// Each transformer's output (a new logical plan) is passed as input to the next transformer.
/// Errors raised by a step are returned unchanged so callers can match on the variant
/// (e.g. [`StoreFeaturesError::UnknownCategory`]); the failing step is reported through `tracing`.
pub struct Pipeline {
    steps: Vec<(String, Box<dyn Transformer + Send + Sync>)>,
    verbose: bool,
}

impl Pipeline {
    /// Creates a new pipeline.
    ///
    /// # Arguments
    ///
    /// * `steps` - A vector of (name, transformer) pairs (each transformer is already boxed).
    /// * `verbose` - If true, emits a debug event with the timing of every step.
    pub fn new(steps: Vec<(String, Box<dyn Transformer + Send + Sync>)>, verbose: bool) -> Self {
        Self { steps, verbose }
    }

    /// Names of the steps in execution order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|(name, _)| name.as_str()).collect()
    }

    fn ensure_not_empty(&self) -> StoreFeaturesResult<()> {
        if self.steps.is_empty() {
            return Err(StoreFeaturesError::InvalidParameter(
                "Pipeline must have at least one transformer.".to_string(),
            ));
        }
        Ok(())
    }

    /// Fits each transformer on the output of the previous one and returns the final plan.
    pub async fn fit(&mut self, df: &DataFrame) -> StoreFeaturesResult<DataFrame> {
        self.ensure_not_empty()?;
        let mut current_df = df.clone();
        for (name, step) in self.steps.iter_mut() {
            let start = Instant::now();
            if let Err(e) = step.fit(&current_df).await {
                error!(step = %name, error = %e, "fitting failed");
                return Err(e);
            }
            current_df = step.transform(current_df).inspect_err(|e| {
                error!(step = %name, error = %e, "transform failed");
            })?;
            if self.verbose {
                debug!(step = %name, elapsed = ?start.elapsed(), "step fitted");
            }
        }
        Ok(current_df)
    }

    /// Applies the `transform` method of each transformer (without fitting).
    pub fn transform(&self, df: DataFrame) -> StoreFeaturesResult<DataFrame> {
        self.ensure_not_empty()?;
        let mut current_df = df;
        for (name, step) in self.steps.iter() {
            if step.is_stateful() && self.verbose {
                debug!(step = %name, "applying stateful transformer with its fitted parameters");
            }
            current_df = step.transform(current_df).inspect_err(|e| {
                error!(step = %name, error = %e, "transform failed");
            })?;
        }
        Ok(current_df)
    }

    /// Convenience method to call `fit` and then return the final transformed DataFrame.
    pub async fn fit_transform(&mut self, df: &DataFrame) -> StoreFeaturesResult<DataFrame> {
        self.fit(df).await
    }
}

/// Macro to simplify pipeline creation by automatically boxing transformers.
///
/// # Example
///
/// ```rust,no_run
/// use store_features::make_pipeline;
/// use store_features::transformers::datetime::CalendarFeatures;
///
/// // Create a pipeline with a single step.
/// let pipeline = make_pipeline!(false,
///     ("calendar", CalendarFeatures::new("Date")),
/// );
/// ```
#[macro_export]
macro_rules! make_pipeline {
    ($verbose:expr, $(($name:expr, $transformer:expr)),+ $(,)?) => {
        {
            let steps: Vec<(String, Box<dyn $crate::pipeline::Transformer + Send + Sync>)> = vec![
                $(
                    ($name.to_string(), Box::new($transformer)),
                )+
            ];
            $crate::pipeline::Pipeline::new(steps, $verbose)
        }
    };
}
