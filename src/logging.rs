//! ## Logging Configuration
//!
//! Logging is set up automatically at program startup using the `ctor` crate.
//! It is controlled by the `DEBUG_STORE_FEATURES` environment variable:
//!
//! - **Disabled** (default): If the variable is unset, empty, or explicitly set to `"0"` or `"false"`,
//!   no subscriber is installed.
//! - **Enabled**: Any other value installs a subscriber with a maximum log level of `DEBUG`.
//!
//! ```sh
//! export DEBUG_STORE_FEATURES=true
//! ```

use ctor::ctor;
use tracing::Level;

/// Name of the environment variable that turns logging on.
pub const DEBUG_ENV_VAR: &str = "DEBUG_STORE_FEATURES";

/// Returns true when the given value of [`DEBUG_ENV_VAR`] means "logging on".
pub(crate) fn logging_enabled(value: Option<&str>) -> bool {
    value.is_some_and(|v| !(v == "0" || v == "false" || v.is_empty()))
}

#[ctor]
fn set_debug_level() {
    let value = std::env::var(DEBUG_ENV_VAR).ok();
    if logging_enabled(value.as_deref()) {
        // A host application may already own the global subscriber.
        let _ = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .try_init();
    }
}
