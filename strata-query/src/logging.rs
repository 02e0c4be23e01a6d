//! Logging bootstrap for Strata.
//!
//! Strata logs through `tracing`. This module only decides whether to install
//! a subscriber, controlled by environment variables.
//!
//! # Environment Variables
//!
//! - `STRATA_DEBUG=true|1|yes` - Enable debug logging
//! - `STRATA_LOG_LEVEL=trace|debug|info|warn|error` - Set a specific level
//! - `STRATA_LOG_FORMAT=json|pretty|compact` - Output format (default: json)
//!
//! # Usage
//!
//! ```rust,no_run
//! use strata_query::logging;
//!
//! // Call once at startup; later calls do nothing.
//! logging::init();
//! ```
//!
//! Within Strata, use the standard tracing macros with structured fields:
//!
//! ```rust,ignore
//! use tracing::{debug, info, warn};
//!
//! debug!(entity = %name, field = %field, "detected rename");
//! info!(migration = %id, "applied migration");
//! warn!(cycle = ?nodes, "dependency cycle, using registration order");
//! ```

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

const DEBUG_VAR: &str = "STRATA_DEBUG";
const LEVEL_VAR: &str = "STRATA_LOG_LEVEL";
const FORMAT_VAR: &str = "STRATA_LOG_FORMAT";

/// Whether `STRATA_DEBUG` asks for debug logging.
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var(DEBUG_VAR)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Log level from `STRATA_LOG_LEVEL`.
///
/// Unknown or missing values fall back to "debug" when `STRATA_DEBUG` is set
/// and "warn" otherwise.
pub fn get_log_level() -> &'static str {
    let fallback = if is_debug_enabled() { "debug" } else { "warn" };
    match env::var(LEVEL_VAR) {
        Ok(level) => match level.to_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" => "warn",
            "error" => "error",
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

/// Output format from `STRATA_LOG_FORMAT`, defaulting to "json".
pub fn get_log_format() -> &'static str {
    env::var(FORMAT_VAR)
        .map(|f| match f.to_lowercase().as_str() {
            "pretty" => "pretty",
            "compact" => "compact",
            _ => "json",
        })
        .unwrap_or("json")
}

/// Initialize logging.
///
/// Installs a `tracing-subscriber` registry when the `tracing-subscriber`
/// feature is enabled and either `STRATA_DEBUG` or `STRATA_LOG_LEVEL` is set.
/// Otherwise the application's own subscriber (if any) receives the events.
pub fn init() {
    INIT.call_once(|| {
        if !is_debug_enabled() && env::var(LEVEL_VAR).is_err() {
            return;
        }

        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = get_log_level();
            let filter = EnvFilter::try_new(format!(
                "strata={level},strata_query={level},strata_schema={level},strata_migrate={level}"
            ))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

            let installed = match get_log_format() {
                "json" => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().json())
                    .try_init(),
                "compact" => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().compact())
                    .try_init(),
                _ => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().pretty())
                    .try_init(),
            };

            if installed.is_ok() {
                tracing::info!(level, format = get_log_format(), "Strata logging initialized");
            }
        }
    });
}

/// Initialize logging at a given level.
///
/// Sets `STRATA_LOG_LEVEL` in the process environment, so call it at startup
/// before spawning threads.
pub fn init_with_level(level: &str) {
    // SAFETY: documented as startup-only, before other threads exist.
    unsafe {
        env::set_var(LEVEL_VAR, level);
    }
    init();
}

/// Conditional debug logging, only when `STRATA_DEBUG` is set at runtime.
#[macro_export]
macro_rules! strata_debug {
    ($($arg:tt)*) => {
        if $crate::logging::is_debug_enabled() {
            tracing::debug!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_defaults() {
        // SAFETY: the only test touching these variables.
        unsafe {
            env::remove_var(DEBUG_VAR);
            env::remove_var(LEVEL_VAR);
            env::remove_var(FORMAT_VAR);
        }
        assert!(!is_debug_enabled());
        assert_eq!(get_log_level(), "warn");
        assert_eq!(get_log_format(), "json");
    }
}
