//! Logging setup shared by the flatbridge binary and embedders.
//!
//! All output goes to stderr so stdout stays free for JSON responses.

use crate::Result;
use tracing_subscriber::EnvFilter;

/// Maps CLI verbosity flags to a maximum log level.
///
/// `quiet` wins over any verbosity count.
pub fn level_for(verbose: u8, quiet: bool) -> tracing::Level {
    match (quiet, verbose) {
        (true, _) => tracing::Level::ERROR,
        (false, 0) => tracing::Level::INFO,
        (false, 1) => tracing::Level::DEBUG,
        (false, _) => tracing::Level::TRACE,
    }
}

/// Filter directives used when `RUST_LOG` is unset.
///
/// The HTTP stack stays at `warn` unless tracing is requested explicitly.
pub fn default_directives(level: tracing::Level) -> String {
    let own = level.as_str().to_lowercase();
    if level == tracing::Level::TRACE {
        own
    } else {
        format!("{own},hyper=warn,hyper_util=warn,reqwest=warn,h2=warn,rustls=warn")
    }
}

/// Initializes structured logging based on verbosity level.
///
/// # Arguments
/// * `verbose` - Verbosity level (0=INFO, 1=DEBUG, 2+=TRACE)
/// * `quiet` - If true, only show ERROR level logs
/// * `json` - Emit one JSON object per event instead of human-readable lines
///
/// `RUST_LOG`, when set, overrides the level derived from the flags.
///
/// # Example
/// ```rust,no_run
/// use flatbridge_core::logging::init_logging;
///
/// init_logging(1, false, false).expect("Failed to initialize logging");
/// ```
pub fn init_logging(verbose: u8, quiet: bool, json: bool) -> Result<()> {
    let level = level_for(verbose, quiet);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| {
        crate::error::FlatbridgeError::configuration(format!(
            "Failed to initialize logging: {}",
            e
        ))
    })
}
