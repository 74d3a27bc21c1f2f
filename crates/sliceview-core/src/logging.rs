#![forbid(unsafe_code)]

//! Structured logging.
//!
//! Events are emitted through `tracing` under these targets:
//!
//! | Target               | Emitted by                                   |
//! |----------------------|----------------------------------------------|
//! | `sliceview.overlay`  | last-item overlay construction and lookups   |
//! | `sliceview.viewer`   | viewer lifecycle and snapshot delivery       |
//! | `sliceview.notify`   | observable fan-out and batch flushes         |
//! | `sliceview.store`    | list mutations and fetch requests            |
//!
//! Nothing is printed unless the host installs a subscriber. With the
//! `tracing-json` feature, [`init_json_logging`] installs a JSON one.

pub use tracing::{
    debug, debug_span, error, error_span, info, info_span, trace, trace_span, warn, warn_span,
};

/// Installs a global JSON subscriber filtered by `RUST_LOG`.
///
/// `default_directives` applies when `RUST_LOG` is unset or unparsable,
/// e.g. `"sliceview=info"`. Fails if a global subscriber already exists.
#[cfg(feature = "tracing-json")]
pub fn init_json_logging(
    default_directives: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives))?;
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(true)
        .try_init()
}
