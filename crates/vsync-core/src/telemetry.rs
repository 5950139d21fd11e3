//! Tracing subscriber setup for the harness binaries.
//!
//! [`init_tracing`] installs an `EnvFilter` plus a text or JSON formatter.
//! Later calls are ignored because the global subscriber can only be set
//! once per process.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "VSYNC_LOG";

/// Build the filter: `VSYNC_LOG`, then `RUST_LOG`, then `level` for the
/// harness crates with HTTP internals held at `warn`.
pub fn build_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn",
                level.as_str().to_lowercase()
            ))
        })
}

/// Install the global subscriber writing to stderr. `json` selects
/// newline-delimited JSON.
pub fn init_tracing(json: bool, level: Level) {
    let filter = build_filter(level);
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .ok();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}
