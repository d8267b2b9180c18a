//! Tracing initialization for embedders and tests.
//!
//! Every globpack crate emits structured `tracing` events (request
//! lifecycles at debug, failures and WARN-strictness conditions at warn).
//! Hosts that already install their own subscriber can skip this entirely.

use tracing_subscriber::{
    EnvFilter,
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Initialize a process-wide tracing subscriber.
///
/// The `RUST_LOG` environment variable overrides the default filter. With
/// `verbose`, globpack crates log at debug and events carry their target;
/// otherwise the format is compact and info-level.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("globpack=debug,info")
            } else {
                EnvFilter::try_new("globpack=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(verbose)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init()?;
    Ok(())
}
