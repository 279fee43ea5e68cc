//! Tracing setup helpers.
//!
//! The engine logs through `tracing` everywhere; hosts that do not install
//! their own subscriber can call [`init`] once at startup. Filtering honors
//! `RUST_LOG` and falls back to `info`.

use tracing_error::ErrorLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Install the default subscriber: env filter + fmt + error-span capture.
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(ErrorLayer::default())
        .try_init();
}
