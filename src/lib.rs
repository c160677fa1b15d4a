pub mod config;
pub mod engine_config;
pub mod models;
pub mod db;
pub mod pipeline;
pub mod service;

use tracing_subscriber::EnvFilter;

pub use service::{OrchestrationService, ServiceError, SessionHandle};

/// Install the global tracing subscriber. `RUST_LOG` wins over the built-in
/// filter. Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();
}
