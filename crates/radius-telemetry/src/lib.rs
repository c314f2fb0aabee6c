//! Structured logging init and decision-observer metrics, the ambient
//! observability stack every profile carries regardless of which policy
//! features a profile enables.

pub mod logging_observer;
pub mod metrics;
pub mod observer;

pub use logging_observer::LoggingObserver;
pub use metrics::{DecisionCounts, DecisionMetrics, MetricsObserver};
pub use observer::DecisionObserver;

use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Initialize structured JSON logging with an env filter. Controlled by
/// `RUST_LOG`, e.g. `"info,radius_pipeline=debug"`.
pub fn init_json_logging() {
    let fmt_layer = fmt::layer().json().with_current_span(true).with_span_list(true);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber).ok();
}
