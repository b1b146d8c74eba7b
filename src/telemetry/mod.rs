mod metrics;
mod tracing;

pub use self::metrics::{counters, init_metrics};
pub use self::tracing::{init_tracing, shutdown_tracing, TracingConfig};
