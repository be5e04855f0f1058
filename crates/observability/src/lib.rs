// crates/observability/src/lib.rs
//! Logging and metrics setup shared by the binary and the library crates.
//! Nothing here is pipeline logic — it only wires `tracing` and `metrics`
//! the way the embedding program expects them configured.

mod logging;
mod metrics_registry;
mod run_id;

pub use logging::{init_logging, LoggingConfig};
pub use metrics_registry::{install_metrics_recorder, PipelineMetrics};
pub use run_id::RunId;
