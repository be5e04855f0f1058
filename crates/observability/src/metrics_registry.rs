//! Registers the pipeline's gauges and counters with a process-wide
//! Prometheus recorder. This crate only registers metrics — scraping them
//! over HTTP is the embedding program's job, via whatever HTTP layer
//! that program exposes.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

const RATE_REMAINING: &str = "gh_intel_rate_remaining";
const CANDIDATES_ENRICHED_TOTAL: &str = "gh_intel_candidates_enriched_total";
const CANDIDATES_FAILED_TOTAL: &str = "gh_intel_candidates_failed_total";
const QUEUE_DEPTH: &str = "gh_intel_queue_depth";

/// Installs the global Prometheus recorder and returns a handle an
/// embedding HTTP layer can use to render the `/metrics` text format.
/// Installing twice in the same process panics (the underlying recorder
/// is a global), so callers should do this once at startup.
pub fn install_metrics_recorder() -> PrometheusHandle {
    let handle = PrometheusBuilder::new().install_recorder().expect("prometheus recorder installs exactly once per process");
    metrics::describe_gauge!(RATE_REMAINING, "GitHub API calls remaining in the current rate window");
    metrics::describe_counter!(CANDIDATES_ENRICHED_TOTAL, "Candidates successfully enriched and persisted");
    metrics::describe_counter!(CANDIDATES_FAILED_TOTAL, "Candidates that ended in the Failed state");
    metrics::describe_gauge!(QUEUE_DEPTH, "Candidates waiting in the priority queue");
    handle
}

/// Thin, typed wrappers over the four pipeline metrics, so call sites never
/// retype a metric name and risk a typo silently creating a new series.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineMetrics;

impl PipelineMetrics {
    pub fn set_rate_remaining(&self, remaining: u32) {
        metrics::gauge!(RATE_REMAINING).set(remaining as f64);
    }

    pub fn record_enriched(&self) {
        metrics::counter!(CANDIDATES_ENRICHED_TOTAL).increment(1);
    }

    pub fn record_failed(&self) {
        metrics::counter!(CANDIDATES_FAILED_TOTAL).increment(1);
    }

    pub fn set_queue_depth(&self, depth: usize) {
        metrics::gauge!(QUEUE_DEPTH).set(depth as f64);
    }
}
