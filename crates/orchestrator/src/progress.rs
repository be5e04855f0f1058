//! The progress-event shape the orchestrator emits on a broadcast channel
//! the embedding program may consume.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressEventKind {
    Enriched,
    Failed,
    GoneMissing,
    Cancelled,
    RateWait,
}

/// One checkpoint emitted after a candidate leaves the worker loop (or,
/// for `RateWait`, whenever a worker blocks on the shared rate budget).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProgressEvent {
    pub kind: ProgressEventKind,
    /// `None` only for `RateWait`, which isn't attributable to one candidate.
    pub username: Option<String>,
    pub duration_ms: u64,
    pub api_remaining: u32,
    pub reset_at: DateTime<Utc>,
    pub queue_size: usize,
}
