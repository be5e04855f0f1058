//! Composes RateBudget-backed discovery, the fetch/extract/persist worker
//! pool, and graceful shutdown into one `run()` call. A broadcast channel
//! carries progress events to any number of subscribers, and a
//! `tokio_util::sync::CancellationToken` cancels every in-flight worker at
//! once rather than one at a time.

use std::sync::atomic::{AtomicBool, AtomicUsize};
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use gh_intel_core::client::GitHubClient;
use gh_intel_core::discovery::{discover, DiscoverySeeds};
use gh_intel_core::extractors::Dictionary;
use gh_intel_db::Persister;
use gh_intel_observability::PipelineMetrics;
use gh_intel_types::GitHubError;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;

use crate::progress::ProgressEvent;
use crate::queue::spawn_priority_feeder;
use crate::worker::{run_worker, WorkerContext};

/// Default grace period the orchestrator waits for in-flight workers to
/// finish after a shutdown signal.
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);
const PROGRESS_CHANNEL_CAPACITY: usize = 1024;

/// Per spec.md §4.7: worker concurrency is "bounded by
/// max(1, permits_per_hour / 200)" — roughly the API cost of one enriched
/// user (§4.4: ~4 + min(50, #repos) calls), so the pool never outpaces what
/// the shared rate budget can actually sustain.
const PERMITS_PER_WORKER: u32 = 200;

/// Clamps a configured worker count to what the hourly rate budget can
/// sustain: `requested.min(max(1, rate_permits_per_hour / PERMITS_PER_WORKER))`.
pub fn effective_worker_concurrency(requested: usize, rate_permits_per_hour: u32) -> usize {
    let cap = ((rate_permits_per_hour / PERMITS_PER_WORKER) as usize).max(1);
    requested.min(cap).max(1)
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub seeds: DiscoverySeeds,
    pub freshness_window_days: i64,
    pub worker_concurrency: usize,
    /// The token's hourly call quota (5000 with a token, 60 anonymous) —
    /// used to clamp `worker_concurrency` down to what the shared
    /// `RateBudget` can actually sustain, per §4.7.
    pub rate_permits_per_hour: u32,
    pub per_user_repo_cap: usize,
    pub per_candidate_budget: Duration,
    pub shutdown_grace: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            seeds: DiscoverySeeds::default(),
            freshness_window_days: 30,
            worker_concurrency: 8,
            rate_permits_per_hour: 5000,
            per_user_repo_cap: 50,
            per_candidate_budget: Duration::from_secs(600),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

/// Summary of one orchestrator run, for the binary to decide its exit code
/// against the configured exit-code table.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOutcome {
    pub enriched: usize,
    pub failed: usize,
    pub gone_missing: usize,
    pub cancelled: usize,
    pub shut_down_early: bool,
    /// Set once 10 consecutive `PersistError::Fatal` outcomes trip the
    /// threshold — the binary should exit with code 2 rather
    /// than 0 when this is set, even though the run otherwise completed.
    pub dependency_failure: bool,
}

pub struct Orchestrator {
    client: Arc<GitHubClient>,
    persister: Arc<dyn Persister>,
    dictionary: Arc<Dictionary>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(client: Arc<GitHubClient>, persister: Arc<dyn Persister>, dictionary: Arc<Dictionary>, config: OrchestratorConfig) -> Self {
        Self { client, persister, dictionary, config }
    }

    /// Subscribes a fresh progress receiver. Call before `run()` if the
    /// caller wants to observe every event — `run()` takes ownership of the
    /// sender, so subscribers registered afterward would miss the run.
    pub fn subscribe(&self) -> (broadcast::Sender<ProgressEvent>, broadcast::Receiver<ProgressEvent>) {
        broadcast::channel(PROGRESS_CHANNEL_CAPACITY)
    }

    /// Runs discovery once, then drives every discovered candidate through
    /// the worker pool until the queue drains or `shutdown` fires.
    pub async fn run(&self, progress_tx: broadcast::Sender<ProgressEvent>, shutdown: CancellationToken) -> Result<RunOutcome, GitHubError> {
        let already_fresh = self
            .persister
            .existing_usernames(ChronoDuration::days(self.config.freshness_window_days))
            .await
            .map_err(|e| GitHubError::Transient(e.to_string()))?;

        let candidates = discover(&*self.client, &self.config.seeds, &already_fresh, &shutdown).await?;
        let total = candidates.len();
        tracing::info!(total, "orchestrator.run_started");

        let worker_concurrency =
            effective_worker_concurrency(self.config.worker_concurrency, self.config.rate_permits_per_hour);
        if worker_concurrency < self.config.worker_concurrency {
            tracing::info!(
                requested = self.config.worker_concurrency,
                effective = worker_concurrency,
                rate_permits_per_hour = self.config.rate_permits_per_hour,
                "orchestrator.worker_concurrency_clamped"
            );
        }

        let queue_depth = Arc::new(AtomicUsize::new(total));
        let queue_capacity = worker_concurrency * 4;
        let queue_rx = Arc::new(Mutex::new(spawn_priority_feeder(candidates, queue_capacity, shutdown.clone())));

        let dependency_failure = Arc::new(AtomicBool::new(false));
        let ctx = WorkerContext {
            client: Arc::clone(&self.client),
            persister: Arc::clone(&self.persister),
            dictionary: Arc::clone(&self.dictionary),
            per_user_repo_cap: self.config.per_user_repo_cap,
            per_candidate_budget: self.config.per_candidate_budget,
            metrics: PipelineMetrics,
            consecutive_fatal_persists: Arc::new(AtomicUsize::new(0)),
            dependency_failure: Arc::clone(&dependency_failure),
        };

        let mut handles = Vec::with_capacity(worker_concurrency);
        for _ in 0..worker_concurrency {
            let queue_rx = Arc::clone(&queue_rx);
            let ctx = ctx.clone();
            let progress_tx = progress_tx.clone();
            let shutdown = shutdown.clone();
            let queue_depth = Arc::clone(&queue_depth);
            handles.push(tokio::spawn(run_worker(queue_rx, ctx, progress_tx, shutdown, queue_depth)));
        }

        let mut summary_rx = progress_tx.subscribe();
        let mut outcome = RunOutcome::default();
        let tally = tokio::spawn(async move {
            let mut tally = RunOutcome::default();
            while let Ok(event) = summary_rx.recv().await {
                match event.kind {
                    crate::progress::ProgressEventKind::Enriched => tally.enriched += 1,
                    crate::progress::ProgressEventKind::Failed => tally.failed += 1,
                    crate::progress::ProgressEventKind::GoneMissing => tally.gone_missing += 1,
                    crate::progress::ProgressEventKind::Cancelled => tally.cancelled += 1,
                    crate::progress::ProgressEventKind::RateWait => {}
                }
            }
            tally
        });

        let all_done = futures_join_all(handles);
        let grace = self.config.shutdown_grace;
        tokio::select! {
            _ = all_done => {}
            _ = shutdown.cancelled() => {
                outcome.shut_down_early = true;
                tokio::time::sleep(grace).await;
            }
        }

        drop(progress_tx);
        if let Ok(tally) = tally.await {
            outcome.enriched = tally.enriched;
            outcome.failed = tally.failed;
            outcome.gone_missing = tally.gone_missing;
            outcome.cancelled = tally.cancelled;
        }

        outcome.dependency_failure = dependency_failure.load(std::sync::atomic::Ordering::Relaxed);

        tracing::info!(
            enriched = outcome.enriched,
            failed = outcome.failed,
            gone_missing = outcome.gone_missing,
            cancelled = outcome.cancelled,
            dependency_failure = outcome.dependency_failure,
            "orchestrator.run_finished"
        );
        Ok(outcome)
    }
}

async fn futures_join_all(handles: Vec<tokio::task::JoinHandle<()>>) {
    for handle in handles {
        let _ = handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gh_intel_core::rate::RateBudget;
    use gh_intel_db::{Database, SqlitePersister};

    async fn in_memory_orchestrator(server_url: String) -> Orchestrator {
        let db = Database::new_in_memory().await.unwrap();
        let persister: Arc<dyn Persister> = Arc::new(SqlitePersister::new(&db));
        let rate = RateBudget::new(5000, chrono::Utc::now() + chrono::Duration::hours(1), Duration::ZERO);
        let client = Arc::new(GitHubClient::new(rate, None, Duration::from_secs(5)).with_base_url(server_url));
        let dictionary = Arc::new(Dictionary::embedded().unwrap());
        let config = OrchestratorConfig {
            seeds: DiscoverySeeds { watchlist_usernames: vec!["ghost".to_string()], ..Default::default() },
            worker_concurrency: 1,
            ..Default::default()
        };
        Orchestrator::new(client, persister, dictionary, config)
    }

    #[tokio::test]
    async fn gone_missing_candidate_produces_no_durable_row_and_a_progress_event() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("GET", "/users/ghost").with_status(404).create_async().await;

        let orchestrator = in_memory_orchestrator(server.url()).await;
        let (tx, mut rx) = orchestrator.subscribe();
        let shutdown = CancellationToken::new();
        let outcome = orchestrator.run(tx, shutdown).await.unwrap();

        assert_eq!(outcome.gone_missing, 1);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, crate::progress::ProgressEventKind::GoneMissing);
    }

    /// A persister whose `persist_enrichment` always returns
    /// `PersistError::Fatal`, to drive the consecutive-fatal-persist
    /// threshold without needing an actually-broken database.
    struct AlwaysFatalPersister;

    #[async_trait::async_trait]
    impl Persister for AlwaysFatalPersister {
        async fn upsert_intelligence(&self, _record: &gh_intel_types::IntelligenceRecord) -> Result<(), gh_intel_types::PersistError> {
            Ok(())
        }
        async fn upsert_timeline(&self, _points: &[gh_intel_types::ActivityTimelinePoint]) -> Result<(), gh_intel_types::PersistError> {
            Ok(())
        }
        async fn upsert_collaborations(&self, _edges: &[gh_intel_types::CollaborationEdge]) -> Result<(), gh_intel_types::PersistError> {
            Ok(())
        }
        async fn existing_usernames(&self, _window: chrono::Duration) -> Result<std::collections::HashSet<String>, gh_intel_types::PersistError> {
            Ok(std::collections::HashSet::new())
        }
        async fn persist_enrichment(
            &self,
            _record: &gh_intel_types::IntelligenceRecord,
            _timeline: &[gh_intel_types::ActivityTimelinePoint],
            _edges: &[gh_intel_types::CollaborationEdge],
        ) -> Result<(), gh_intel_types::PersistError> {
            Err(gh_intel_types::PersistError::Fatal("simulated constraint violation".to_string()))
        }
    }

    #[tokio::test]
    async fn ten_consecutive_fatal_persists_trip_dependency_failure() {
        let mut server = mockito::Server::new_async().await;
        let _user_mock = server
            .mock("GET", mockito::Matcher::Regex(r"^/users/[a-z0-9]+$".to_string()))
            .with_status(200)
            .with_body(
                r#"{"login":"user","name":null,"bio":null,"company":null,"location":null,"email":null,
                "blog":null,"twitter_username":null,"created_at":"2020-01-01T00:00:00Z","followers":0,
                "following":0,"public_repos":0}"#,
            )
            .expect_at_least(10)
            .create_async()
            .await;

        let persister: Arc<dyn Persister> = Arc::new(AlwaysFatalPersister);
        let rate = RateBudget::new(5000, chrono::Utc::now() + chrono::Duration::hours(1), Duration::ZERO);
        let client = Arc::new(GitHubClient::new(rate, None, Duration::from_secs(5)).with_base_url(server.url()));
        let dictionary = Arc::new(Dictionary::embedded().unwrap());
        let config = OrchestratorConfig {
            seeds: DiscoverySeeds {
                watchlist_usernames: (0..10).map(|i| format!("user{i}")).collect(),
                ..Default::default()
            },
            worker_concurrency: 4,
            ..Default::default()
        };
        let orchestrator = Orchestrator::new(client, persister, dictionary, config);
        let (tx, _rx) = orchestrator.subscribe();
        let outcome = orchestrator.run(tx, CancellationToken::new()).await.unwrap();

        assert!(outcome.dependency_failure);
        assert!(outcome.failed >= 10);
    }
}
