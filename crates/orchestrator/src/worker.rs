//! One worker task: pulls candidates off the priority queue and drives each
//! one through Fetch → Extract → Persist.
//! Fetch, extraction, and persistence all run inline in the same task —
//! extraction is pure and cheap, and persistence needs no parallelism of
//! its own.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gh_intel_core::client::GitHubClient;
use gh_intel_core::extractors::{self, Dictionary};
use gh_intel_core::fetcher::{fetch_profile_bundle, FetchOutcome};
use gh_intel_db::Persister;
use gh_intel_observability::PipelineMetrics;
use gh_intel_types::{Candidate, IntelligenceRecord, PersistError, ProfileBundle};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::progress::{ProgressEvent, ProgressEventKind};

/// Backoff applied between persist retries: 200 ms / 1 s / 5 s.
const PERSIST_BACKOFF: [Duration; 3] = [Duration::from_millis(200), Duration::from_secs(1), Duration::from_secs(5)];

/// Consecutive `PersistError::Fatal` outcomes (across every worker) before
/// the orchestrator gives up on the run entirely: a recurring fatal write
/// failure usually means the store itself is broken, not any one
/// candidate's data.
const FATAL_PERSIST_THRESHOLD: usize = 10;

#[derive(Clone)]
pub struct WorkerContext {
    pub client: Arc<GitHubClient>,
    pub persister: Arc<dyn Persister>,
    pub dictionary: Arc<Dictionary>,
    pub per_user_repo_cap: usize,
    pub per_candidate_budget: Duration,
    pub metrics: PipelineMetrics,
    /// Shared across every worker: counts consecutive `Fatal` persistence
    /// failures, reset to 0 on any successful persist.
    pub consecutive_fatal_persists: Arc<AtomicUsize>,
    /// Flips to `true` once `consecutive_fatal_persists` trips the
    /// threshold; the orchestrator surfaces this as `RunOutcome::dependency_failure`.
    pub dependency_failure: Arc<AtomicBool>,
}

/// `queue_rx` is shared across every worker behind a mutex — `mpsc::Receiver`
/// has exactly one consumer, so this is how N worker tasks pull from the
/// same priority-fed channel. The lock is held only across one `recv()`
/// call, never across the (slow) fetch/extract/persist sequence, so workers
/// don't serialize on anything but picking up the next candidate.
pub async fn run_worker(
    queue_rx: Arc<Mutex<mpsc::Receiver<Candidate>>>,
    ctx: WorkerContext,
    progress_tx: broadcast::Sender<ProgressEvent>,
    shutdown: CancellationToken,
    queue_depth: Arc<AtomicUsize>,
) {
    loop {
        let candidate = {
            let mut rx = queue_rx.lock().await;
            rx.recv().await
        };
        let Some(candidate) = candidate else { break };
        let remaining_after_pop = queue_depth.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        if shutdown.is_cancelled() {
            emit_cancelled(&ctx, &candidate.username, remaining_after_pop, &progress_tx).await;
            continue;
        }
        process_candidate(&ctx, candidate, remaining_after_pop, &progress_tx, &shutdown).await;
    }
}

async fn process_candidate(
    ctx: &WorkerContext,
    candidate: Candidate,
    queue_size: usize,
    progress_tx: &broadcast::Sender<ProgressEvent>,
    shutdown: &CancellationToken,
) {
    let started = tokio::time::Instant::now();
    let username = candidate.username;

    let candidate_cancel = shutdown.child_token();
    let budget_guard = {
        let candidate_cancel = candidate_cancel.clone();
        let budget = ctx.per_candidate_budget;
        tokio::spawn(async move {
            tokio::time::sleep(budget).await;
            candidate_cancel.cancel();
        })
    };

    let (bundle, outcome) = fetch_profile_bundle(&ctx.client, &username, ctx.per_user_repo_cap, &candidate_cancel).await;
    budget_guard.abort();

    let duration_ms = started.elapsed().as_millis() as u64;

    match outcome {
        FetchOutcome::GoneMissing => {
            emit(ctx, progress_tx, ProgressEventKind::GoneMissing, &username, duration_ms, queue_size).await;
        }
        FetchOutcome::Cancelled => {
            emit(ctx, progress_tx, ProgressEventKind::Cancelled, &username, duration_ms, queue_size).await;
        }
        FetchOutcome::Failed(reason) => {
            tracing::warn!(username, reason, "worker.fetch_failed");
            ctx.metrics.record_failed();
            emit(ctx, progress_tx, ProgressEventKind::Failed, &username, duration_ms, queue_size).await;
        }
        FetchOutcome::Ok | FetchOutcome::Partial => {
            let Some(bundle) = bundle else {
                // Unreachable per `fetch_profile_bundle`'s contract (Ok/Partial always carry a bundle),
                // but handled rather than asserted so a future contract change fails soft, not panics.
                ctx.metrics.record_failed();
                emit(ctx, progress_tx, ProgressEventKind::Failed, &username, duration_ms, queue_size).await;
                return;
            };
            enrich_and_persist(ctx, bundle, duration_ms, queue_size, progress_tx, shutdown).await;
        }
    }
}

async fn enrich_and_persist(
    ctx: &WorkerContext,
    bundle: ProfileBundle,
    duration_ms: u64,
    queue_size: usize,
    progress_tx: &broadcast::Sender<ProgressEvent>,
    shutdown: &CancellationToken,
) {
    let username = bundle.username.clone();
    let skills = extractors::skills::extract(&bundle, &ctx.dictionary);
    let seniority = extractors::seniority::extract(&bundle);
    let network = extractors::network::extract(&bundle);
    let activity = extractors::activity::extract(&bundle);
    let reachability = extractors::reachability::extract(&bundle);
    let record = build_record(&bundle, skills, seniority, &network, &activity, reachability);

    match persist_with_retry(ctx, &record, &activity.timeline_points, &network.edges).await {
        Ok(()) => {
            ctx.consecutive_fatal_persists.store(0, Ordering::Relaxed);
            ctx.metrics.record_enriched();
            emit(ctx, progress_tx, ProgressEventKind::Enriched, &username, duration_ms, queue_size).await;
        }
        Err(err) => {
            if err.is_fatal() {
                let consecutive = ctx.consecutive_fatal_persists.fetch_add(1, Ordering::Relaxed) + 1;
                if consecutive >= FATAL_PERSIST_THRESHOLD {
                    tracing::error!(consecutive, "worker.fatal_persist_threshold_tripped");
                    ctx.dependency_failure.store(true, Ordering::Relaxed);
                    shutdown.cancel();
                }
            }
            ctx.metrics.record_failed();
            emit(ctx, progress_tx, ProgressEventKind::Failed, &username, duration_ms, queue_size).await;
        }
    }
}

/// Assembles the durable record from the bundle and the five extractors'
/// already-computed outputs (the caller owns `network`/`activity` because it
/// also needs their edges/timeline points after this call returns).
/// Geocoding a free-text `location` string into city/country/timezone has
/// no extractor or dictionary backing it in this design (see DESIGN.md), so
/// those three fields are left unset; `current_employer_hint` is taken
/// directly from the profile's `company` field.
fn build_record(
    bundle: &ProfileBundle,
    skills: extractors::skills::SkillsOutput,
    seniority: extractors::seniority::SeniorityOutput,
    network: &extractors::network::NetworkOutput,
    activity: &extractors::activity::ActivityOutput,
    reachability: extractors::reachability::ReachabilityOutput,
) -> IntelligenceRecord {
    let now = Utc::now();

    IntelligenceRecord {
        username: bundle.username.clone(),
        display_name: bundle.user.display_name.clone(),
        extracted_emails: reachability.extracted_emails,
        inferred_city: None,
        inferred_country: None,
        inferred_timezone: None,
        current_employer_hint: bundle.user.company.clone(),
        primary_languages: skills.primary_languages,
        frameworks: skills.frameworks,
        tools: skills.tools,
        domains: skills.domains,
        years_active: seniority.years_active,
        total_commits_estimate: seniority.total_commits_estimate,
        repos_maintained: seniority.repos_maintained,
        seniority_level: seniority.seniority_level,
        seniority_confidence: seniority.seniority_confidence,
        influence_score: network.influence_score,
        organization_memberships: network.organization_memberships.clone(),
        top_collaborators: network.top_collaborators.clone(),
        commits_per_week: activity.commits_per_week,
        prs_per_month: activity.prs_per_month,
        consistency_score: activity.consistency_score,
        activity_trend: activity.activity_trend,
        last_active_at: activity.last_active_at,
        reachability_score: reachability.reachability_score,
        reachability_signals: reachability.reachability_signals,
        best_contact_method: reachability.best_contact_method,
        partial: bundle.partial,
        source_fetched_at: bundle.fetched_at,
        created_at: now,
        updated_at: now,
        ai_summary: None,
    }
}

async fn persist_with_retry(
    ctx: &WorkerContext,
    record: &IntelligenceRecord,
    timeline: &[gh_intel_types::ActivityTimelinePoint],
    edges: &[gh_intel_types::CollaborationEdge],
) -> Result<(), PersistError> {
    let mut attempt = 0;
    loop {
        match ctx.persister.persist_enrichment(record, timeline, edges).await {
            Ok(()) => return Ok(()),
            Err(err) if err.is_retriable() && attempt < PERSIST_BACKOFF.len() => {
                tracing::warn!(username = %record.username, attempt, error = %err, "worker.persist_retry");
                tokio::time::sleep(PERSIST_BACKOFF[attempt]).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

async fn emit(
    ctx: &WorkerContext,
    progress_tx: &broadcast::Sender<ProgressEvent>,
    kind: ProgressEventKind,
    username: &str,
    duration_ms: u64,
    queue_size: usize,
) {
    let snapshot = ctx.client.rate().snapshot().await;
    ctx.metrics.set_rate_remaining(snapshot.remaining);
    ctx.metrics.set_queue_depth(queue_size);
    let event = ProgressEvent {
        kind,
        username: Some(username.to_string()),
        duration_ms,
        api_remaining: snapshot.remaining,
        reset_at: snapshot.reset_at,
        queue_size,
    };
    let _ = progress_tx.send(event);
}

async fn emit_cancelled(ctx: &WorkerContext, username: &str, queue_size: usize, progress_tx: &broadcast::Sender<ProgressEvent>) {
    emit(ctx, progress_tx, ProgressEventKind::Cancelled, username, 0, queue_size).await;
}
