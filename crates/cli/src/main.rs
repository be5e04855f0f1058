//! `gh-intel` binary: loads configuration, opens the database, runs one
//! discovery + enrichment pass, and exits with a status code reflecting
//! how the run went.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use gh_intel_core::client::GitHubClient;
use gh_intel_core::discovery::DiscoverySeeds;
use gh_intel_core::extractors::Dictionary;
use gh_intel_core::rate::RateBudget;
use gh_intel_db::{Database, Persister, SqlitePersister};
use gh_intel_observability::{init_logging, install_metrics_recorder, LoggingConfig, RunId};
use gh_intel_orchestrator::{Orchestrator, OrchestratorConfig};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::{load_github_token, FileConfig};

/// Exit code returned for a fatal configuration error.
const EXIT_CONFIG_ERROR: i32 = 1;
/// Exit code for an unrecoverable external dependency failure (database
/// unreachable after its own retries, etc.).
const EXIT_DEPENDENCY_FAILURE: i32 = 2;
/// Exit code for a clean shutdown triggered by SIGINT/SIGTERM.
const EXIT_INTERRUPTED: i32 = 130;

const ANON_RATE_CAP: u32 = 60;
const TOKEN_RATE_CAP: u32 = 5000;

#[derive(Parser, Debug)]
#[command(name = "gh-intel", about = "GitHub-native developer intelligence pipeline")]
struct Cli {
    /// Path to a TOML config file. Falls back to `GH_INTEL_CONFIG`.
    #[arg(long, env = "GH_INTEL_CONFIG")]
    config: Option<PathBuf>,

    /// Path to a file containing the GitHub token. Falls back to
    /// `GH_INTEL_TOKEN_FILE`. The token itself is never a CLI flag — only
    /// this file or the `GH_INTEL_GITHUB_TOKEN` env var carry it, so it
    /// never shows up in `ps`.
    #[arg(long, env = "GH_INTEL_TOKEN_FILE")]
    token_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let file_config = match FileConfig::load(cli.config.as_ref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    };

    let token = match load_github_token(cli.token_file.as_ref()) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    };

    let logging_config = LoggingConfig { log_dir: file_config.log_dir.clone() };
    let _log_guard = init_logging(&logging_config);
    let _metrics_handle = install_metrics_recorder();

    let run_id = RunId::new();
    tracing::info!(%run_id, "gh_intel.starting");

    let run_span = tracing::info_span!("run", %run_id);
    match run(file_config, token).instrument(run_span).await {
        Ok(outcome) => {
            if outcome.dependency_failure {
                tracing::error!("gh_intel.dependency_failure");
                std::process::exit(EXIT_DEPENDENCY_FAILURE);
            }
            if outcome.shut_down_early {
                tracing::info!("gh_intel.interrupted");
                std::process::exit(EXIT_INTERRUPTED);
            }
            tracing::info!(
                enriched = outcome.enriched,
                failed = outcome.failed,
                gone_missing = outcome.gone_missing,
                "gh_intel.finished"
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "gh_intel.fatal");
            eprintln!("fatal: {e:#}");
            std::process::exit(EXIT_DEPENDENCY_FAILURE);
        }
    }
}

async fn run(
    file_config: FileConfig,
    token: Option<gh_intel_types::GithubToken>,
) -> Result<gh_intel_orchestrator::RunOutcome> {
    let has_token = token.is_some();
    let cap = if has_token { TOKEN_RATE_CAP } else { ANON_RATE_CAP };
    let spacing = std::time::Duration::from_millis(file_config.min_intercall_spacing_ms(has_token));
    let rate = RateBudget::new(cap, chrono::Utc::now() + chrono::Duration::hours(1), spacing);

    let http_timeout = std::time::Duration::from_secs(file_config.http_timeout_seconds);
    let client = Arc::new(GitHubClient::new(rate, token, http_timeout));

    let dictionary =
        Arc::new(Dictionary::embedded().context("embedded skill dictionary failed to parse")?);

    let effective_workers =
        gh_intel_orchestrator::effective_worker_concurrency(file_config.worker_concurrency, cap);

    let db_path = file_config.database_path();
    let database = Database::new(&db_path, effective_workers as u32)
        .await
        .with_context(|| format!("opening database at {}", db_path.display()))?;
    let persister: Arc<dyn Persister> = Arc::new(SqlitePersister::new(&database));

    let seeds = DiscoverySeeds {
        orgs: file_config.seed_orgs.clone(),
        repos: file_config.seed_repos.clone(),
        watchlist_usernames: file_config.watchlist_usernames.clone(),
    };

    let orchestrator_config = OrchestratorConfig {
        seeds,
        freshness_window_days: file_config.freshness_window_days,
        worker_concurrency: file_config.worker_concurrency,
        rate_permits_per_hour: cap,
        per_user_repo_cap: file_config.per_user_repo_cap,
        per_candidate_budget: std::time::Duration::from_secs(file_config.per_candidate_budget_seconds),
        ..Default::default()
    };

    let orchestrator = Orchestrator::new(client, persister, dictionary, orchestrator_config);

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("installing a SIGTERM handler should not fail");
        #[cfg(unix)]
        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate.recv() => {}
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }
        tracing::info!("gh_intel.shutdown_signal_received");
        shutdown_signal.cancel();
    });

    let (progress_tx, mut progress_rx) = orchestrator.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = progress_rx.recv().await {
            tracing::debug!(?event, "gh_intel.progress");
        }
    });

    let outcome = orchestrator.run(progress_tx, shutdown).await?;
    Ok(outcome)
}
