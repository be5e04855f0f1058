//! Expands a configured seed list into a deduplicated, prioritized stream of
//! enrichment candidates.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use gh_intel_types::{Candidate, GitHubError};
use tokio_util::sync::CancellationToken;

use crate::client::GitHubClient;

/// Fixed priority for watchlist usernames — always attempted first.
pub const WATCHLIST_PRIORITY: i32 = 100;
/// Fixed priority for org members.
pub const ORG_MEMBER_PRIORITY: i32 = 50;
/// Ceiling applied to the contribution-scaled priority repo contributors get.
pub const CONTRIBUTOR_PRIORITY_CAP: i32 = 40;

/// The seed configuration discovery expands.
#[derive(Debug, Clone, Default)]
pub struct DiscoverySeeds {
    pub orgs: Vec<String>,
    /// `owner/name` repo identifiers.
    pub repos: Vec<String>,
    pub watchlist_usernames: Vec<String>,
}

/// The narrow slice of [`GitHubClient`] that discovery actually needs —
/// letting tests substitute an in-memory fake instead of hitting the
/// network.
#[async_trait]
pub trait GitHubOrgReposClient {
    async fn list_org_members(&self, org: &str, cancel: &CancellationToken) -> Result<Vec<String>, GitHubError>;
    async fn list_repo_contributors(
        &self,
        owner_repo: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<crate::client::Contributor>, GitHubError>;
}

#[async_trait]
impl GitHubOrgReposClient for GitHubClient {
    async fn list_org_members(&self, org: &str, cancel: &CancellationToken) -> Result<Vec<String>, GitHubError> {
        GitHubClient::list_org_members(self, org, cancel).await
    }

    async fn list_repo_contributors(
        &self,
        owner_repo: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<crate::client::Contributor>, GitHubError> {
        GitHubClient::list_repo_contributors(self, owner_repo, cancel).await
    }
}

/// Contribution count → priority, clamped to `[0, CONTRIBUTOR_PRIORITY_CAP]`.
fn contributor_priority(contributions: u64) -> i32 {
    let score = 2.0 * (1.0 + contributions as f64).log10();
    score.clamp(0.0, CONTRIBUTOR_PRIORITY_CAP as f64).round() as i32
}

/// Expands `seeds` into a deduplicated stream of candidates, dropping any
/// username present in `already_fresh` (computed by the caller as
/// `ExistingUsernames(freshness_window)`), and returns the stream ordered by
/// descending priority.
pub async fn discover(
    client: &dyn GitHubOrgReposClient,
    seeds: &DiscoverySeeds,
    already_fresh: &HashSet<String>,
    cancel: &CancellationToken,
) -> Result<Vec<Candidate>, GitHubError> {
    let mut best_priority: HashMap<String, (i32, String)> = HashMap::new();
    let now = Utc::now();

    for org in &seeds.orgs {
        let members = client.list_org_members(org, cancel).await?;
        tracing::info!(org, members_found = members.len(), "discovery.org_members");
        for login in members {
            upsert_max(&mut best_priority, login, ORG_MEMBER_PRIORITY, org.clone());
        }
    }

    for repo in &seeds.repos {
        let contributors = client.list_repo_contributors(repo, cancel).await?;
        tracing::info!(repo, contributors_found = contributors.len(), "discovery.repo_contributors");
        for c in contributors {
            let priority = contributor_priority(c.contributions);
            upsert_max(&mut best_priority, c.login, priority, repo.clone());
        }
    }

    for login in &seeds.watchlist_usernames {
        upsert_max(&mut best_priority, login.clone(), WATCHLIST_PRIORITY, "watchlist".to_string());
    }

    let mut candidates: Vec<Candidate> = best_priority
        .into_iter()
        .filter(|(username, _)| !already_fresh.contains(username))
        .map(|(username, (priority, discovered_from))| Candidate::new(username, priority, discovered_from, now))
        .collect();

    candidates.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.enqueued_at.cmp(&b.enqueued_at)));
    tracing::info!(deduped_to = candidates.len(), "discovery.complete");
    Ok(candidates)
}

fn upsert_max(map: &mut HashMap<String, (i32, String)>, login: String, priority: i32, source: String) {
    let login = login.to_lowercase();
    map.entry(login)
        .and_modify(|(existing_priority, existing_source)| {
            if priority > *existing_priority {
                *existing_priority = priority;
                *existing_source = source.clone();
            }
        })
        .or_insert((priority, source));
}
