//! Assembles one [`ProfileBundle`] for one candidate username, coordinating
//! the handful of API calls needed and owning per-username partial-failure
//! semantics. Strict step order: later steps depend on data gathered by
//! earlier ones (repo languages need the repo list; nothing downstream
//! blocks on events or orgs, so those two can fail independently).

use std::collections::{BTreeSet, HashMap};

use gh_intel_types::{GitHubError, ProfileBundle};
use tokio_util::sync::CancellationToken;

use crate::client::GitHubClient;

/// The outcome of one fetch attempt, distinguishing the ways a bundle can
/// come back short of fully populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Ok,
    Partial,
    GoneMissing,
    Cancelled,
    Failed(String),
}

pub async fn fetch_profile_bundle(
    client: &GitHubClient,
    username: &str,
    per_user_repo_cap: usize,
    cancel: &CancellationToken,
) -> (Option<ProfileBundle>, FetchOutcome) {
    if cancel.is_cancelled() {
        return (None, FetchOutcome::Cancelled);
    }

    let user = match client.get_user(username, cancel).await {
        Ok(user) => user,
        Err(GitHubError::NotFound) => return (None, FetchOutcome::GoneMissing),
        Err(GitHubError::Cancelled) => return (None, FetchOutcome::Cancelled),
        Err(e) => return (None, FetchOutcome::Failed(e.to_string())),
    };

    let fetched_at = chrono::Utc::now();
    let mut bundle = ProfileBundle::user_only(username.to_string(), user, fetched_at);
    bundle.partial = false;

    if cancel.is_cancelled() {
        return (Some(bundle), FetchOutcome::Cancelled);
    }

    match client.list_user_repos(username, cancel).await {
        Ok(mut repos) => {
            repos.sort_by(|a, b| b.pushed_at.cmp(&a.pushed_at));
            bundle.repos = repos;
        }
        Err(GitHubError::Cancelled) => return (Some(bundle), FetchOutcome::Cancelled),
        Err(_) => bundle.partial = true,
    }

    let mut language_stats: HashMap<String, HashMap<String, u64>> = HashMap::new();
    for repo in bundle.repos.iter().take(per_user_repo_cap) {
        if cancel.is_cancelled() {
            return (Some(bundle), FetchOutcome::Cancelled);
        }
        let owner_repo = format!("{username}/{}", repo.name);
        match client.list_repo_languages(&owner_repo, cancel).await {
            Ok(langs) => {
                language_stats.insert(repo.name.clone(), langs);
            }
            Err(GitHubError::Cancelled) => return (Some(bundle), FetchOutcome::Cancelled),
            Err(_) => bundle.partial = true,
        }
    }
    bundle.language_stats = language_stats;

    if cancel.is_cancelled() {
        return (Some(bundle), FetchOutcome::Cancelled);
    }

    match client.list_user_events(username, cancel).await {
        Ok(events) => {
            let cutoff = chrono::Utc::now() - chrono::Duration::days(90);
            bundle.events = events.into_iter().filter(|e| e.created_at >= cutoff).collect();
        }
        Err(GitHubError::Cancelled) => return (Some(bundle), FetchOutcome::Cancelled),
        Err(_) => bundle.partial = true,
    }

    if cancel.is_cancelled() {
        return (Some(bundle), FetchOutcome::Cancelled);
    }

    match client.list_user_orgs(username, cancel).await {
        Ok(orgs) => bundle.orgs = orgs.into_iter().map(|o| o.to_lowercase()).collect::<BTreeSet<_>>(),
        Err(GitHubError::Cancelled) => return (Some(bundle), FetchOutcome::Cancelled),
        Err(_) => bundle.partial = true,
    }

    let outcome = if bundle.partial { FetchOutcome::Partial } else { FetchOutcome::Ok };
    (Some(bundle), outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate::RateBudget;
    use std::time::Duration;

    #[tokio::test]
    async fn gone_missing_when_user_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("GET", "/users/ghost").with_status(404).create_async().await;
        let rate = RateBudget::new(100, chrono::Utc::now() + chrono::Duration::hours(1), Duration::ZERO);
        let client = GitHubClient::new(rate, None, Duration::from_secs(5)).with_base_url(server.url());
        let cancel = CancellationToken::new();

        let (bundle, outcome) = fetch_profile_bundle(&client, "ghost", 50, &cancel).await;
        assert!(bundle.is_none());
        assert_eq!(outcome, FetchOutcome::GoneMissing);
    }

    #[tokio::test]
    async fn cancellation_before_any_call_short_circuits() {
        let rate = RateBudget::new(100, chrono::Utc::now() + chrono::Duration::hours(1), Duration::ZERO);
        let client = GitHubClient::new(rate, None, Duration::from_secs(5));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let (bundle, outcome) = fetch_profile_bundle(&client, "alice", 50, &cancel).await;
        assert!(bundle.is_none());
        assert_eq!(outcome, FetchOutcome::Cancelled);
    }
}
