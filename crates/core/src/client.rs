//! Typed, paginated facade over the subset of the GitHub REST API the
//! pipeline needs. Every call acquires a permit from a shared [`RateBudget`]
//! before it goes out, and every response's rate-limit headers are fed back
//! into that budget, so the budget's accounting always reflects the server's
//! own view.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use gh_intel_types::{
    Event, EventKind, GitHubError, GithubToken, IssueAction, PullRequestAction, PushCommit, Repo,
    User,
};
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use crate::rate::RateBudget;

const USER_AGENT: &str = "gh-intel-pipeline/0.1";
const DEFAULT_BASE_URL: &str = "https://api.github.com";

const REPO_PAGE_CAP: usize = 500;
const EVENT_PAGE_CAP: usize = 300;
const MEMBER_PAGE_CAP: usize = 1000;
const CONTRIBUTOR_PAGE_CAP: usize = 500;
const PER_PAGE: u32 = 100;

const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(30);
const MAX_RETRY_ATTEMPTS: u32 = 5;

/// A repo contributor with their contribution count, as returned by
/// `GET /repos/{owner}/{repo}/contributors`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contributor {
    pub login: String,
    pub contributions: u64,
}

pub struct GitHubClient {
    http: reqwest::Client,
    rate: RateBudget,
    token: Option<GithubToken>,
    base_url: String,
}

impl GitHubClient {
    pub fn new(rate: RateBudget, token: Option<GithubToken>, http_timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(http_timeout)
            .build()
            .expect("reqwest client builds with static config");
        Self {
            http,
            rate,
            token,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Points the client at a different base URL — the real API by
    /// default, a mock server in tests (this crate's own and downstream
    /// crates' orchestrator/integration tests alike).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The shared rate budget this client draws permits from, so callers
    /// can report `api_remaining`/`reset_at` in progress events without the
    /// client needing to know about progress reporting itself.
    pub fn rate(&self) -> &RateBudget {
        &self.rate
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.get(url).header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            req = req.bearer_auth(token.as_str());
        }
        req
    }

    /// Sends one request, applying the retry/backoff policy for transient
    /// failures and feeding the response's rate headers back into the
    /// shared budget. Does not follow pagination — see [`Self::paginate`].
    async fn send_with_retry(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, GitHubError> {
        let mut attempt = 0;
        let mut rate_limit_retried = false;
        loop {
            if cancel.is_cancelled() {
                return Err(GitHubError::Cancelled);
            }
            self.rate.acquire(1).await;

            let result = self.request(url).send().await;
            match result {
                Ok(resp) => {
                    self.observe_rate_headers(&resp).await;
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp);
                    }
                    if status == StatusCode::NOT_FOUND {
                        return Err(GitHubError::NotFound);
                    }
                    if status == StatusCode::FORBIDDEN && is_rate_limited(&resp) {
                        // Not retried by the backoff loop above — the budget's
                        // own `acquire` is what paces the retry: reacquire a
                        // permit (which blocks until the server's reset, since
                        // `observe_rate_headers` just recorded remaining=0)
                        // and retry the call exactly once.
                        if rate_limit_retried {
                            let retry_after_secs = resp
                                .headers()
                                .get("retry-after")
                                .and_then(|v| v.to_str().ok())
                                .and_then(|v| v.parse::<u64>().ok());
                            return Err(GitHubError::RateLimited { retry_after_secs });
                        }
                        rate_limit_retried = true;
                        continue;
                    }
                    if status.is_server_error() {
                        attempt += 1;
                        if attempt >= MAX_RETRY_ATTEMPTS {
                            let body = resp.text().await.unwrap_or_default();
                            return Err(GitHubError::Permanent {
                                status: status.as_u16(),
                                body,
                            });
                        }
                        tokio::time::sleep(backoff_delay(attempt)).await;
                        continue;
                    }
                    let body = resp.text().await.unwrap_or_default();
                    return Err(GitHubError::Permanent {
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    attempt += 1;
                    if attempt >= MAX_RETRY_ATTEMPTS {
                        return Err(GitHubError::Transient(e.to_string()));
                    }
                    tokio::time::sleep(backoff_delay(attempt)).await;
                    continue;
                }
                Err(e) => return Err(GitHubError::Transient(e.to_string())),
            }
        }
    }

    async fn observe_rate_headers(&self, resp: &reqwest::Response) {
        let headers = resp.headers();
        let remaining = headers
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u32>().ok());
        let reset_epoch = headers
            .get("x-ratelimit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok());
        if let (Some(remaining), Some(reset_epoch)) = (remaining, reset_epoch) {
            let reset_at = Utc.timestamp_opt(reset_epoch, 0).single().unwrap_or_else(Utc::now);
            self.rate.observe(remaining, reset_at).await;
        }
    }

    /// Follows the `Link: rel="next"` header until exhausted or `cap`
    /// entries have been collected, calling `parse_page` on each response
    /// body and flattening the results.
    async fn paginate<T>(
        &self,
        mut url: String,
        cap: usize,
        cancel: &CancellationToken,
        parse_page: impl Fn(serde_json::Value) -> Result<Vec<T>, GitHubError>,
    ) -> Result<Vec<T>, GitHubError> {
        let mut out = Vec::new();
        loop {
            if cancel.is_cancelled() {
                return Err(GitHubError::Cancelled);
            }
            let resp = self.send_with_retry(&url, cancel).await?;
            let next_url = next_link(&resp);
            let body: serde_json::Value = resp
                .json()
                .await
                .map_err(|e| GitHubError::Permanent { status: 200, body: e.to_string() })?;
            let mut page = parse_page(body)?;
            out.append(&mut page);
            if out.len() >= cap {
                out.truncate(cap);
                return Ok(out);
            }
            match next_url {
                Some(next) => url = next,
                None => return Ok(out),
            }
        }
    }

    pub async fn get_user(&self, login: &str, cancel: &CancellationToken) -> Result<User, GitHubError> {
        let url = format!("{}/users/{login}", self.base_url);
        let resp = self.send_with_retry(&url, cancel).await?;
        let raw: RawUser = resp
            .json()
            .await
            .map_err(|e| GitHubError::Permanent { status: 200, body: e.to_string() })?;
        Ok(raw.into_user())
    }

    pub async fn list_user_repos(&self, login: &str, cancel: &CancellationToken) -> Result<Vec<Repo>, GitHubError> {
        let url = format!("{}/users/{login}/repos?per_page={PER_PAGE}&type=owner&sort=pushed", self.base_url);
        let repos = self
            .paginate(url, REPO_PAGE_CAP, cancel, |body| {
                let raw: Vec<RawRepo> = serde_json::from_value(body)
                    .map_err(|e| GitHubError::Permanent { status: 200, body: e.to_string() })?;
                Ok(raw.into_iter().filter(|r| !r.fork).map(RawRepo::into_repo).collect())
            })
            .await?;
        Ok(repos)
    }

    pub async fn list_repo_languages(
        &self,
        owner_repo: &str,
        cancel: &CancellationToken,
    ) -> Result<std::collections::HashMap<String, u64>, GitHubError> {
        let url = format!("{}/repos/{owner_repo}/languages", self.base_url);
        let resp = self.send_with_retry(&url, cancel).await?;
        resp.json()
            .await
            .map_err(|e| GitHubError::Permanent { status: 200, body: e.to_string() })
    }

    pub async fn list_user_events(&self, login: &str, cancel: &CancellationToken) -> Result<Vec<Event>, GitHubError> {
        let url = format!("{}/users/{login}/events/public?per_page={PER_PAGE}", self.base_url);
        self.paginate(url, EVENT_PAGE_CAP, cancel, |body| {
            let raw: Vec<RawEvent> = serde_json::from_value(body)
                .map_err(|e| GitHubError::Permanent { status: 200, body: e.to_string() })?;
            Ok(raw.into_iter().filter_map(RawEvent::into_event).collect())
        })
        .await
    }

    pub async fn list_user_orgs(&self, login: &str, cancel: &CancellationToken) -> Result<Vec<String>, GitHubError> {
        let url = format!("{}/users/{login}/orgs?per_page={PER_PAGE}", self.base_url);
        let resp = self.send_with_retry(&url, cancel).await?;
        let raw: Vec<RawOrg> = resp
            .json()
            .await
            .map_err(|e| GitHubError::Permanent { status: 200, body: e.to_string() })?;
        Ok(raw.into_iter().map(|o| o.login).collect())
    }

    pub async fn list_org_members(&self, org: &str, cancel: &CancellationToken) -> Result<Vec<String>, GitHubError> {
        let url = format!("{}/orgs/{org}/members?per_page={PER_PAGE}", self.base_url);
        self.paginate(url, MEMBER_PAGE_CAP, cancel, |body| {
            let raw: Vec<RawLogin> = serde_json::from_value(body)
                .map_err(|e| GitHubError::Permanent { status: 200, body: e.to_string() })?;
            Ok(raw.into_iter().map(|m| m.login).collect())
        })
        .await
    }

    pub async fn list_repo_contributors(
        &self,
        owner_repo: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Contributor>, GitHubError> {
        let url = format!("{}/repos/{owner_repo}/contributors?per_page={PER_PAGE}", self.base_url);
        self.paginate(url, CONTRIBUTOR_PAGE_CAP, cancel, |body| {
            let raw: Vec<RawContributor> = serde_json::from_value(body)
                .map_err(|e| GitHubError::Permanent { status: 200, body: e.to_string() })?;
            Ok(raw
                .into_iter()
                .map(|c| Contributor { login: c.login, contributions: c.contributions })
                .collect())
        })
        .await
    }
}

fn is_rate_limited(resp: &reqwest::Response) -> bool {
    resp.headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "0")
        .unwrap_or(false)
}

fn backoff_delay(attempt: u32) -> Duration {
    let millis = BACKOFF_BASE.as_millis() as u64 * 2u64.pow(attempt.saturating_sub(1));
    Duration::from_millis(millis).min(BACKOFF_CAP)
}

fn next_link(resp: &reqwest::Response) -> Option<String> {
    let link = resp.headers().get("link")?.to_str().ok()?;
    for part in link.split(',') {
        let mut segments = part.split(';');
        let url_part = segments.next()?.trim();
        let rel_part = segments.next()?.trim();
        if rel_part == r#"rel="next""# {
            return Some(url_part.trim_start_matches('<').trim_end_matches('>').to_string());
        }
    }
    None
}

// ── Raw GitHub API response shapes ──────────────────────────────────────

#[derive(Debug, serde::Deserialize)]
struct RawUser {
    login: String,
    name: Option<String>,
    bio: Option<String>,
    company: Option<String>,
    location: Option<String>,
    email: Option<String>,
    blog: Option<String>,
    twitter_username: Option<String>,
    created_at: DateTime<Utc>,
    followers: u64,
    following: u64,
    public_repos: u64,
}

impl RawUser {
    fn into_user(self) -> User {
        User {
            login: self.login.to_lowercase(),
            display_name: self.name,
            bio: self.bio,
            company: self.company,
            location: self.location,
            email: self.email.filter(|e| !e.is_empty()),
            blog: self.blog.filter(|b| !b.is_empty()),
            twitter_username: self.twitter_username,
            created_at: self.created_at,
            followers: self.followers,
            following: self.following,
            public_repos: self.public_repos,
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct RawRepo {
    name: String,
    fork: bool,
    language: Option<String>,
    stargazers_count: u64,
    forks_count: u64,
    size: u64,
    #[serde(default)]
    topics: Vec<String>,
    created_at: DateTime<Utc>,
    pushed_at: DateTime<Utc>,
    description: Option<String>,
}

impl RawRepo {
    fn into_repo(self) -> Repo {
        Repo {
            name: self.name,
            is_fork: self.fork,
            primary_language: self.language,
            stargazers: self.stargazers_count,
            forks: self.forks_count,
            size_bytes: self.size * 1024,
            topics: self.topics,
            created_at: self.created_at,
            pushed_at: self.pushed_at,
            description: self.description,
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct RawOrg {
    login: String,
}

#[derive(Debug, serde::Deserialize)]
struct RawLogin {
    login: String,
}

#[derive(Debug, serde::Deserialize)]
struct RawContributor {
    login: String,
    contributions: u64,
}

#[derive(Debug, serde::Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    repo: Option<RawEventRepo>,
    actor: Option<RawLogin>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Debug, serde::Deserialize)]
struct RawEventRepo {
    name: String,
}

impl RawEvent {
    fn into_event(self) -> Option<Event> {
        let repo = self.repo.map(|r| r.name);
        let (kind, related_user) = match self.kind.as_str() {
            "PushEvent" => {
                let commits = self
                    .payload
                    .get("commits")
                    .and_then(|c| c.as_array())
                    .map(|commits| {
                        commits
                            .iter()
                            .take(20)
                            .map(|c| PushCommit {
                                author_email: c
                                    .get("author")
                                    .and_then(|a| a.get("email"))
                                    .and_then(|e| e.as_str())
                                    .map(|s| s.to_string()),
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                (EventKind::Push { commits }, None)
            }
            "PullRequestEvent" => {
                let action = match self.payload.get("action").and_then(|a| a.as_str()) {
                    Some("opened") => PullRequestAction::Opened,
                    Some("closed") => PullRequestAction::Closed,
                    _ => PullRequestAction::Other,
                };
                let merged = self
                    .payload
                    .get("pull_request")
                    .and_then(|pr| pr.get("merged"))
                    .and_then(|m| m.as_bool())
                    .unwrap_or(false);
                let author = pr_author(&self.payload);
                (EventKind::PullRequest { action, merged }, author)
            }
            "PullRequestReviewEvent" => {
                let author = pr_author(&self.payload);
                (EventKind::PullRequestReview, author)
            }
            "IssuesEvent" => {
                let action = match self.payload.get("action").and_then(|a| a.as_str()) {
                    Some("opened") => IssueAction::Opened,
                    _ => IssueAction::Other,
                };
                let author = self
                    .payload
                    .get("issue")
                    .and_then(|i| i.get("user"))
                    .and_then(|u| u.get("login"))
                    .and_then(|l| l.as_str())
                    .map(|s| s.to_string());
                (EventKind::Issues { action }, author)
            }
            _ => (EventKind::Other, None),
        };
        let related_user = related_user.filter(|login| Some(login) != self.actor.as_ref().map(|a| &a.login));
        Some(Event {
            kind,
            repo,
            related_user,
            created_at: self.created_at,
        })
    }
}

fn pr_author(payload: &serde_json::Value) -> Option<String> {
    payload
        .get("pull_request")
        .and_then(|pr| pr.get("user"))
        .and_then(|u| u.get("login"))
        .and_then(|l| l.as_str())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[test]
    fn backoff_delay_grows_and_caps() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(3), Duration::from_secs(4));
        assert_eq!(backoff_delay(10), BACKOFF_CAP);
    }

    #[test]
    fn raw_user_lowercases_login_and_blanks_become_none() {
        let raw = RawUser {
            login: "ALICE".to_string(),
            name: None,
            bio: None,
            company: None,
            location: None,
            email: Some(String::new()),
            blog: Some(String::new()),
            twitter_username: None,
            created_at: Utc::now(),
            followers: 0,
            following: 0,
            public_repos: 0,
        };
        let user = raw.into_user();
        assert_eq!(user.login, "alice");
        assert_eq!(user.email, None);
        assert_eq!(user.blog, None);
    }

    #[tokio::test]
    async fn get_user_maps_404_to_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("GET", "/users/ghost").with_status(404).create_async().await;

        let rate = RateBudget::new(100, Utc::now() + chrono::Duration::hours(1), StdDuration::ZERO);
        let client = GitHubClient::new(rate, None, Duration::from_secs(5)).with_base_url(server.url());
        let cancel = CancellationToken::new();
        let err = client.get_user("ghost", &cancel).await.unwrap_err();
        assert!(matches!(err, GitHubError::NotFound));
    }

    #[tokio::test]
    async fn rate_limited_response_is_retried_exactly_once_then_bubbles_up() {
        // Always rate-limited: proves the client reacquires the budget and
        // retries the call exactly once (2 total requests) rather than
        // retrying forever or bubbling up on the first hit.
        let mut server = mockito::Server::new_async().await;
        let reset_at = Utc::now() + chrono::Duration::milliseconds(200);
        let m = server
            .mock("GET", "/users/alice")
            .with_status(403)
            .with_header("x-ratelimit-remaining", "0")
            .with_header("x-ratelimit-reset", &reset_at.timestamp().to_string())
            .with_header("retry-after", "1")
            .expect(2)
            .create_async()
            .await;

        let rate = RateBudget::new(100, Utc::now() + chrono::Duration::hours(1), StdDuration::ZERO);
        let client = GitHubClient::new(rate, None, Duration::from_secs(5)).with_base_url(server.url());
        let cancel = CancellationToken::new();
        let err = client.get_user("alice", &cancel).await.unwrap_err();
        assert!(matches!(err, GitHubError::RateLimited { retry_after_secs: Some(1) }));
        m.assert_async().await;
    }

    #[tokio::test]
    async fn send_with_retry_respects_cancellation() {
        let rate = RateBudget::new(100, Utc::now() + chrono::Duration::hours(1), StdDuration::ZERO);
        let client = GitHubClient::new(rate, None, Duration::from_secs(5));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = client.get_user("alice", &cancel).await.unwrap_err();
        assert!(matches!(err, GitHubError::Cancelled));
    }
}
