use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};

/// A GitHub user profile, as returned by `GET /users/{username}`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct User {
    pub login: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub email: Option<String>,
    pub blog: Option<String>,
    pub twitter_username: Option<String>,
    pub created_at: DateTime<Utc>,
    pub followers: u64,
    pub following: u64,
    pub public_repos: u64,
}

/// One non-fork repository owned (or contributed to) by a user.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Repo {
    pub name: String,
    pub is_fork: bool,
    pub primary_language: Option<String>,
    pub stargazers: u64,
    pub forks: u64,
    pub size_bytes: u64,
    pub topics: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub pushed_at: DateTime<Utc>,
    pub description: Option<String>,
}

/// A single commit as it appears in a `PushEvent` payload — just enough to
/// feed the commits-estimate and reachability extractors.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PushCommit {
    pub author_email: Option<String>,
}

/// The `action` field of a `PullRequestEvent` payload, narrowed to what the
/// activity extractor distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PullRequestAction {
    Opened,
    Closed,
    Other,
}

/// The `action` field of an `IssuesEvent` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum IssueAction {
    Opened,
    Other,
}

/// The discriminating payload of a recent user event. Mirrors the handful of
/// GitHub event types the extractors actually read; everything else collapses
/// to `Other` rather than attempting to model the full event taxonomy.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum EventKind {
    /// `PushEvent`. `commits` is capped at 20 entries per event per the
    /// upstream API's own payload limit.
    Push { commits: Vec<PushCommit> },
    /// `PullRequestEvent`. `merged` only means something when
    /// `action == Closed`.
    PullRequest {
        action: PullRequestAction,
        merged: bool,
    },
    /// `PullRequestReviewEvent`.
    PullRequestReview,
    /// `IssuesEvent`.
    Issues { action: IssueAction },
    /// Any event type the extractors don't score (e.g. `WatchEvent`, `ForkEvent`).
    Other,
}

/// One recent activity event for a user, trimmed to the fields the
/// extractors need (seniority, network, activity, reachability).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Event {
    pub kind: EventKind,
    /// The repo the event occurred on, `owner/name` form.
    pub repo: Option<String>,
    /// The other party in a co-contribution signal: the PR/issue author for
    /// a review or issue event, the requested reviewer for a review-request
    /// event. `None` for events with no second party (e.g. a solo push).
    pub related_user: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A short-lived, in-memory bundle of everything fetched for one username in
/// one enrichment attempt. Discarded once the extractors have consumed it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProfileBundle {
    /// Canonical lowercase GitHub login.
    pub username: String,
    pub user: User,
    /// Non-fork repos only, ordered by `pushed_at` descending.
    pub repos: Vec<Repo>,
    /// repo name -> language -> bytes. Keys are a subset of `repos` names.
    pub language_stats: HashMap<String, HashMap<String, u64>>,
    /// Recent events, covering at most the last 90 days.
    pub events: Vec<Event>,
    /// Org logins the user is a public member of.
    pub orgs: BTreeSet<String>,
    pub fetched_at: DateTime<Utc>,
    /// True if any secondary call (repos/events/orgs/languages) failed
    /// permanently but the bundle is still usable.
    pub partial: bool,
}

impl ProfileBundle {
    /// A bundle with only the user profile populated — the minimal usable
    /// shape when every secondary endpoint failed.
    pub fn user_only(username: impl Into<String>, user: User, fetched_at: DateTime<Utc>) -> Self {
        Self {
            username: username.into(),
            user,
            repos: Vec::new(),
            language_stats: HashMap::new(),
            events: Vec::new(),
            orgs: BTreeSet::new(),
            fetched_at,
            partial: true,
        }
    }
}
