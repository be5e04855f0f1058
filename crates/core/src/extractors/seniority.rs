//! Seniority extractor (C5.2): infers years active, a commit-count proxy,
//! maintained-repo count, and a seniority level + confidence from the
//! bundle's account age, repos, events, and org memberships.

use chrono::Utc;
use gh_intel_types::{EventKind, ProfileBundle, SeniorityLevel};

const MAX_YEARS_ACTIVE: f64 = 30.0;
const MAINTAINED_REPO_MIN_STARS: u64 = 5;
const MAINTAINED_REPO_WINDOW_DAYS: i64 = 365 * 2;
const COMMITS_PER_PUSH_EVENT_CAP: usize = 20;

pub struct SeniorityOutput {
    pub years_active: f64,
    pub total_commits_estimate: u64,
    pub repos_maintained: u32,
    pub seniority_level: SeniorityLevel,
    pub seniority_confidence: f64,
}

pub fn extract(bundle: &ProfileBundle) -> SeniorityOutput {
    let now = Utc::now();

    let years_active = ((now - bundle.user.created_at).num_days() as f64 / 365.25)
        .max(0.0)
        .min(MAX_YEARS_ACTIVE);

    let total_commits_estimate: u64 = bundle
        .events
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::Push { commits } => Some(commits.len().min(COMMITS_PER_PUSH_EVENT_CAP) as u64),
            _ => None,
        })
        .sum();

    let cutoff = now - chrono::Duration::days(MAINTAINED_REPO_WINDOW_DAYS);
    let repos_maintained = bundle
        .repos
        .iter()
        .filter(|r| r.pushed_at >= cutoff && r.stargazers >= MAINTAINED_REPO_MIN_STARS)
        .count() as u32;

    let review_signal = bundle.events.iter().filter(|e| matches!(e.kind, EventKind::PullRequestReview)).count() as f64;

    let sum_stargazers: u64 = bundle.repos.iter().map(|r| r.stargazers).sum();
    let star_signal = (1.0 + sum_stargazers as f64).log10();

    let org_signal = bundle.orgs.len() as f64;

    let score = (years_active * 10.0).min(50.0)
        + (total_commits_estimate as f64 / 100.0).min(20.0)
        + review_signal * 2.0
        + repos_maintained as f64 * 3.0
        + (star_signal * 5.0).min(15.0)
        + org_signal * 5.0;

    let seniority_level = classify(score);

    let signals_present = [
        years_active > 0.0,
        total_commits_estimate > 0,
        review_signal > 0.0,
        repos_maintained > 0,
        star_signal > 0.0,
        org_signal > 0.0,
    ];
    let nonzero_count = signals_present.iter().filter(|&&present| present).count();
    let seniority_confidence = (nonzero_count as f64 / 6.0).min(1.0);

    SeniorityOutput {
        years_active,
        total_commits_estimate,
        repos_maintained,
        seniority_level,
        seniority_confidence,
    }
}

/// `[0, 30) -> Junior; [30, 60) -> Mid; [60, 90) -> Senior; [90, 120) -> Staff;
/// [120, inf) -> Principal`. Boundaries belong to the lower bucket.
fn classify(score: f64) -> SeniorityLevel {
    if score < 30.0 {
        SeniorityLevel::Junior
    } else if score < 60.0 {
        SeniorityLevel::Mid
    } else if score < 90.0 {
        SeniorityLevel::Senior
    } else if score < 120.0 {
        SeniorityLevel::Staff
    } else {
        SeniorityLevel::Principal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use gh_intel_types::User;

    fn user_with_age(years_ago: i64) -> User {
        User {
            login: "alice".to_string(),
            display_name: None,
            bio: None,
            company: None,
            location: None,
            email: None,
            blog: None,
            twitter_username: None,
            created_at: Utc::now() - Duration::days(years_ago * 365),
            followers: 0,
            following: 0,
            public_repos: 0,
        }
    }

    #[test]
    fn minimal_new_user_is_junior_with_one_signal() {
        let bundle = ProfileBundle::user_only("alice", user_with_age(2), Utc::now());
        let out = extract(&bundle);
        assert_eq!(out.seniority_level, SeniorityLevel::Junior);
        // years_active is the only non-zero signal out of 6.
        assert!((out.seniority_confidence - (1.0 / 6.0)).abs() < 0.001);
    }

    #[test]
    fn boundary_score_maps_to_lower_bucket() {
        // Each bucket's lower bound is inclusive, so a score landing exactly
        // on a boundary belongs to the bucket starting there.
        assert!(matches!(classify(30.0), SeniorityLevel::Mid));
        assert!(matches!(classify(29.999), SeniorityLevel::Junior));
        assert!(matches!(classify(60.0), SeniorityLevel::Senior));
        assert!(matches!(classify(120.0), SeniorityLevel::Principal));
    }

    #[test]
    fn commits_estimate_caps_at_20_per_push_event() {
        use gh_intel_types::{Event, PushCommit};
        let mut bundle = ProfileBundle::user_only("alice", user_with_age(5), Utc::now());
        let commits: Vec<PushCommit> = (0..50).map(|_| PushCommit { author_email: None }).collect();
        bundle.events = vec![Event {
            kind: EventKind::Push { commits },
            repo: Some("alice/repo".to_string()),
            related_user: None,
            created_at: Utc::now(),
        }];
        let out = extract(&bundle);
        assert_eq!(out.total_commits_estimate, 20);
    }
}
