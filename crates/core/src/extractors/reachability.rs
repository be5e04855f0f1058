//! Reachability extractor (C5.5): scores how easy a candidate is to contact
//! from signals already present in the bundle, and picks a best contact
//! method.

use std::collections::BTreeSet;

use chrono::{Duration, Utc};
use gh_intel_types::{BestContactMethod, EventKind, ProfileBundle, ReachabilitySignal, ReachabilitySignalKind};
use regex_lite::Regex;

const WEIGHT_PROFILE_EMAIL: u32 = 30;
const WEIGHT_COMMIT_EMAIL: u32 = 20;
const WEIGHT_TWITTER: u32 = 20;
const WEIGHT_WEBSITE: u32 = 15;
const WEIGHT_RECENT_ACTIVITY: u32 = 20;
const WEIGHT_HIREABLE_BIO: u32 = 15;
const RECENT_ACTIVITY_WINDOW_DAYS: i64 = 90;
const SCORE_CAP: u32 = 100;

const HIREABLE_PHRASES: &[&str] = &["open to", "available for", "looking for", "hire me", "freelance"];

pub struct ReachabilityOutput {
    pub extracted_emails: BTreeSet<String>,
    pub reachability_score: u32,
    pub reachability_signals: Vec<ReachabilitySignal>,
    pub best_contact_method: BestContactMethod,
}

pub fn extract(bundle: &ProfileBundle) -> ReachabilityOutput {
    let extracted_emails = collect_emails(bundle);

    let mut signals = Vec::new();

    let has_profile_email = bundle.user.email.as_deref().map(|e| !e.is_empty() && !is_noreply(e)).unwrap_or(false);
    if has_profile_email {
        signals.push(ReachabilitySignal { signal: ReachabilitySignalKind::ProfileEmail, weight: WEIGHT_PROFILE_EMAIL });
    }

    let has_commit_email = extracted_emails.len() > usize::from(has_profile_email);
    if has_commit_email {
        signals.push(ReachabilitySignal { signal: ReachabilitySignalKind::CommitEmail, weight: WEIGHT_COMMIT_EMAIL });
    }

    let has_twitter = bundle.user.twitter_username.as_deref().map(|t| !t.is_empty()).unwrap_or(false);
    if has_twitter {
        signals.push(ReachabilitySignal { signal: ReachabilitySignalKind::Twitter, weight: WEIGHT_TWITTER });
    }

    let has_website = bundle.user.blog.as_deref().map(is_parseable_url).unwrap_or(false);
    if has_website {
        signals.push(ReachabilitySignal { signal: ReachabilitySignalKind::PersonalWebsite, weight: WEIGHT_WEBSITE });
    }

    let has_recent_activity = is_recently_active(bundle);
    if has_recent_activity {
        signals.push(ReachabilitySignal { signal: ReachabilitySignalKind::RecentActivity, weight: WEIGHT_RECENT_ACTIVITY });
    }

    let has_hireable_bio = bundle.user.bio.as_deref().map(is_hireable_bio).unwrap_or(false);
    if has_hireable_bio {
        signals.push(ReachabilitySignal { signal: ReachabilitySignalKind::HireableBio, weight: WEIGHT_HIREABLE_BIO });
    }

    let reachability_score = signals.iter().map(|s| s.weight).sum::<u32>().min(SCORE_CAP);

    let best_contact_method = if has_profile_email {
        BestContactMethod::Email
    } else if has_twitter {
        BestContactMethod::Twitter
    } else if has_website {
        BestContactMethod::Website
    } else {
        BestContactMethod::GitHub
    };
    let best_contact_method = if reachability_score == 0 { BestContactMethod::None } else { best_contact_method };

    ReachabilityOutput { extracted_emails, reachability_score, reachability_signals: signals, best_contact_method }
}

fn collect_emails(bundle: &ProfileBundle) -> BTreeSet<String> {
    let mut emails = BTreeSet::new();
    if let Some(email) = &bundle.user.email {
        if !email.is_empty() && !is_noreply(email) {
            emails.insert(email.to_lowercase());
        }
    }
    for event in &bundle.events {
        if let EventKind::Push { commits } = &event.kind {
            for commit in commits {
                if let Some(email) = &commit.author_email {
                    if !email.is_empty() && !is_noreply(email) {
                        emails.insert(email.to_lowercase());
                    }
                }
            }
        }
    }
    emails
}

fn is_parseable_url(candidate: &str) -> bool {
    if !candidate.is_empty() && !candidate.contains("://") {
        return url::Url::parse(&format!("https://{candidate}")).is_ok();
    }
    url::Url::parse(candidate).is_ok()
}

fn is_noreply(email: &str) -> bool {
    email.to_lowercase().ends_with("@users.noreply.github.com")
}

fn is_recently_active(bundle: &ProfileBundle) -> bool {
    let cutoff = Utc::now() - Duration::days(RECENT_ACTIVITY_WINDOW_DAYS);
    let last_event = bundle.events.iter().map(|e| e.created_at).max();
    let last_push = bundle.repos.iter().map(|r| r.pushed_at).max();
    [last_event, last_push].into_iter().flatten().any(|at| at >= cutoff)
}

fn is_hireable_bio(bio: &str) -> bool {
    HIREABLE_PHRASES.iter().any(|phrase| {
        let escaped = regex_lite::escape(phrase);
        let pattern = format!(r"(?i)\b{escaped}\b");
        Regex::new(&pattern).map(|re| re.is_match(bio)).unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gh_intel_types::User;

    fn user() -> User {
        User {
            login: "alice".to_string(),
            display_name: None,
            bio: None,
            company: None,
            location: None,
            email: None,
            blog: None,
            twitter_username: None,
            created_at: Utc::now(),
            followers: 0,
            following: 0,
            public_repos: 0,
        }
    }

    #[test]
    fn minimal_bundle_is_unreachable() {
        let bundle = ProfileBundle::user_only("alice", user(), Utc::now());
        let out = extract(&bundle);
        assert_eq!(out.reachability_score, 0);
        assert_eq!(out.best_contact_method, BestContactMethod::None);
        assert!(out.extracted_emails.is_empty());
    }

    #[test]
    fn profile_email_wins_over_twitter_as_contact_method() {
        let mut u = user();
        u.email = Some("Alice@Example.com".to_string());
        u.twitter_username = Some("alicedev".to_string());
        let bundle = ProfileBundle::user_only("alice", u, Utc::now());
        let out = extract(&bundle);
        assert_eq!(out.best_contact_method, BestContactMethod::Email);
        assert!(out.extracted_emails.contains("alice@example.com"));
    }

    #[test]
    fn noreply_github_emails_are_filtered_out() {
        use gh_intel_types::{Event, EventKind, PushCommit};
        let mut bundle = ProfileBundle::user_only("alice", user(), Utc::now());
        bundle.events = vec![Event {
            kind: EventKind::Push {
                commits: vec![PushCommit { author_email: Some("1234+alice@users.noreply.github.com".to_string()) }],
            },
            repo: Some("alice/repo".to_string()),
            related_user: None,
            created_at: Utc::now(),
        }];
        let out = extract(&bundle);
        assert!(out.extracted_emails.is_empty());
    }

    #[test]
    fn noreply_profile_email_does_not_count_as_a_reachability_signal() {
        let mut u = user();
        u.email = Some("1234+alice@users.noreply.github.com".to_string());
        let bundle = ProfileBundle::user_only("alice", u, Utc::now());
        let out = extract(&bundle);
        assert_eq!(out.reachability_score, 0);
        assert_eq!(out.best_contact_method, BestContactMethod::None);
        assert!(!out.reachability_signals.iter().any(|s| s.signal == ReachabilitySignalKind::ProfileEmail));
    }

    #[test]
    fn hireable_bio_phrase_is_detected_case_insensitively() {
        let mut u = user();
        u.bio = Some("Open to new opportunities".to_string());
        let bundle = ProfileBundle::user_only("alice", u, Utc::now());
        let out = extract(&bundle);
        assert!(out.reachability_signals.iter().any(|s| s.signal == ReachabilitySignalKind::HireableBio));
    }
}
