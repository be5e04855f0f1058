//! Activity extractor (C5.4): aggregates events into weekly buckets and
//! derives a trend classification and timeline points from them.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use gh_intel_types::{
    ActivityTimelinePoint, ActivityTrend, Event, EventKind, IssueAction, ProfileBundle,
    PullRequestAction,
};

const WEEKS_WINDOW: i64 = 26;
const MONTHS_WINDOW: i64 = 6;
const TREND_SPLIT_WEEK: i64 = 13;
const DORMANT_THRESHOLD: f64 = 0.5;
const DECLINE_RATIO: f64 = 0.25;
const GROWTH_RATIO: f64 = 1.5;

#[derive(Default, Clone)]
struct WeekBucket {
    commits: u32,
    prs_opened: u32,
    prs_merged: u32,
    issues_opened: u32,
    reviews_given: u32,
    active_days: HashSet<chrono::NaiveDate>,
}

pub struct ActivityOutput {
    pub commits_per_week: f64,
    pub prs_per_month: f64,
    pub consistency_score: f64,
    pub activity_trend: ActivityTrend,
    pub last_active_at: Option<DateTime<Utc>>,
    pub timeline_points: Vec<ActivityTimelinePoint>,
}

/// The Monday 00:00 UTC that starts the ISO week containing `at`.
fn week_start(at: DateTime<Utc>) -> DateTime<Utc> {
    let date = at.date_naive();
    let days_since_monday = date.weekday().num_days_from_monday();
    let monday = date - Duration::days(days_since_monday as i64);
    Utc.from_utc_datetime(&monday.and_hms_opt(0, 0, 0).expect("midnight is always valid"))
}

pub fn extract(bundle: &ProfileBundle) -> ActivityOutput {
    let now = Utc::now();
    let this_week = week_start(now);

    let mut buckets: HashMap<i64, WeekBucket> = HashMap::new();
    let mut month_pr_opens: HashMap<(i32, u32), u32> = HashMap::new();

    for event in &bundle.events {
        let week = week_start(event.created_at);
        let weeks_ago = (this_week - week).num_weeks();
        if weeks_ago < 0 || weeks_ago >= WEEKS_WINDOW {
            continue;
        }
        let bucket = buckets.entry(weeks_ago).or_default();
        accumulate(bucket, event);

        let months_ago = months_between(now, event.created_at);
        if let (EventKind::PullRequest { action: PullRequestAction::Opened, .. }, Some(m)) =
            (&event.kind, months_ago)
        {
            if m >= 1 && m <= MONTHS_WINDOW {
                let key = (event.created_at.year(), event.created_at.month());
                *month_pr_opens.entry(key).or_insert(0) += 1;
            }
        }
    }

    let commits_per_week = (0..WEEKS_WINDOW)
        .map(|w| buckets.get(&w).map(|b| b.commits).unwrap_or(0) as f64)
        .sum::<f64>()
        / WEEKS_WINDOW as f64;

    let prs_per_month = if month_pr_opens.is_empty() {
        0.0
    } else {
        month_pr_opens.values().sum::<u32>() as f64 / MONTHS_WINDOW as f64
    };

    let weeks_with_activity = (0..WEEKS_WINDOW).filter(|w| buckets.contains_key(w)).count();
    let consistency_score = (weeks_with_activity as f64 / WEEKS_WINDOW as f64).clamp(0.0, 1.0);

    let last_event_at = bundle.events.iter().map(|e| e.created_at).max();
    let last_repo_push_at = bundle.repos.iter().map(|r| r.pushed_at).max();
    let last_active_at = match (last_event_at, last_repo_push_at) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    };

    let older_mean = mean_events_per_week(&buckets, TREND_SPLIT_WEEK, WEEKS_WINDOW);
    let recent_mean = mean_events_per_week(&buckets, 0, TREND_SPLIT_WEEK);
    let activity_trend = classify_trend(recent_mean, older_mean);

    let mut timeline_points: Vec<ActivityTimelinePoint> = buckets
        .iter()
        .filter(|(_, b)| {
            b.commits + b.prs_opened + b.issues_opened + b.reviews_given > 0 || !b.active_days.is_empty()
        })
        .map(|(weeks_ago, b)| ActivityTimelinePoint {
            username: bundle.username.clone(),
            week_start: this_week - Duration::weeks(*weeks_ago),
            commits: b.commits,
            prs_opened: b.prs_opened,
            prs_merged: b.prs_merged,
            issues_opened: b.issues_opened,
            reviews_given: b.reviews_given,
            active_days: b.active_days.len().min(7) as u8,
        })
        .collect();
    timeline_points.sort_by_key(|p| p.week_start);

    ActivityOutput {
        commits_per_week,
        prs_per_month,
        consistency_score,
        activity_trend,
        last_active_at,
        timeline_points,
    }
}

fn accumulate(bucket: &mut WeekBucket, event: &Event) {
    bucket.active_days.insert(event.created_at.date_naive());
    match &event.kind {
        EventKind::Push { commits } => bucket.commits += commits.len() as u32,
        EventKind::PullRequest { action, merged } => match action {
            PullRequestAction::Opened => bucket.prs_opened += 1,
            PullRequestAction::Closed if *merged => bucket.prs_merged += 1,
            _ => {}
        },
        EventKind::Issues { action: IssueAction::Opened } => bucket.issues_opened += 1,
        EventKind::PullRequestReview => bucket.reviews_given += 1,
        _ => {}
    }
}

/// Whole completed calendar months between `now` and `at`; `None` if `at`
/// is in the future or outside the lookback window entirely.
fn months_between(now: DateTime<Utc>, at: DateTime<Utc>) -> Option<i64> {
    if at > now {
        return None;
    }
    let months = (now.year() - at.year()) as i64 * 12 + (now.month() as i64 - at.month() as i64);
    Some(months)
}

fn mean_events_per_week(buckets: &HashMap<i64, WeekBucket>, from_weeks_ago: i64, to_weeks_ago_exclusive: i64) -> f64 {
    let span = (to_weeks_ago_exclusive - from_weeks_ago).max(1);
    let total: u32 = (from_weeks_ago..to_weeks_ago_exclusive)
        .filter_map(|w| buckets.get(&w))
        .map(|b| b.commits + b.prs_opened + b.issues_opened + b.reviews_given)
        .sum();
    total as f64 / span as f64
}

fn classify_trend(recent_mean: f64, older_mean: f64) -> ActivityTrend {
    if recent_mean < DECLINE_RATIO * older_mean {
        ActivityTrend::Declining
    } else if recent_mean > GROWTH_RATIO * older_mean {
        ActivityTrend::Growing
    } else if recent_mean < DORMANT_THRESHOLD && older_mean < DORMANT_THRESHOLD {
        ActivityTrend::Dormant
    } else {
        ActivityTrend::Stable
    }
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
    fn minimal_bundle_is_dormant_with_zero_everything() {
        let bundle = ProfileBundle::user_only("alice", user(), Utc::now());
        let out = extract(&bundle);
        assert_eq!(out.activity_trend, ActivityTrend::Dormant);
        assert_eq!(out.consistency_score, 0.0);
        assert_eq!(out.commits_per_week, 0.0);
        assert!(out.timeline_points.is_empty());
    }

    #[test]
    fn week_start_always_lands_on_a_monday() {
        let now = Utc::now();
        assert_eq!(week_start(now).weekday(), chrono::Weekday::Mon);
    }

    #[test]
    fn timeline_point_emitted_only_for_weeks_with_activity() {
        use gh_intel_types::PushCommit;
        let mut bundle = ProfileBundle::user_only("alice", user(), Utc::now());
        bundle.events = vec![Event {
            kind: EventKind::Push { commits: vec![PushCommit { author_email: None }] },
            repo: Some("alice/repo".to_string()),
            related_user: None,
            created_at: Utc::now(),
        }];
        let out = extract(&bundle);
        assert_eq!(out.timeline_points.len(), 1);
        assert_eq!(out.timeline_points[0].commits, 1);
        assert_eq!(out.timeline_points[0].week_start.weekday(), chrono::Weekday::Mon);
    }

    #[test]
    fn zero_older_mean_with_recent_activity_is_growing_not_stable() {
        // GitHub's events feed only reaches back ~90 days, so the older
        // window [-26,-14) is empty for most real profiles. That must still
        // satisfy the growth rule rather than falling through to Stable.
        assert_eq!(classify_trend(2.0, 0.0), ActivityTrend::Growing);
    }
}
