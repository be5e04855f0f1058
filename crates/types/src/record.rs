use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};

/// A language's share of a user's code, across all of their non-fork repos.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LanguageShare {
    pub bytes: u64,
    pub percentage: f64,
}

/// An inferred seniority bucket. Boundaries live with the extractor that
/// produces this value, not here — this type only names the buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SeniorityLevel {
    Junior,
    Mid,
    Senior,
    Staff,
    Principal,
}

impl SeniorityLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            SeniorityLevel::Junior => "junior",
            SeniorityLevel::Mid => "mid",
            SeniorityLevel::Senior => "senior",
            SeniorityLevel::Staff => "staff",
            SeniorityLevel::Principal => "principal",
        }
    }
}

impl std::str::FromStr for SeniorityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "junior" => Ok(SeniorityLevel::Junior),
            "mid" => Ok(SeniorityLevel::Mid),
            "senior" => Ok(SeniorityLevel::Senior),
            "staff" => Ok(SeniorityLevel::Staff),
            "principal" => Ok(SeniorityLevel::Principal),
            other => Err(format!("unknown seniority level: {other}")),
        }
    }
}

/// Direction of recent activity relative to the preceding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ActivityTrend {
    Growing,
    Stable,
    Declining,
    Dormant,
}

impl ActivityTrend {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityTrend::Growing => "growing",
            ActivityTrend::Stable => "stable",
            ActivityTrend::Declining => "declining",
            ActivityTrend::Dormant => "dormant",
        }
    }
}

/// The most promising way to reach this user, ranked by the reachability
/// extractor's signal table. Named `None` (not `Option::None`) to match the
/// closed set of contact methods the design calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum BestContactMethod {
    Email,
    Twitter,
    Website,
    GitHub,
    None,
}

impl BestContactMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            BestContactMethod::Email => "email",
            BestContactMethod::Twitter => "twitter",
            BestContactMethod::Website => "website",
            BestContactMethod::GitHub => "github",
            BestContactMethod::None => "none",
        }
    }
}

/// Which reachability condition fired. Distinct from `BestContactMethod`:
/// several signals (e.g. profile email and commit-author email) both point
/// at the same contact method but are recorded as separate weighted signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ReachabilitySignalKind {
    ProfileEmail,
    CommitEmail,
    Twitter,
    PersonalWebsite,
    RecentActivity,
    HireableBio,
}

/// One weighted signal the reachability extractor found, kept around for
/// explainability rather than collapsed into just the winning method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ReachabilitySignal {
    pub signal: ReachabilitySignalKind,
    pub weight: u32,
}

/// A frequent co-contributor inferred from recent events, with the raw
/// co-contribution weight the network extractor computed.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TopCollaborator {
    pub username: String,
    pub strength: u32,
    pub shared_repos: BTreeSet<String>,
}

/// The enrichment output for one candidate: the denormalized facts derived
/// from a `ProfileBundle` by the extractors, ready to persist.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IntelligenceRecord {
    // Identity
    pub username: String,
    pub display_name: Option<String>,
    pub extracted_emails: BTreeSet<String>,
    pub inferred_city: Option<String>,
    pub inferred_country: Option<String>,
    pub inferred_timezone: Option<String>,
    pub current_employer_hint: Option<String>,

    // Skills (C5.1)
    pub primary_languages: HashMap<String, LanguageShare>,
    pub frameworks: BTreeSet<String>,
    pub tools: BTreeSet<String>,
    pub domains: BTreeSet<String>,

    // Seniority (C5.2)
    pub years_active: f64,
    pub total_commits_estimate: u64,
    pub repos_maintained: u32,
    pub seniority_level: SeniorityLevel,
    pub seniority_confidence: f64,

    // Network (C5.3)
    pub influence_score: u32,
    pub organization_memberships: Vec<String>,
    pub top_collaborators: Vec<TopCollaborator>,

    // Activity (C5.4)
    pub commits_per_week: f64,
    pub prs_per_month: f64,
    pub consistency_score: f64,
    pub activity_trend: ActivityTrend,
    pub last_active_at: Option<DateTime<Utc>>,

    // Reachability (C5.5)
    pub reachability_score: u32,
    pub reachability_signals: Vec<ReachabilitySignal>,
    pub best_contact_method: BestContactMethod,

    // Provenance
    pub partial: bool,
    pub source_fetched_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Reserved for an out-of-core summarization layer. The pipeline never
    /// reads or writes this field; `UpsertIntelligence` must preserve
    /// whatever value is already stored.
    pub ai_summary: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn seniority_level_round_trips_through_as_str() {
        for level in [
            SeniorityLevel::Junior,
            SeniorityLevel::Mid,
            SeniorityLevel::Senior,
            SeniorityLevel::Staff,
            SeniorityLevel::Principal,
        ] {
            assert_eq!(SeniorityLevel::from_str(level.as_str()).unwrap(), level);
        }
    }

    #[test]
    fn seniority_level_rejects_unknown_strings() {
        assert!(SeniorityLevel::from_str("wizard").is_err());
    }
}
