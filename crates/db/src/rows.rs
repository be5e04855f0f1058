//! Conversions between the typed `gh_intel_types` model and the flat rows
//! `sqlx` reads from / writes to SQLite. Arrays and nested structures are
//! stored as JSON text columns — SQLite has no native array or jsonb type —
//! and decoded back into the named types at the boundary, so nothing above
//! this module ever sees a loosely typed JSON value.

use chrono::{DateTime, Utc};
use gh_intel_types::{
    ActivityTimelinePoint, ActivityTrend, BestContactMethod, CollaborationEdge, IntelligenceRecord,
    LanguageShare, ReachabilitySignal, SeniorityLevel, TopCollaborator,
};
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

#[derive(Debug, sqlx::FromRow)]
pub struct IntelligenceRow {
    pub username: String,
    pub display_name: Option<String>,
    pub extracted_emails: String,
    pub inferred_city: Option<String>,
    pub inferred_country: Option<String>,
    pub inferred_timezone: Option<String>,
    pub current_employer_hint: Option<String>,
    pub primary_languages: String,
    pub frameworks: String,
    pub tools: String,
    pub domains: String,
    pub years_active: f64,
    pub total_commits_estimate: i64,
    pub repos_maintained: i64,
    pub seniority_level: String,
    pub seniority_confidence: f64,
    pub influence_score: i64,
    pub organization_memberships: String,
    pub top_collaborators: String,
    pub commits_per_week: f64,
    pub prs_per_month: f64,
    pub consistency_score: f64,
    pub activity_trend: String,
    pub last_active_at: Option<DateTime<Utc>>,
    pub reachability_score: i64,
    pub reachability_signals: String,
    pub best_contact_method: String,
    pub partial: bool,
    pub source_fetched_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ai_summary: Option<String>,
}

fn activity_trend_str(trend: ActivityTrend) -> &'static str {
    trend.as_str()
}

fn parse_activity_trend(s: &str) -> ActivityTrend {
    match s {
        "growing" => ActivityTrend::Growing,
        "declining" => ActivityTrend::Declining,
        "dormant" => ActivityTrend::Dormant,
        _ => ActivityTrend::Stable,
    }
}

fn parse_best_contact_method(s: &str) -> BestContactMethod {
    match s {
        "email" => BestContactMethod::Email,
        "twitter" => BestContactMethod::Twitter,
        "website" => BestContactMethod::Website,
        "github" => BestContactMethod::GitHub,
        _ => BestContactMethod::None,
    }
}

impl IntelligenceRow {
    /// Builds the row that `UpsertIntelligence` writes on a fresh insert —
    /// `created_at` is set to `now`; on conflict the caller preserves the
    /// existing `created_at` instead (see `persister::upsert_intelligence`).
    pub fn from_record(record: &IntelligenceRecord) -> Self {
        Self {
            username: record.username.clone(),
            display_name: record.display_name.clone(),
            extracted_emails: serde_json::to_string(&record.extracted_emails).unwrap_or_default(),
            inferred_city: record.inferred_city.clone(),
            inferred_country: record.inferred_country.clone(),
            inferred_timezone: record.inferred_timezone.clone(),
            current_employer_hint: record.current_employer_hint.clone(),
            primary_languages: serde_json::to_string(&record.primary_languages).unwrap_or_default(),
            frameworks: serde_json::to_string(&record.frameworks).unwrap_or_default(),
            tools: serde_json::to_string(&record.tools).unwrap_or_default(),
            domains: serde_json::to_string(&record.domains).unwrap_or_default(),
            years_active: record.years_active,
            total_commits_estimate: record.total_commits_estimate as i64,
            repos_maintained: record.repos_maintained as i64,
            seniority_level: record.seniority_level.as_str().to_string(),
            seniority_confidence: record.seniority_confidence,
            influence_score: record.influence_score as i64,
            organization_memberships: serde_json::to_string(&record.organization_memberships).unwrap_or_default(),
            top_collaborators: serde_json::to_string(&record.top_collaborators).unwrap_or_default(),
            commits_per_week: record.commits_per_week,
            prs_per_month: record.prs_per_month,
            consistency_score: record.consistency_score,
            activity_trend: activity_trend_str(record.activity_trend).to_string(),
            last_active_at: record.last_active_at,
            reachability_score: record.reachability_score as i64,
            reachability_signals: serde_json::to_string(&record.reachability_signals).unwrap_or_default(),
            best_contact_method: record.best_contact_method.as_str().to_string(),
            partial: record.partial,
            source_fetched_at: record.source_fetched_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
            ai_summary: record.ai_summary.clone(),
        }
    }

    pub fn into_record(self) -> IntelligenceRecord {
        IntelligenceRecord {
            username: self.username,
            display_name: self.display_name,
            extracted_emails: serde_json::from_str(&self.extracted_emails).unwrap_or_default(),
            inferred_city: self.inferred_city,
            inferred_country: self.inferred_country,
            inferred_timezone: self.inferred_timezone,
            current_employer_hint: self.current_employer_hint,
            primary_languages: serde_json::from_str::<HashMap<String, LanguageShare>>(&self.primary_languages).unwrap_or_default(),
            frameworks: serde_json::from_str(&self.frameworks).unwrap_or_default(),
            tools: serde_json::from_str(&self.tools).unwrap_or_default(),
            domains: serde_json::from_str(&self.domains).unwrap_or_default(),
            years_active: self.years_active,
            total_commits_estimate: self.total_commits_estimate as u64,
            repos_maintained: self.repos_maintained as u32,
            seniority_level: SeniorityLevel::from_str(&self.seniority_level).unwrap_or(SeniorityLevel::Junior),
            seniority_confidence: self.seniority_confidence,
            influence_score: self.influence_score as u32,
            organization_memberships: serde_json::from_str(&self.organization_memberships).unwrap_or_default(),
            top_collaborators: serde_json::from_str::<Vec<TopCollaborator>>(&self.top_collaborators).unwrap_or_default(),
            commits_per_week: self.commits_per_week,
            prs_per_month: self.prs_per_month,
            consistency_score: self.consistency_score,
            activity_trend: parse_activity_trend(&self.activity_trend),
            last_active_at: self.last_active_at,
            reachability_score: self.reachability_score as u32,
            reachability_signals: serde_json::from_str::<Vec<ReachabilitySignal>>(&self.reachability_signals).unwrap_or_default(),
            best_contact_method: parse_best_contact_method(&self.best_contact_method),
            partial: self.partial,
            source_fetched_at: self.source_fetched_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            ai_summary: self.ai_summary,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct CollaborationRow {
    pub user_a: String,
    pub user_b: String,
    pub shared_repos: String,
    pub strength: i64,
    pub last_interaction_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CollaborationRow {
    pub fn from_edge(edge: &CollaborationEdge) -> Self {
        Self {
            user_a: edge.user_a.clone(),
            user_b: edge.user_b.clone(),
            shared_repos: serde_json::to_string(&edge.shared_repos).unwrap_or_default(),
            strength: edge.strength as i64,
            last_interaction_at: edge.last_interaction_at,
            updated_at: edge.updated_at,
        }
    }

    pub fn into_edge(self) -> CollaborationEdge {
        CollaborationEdge {
            user_a: self.user_a,
            user_b: self.user_b,
            shared_repos: serde_json::from_str::<BTreeSet<String>>(&self.shared_repos).unwrap_or_default(),
            strength: self.strength as u32,
            last_interaction_at: self.last_interaction_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct TimelineRow {
    pub username: String,
    pub week_start: DateTime<Utc>,
    pub commits: i64,
    pub prs_opened: i64,
    pub prs_merged: i64,
    pub issues_opened: i64,
    pub reviews_given: i64,
    pub active_days: i64,
}

impl TimelineRow {
    pub fn from_point(point: &ActivityTimelinePoint) -> Self {
        Self {
            username: point.username.clone(),
            week_start: point.week_start,
            commits: point.commits as i64,
            prs_opened: point.prs_opened as i64,
            prs_merged: point.prs_merged as i64,
            issues_opened: point.issues_opened as i64,
            reviews_given: point.reviews_given as i64,
            active_days: point.active_days as i64,
        }
    }

    pub fn into_point(self) -> ActivityTimelinePoint {
        ActivityTimelinePoint {
            username: self.username,
            week_start: self.week_start,
            commits: self.commits as u32,
            prs_opened: self.prs_opened as u32,
            prs_merged: self.prs_merged as u32,
            issues_opened: self.issues_opened as u32,
            reviews_given: self.reviews_given as u32,
            active_days: self.active_days as u8,
        }
    }
}
