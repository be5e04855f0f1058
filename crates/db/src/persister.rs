//! Transactional, idempotent writes of enrichment results. No component
//! above this one interprets the data it stores — it only upserts under
//! each table's own freshness and merge rules.

use std::collections::HashSet;

use async_trait::async_trait;
use gh_intel_types::{ActivityTimelinePoint, CollaborationEdge, IntelligenceRecord, PersistError};
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::rows::{CollaborationRow, IntelligenceRow, TimelineRow};
use crate::Database;

/// Storage-agnostic interface the orchestrator depends on, so tests (and
/// any future non-SQLite backend) can swap in a different implementation
/// without touching the pipeline above it.
#[async_trait]
pub trait Persister: Send + Sync {
    /// Inserts or updates the row keyed by `username`. `created_at` and
    /// `ai_summary` are preserved across updates — this method never reads
    /// or writes `ai_summary`, since nothing upstream of it computes one.
    async fn upsert_intelligence(&self, record: &IntelligenceRecord) -> Result<(), PersistError>;

    /// Upserts each point under the monotonic-refinement rule: an existing
    /// `(username, week_start)` row is only replaced if the incoming row's
    /// activity total is greater than or equal to the stored one.
    async fn upsert_timeline(&self, points: &[ActivityTimelinePoint]) -> Result<(), PersistError>;

    /// Upserts each canonicalized edge; on conflict, strength takes the
    /// max, shared repos are unioned, and the interaction timestamp takes
    /// the max.
    async fn upsert_collaborations(&self, edges: &[CollaborationEdge]) -> Result<(), PersistError>;

    /// Usernames whose `source_fetched_at` falls within `window` of now —
    /// Discovery's freshness filter.
    async fn existing_usernames(&self, window: chrono::Duration) -> Result<HashSet<String>, PersistError>;

    /// Writes one candidate's full enrichment result — the intelligence
    /// row, its timeline points, and its collaboration edges — in a single
    /// transaction, so a crash between the three never leaves a partial
    /// write visible (Invariant 8, Design Note "Cross-table consistency").
    async fn persist_enrichment(
        &self,
        record: &IntelligenceRecord,
        timeline: &[ActivityTimelinePoint],
        edges: &[CollaborationEdge],
    ) -> Result<(), PersistError>;
}

#[derive(Clone)]
pub struct SqlitePersister {
    pool: SqlitePool,
}

impl SqlitePersister {
    pub fn new(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}

#[async_trait]
impl Persister for SqlitePersister {
    async fn upsert_intelligence(&self, record: &IntelligenceRecord) -> Result<(), PersistError> {
        exec_upsert_intelligence(&self.pool, record).await.map_err(classify)
    }

    async fn upsert_timeline(&self, points: &[ActivityTimelinePoint]) -> Result<(), PersistError> {
        for point in points {
            exec_upsert_timeline_point(&self.pool, point).await.map_err(classify)?;
        }
        Ok(())
    }

    async fn upsert_collaborations(&self, edges: &[CollaborationEdge]) -> Result<(), PersistError> {
        for edge in edges {
            exec_upsert_edge_pool(&self.pool, edge).await.map_err(classify)?;
        }
        Ok(())
    }

    async fn existing_usernames(&self, window: chrono::Duration) -> Result<HashSet<String>, PersistError> {
        let cutoff = chrono::Utc::now() - window;
        let rows: Vec<(String,)> = sqlx::query_as("SELECT username FROM intelligence WHERE source_fetched_at >= ?")
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;
        Ok(rows.into_iter().map(|(u,)| u).collect())
    }

    async fn persist_enrichment(
        &self,
        record: &IntelligenceRecord,
        timeline: &[ActivityTimelinePoint],
        edges: &[CollaborationEdge],
    ) -> Result<(), PersistError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;
        exec_upsert_intelligence(&mut *tx, record).await.map_err(classify)?;
        for point in timeline {
            exec_upsert_timeline_point(&mut *tx, point).await.map_err(classify)?;
        }
        for edge in edges {
            exec_upsert_edge_tx(&mut tx, edge).await.map_err(classify)?;
        }
        tx.commit().await.map_err(classify)?;
        Ok(())
    }
}

async fn exec_upsert_intelligence<'e, E>(executor: E, record: &IntelligenceRecord) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = IntelligenceRow::from_record(record);
    sqlx::query(
        r#"
INSERT INTO intelligence (
    username, display_name, extracted_emails, inferred_city, inferred_country, inferred_timezone,
    current_employer_hint, primary_languages, frameworks, tools, domains, years_active,
    total_commits_estimate, repos_maintained, seniority_level, seniority_confidence, influence_score,
    organization_memberships, top_collaborators, commits_per_week, prs_per_month, consistency_score,
    activity_trend, last_active_at, reachability_score, reachability_signals, best_contact_method,
    partial, source_fetched_at, created_at, updated_at, ai_summary
) VALUES (
    ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
)
ON CONFLICT(username) DO UPDATE SET
    display_name = excluded.display_name,
    extracted_emails = excluded.extracted_emails,
    inferred_city = excluded.inferred_city,
    inferred_country = excluded.inferred_country,
    inferred_timezone = excluded.inferred_timezone,
    current_employer_hint = excluded.current_employer_hint,
    primary_languages = excluded.primary_languages,
    frameworks = excluded.frameworks,
    tools = excluded.tools,
    domains = excluded.domains,
    years_active = excluded.years_active,
    total_commits_estimate = excluded.total_commits_estimate,
    repos_maintained = excluded.repos_maintained,
    seniority_level = excluded.seniority_level,
    seniority_confidence = excluded.seniority_confidence,
    influence_score = excluded.influence_score,
    organization_memberships = excluded.organization_memberships,
    top_collaborators = excluded.top_collaborators,
    commits_per_week = excluded.commits_per_week,
    prs_per_month = excluded.prs_per_month,
    consistency_score = excluded.consistency_score,
    activity_trend = excluded.activity_trend,
    last_active_at = excluded.last_active_at,
    reachability_score = excluded.reachability_score,
    reachability_signals = excluded.reachability_signals,
    best_contact_method = excluded.best_contact_method,
    partial = excluded.partial,
    source_fetched_at = excluded.source_fetched_at,
    updated_at = excluded.updated_at
"#,
    )
    .bind(row.username)
    .bind(row.display_name)
    .bind(row.extracted_emails)
    .bind(row.inferred_city)
    .bind(row.inferred_country)
    .bind(row.inferred_timezone)
    .bind(row.current_employer_hint)
    .bind(row.primary_languages)
    .bind(row.frameworks)
    .bind(row.tools)
    .bind(row.domains)
    .bind(row.years_active)
    .bind(row.total_commits_estimate)
    .bind(row.repos_maintained)
    .bind(row.seniority_level)
    .bind(row.seniority_confidence)
    .bind(row.influence_score)
    .bind(row.organization_memberships)
    .bind(row.top_collaborators)
    .bind(row.commits_per_week)
    .bind(row.prs_per_month)
    .bind(row.consistency_score)
    .bind(row.activity_trend)
    .bind(row.last_active_at)
    .bind(row.reachability_score)
    .bind(row.reachability_signals)
    .bind(row.best_contact_method)
    .bind(row.partial)
    .bind(row.source_fetched_at)
    .bind(row.created_at)
    .bind(row.updated_at)
    .bind(row.ai_summary)
    .execute(executor)
    .await?;
    Ok(())
}

async fn exec_upsert_timeline_point<'e, E>(executor: E, point: &ActivityTimelinePoint) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = TimelineRow::from_point(point);
    // The monotonic-refinement rule lives in the SQL itself: the new row's
    // activity total must be >= the stored one for the UPDATE to apply.
    sqlx::query(
        r#"
INSERT INTO activity_timeline (username, week_start, commits, prs_opened, prs_merged, issues_opened, reviews_given, active_days)
VALUES (?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT(username, week_start) DO UPDATE SET
    commits = excluded.commits,
    prs_opened = excluded.prs_opened,
    prs_merged = excluded.prs_merged,
    issues_opened = excluded.issues_opened,
    reviews_given = excluded.reviews_given,
    active_days = excluded.active_days
WHERE (excluded.commits + excluded.prs_opened + excluded.issues_opened + excluded.reviews_given)
    >= (activity_timeline.commits + activity_timeline.prs_opened + activity_timeline.issues_opened + activity_timeline.reviews_given)
"#,
    )
    .bind(row.username)
    .bind(row.week_start)
    .bind(row.commits)
    .bind(row.prs_opened)
    .bind(row.prs_merged)
    .bind(row.issues_opened)
    .bind(row.reviews_given)
    .bind(row.active_days)
    .execute(executor)
    .await?;
    Ok(())
}

const EDGE_SELECT: &str =
    "SELECT user_a, user_b, shared_repos, strength, last_interaction_at, updated_at FROM collaboration WHERE user_a = ? AND user_b = ?";

const EDGE_UPSERT: &str = r#"
INSERT INTO collaboration (user_a, user_b, shared_repos, strength, last_interaction_at, updated_at)
VALUES (?, ?, ?, ?, ?, ?)
ON CONFLICT(user_a, user_b) DO UPDATE SET
    shared_repos = excluded.shared_repos,
    strength = excluded.strength,
    last_interaction_at = excluded.last_interaction_at,
    updated_at = excluded.updated_at
"#;

fn bind_edge_upsert(row: CollaborationRow) -> sqlx::query::Query<'static, Sqlite, sqlx::sqlite::SqliteArguments<'static>> {
    sqlx::query(EDGE_UPSERT)
        .bind(row.user_a)
        .bind(row.user_b)
        .bind(row.shared_repos)
        .bind(row.strength)
        .bind(row.last_interaction_at)
        .bind(row.updated_at)
}

/// SQLite has no array-union function, so merging `shared_repos` happens in
/// Rust: read the existing row (if any), merge via `CollaborationEdge::merge`,
/// then write the merged result back. Against the pool, the read and write
/// are two separate connections — a concurrent writer for the same pair can
/// interleave between them, but the ON CONFLICT upsert still lands a
/// consistent row; it may just need one more enrichment pass to fully
/// converge, which the idempotent upsert rule tolerates.
async fn exec_upsert_edge_pool(pool: &SqlitePool, edge: &CollaborationEdge) -> Result<(), sqlx::Error> {
    let existing: Option<CollaborationRow> =
        sqlx::query_as(EDGE_SELECT).bind(&edge.user_a).bind(&edge.user_b).fetch_optional(pool).await?;
    let merged = match existing {
        Some(row) => row.into_edge().merge(edge),
        None => edge.clone(),
    };
    bind_edge_upsert(CollaborationRow::from_edge(&merged)).execute(pool).await?;
    Ok(())
}

/// Transaction variant of [`exec_upsert_edge_pool`], used by
/// `persist_enrichment` so the edge write is part of the same atomic commit
/// as the intelligence row and timeline points.
async fn exec_upsert_edge_tx(tx: &mut sqlx::Transaction<'_, Sqlite>, edge: &CollaborationEdge) -> Result<(), sqlx::Error> {
    let existing: Option<CollaborationRow> =
        sqlx::query_as(EDGE_SELECT).bind(&edge.user_a).bind(&edge.user_b).fetch_optional(&mut **tx).await?;
    let merged = match existing {
        Some(row) => row.into_edge().merge(edge),
        None => edge.clone(),
    };
    bind_edge_upsert(CollaborationRow::from_edge(&merged)).execute(&mut **tx).await?;
    Ok(())
}

fn classify(err: sqlx::Error) -> PersistError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if db_err.is_unique_violation() || db_err.is_check_violation() || db_err.is_foreign_key_violation() {
                PersistError::Fatal(err.to_string())
            } else {
                PersistError::Retriable(err.to_string())
            }
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Protocol(_) => {
            PersistError::Retriable(err.to_string())
        }
        _ => PersistError::Fatal(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use chrono::Utc;
    use gh_intel_types::{ActivityTrend, BestContactMethod, SeniorityLevel};
    use std::collections::{BTreeSet, HashMap};

    fn minimal_record(username: &str) -> IntelligenceRecord {
        let now = Utc::now();
        IntelligenceRecord {
            username: username.to_string(),
            display_name: None,
            extracted_emails: BTreeSet::new(),
            inferred_city: None,
            inferred_country: None,
            inferred_timezone: None,
            current_employer_hint: None,
            primary_languages: HashMap::new(),
            frameworks: BTreeSet::new(),
            tools: BTreeSet::new(),
            domains: BTreeSet::new(),
            years_active: 1.0,
            total_commits_estimate: 0,
            repos_maintained: 0,
            seniority_level: SeniorityLevel::Junior,
            seniority_confidence: 0.167,
            influence_score: 0,
            organization_memberships: Vec::new(),
            top_collaborators: Vec::new(),
            commits_per_week: 0.0,
            prs_per_month: 0.0,
            consistency_score: 0.0,
            activity_trend: ActivityTrend::Dormant,
            last_active_at: None,
            reachability_score: 0,
            reachability_signals: Vec::new(),
            best_contact_method: BestContactMethod::None,
            partial: false,
            source_fetched_at: now,
            created_at: now,
            updated_at: now,
            ai_summary: None,
        }
    }

    #[tokio::test]
    async fn upsert_intelligence_is_idempotent() {
        let db = Database::new_in_memory().await.unwrap();
        let persister = SqlitePersister::new(&db);
        let record = minimal_record("alice");
        persister.upsert_intelligence(&record).await.unwrap();
        persister.upsert_intelligence(&record).await.unwrap();

        let rows: Vec<(String,)> = sqlx::query_as("SELECT username FROM intelligence").fetch_all(db.pool()).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn upsert_intelligence_preserves_created_at_and_ai_summary_on_update() {
        let db = Database::new_in_memory().await.unwrap();
        let persister = SqlitePersister::new(&db);
        let mut record = minimal_record("alice");
        persister.upsert_intelligence(&record).await.unwrap();

        sqlx::query("UPDATE intelligence SET ai_summary = ? WHERE username = ?")
            .bind("out-of-band summary")
            .bind("alice")
            .execute(db.pool())
            .await
            .unwrap();

        let original_created_at = record.created_at;
        record.created_at = Utc::now() + chrono::Duration::days(1); // an enrichment run shouldn't touch this
        record.seniority_level = SeniorityLevel::Mid;
        persister.upsert_intelligence(&record).await.unwrap();

        let row: IntelligenceRow = sqlx::query_as(
            "SELECT username, display_name, extracted_emails, inferred_city, inferred_country, inferred_timezone, current_employer_hint, primary_languages, frameworks, tools, domains, years_active, total_commits_estimate, repos_maintained, seniority_level, seniority_confidence, influence_score, organization_memberships, top_collaborators, commits_per_week, prs_per_month, consistency_score, activity_trend, last_active_at, reachability_score, reachability_signals, best_contact_method, partial, source_fetched_at, created_at, updated_at, ai_summary FROM intelligence WHERE username = ?",
        )
        .bind("alice")
        .fetch_one(db.pool())
        .await
        .unwrap();

        assert_eq!(row.ai_summary.as_deref(), Some("out-of-band summary"));
        assert_eq!(row.created_at.timestamp(), original_created_at.timestamp());
        assert_eq!(row.seniority_level, "mid");
    }

    #[tokio::test]
    async fn existing_usernames_respects_freshness_window() {
        let db = Database::new_in_memory().await.unwrap();
        let persister = SqlitePersister::new(&db);
        let mut stale = minimal_record("stale");
        stale.source_fetched_at = Utc::now() - chrono::Duration::days(60);
        persister.upsert_intelligence(&stale).await.unwrap();

        let fresh = minimal_record("fresh");
        persister.upsert_intelligence(&fresh).await.unwrap();

        let usernames = persister.existing_usernames(chrono::Duration::days(30)).await.unwrap();
        assert!(usernames.contains("fresh"));
        assert!(!usernames.contains("stale"));
    }

    #[tokio::test]
    async fn collaboration_upsert_merges_strength_and_repos() {
        let db = Database::new_in_memory().await.unwrap();
        let persister = SqlitePersister::new(&db);
        let now = Utc::now();
        let first = CollaborationEdge::new(
            "alice",
            "bob",
            BTreeSet::from(["acme/a".to_string()]),
            3,
            now,
            now,
        )
        .unwrap();
        let second = CollaborationEdge::new(
            "bob",
            "alice",
            BTreeSet::from(["acme/b".to_string()]),
            5,
            now + chrono::Duration::hours(1),
            now + chrono::Duration::hours(1),
        )
        .unwrap();
        persister.upsert_collaborations(&[first]).await.unwrap();
        persister.upsert_collaborations(&[second]).await.unwrap();

        let row: CollaborationRow =
            sqlx::query_as("SELECT user_a, user_b, shared_repos, strength, last_interaction_at, updated_at FROM collaboration")
                .fetch_one(db.pool())
                .await
                .unwrap();
        let edge = row.into_edge();
        assert_eq!(edge.strength, 5);
        assert_eq!(edge.shared_repos, BTreeSet::from(["acme/a".to_string(), "acme/b".to_string()]));
    }

    #[tokio::test]
    async fn timeline_upsert_refines_upward_only() {
        let db = Database::new_in_memory().await.unwrap();
        let persister = SqlitePersister::new(&db);
        let week_start = Utc::now();
        let high = ActivityTimelinePoint {
            username: "alice".to_string(),
            week_start,
            commits: 10,
            prs_opened: 0,
            prs_merged: 0,
            issues_opened: 0,
            reviews_given: 0,
            active_days: 3,
        };
        let low = ActivityTimelinePoint { commits: 2, ..high.clone() };
        persister.upsert_timeline(&[high.clone()]).await.unwrap();
        persister.upsert_timeline(&[low]).await.unwrap();

        let row: TimelineRow = sqlx::query_as(
            "SELECT username, week_start, commits, prs_opened, prs_merged, issues_opened, reviews_given, active_days FROM activity_timeline",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(row.into_point().commits, 10);
    }

    #[tokio::test]
    async fn persist_enrichment_writes_all_three_tables_in_one_call() {
        let db = Database::new_in_memory().await.unwrap();
        let persister = SqlitePersister::new(&db);
        let record = minimal_record("alice");
        let now = Utc::now();
        let timeline = vec![ActivityTimelinePoint {
            username: "alice".to_string(),
            week_start: now,
            commits: 1,
            prs_opened: 0,
            prs_merged: 0,
            issues_opened: 0,
            reviews_given: 0,
            active_days: 1,
        }];
        let edges = vec![CollaborationEdge::new("alice", "bob", BTreeSet::new(), 2, now, now).unwrap()];

        persister.persist_enrichment(&record, &timeline, &edges).await.unwrap();

        let intel: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM intelligence").fetch_one(db.pool()).await.unwrap();
        let tl: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM activity_timeline").fetch_one(db.pool()).await.unwrap();
        let coll: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM collaboration").fetch_one(db.pool()).await.unwrap();
        assert_eq!(intel.0, 1);
        assert_eq!(tl.0, 1);
        assert_eq!(coll.0, 1);
    }
}
