//! Inline SQL migrations for the intelligence store's schema.
//!
//! Simple inline migrations (not sqlx migration files) because the schema
//! is small, self-contained, and entirely owned by this crate.

pub const MIGRATIONS: &[&str] = &[
    // Migration 1: intelligence — one durable row per enriched username.
    r#"
CREATE TABLE IF NOT EXISTS intelligence (
    username TEXT PRIMARY KEY,
    display_name TEXT,
    extracted_emails TEXT NOT NULL DEFAULT '[]',
    inferred_city TEXT,
    inferred_country TEXT,
    inferred_timezone TEXT,
    current_employer_hint TEXT,
    primary_languages TEXT NOT NULL DEFAULT '{}',
    frameworks TEXT NOT NULL DEFAULT '[]',
    tools TEXT NOT NULL DEFAULT '[]',
    domains TEXT NOT NULL DEFAULT '[]',
    years_active REAL NOT NULL DEFAULT 0,
    total_commits_estimate INTEGER NOT NULL DEFAULT 0,
    repos_maintained INTEGER NOT NULL DEFAULT 0,
    seniority_level TEXT NOT NULL DEFAULT 'junior',
    seniority_confidence REAL NOT NULL DEFAULT 0,
    influence_score INTEGER NOT NULL DEFAULT 0,
    organization_memberships TEXT NOT NULL DEFAULT '[]',
    top_collaborators TEXT NOT NULL DEFAULT '[]',
    commits_per_week REAL NOT NULL DEFAULT 0,
    prs_per_month REAL NOT NULL DEFAULT 0,
    consistency_score REAL NOT NULL DEFAULT 0,
    activity_trend TEXT NOT NULL DEFAULT 'dormant',
    last_active_at TEXT,
    reachability_score INTEGER NOT NULL DEFAULT 0,
    reachability_signals TEXT NOT NULL DEFAULT '[]',
    best_contact_method TEXT NOT NULL DEFAULT 'none',
    partial INTEGER NOT NULL DEFAULT 0,
    source_fetched_at TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    ai_summary TEXT
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_intelligence_source_fetched_at ON intelligence(source_fetched_at);"#,
    // Migration 3: collaboration — undirected, canonicalized edges.
    r#"
CREATE TABLE IF NOT EXISTS collaboration (
    user_a TEXT NOT NULL,
    user_b TEXT NOT NULL,
    shared_repos TEXT NOT NULL DEFAULT '[]',
    strength INTEGER NOT NULL,
    last_interaction_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (user_a, user_b),
    CHECK (user_a < user_b)
);
"#,
    // Migration 4: activity_timeline — append-style weekly points.
    r#"
CREATE TABLE IF NOT EXISTS activity_timeline (
    username TEXT NOT NULL,
    week_start TEXT NOT NULL,
    commits INTEGER NOT NULL DEFAULT 0,
    prs_opened INTEGER NOT NULL DEFAULT 0,
    prs_merged INTEGER NOT NULL DEFAULT 0,
    issues_opened INTEGER NOT NULL DEFAULT 0,
    reviews_given INTEGER NOT NULL DEFAULT 0,
    active_days INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (username, week_start)
);
"#,
];
