//! Network extractor (C5.3): infers co-contributors and an influence score
//! from events and org memberships, and emits the collaboration edges a
//! candidate's bundle alone can produce.

use std::collections::{BTreeSet, HashMap};

use gh_intel_types::{CollaborationEdge, EventKind, ProfileBundle, TopCollaborator};

const TOP_COLLABORATORS_LIMIT: usize = 20;
const EDGE_MIN_WEIGHT: u32 = 2;

const WEIGHT_REVIEW: u32 = 3;
const WEIGHT_PR: u32 = 2;
const WEIGHT_ISSUE: u32 = 1;
const WEIGHT_SHARED_PUSH: u32 = 1;

pub struct NetworkOutput {
    pub top_collaborators: Vec<TopCollaborator>,
    pub influence_score: u32,
    pub organization_memberships: Vec<String>,
    pub edges: Vec<CollaborationEdge>,
}

struct Accumulated {
    weight: u32,
    repos: BTreeSet<String>,
    last_seen: chrono::DateTime<chrono::Utc>,
}

pub fn extract(bundle: &ProfileBundle) -> NetworkOutput {
    let mut by_other: HashMap<String, Accumulated> = HashMap::new();

    for event in &bundle.events {
        let Some(other) = &event.related_user else { continue };
        let weight = match &event.kind {
            EventKind::PullRequestReview => WEIGHT_REVIEW,
            EventKind::PullRequest { .. } => WEIGHT_PR,
            EventKind::Issues { .. } => WEIGHT_ISSUE,
            EventKind::Push { .. } => WEIGHT_SHARED_PUSH,
            EventKind::Other => continue,
        };
        let entry = by_other.entry(other.to_lowercase()).or_insert_with(|| Accumulated {
            weight: 0,
            repos: BTreeSet::new(),
            last_seen: event.created_at,
        });
        entry.weight += weight;
        entry.last_seen = entry.last_seen.max(event.created_at);
        if let Some(repo) = &event.repo {
            entry.repos.insert(repo.clone());
        }
    }

    let mut ranked: Vec<(String, Accumulated)> = by_other.into_iter().collect();
    ranked.sort_by(|a, b| b.1.weight.cmp(&a.1.weight).then(a.0.cmp(&b.0)));

    let edges: Vec<CollaborationEdge> = ranked
        .iter()
        .filter(|(_, acc)| acc.weight >= EDGE_MIN_WEIGHT)
        .filter_map(|(other, acc)| {
            CollaborationEdge::new(&bundle.username, other, acc.repos.clone(), acc.weight, acc.last_seen, acc.last_seen)
        })
        .collect();

    let top_collaborators: Vec<TopCollaborator> = ranked
        .into_iter()
        .take(TOP_COLLABORATORS_LIMIT)
        .map(|(username, acc)| TopCollaborator { username, strength: acc.weight, shared_repos: acc.repos })
        .collect();

    let sum_stars: u64 = bundle.repos.iter().map(|r| r.stargazers).sum();
    let influence_score = {
        let score = 5.0 * bundle.orgs.len() as f64
            + 10.0 * (1.0 + bundle.user.followers as f64).log10()
            + 0.1 * sum_stars as f64
            + (top_collaborators.len() as f64).min(20.0);
        score.clamp(0.0, 100.0).round() as u32
    };

    NetworkOutput {
        top_collaborators,
        influence_score,
        organization_memberships: bundle.orgs.iter().cloned().collect(),
        edges,
    }
}
