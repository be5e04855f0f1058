use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// An undirected co-contribution link between two users. `user_a < user_b`
/// always holds lexicographically, so the same pair never produces two rows
/// regardless of which side was enriched first.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CollaborationEdge {
    pub user_a: String,
    pub user_b: String,
    pub shared_repos: BTreeSet<String>,
    pub strength: u32,
    pub last_interaction_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CollaborationEdge {
    /// Builds an edge from an unordered pair, canonicalizing the order.
    /// Returns `None` for a self-edge (`left == right`), which is never
    /// meaningful.
    pub fn new(
        left: &str,
        right: &str,
        shared_repos: BTreeSet<String>,
        strength: u32,
        last_interaction_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Option<Self> {
        if left == right {
            return None;
        }
        let (user_a, user_b) = if left < right {
            (left.to_string(), right.to_string())
        } else {
            (right.to_string(), left.to_string())
        };
        Some(Self {
            user_a,
            user_b,
            shared_repos,
            strength,
            last_interaction_at,
            updated_at,
        })
    }

    /// The upsert-on-conflict merge rule: strength takes the max, repos are
    /// unioned, timestamps take the max.
    pub fn merge(&self, other: &CollaborationEdge) -> CollaborationEdge {
        debug_assert_eq!(self.user_a, other.user_a);
        debug_assert_eq!(self.user_b, other.user_b);
        CollaborationEdge {
            user_a: self.user_a.clone(),
            user_b: self.user_b.clone(),
            shared_repos: self.shared_repos.union(&other.shared_repos).cloned().collect(),
            strength: self.strength.max(other.strength),
            last_interaction_at: self.last_interaction_at.max(other.last_interaction_at),
            updated_at: self.updated_at.max(other.updated_at),
        }
    }
}
