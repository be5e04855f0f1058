use chrono::{DateTime, Utc};

/// One username queued for enrichment, with enough provenance to prioritize
/// it without re-running discovery. Lives only in the orchestrator's queue —
/// discarded the moment it is handed to a worker.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Candidate {
    /// Canonical lowercase GitHub login.
    pub username: String,
    /// Higher is attempted first. Org members and watchlist entries carry a
    /// fixed priority; repo contributors get one scaled by contribution
    /// count (see discovery's scoring).
    pub priority: i32,
    /// The org login, `owner/repo`, or the literal `"watchlist"` that
    /// produced this candidate — kept for diagnostics, not used for scoring.
    pub discovered_from: String,
    pub enqueued_at: DateTime<Utc>,
}

impl Candidate {
    pub fn new(
        username: impl Into<String>,
        priority: i32,
        discovered_from: impl Into<String>,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            username: username.into(),
            priority,
            discovered_from: discovered_from.into(),
            enqueued_at,
        }
    }

    /// Ordering key for the candidate queue: highest priority first, then
    /// earliest discovery first among ties, for deterministic draining.
    pub fn queue_key(&self) -> (i32, std::cmp::Reverse<DateTime<Utc>>) {
        (self.priority, std::cmp::Reverse(self.enqueued_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_priority_sorts_first() {
        let now = Utc::now();
        let watchlist = Candidate::new("alice", 100, "watchlist", now);
        let org_member = Candidate::new("bob", 50, "acme-corp", now);
        let contributor = Candidate::new("carol", 12, "acme-corp/widget", now);
        assert!(watchlist.queue_key() > org_member.queue_key());
        assert!(org_member.queue_key() > contributor.queue_key());
    }

    #[test]
    fn earlier_discovery_breaks_priority_ties() {
        let earlier = Utc::now();
        let later = earlier + chrono::Duration::seconds(1);
        let first = Candidate::new("alice", 50, "acme-corp", earlier);
        let second = Candidate::new("bob", 50, "acme-corp", later);
        assert!(first.queue_key() > second.queue_key());
    }
}
