use chrono::{DateTime, Utc};

/// One week's worth of aggregated activity for a user. `week_start` is
/// always a Monday at midnight UTC; `active_days` is the count of distinct
/// days within that week that had at least one event.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ActivityTimelinePoint {
    pub username: String,
    pub week_start: DateTime<Utc>,
    pub commits: u32,
    pub prs_opened: u32,
    pub prs_merged: u32,
    pub issues_opened: u32,
    pub reviews_given: u32,
    pub active_days: u8,
}

impl ActivityTimelinePoint {
    /// Sum of the four counts the monotonic-refinement rule compares.
    /// `prs_merged` is deliberately excluded — it is a subset of
    /// `prs_opened` over time and double-counts otherwise.
    fn refinement_total(&self) -> u32 {
        self.commits + self.prs_opened + self.issues_opened + self.reviews_given
    }

    /// An existing timeline row is only overwritten by a later fetch if the
    /// new row's activity total is greater than or equal to the stored one.
    pub fn should_replace(existing: &ActivityTimelinePoint, candidate: &ActivityTimelinePoint) -> bool {
        debug_assert_eq!(existing.week_start, candidate.week_start);
        candidate.refinement_total() >= existing.refinement_total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn point(commits: u32, prs_opened: u32, prs_merged: u32, issues_opened: u32, reviews_given: u32) -> ActivityTimelinePoint {
        ActivityTimelinePoint {
            username: "alice".to_string(),
            week_start: Utc.with_ymd_and_hms(2026, 7, 20, 0, 0, 0).unwrap(),
            commits,
            prs_opened,
            prs_merged,
            issues_opened,
            reviews_given,
            active_days: 0,
        }
    }

    #[test]
    fn refines_upward_only() {
        let existing = point(5, 1, 1, 0, 2);
        assert!(ActivityTimelinePoint::should_replace(&existing, &point(7, 1, 1, 0, 2)));
        assert!(!ActivityTimelinePoint::should_replace(&existing, &point(3, 1, 1, 0, 2)));
    }

    #[test]
    fn prs_merged_does_not_affect_refinement() {
        let existing = point(5, 1, 0, 0, 2);
        // Lower commits but a higher prs_merged must not count as a refinement.
        assert!(!ActivityTimelinePoint::should_replace(&existing, &point(4, 1, 5, 0, 2)));
    }
}
