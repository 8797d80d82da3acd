use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::participation::ParticipationStatus;

pub const RECENT_ACTIVITY_LIMIT: usize = 5;
pub const RECENT_ACTIVITY_WINDOW_DAYS: i64 = 30;
pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DashboardStatistics {
    pub total_available: u64,
    pub total_in_progress: u64,
    pub total_completed: u64,
    pub recent_activity_count: u64,
}

/// One participation row joined with its form
#[derive(Debug, Clone, Serialize)]
pub struct DashboardActivity {
    pub form_id: String,
    pub form_title: String,
    pub form_description: String,
    pub status: ParticipationStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_modified: DateTime<Utc>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
}

/// A form as it appears on a user's dashboard, with the derived status
#[derive(Debug, Clone, Serialize)]
pub struct DashboardForm {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub status: ParticipationStatus,
    pub progress_percentage: Option<f64>,
    pub last_modified: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardData {
    pub statistics: DashboardStatistics,
    pub recent_activity: Vec<DashboardActivity>,
    pub forms: Vec<DashboardForm>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivitiesQuery {
    pub status: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl ActivitiesQuery {
    /// Page number and size, clamped to sane bounds.
    pub fn page_bounds(&self) -> (u64, u64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self
            .per_page
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        (page, per_page)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityPage {
    pub activities: Vec<DashboardActivity>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_bounds_defaults_and_clamping() {
        assert_eq!(ActivitiesQuery::default().page_bounds(), (1, 10));

        let query = ActivitiesQuery {
            status: None,
            page: Some(0),
            per_page: Some(1000),
        };
        assert_eq!(query.page_bounds(), (1, 100));
    }
}
