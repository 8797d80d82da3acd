use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::participation_service::ParticipationService;
use crate::error::{ServiceError, ServiceResult};
use crate::models::dashboard::{
    ActivitiesQuery, ActivityPage, DashboardActivity, DashboardData, DashboardStatistics,
    RECENT_ACTIVITY_LIMIT, RECENT_ACTIVITY_WINDOW_DAYS,
};
use crate::models::form::Form;
use crate::models::participation::{ParticipationStatus, UserFormParticipation};
use crate::repository::Store;

pub struct DashboardService {
    store: Arc<dyn Store>,
}

impl DashboardService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn dashboard(&self, user_id: &str) -> ServiceResult<DashboardData> {
        let now = Utc::now();

        let statistics = self.statistics(user_id, now).await?;
        let (recent, _) = self
            .store
            .page_participations(user_id, None, 0, RECENT_ACTIVITY_LIMIT as u64)
            .await?;
        let recent_activity = self.join_forms(recent).await?;
        let forms = ParticipationService::new(self.store.clone())
            .forms_for_user(user_id, now)
            .await?;

        Ok(DashboardData {
            statistics,
            recent_activity,
            forms,
        })
    }

    pub async fn statistics(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<DashboardStatistics> {
        let submitted: HashSet<String> = self
            .store
            .list_submitted_form_ids(user_id)
            .await?
            .into_iter()
            .collect();
        let statuses: HashMap<String, ParticipationStatus> = self
            .store
            .list_participations_by_user(user_id)
            .await?
            .into_iter()
            .map(|p| (p.form_id, p.status))
            .collect();

        let total_available = self
            .store
            .list_active_forms(now)
            .await?
            .iter()
            .filter(|form| !submitted.contains(&form.id))
            .filter(|form| {
                statuses
                    .get(&form.id)
                    .is_none_or(|status| *status == ParticipationStatus::Available)
            })
            .count() as u64;

        let since = now - Duration::days(RECENT_ACTIVITY_WINDOW_DAYS);

        Ok(DashboardStatistics {
            total_available,
            total_in_progress: self
                .store
                .count_participations(user_id, ParticipationStatus::InProgress)
                .await?,
            total_completed: self
                .store
                .count_participations(user_id, ParticipationStatus::Completed)
                .await?,
            recent_activity_count: self
                .store
                .count_participations_modified_since(user_id, since)
                .await?,
        })
    }

    /// Paginated participation log. `status` is a status name or "all".
    pub async fn activities(
        &self,
        user_id: &str,
        query: &ActivitiesQuery,
    ) -> ServiceResult<ActivityPage> {
        let status = match query.status.as_deref() {
            None | Some("") | Some("all") => None,
            Some(name) => Some(
                name.parse::<ParticipationStatus>()
                    .map_err(|e| ServiceError::Validation(e.to_string()))?,
            ),
        };
        let (page, per_page) = query.page_bounds();
        let skip = (page - 1)
            .checked_mul(per_page)
            .ok_or_else(|| ServiceError::Validation("page is out of range".to_string()))?;

        let (rows, total) = self
            .store
            .page_participations(user_id, status, skip, per_page)
            .await?;

        Ok(ActivityPage {
            activities: self.join_forms(rows).await?,
            total,
            page,
            per_page,
        })
    }

    async fn join_forms(
        &self,
        rows: Vec<UserFormParticipation>,
    ) -> ServiceResult<Vec<DashboardActivity>> {
        let ids: Vec<String> = rows.iter().map(|p| p.form_id.clone()).collect();
        let forms: HashMap<String, Form> = self
            .store
            .find_forms_by_ids(&ids)
            .await?
            .into_iter()
            .map(|f| (f.id.clone(), f))
            .collect();

        Ok(rows
            .into_iter()
            .map(|p| {
                let form = forms.get(&p.form_id);
                let status = match form {
                    Some(f) if !f.is_deleted() => p.status,
                    _ => ParticipationStatus::Deleted,
                };
                DashboardActivity {
                    form_title: form.map(|f| f.title.clone()).unwrap_or_default(),
                    form_description: form.map(|f| f.description.clone()).unwrap_or_default(),
                    start_at: form.map(|f| f.start_at),
                    end_at: form.and_then(|f| f.end_at),
                    form_id: p.form_id,
                    status,
                    started_at: p.started_at,
                    completed_at: p.completed_at,
                    last_modified: p.last_modified,
                }
            })
            .collect())
    }
}
