use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ServiceError, ServiceResult};
use crate::metrics;
use crate::models::dashboard::DashboardForm;
use crate::models::form::Form;
use crate::models::participation::{ParticipationStatus, UserFormParticipation};
use crate::repository::{RepositoryError, Store};
use crate::utils::time::truncate_to_millis;

/// Tracks where each user stands with each form.
pub struct ParticipationService {
    store: Arc<dyn Store>,
}

impl ParticipationService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn set_status(
        &self,
        user_id: &str,
        form_id: &str,
        status: ParticipationStatus,
    ) -> ServiceResult<UserFormParticipation> {
        let form = self
            .store
            .find_form(form_id)
            .await?
            .ok_or(ServiceError::FormNotFound)?;

        self.set_status_for_form(user_id, &form, status).await
    }

    /// Same as [`set_status`](Self::set_status) for a form the caller already loaded.
    pub async fn set_status_for_form(
        &self,
        user_id: &str,
        form: &Form,
        status: ParticipationStatus,
    ) -> ServiceResult<UserFormParticipation> {
        let current = self.store.find_participation(user_id, &form.id).await?;
        self.write_status(user_id, form, current, status).await
    }

    /// Writes the transition from `current`, the row as last read. Fails with
    /// `ConcurrentModification` when the stored row moved on since then.
    pub(crate) async fn write_status(
        &self,
        user_id: &str,
        form: &Form,
        current: Option<UserFormParticipation>,
        status: ParticipationStatus,
    ) -> ServiceResult<UserFormParticipation> {
        let now = truncate_to_millis(Utc::now());

        let Some(current) = current else {
            let created = UserFormParticipation::start(user_id, &form.id, status, now)?;
            return match self.store.insert_participation(&created).await {
                Ok(()) => {
                    metrics::record_transition("none", status.as_str());
                    tracing::debug!(
                        user_id = %user_id,
                        form_id = %form.id,
                        status = %status,
                        "Participation created"
                    );
                    Ok(created)
                }
                Err(RepositoryError::Duplicate) => Err(ServiceError::ConcurrentModification),
                Err(e) => Err(e.into()),
            };
        };

        let next = current.transition(status, now)?;
        if !self
            .store
            .replace_participation(&next, current.version)
            .await?
        {
            tracing::warn!(
                user_id = %user_id,
                form_id = %form.id,
                "Participation changed between read and write"
            );
            return Err(ServiceError::ConcurrentModification);
        }

        metrics::record_transition(current.status.as_str(), status.as_str());
        tracing::debug!(
            user_id = %user_id,
            form_id = %form.id,
            from = %current.status,
            to = %status,
            "Participation updated"
        );

        Ok(next)
    }

    pub async fn get_participation(
        &self,
        user_id: &str,
        form_id: &str,
    ) -> ServiceResult<UserFormParticipation> {
        self.store
            .find_participation(user_id, form_id)
            .await?
            .ok_or(ServiceError::ParticipationNotFound)
    }

    pub async fn delete_participation(&self, user_id: &str, form_id: &str) -> ServiceResult<()> {
        if !self.store.delete_participation(user_id, form_id).await? {
            return Err(ServiceError::ParticipationNotFound);
        }
        tracing::debug!(user_id = %user_id, form_id = %form_id, "Participation removed");
        Ok(())
    }

    /// Forms that belong on the user's dashboard: every form open at `now`
    /// plus every live form the user already interacted with.
    pub async fn forms_for_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<DashboardForm>> {
        let participations: Vec<UserFormParticipation> = self
            .store
            .list_participations_by_user(user_id)
            .await?
            .into_iter()
            .filter(|p| p.status != ParticipationStatus::Deleted)
            .collect();
        let by_form: HashMap<&str, &UserFormParticipation> = participations
            .iter()
            .map(|p| (p.form_id.as_str(), p))
            .collect();

        let mut forms = self.store.list_active_forms(now).await?;
        let missing: Vec<String> = participations
            .iter()
            .filter(|p| !forms.iter().any(|f| f.id == p.form_id))
            .map(|p| p.form_id.clone())
            .collect();
        forms.extend(
            self.store
                .find_forms_by_ids(&missing)
                .await?
                .into_iter()
                .filter(|f| !f.is_deleted()),
        );
        forms.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut result = Vec::with_capacity(forms.len());
        for form in forms {
            let participation = by_form.get(form.id.as_str()).copied();
            let status = match participation {
                Some(p) => p.status,
                None if form.is_active_at(now) => ParticipationStatus::Available,
                None => continue,
            };

            let mut progress_percentage = None;
            let mut last_modified = participation.map(|p| p.last_modified);
            if status == ParticipationStatus::InProgress {
                if let Some(draft) = self.store.find_draft(user_id, &form.id).await? {
                    progress_percentage = Some(draft.progress_percentage);
                    last_modified = Some(draft.updated_at);
                }
            }

            result.push(DashboardForm {
                id: form.id,
                title: form.title,
                description: form.description,
                start_at: form.start_at,
                end_at: form.end_at,
                status,
                progress_percentage,
                last_modified,
                completed_at: participation.and_then(|p| p.completed_at),
            });
        }

        Ok(result)
    }
}
