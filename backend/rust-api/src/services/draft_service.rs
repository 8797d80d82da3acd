use chrono::Utc;
use std::sync::Arc;

use super::authorization_service::FormAuthorizationService;
use super::participation_service::ParticipationService;
use super::progress::calculate_progress;
use crate::error::{ServiceError, ServiceResult};
use crate::metrics::DRAFTS_SAVED_TOTAL;
use crate::models::draft::{DraftResponse, DraftSubmission, SaveDraftRequest};
use crate::models::new_id;
use crate::models::participation::ParticipationStatus;
use crate::repository::Store;
use crate::utils::time::truncate_to_millis;

/// Autosave of unfinished answers.
pub struct DraftService {
    store: Arc<dyn Store>,
}

impl DraftService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Moves the user's participation to in progress, then stores the answers
    /// with a freshly computed progress percentage. Only users who could still
    /// submit the form while it is open may save a draft.
    pub async fn save_draft(
        &self,
        user_id: &str,
        req: SaveDraftRequest,
    ) -> ServiceResult<DraftResponse> {
        let form = self
            .store
            .find_form(&req.form_id)
            .await?
            .ok_or(ServiceError::FormNotFound)?;

        FormAuthorizationService::new(self.store.clone())
            .can_submit(user_id, &form)
            .await?;
        if !form.is_active_at(Utc::now()) {
            return Err(ServiceError::FormNotActive);
        }

        ParticipationService::new(self.store.clone())
            .set_status_for_form(user_id, &form, ParticipationStatus::InProgress)
            .await?;

        let now = truncate_to_millis(Utc::now());
        let draft = DraftSubmission {
            id: new_id(),
            form_id: form.id.clone(),
            user_id: user_id.to_string(),
            progress_percentage: calculate_progress(&form, &req.answers),
            answers: req.answers,
            created_at: now,
            updated_at: now,
        };

        let stored = self.store.upsert_draft(&draft).await?;
        DRAFTS_SAVED_TOTAL.inc();

        tracing::debug!(
            user_id = %user_id,
            form_id = %form.id,
            progress = stored.progress_percentage,
            "Draft saved"
        );

        Ok(DraftResponse::new(stored, form.title, form.description))
    }

    pub async fn get_draft(&self, user_id: &str, form_id: &str) -> ServiceResult<DraftResponse> {
        let form = self
            .store
            .find_form(form_id)
            .await?
            .ok_or(ServiceError::FormNotFound)?;
        let draft = self
            .store
            .find_draft(user_id, form_id)
            .await?
            .ok_or(ServiceError::DraftNotFound)?;

        Ok(DraftResponse::new(draft, form.title, form.description))
    }

    /// Drops the draft. A participation that was in progress goes back to
    /// available; finished ones are left alone.
    pub async fn discard_draft(&self, user_id: &str, form_id: &str) -> ServiceResult<()> {
        let form = self
            .store
            .find_form(form_id)
            .await?
            .ok_or(ServiceError::FormNotFound)?;

        self.remove_draft(user_id, form_id).await?;

        let participation = self.store.find_participation(user_id, form_id).await?;
        if participation.is_some_and(|p| p.status == ParticipationStatus::InProgress) {
            ParticipationService::new(self.store.clone())
                .set_status_for_form(user_id, &form, ParticipationStatus::Available)
                .await?;
        }

        Ok(())
    }

    /// Deletes the draft if there is one.
    pub async fn remove_draft(&self, user_id: &str, form_id: &str) -> ServiceResult<bool> {
        let removed = self.store.delete_draft(user_id, form_id).await?;
        if removed {
            tracing::debug!(user_id = %user_id, form_id = %form_id, "Draft removed");
        }
        Ok(removed)
    }
}
