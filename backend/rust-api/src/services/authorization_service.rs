use std::sync::Arc;

use crate::error::{ServiceError, ServiceResult};
use crate::models::form::Form;
use crate::repository::Store;

/// Ownership and eligibility checks for form operations.
pub struct FormAuthorizationService {
    store: Arc<dyn Store>,
}

impl FormAuthorizationService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// False when the form does not exist.
    pub async fn is_form_owner(&self, user_id: &str, form_id: &str) -> ServiceResult<bool> {
        Ok(self
            .store
            .find_form(form_id)
            .await?
            .is_some_and(|form| form.is_owned_by(user_id)))
    }

    /// Owners never submit their own forms; everyone else submits once.
    pub async fn can_submit(&self, user_id: &str, form: &Form) -> ServiceResult<()> {
        if form.is_owned_by(user_id) {
            return Err(ServiceError::CannotSubmitOwnForm);
        }
        if self.store.submission_exists(user_id, &form.id).await? {
            return Err(ServiceError::SubmissionAlreadyExists);
        }
        Ok(())
    }

    /// Results, voters, edits and deletion are for the owner only.
    pub fn can_view_results(&self, user_id: &str, form: &Form) -> ServiceResult<()> {
        if !form.is_owned_by(user_id) {
            tracing::warn!(user_id = %user_id, form_id = %form.id, "Non-owner access denied");
            return Err(ServiceError::NotFormOwner);
        }
        Ok(())
    }
}
