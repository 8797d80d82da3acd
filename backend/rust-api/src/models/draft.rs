use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bson_datetime_as_chrono;
use super::submission::AnswerSubmission;

/// Autosaved answers stored in MongoDB "drafts" collection, one per (user, form)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftSubmission {
    #[serde(rename = "_id")]
    pub id: String,
    pub form_id: String,
    pub user_id: String,
    #[serde(default)]
    pub answers: Vec<AnswerSubmission>,
    pub progress_percentage: f64,
    #[serde(with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveDraftRequest {
    pub form_id: String,
    #[serde(default)]
    pub answers: Vec<AnswerSubmission>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DraftResponse {
    pub id: String,
    pub form_id: String,
    pub user_id: String,
    pub form_title: String,
    pub form_description: String,
    pub last_modified: DateTime<Utc>,
    pub progress_percentage: f64,
    pub answers: Vec<AnswerSubmission>,
}

impl DraftResponse {
    pub fn new(draft: DraftSubmission, form_title: String, form_description: String) -> Self {
        Self {
            id: draft.id,
            form_id: draft.form_id,
            user_id: draft.user_id,
            form_title,
            form_description,
            last_modified: draft.updated_at,
            progress_percentage: draft.progress_percentage,
            answers: draft.answers,
        }
    }
}
