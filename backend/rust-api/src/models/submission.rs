use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bson_datetime_as_chrono;
use super::participation::ParticipationStatus;

/// Raw answer as sent by the client, used both for drafts and final submits.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerSubmission {
    pub question_id: String,
    #[serde(default)]
    pub option_ids: Vec<String>,
    #[serde(default)]
    pub text: String,
}

impl AnswerSubmission {
    pub fn is_answered(&self) -> bool {
        !self.option_ids.is_empty() || !self.text.is_empty()
    }
}

/// Validated answer persisted inside a submission
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Answer {
    pub question_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub option_ids: Vec<String>,
}

/// Submission stored in MongoDB "submissions" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub form_id: String,
    #[serde(with = "bson_datetime_as_chrono")]
    pub completed_at: DateTime<Utc>,
    pub answers: Vec<Answer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitFormRequest {
    pub answers: Vec<AnswerSubmission>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionResponse {
    pub id: String,
    pub form_id: String,
    pub user_id: String,
    pub completed_at: DateTime<Utc>,
    pub answers: Vec<Answer>,
}

impl From<Submission> for SubmissionResponse {
    fn from(submission: Submission) -> Self {
        Self {
            id: submission.id,
            form_id: submission.form_id,
            user_id: submission.user_id,
            completed_at: submission.completed_at,
            answers: submission.answers,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HasVotedQuery {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct HasVotedResponse {
    pub submitted: bool,
}

/// A respondent of a form as seen by its owner: either a finished
/// submission or a participant who is still in progress.
#[derive(Debug, Clone, Serialize)]
pub struct FormVoter {
    pub id: Option<String>,
    pub user_id: String,
    pub email: String,
    pub status: ParticipationStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
}
