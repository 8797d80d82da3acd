use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use super::{bson_datetime_as_chrono, bson_datetime_as_chrono_option};

/// Answer shape a question expects.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    Text,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "single_choice",
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::Text => "text",
        }
    }

    pub fn is_choice(&self) -> bool {
        match self {
            QuestionType::SingleChoice | QuestionType::MultipleChoice => true,
            QuestionType::Text => false,
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionOption {
    pub id: String,
    pub title: String,
}

/// Question embedded in its form document. Options are embedded in turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Question {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
}

impl Question {
    pub fn has_option(&self, option_id: &str) -> bool {
        self.options.iter().any(|option| option.id == option_id)
    }
}

/// Form stored in MongoDB "forms" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Form {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "bson_datetime_as_chrono")]
    pub start_at: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub end_at: Option<DateTime<Utc>>,
    pub owner_id: String,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Form {
    /// Whether `now` falls inside the voting window. A missing end is open-ended.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.deleted_at.is_none()
            && self.start_at <= now
            && self.end_at.is_none_or(|end_at| now <= end_at)
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateOptionRequest {
    #[validate(length(min = 1, max = 200, message = "Option title must be between 1 and 200 characters"))]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 500, message = "Question title must be between 1 and 500 characters"))]
    pub title: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default)]
    #[validate(nested)]
    pub options: Vec<CreateOptionRequest>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateFormRequest {
    #[validate(length(min = 5, max = 100, message = "title must be at least 5 characters long"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    #[validate(nested)]
    pub questions: Vec<CreateQuestionRequest>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateOptionRequest {
    pub id: Option<String>,
    #[validate(length(min = 1, max = 200, message = "Option title must be between 1 and 200 characters"))]
    pub title: String,
}

/// A question entry in a partial update. Without `id` it is appended as new.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    pub id: Option<String>,
    #[validate(length(min = 1, max = 500, message = "Question title must be between 1 and 500 characters"))]
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub question_type: Option<QuestionType>,
    #[validate(nested)]
    pub options: Option<Vec<UpdateOptionRequest>>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateFormRequest {
    #[validate(length(min = 5, max = 100, message = "title must be at least 5 characters long"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    #[serde(default)]
    #[validate(nested)]
    pub questions: Vec<UpdateQuestionRequest>,
    #[serde(default)]
    pub deleted_question_ids: Vec<String>,
}

/// Owner view of a form
#[derive(Debug, Clone, Serialize)]
pub struct FormResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub owner_id: String,
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Form> for FormResponse {
    fn from(form: Form) -> Self {
        Self {
            id: form.id,
            title: form.title,
            description: form.description,
            start_at: form.start_at,
            end_at: form.end_at,
            owner_id: form.owner_id,
            questions: form.questions,
            created_at: form.created_at,
            updated_at: form.updated_at,
        }
    }
}

/// Respondent view of a form, without ownership details
#[derive(Debug, Clone, Serialize)]
pub struct PublicFormResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub questions: Vec<Question>,
}

impl From<Form> for PublicFormResponse {
    fn from(form: Form) -> Self {
        Self {
            id: form.id,
            title: form.title,
            description: form.description,
            start_at: form.start_at,
            end_at: form.end_at,
            questions: form.questions,
        }
    }
}

/// Row of the owner's form list
#[derive(Debug, Clone, Serialize)]
pub struct FormSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub question_count: usize,
    pub created_at: DateTime<Utc>,
}

impl From<Form> for FormSummary {
    fn from(form: Form) -> Self {
        Self {
            question_count: form.questions.len(),
            id: form.id,
            title: form.title,
            description: form.description,
            start_at: form.start_at,
            end_at: form.end_at,
            created_at: form.created_at,
        }
    }
}
