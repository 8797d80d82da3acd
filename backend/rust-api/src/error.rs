use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::participation::{InvalidTransition, ParticipationStatus};
use crate::repository::RepositoryError;
use crate::services::answer_validator::AnswerValidationError;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("form not found")]
    FormNotFound,
    #[error("draft not found")]
    DraftNotFound,
    #[error("participation not found")]
    ParticipationNotFound,
    #[error("user not found")]
    UserNotFound,

    #[error("user has already submitted the form")]
    SubmissionAlreadyExists,
    #[error("user already exists")]
    UserAlreadyExists,
    #[error("cannot change participation status from {from} to {to}")]
    InvalidStatusTransition {
        from: ParticipationStatus,
        to: ParticipationStatus,
    },
    #[error("participation was modified concurrently, retry the request")]
    ConcurrentModification,
    #[error("form is not accepting submissions")]
    FormNotActive,

    #[error("user is not the owner of this form")]
    NotFormOwner,
    #[error("user cannot submit their own form")]
    CannotSubmitOwnForm,

    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid token")]
    InvalidToken,
    #[error("missing authorization token")]
    MissingToken,

    #[error(transparent)]
    InvalidAnswer(#[from] AnswerValidationError),
    #[error("question with ID {0} not found in form")]
    QuestionNotInForm(String),
    #[error("question with ID {0} answered more than once")]
    DuplicateAnswer(String),
    #[error("option {option_id} does not belong to question {question_id}")]
    OptionNotInQuestion {
        question_id: String,
        option_id: String,
    },
    #[error("invalid form: {0}")]
    InvalidForm(String),
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        ServiceError::InvalidStatusTransition {
            from: err.from,
            to: err.to,
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ServiceError::Validation(errors.to_string())
    }
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::FormNotFound
            | ServiceError::DraftNotFound
            | ServiceError::ParticipationNotFound
            | ServiceError::UserNotFound => StatusCode::NOT_FOUND,

            ServiceError::SubmissionAlreadyExists
            | ServiceError::UserAlreadyExists
            | ServiceError::InvalidStatusTransition { .. }
            | ServiceError::ConcurrentModification
            | ServiceError::FormNotActive => StatusCode::CONFLICT,

            ServiceError::NotFormOwner | ServiceError::CannotSubmitOwnForm => {
                StatusCode::FORBIDDEN
            }

            ServiceError::InvalidCredentials
            | ServiceError::InvalidToken
            | ServiceError::MissingToken => StatusCode::UNAUTHORIZED,

            ServiceError::InvalidAnswer(_)
            | ServiceError::QuestionNotInForm(_)
            | ServiceError::DuplicateAnswer(_)
            | ServiceError::OptionNotInQuestion { .. }
            | ServiceError::InvalidForm(_)
            | ServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,

            ServiceError::Repository(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed");
            "internal server error".to_string()
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
            self.to_string()
        };

        (
            status,
            Json(json!({
                "message": message,
                "status": status.as_u16()
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ServiceError::FormNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ServiceError::SubmissionAlreadyExists.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::CannotSubmitOwnForm.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::InvalidAnswer(AnswerValidationError::TextRequired).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_messages_match_public_contract() {
        assert_eq!(
            ServiceError::QuestionNotInForm("q9".to_string()).to_string(),
            "question with ID q9 not found in form"
        );
        assert_eq!(
            ServiceError::InvalidAnswer(AnswerValidationError::SingleChoiceRequiresOne)
                .to_string(),
            "single choice question requires exactly one option"
        );
    }

    #[tokio::test]
    async fn test_server_errors_hide_details() {
        let response =
            ServiceError::Internal(anyhow::anyhow!("connection reset by peer")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "internal server error");
        assert_eq!(json["status"], 500);
    }
}
