use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::answer_validator::validate_answer;
use super::authorization_service::FormAuthorizationService;
use crate::error::{ServiceError, ServiceResult};
use crate::metrics;
use crate::models::form::{Form, Question};
use crate::models::new_id;
use crate::models::participation::ParticipationStatus;
use crate::models::submission::{Answer, AnswerSubmission, FormVoter, Submission};
use crate::repository::{RepositoryError, Store};
use crate::utils::time::truncate_to_millis;

pub struct SubmissionService {
    store: Arc<dyn Store>,
}

/// Turns raw answers into persisted answers, rejecting anything that does not
/// fit the form.
pub fn assemble_answers(form: &Form, answers: &[AnswerSubmission]) -> ServiceResult<Vec<Answer>> {
    let questions: HashMap<&str, &Question> = form
        .questions
        .iter()
        .map(|q| (q.id.as_str(), q))
        .collect();
    let mut seen = HashSet::new();

    answers
        .iter()
        .map(|answer| {
            let question = questions
                .get(answer.question_id.as_str())
                .ok_or_else(|| ServiceError::QuestionNotInForm(answer.question_id.clone()))?;

            if !seen.insert(answer.question_id.as_str()) {
                return Err(ServiceError::DuplicateAnswer(answer.question_id.clone()));
            }

            validate_answer(question, answer)?;

            if let Some(unknown) = answer.option_ids.iter().find(|id| !question.has_option(id)) {
                return Err(ServiceError::OptionNotInQuestion {
                    question_id: question.id.clone(),
                    option_id: unknown.clone(),
                });
            }

            let text = (!question.question_type.is_choice()).then(|| answer.text.clone());
            Ok(Answer {
                question_id: question.id.clone(),
                text,
                option_ids: answer.option_ids.clone(),
            })
        })
        .collect()
}

impl SubmissionService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn submit(
        &self,
        form_id: &str,
        user_id: &str,
        answers: &[AnswerSubmission],
    ) -> ServiceResult<Submission> {
        let result = self.try_submit(form_id, user_id, answers).await;
        metrics::record_submission(if result.is_ok() { "accepted" } else { "rejected" });
        result
    }

    async fn try_submit(
        &self,
        form_id: &str,
        user_id: &str,
        answers: &[AnswerSubmission],
    ) -> ServiceResult<Submission> {
        let form = self
            .store
            .find_form(form_id)
            .await?
            .ok_or(ServiceError::FormNotFound)?;

        FormAuthorizationService::new(self.store.clone())
            .can_submit(user_id, &form)
            .await?;

        let now = truncate_to_millis(Utc::now());
        if !form.is_active_at(now) {
            return Err(ServiceError::FormNotActive);
        }

        let submission = Submission {
            id: new_id(),
            user_id: user_id.to_string(),
            form_id: form.id.clone(),
            completed_at: now,
            answers: assemble_answers(&form, answers)?,
        };

        match self.store.insert_submission(&submission).await {
            Ok(()) => {}
            Err(RepositoryError::Duplicate) => return Err(ServiceError::SubmissionAlreadyExists),
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            user_id = %user_id,
            form_id = %form.id,
            submission_id = %submission.id,
            answers = submission.answers.len(),
            "Form submitted"
        );

        Ok(submission)
    }

    /// Whether the user registered under `email` has submitted the form.
    pub async fn has_submitted(&self, form_id: &str, email: &str) -> ServiceResult<bool> {
        match self.store.find_user_by_email(&email.trim().to_lowercase()).await? {
            Some(user) => Ok(self.store.submission_exists(&user.id, form_id).await?),
            None => Ok(false),
        }
    }

    /// Everyone who finished the form plus everyone still working on it.
    pub async fn voters(&self, form_id: &str, requester_id: &str) -> ServiceResult<Vec<FormVoter>> {
        let form = self
            .store
            .find_form(form_id)
            .await?
            .ok_or(ServiceError::FormNotFound)?;
        FormAuthorizationService::new(self.store.clone()).can_view_results(requester_id, &form)?;

        let submissions = self.store.list_submissions_by_form(form_id).await?;
        let in_progress = self
            .store
            .list_participations_by_form(form_id, ParticipationStatus::InProgress)
            .await?;

        let user_ids: Vec<String> = submissions
            .iter()
            .map(|s| s.user_id.clone())
            .chain(in_progress.iter().map(|p| p.user_id.clone()))
            .collect();
        let emails: HashMap<String, String> = self
            .store
            .find_users_by_ids(&user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u.email))
            .collect();
        let email_of = |user_id: &str| emails.get(user_id).cloned().unwrap_or_default();

        let mut voters: Vec<FormVoter> = submissions
            .into_iter()
            .map(|s| FormVoter {
                email: email_of(&s.user_id),
                id: Some(s.id),
                user_id: s.user_id,
                status: ParticipationStatus::Completed,
                completed_at: Some(s.completed_at),
                last_modified: Some(s.completed_at),
            })
            .collect();
        voters.extend(in_progress.into_iter().map(|p| FormVoter {
            email: email_of(&p.user_id),
            id: None,
            user_id: p.user_id,
            status: ParticipationStatus::InProgress,
            completed_at: None,
            last_modified: Some(p.last_modified),
        }));

        Ok(voters)
    }
}
