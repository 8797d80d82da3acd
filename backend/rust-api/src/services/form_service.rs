use chrono::{DateTime, Utc};
use std::sync::Arc;
use validator::Validate;

use super::authorization_service::FormAuthorizationService;
use crate::error::{ServiceError, ServiceResult};
use crate::metrics::{FORMS_CREATED_TOTAL, FORMS_DELETED_TOTAL};
use crate::models::form::{
    CreateFormRequest, Form, FormResponse, FormSummary, PublicFormResponse, Question,
    QuestionOption, QuestionType, UpdateFormRequest, UpdateOptionRequest,
};
use crate::models::new_id;
use crate::repository::Store;
use crate::utils::time::truncate_to_millis;

pub struct FormService {
    store: Arc<dyn Store>,
}

fn check_window(start_at: DateTime<Utc>, end_at: Option<DateTime<Utc>>) -> ServiceResult<()> {
    match end_at {
        Some(end_at) if end_at < start_at => Err(ServiceError::InvalidForm(
            "end_at must not be before start_at".to_string(),
        )),
        _ => Ok(()),
    }
}

fn check_question(question: &Question) -> ServiceResult<()> {
    if question.title.trim().is_empty() {
        return Err(ServiceError::InvalidForm(
            "question title must not be empty".to_string(),
        ));
    }
    if question.options.iter().any(|o| o.title.trim().is_empty()) {
        return Err(ServiceError::InvalidForm(format!(
            "question {} has an option without a title",
            question.id
        )));
    }

    match question.question_type {
        QuestionType::SingleChoice | QuestionType::MultipleChoice => {
            if question.options.is_empty() {
                return Err(ServiceError::InvalidForm(format!(
                    "{} question {} needs at least one option",
                    question.question_type, question.id
                )));
            }
        }
        QuestionType::Text => {
            if !question.options.is_empty() {
                return Err(ServiceError::InvalidForm(format!(
                    "text question {} must not have options",
                    question.id
                )));
            }
        }
    }
    Ok(())
}

fn build_options(options: Vec<UpdateOptionRequest>) -> Vec<QuestionOption> {
    options
        .into_iter()
        .map(|o| QuestionOption {
            id: o.id.unwrap_or_else(new_id),
            title: o.title,
        })
        .collect()
}

impl FormService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn load(&self, form_id: &str) -> ServiceResult<Form> {
        self.store
            .find_form(form_id)
            .await?
            .ok_or(ServiceError::FormNotFound)
    }

    async fn load_owned(&self, user_id: &str, form_id: &str) -> ServiceResult<Form> {
        let form = self.load(form_id).await?;
        FormAuthorizationService::new(self.store.clone()).can_view_results(user_id, &form)?;
        Ok(form)
    }

    pub async fn create_form(
        &self,
        owner_id: &str,
        req: CreateFormRequest,
    ) -> ServiceResult<FormResponse> {
        req.validate()?;

        let now = truncate_to_millis(Utc::now());
        let start_at = req.start_at.map(truncate_to_millis).unwrap_or(now);
        let end_at = req.end_at.map(truncate_to_millis);
        check_window(start_at, end_at)?;

        let questions: Vec<Question> = req
            .questions
            .into_iter()
            .map(|q| Question {
                id: new_id(),
                title: q.title,
                question_type: q.question_type,
                options: q
                    .options
                    .into_iter()
                    .map(|o| QuestionOption {
                        id: new_id(),
                        title: o.title,
                    })
                    .collect(),
            })
            .collect();
        questions.iter().try_for_each(check_question)?;

        let form = Form {
            id: new_id(),
            title: req.title,
            description: req.description,
            start_at,
            end_at,
            owner_id: owner_id.to_string(),
            questions,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        self.store.insert_form(&form).await?;
        FORMS_CREATED_TOTAL.inc();

        tracing::info!(
            form_id = %form.id,
            owner_id = %owner_id,
            questions = form.questions.len(),
            "Form created"
        );

        Ok(FormResponse::from(form))
    }

    /// Full view, owner only.
    pub async fn get_form(&self, user_id: &str, form_id: &str) -> ServiceResult<FormResponse> {
        Ok(FormResponse::from(self.load_owned(user_id, form_id).await?))
    }

    /// Respondent view, open to any authenticated user.
    pub async fn get_public_form(&self, form_id: &str) -> ServiceResult<PublicFormResponse> {
        Ok(PublicFormResponse::from(self.load(form_id).await?))
    }

    pub async fn list_user_forms(&self, owner_id: &str) -> ServiceResult<Vec<FormSummary>> {
        let forms = self.store.list_forms_by_owner(owner_id).await?;
        Ok(forms.into_iter().map(FormSummary::from).collect())
    }

    /// Partial update. Only supplied fields change; questions are matched by id.
    pub async fn update_form(
        &self,
        user_id: &str,
        form_id: &str,
        req: UpdateFormRequest,
    ) -> ServiceResult<FormResponse> {
        req.validate()?;
        let mut form = self.load_owned(user_id, form_id).await?;

        if let Some(title) = req.title {
            form.title = title;
        }
        if let Some(description) = req.description {
            form.description = description;
        }
        if let Some(start_at) = req.start_at {
            form.start_at = truncate_to_millis(start_at);
        }
        if let Some(end_at) = req.end_at {
            form.end_at = Some(truncate_to_millis(end_at));
        }
        check_window(form.start_at, form.end_at)?;

        if !req.deleted_question_ids.is_empty() {
            form.questions
                .retain(|q| !req.deleted_question_ids.contains(&q.id));
        }

        let wants_type_change = req.questions.iter().any(|q| {
            q.id.as_ref().is_some_and(|id| {
                form.question(id)
                    .zip(q.question_type)
                    .is_some_and(|(existing, new_type)| existing.question_type != new_type)
            })
        });
        if wants_type_change && self.store.count_submissions_by_form(&form.id).await? > 0 {
            return Err(ServiceError::InvalidForm(
                "question types cannot change once the form has submissions".to_string(),
            ));
        }

        for update in req.questions {
            match update.id {
                Some(id) => {
                    let question = form
                        .questions
                        .iter_mut()
                        .find(|q| q.id == id)
                        .ok_or_else(|| ServiceError::QuestionNotInForm(id.clone()))?;
                    if let Some(title) = update.title {
                        question.title = title;
                    }
                    if let Some(question_type) = update.question_type {
                        question.question_type = question_type;
                    }
                    if let Some(options) = update.options {
                        question.options = build_options(options);
                    }
                }
                None => {
                    let title = update.title.ok_or_else(|| {
                        ServiceError::InvalidForm("new question requires a title".to_string())
                    })?;
                    let question_type = update.question_type.ok_or_else(|| {
                        ServiceError::InvalidForm("new question requires a type".to_string())
                    })?;
                    form.questions.push(Question {
                        id: new_id(),
                        title,
                        question_type,
                        options: build_options(update.options.unwrap_or_default()),
                    });
                }
            }
        }
        form.questions.iter().try_for_each(check_question)?;

        form.updated_at = truncate_to_millis(Utc::now());
        if !self.store.replace_form(&form).await? {
            return Err(ServiceError::FormNotFound);
        }

        tracing::info!(form_id = %form.id, "Form updated");
        Ok(FormResponse::from(form))
    }

    /// Removes the form together with everything that hangs off it.
    pub async fn delete_form(&self, user_id: &str, form_id: &str) -> ServiceResult<()> {
        let form = self.load_owned(user_id, form_id).await?;

        let now = truncate_to_millis(Utc::now());
        if !self.store.delete_form_cascade(&form.id, now).await? {
            return Err(ServiceError::FormNotFound);
        }
        FORMS_DELETED_TOTAL.inc();

        tracing::info!(form_id = %form.id, owner_id = %user_id, "Form deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn question(question_type: QuestionType, options: &[&str]) -> Question {
        Question {
            id: "q1".to_string(),
            title: "Question".to_string(),
            question_type,
            options: options
                .iter()
                .map(|title| QuestionOption {
                    id: new_id(),
                    title: title.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_choice_questions_need_options() {
        assert!(check_question(&question(QuestionType::SingleChoice, &[])).is_err());
        assert!(check_question(&question(QuestionType::MultipleChoice, &["a"])).is_ok());
    }

    #[test]
    fn test_text_questions_reject_options() {
        assert!(check_question(&question(QuestionType::Text, &["a"])).is_err());
        assert!(check_question(&question(QuestionType::Text, &[])).is_ok());
    }

    #[test]
    fn test_window_order() {
        let now = Utc::now();
        assert!(check_window(now, Some(now - Duration::seconds(1))).is_err());
        assert!(check_window(now, Some(now)).is_ok());
        assert!(check_window(now, None).is_ok());
    }
}
