use thiserror::Error;

use crate::models::form::{Question, QuestionType};
use crate::models::submission::AnswerSubmission;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnswerValidationError {
    #[error("single choice question requires exactly one option")]
    SingleChoiceRequiresOne,
    #[error("multiple choice question requires at least one option")]
    MultipleChoiceRequiresAny,
    #[error("text question requires a text answer")]
    TextRequired,
    #[error("text question should not have options")]
    TextWithOptions,
}

/// Checks the shape of an answer against the declared question type.
pub fn validate_answer(
    question: &Question,
    answer: &AnswerSubmission,
) -> Result<(), AnswerValidationError> {
    match question.question_type {
        QuestionType::SingleChoice => {
            if answer.option_ids.len() != 1 {
                return Err(AnswerValidationError::SingleChoiceRequiresOne);
            }
        }
        QuestionType::MultipleChoice => {
            if answer.option_ids.is_empty() {
                return Err(AnswerValidationError::MultipleChoiceRequiresAny);
            }
        }
        QuestionType::Text => {
            if answer.text.is_empty() {
                return Err(AnswerValidationError::TextRequired);
            }
            if !answer.option_ids.is_empty() {
                return Err(AnswerValidationError::TextWithOptions);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::form::QuestionOption;

    fn question(question_type: QuestionType) -> Question {
        Question {
            id: "q1".to_string(),
            title: "Pick".to_string(),
            question_type,
            options: vec![
                QuestionOption {
                    id: "o1".to_string(),
                    title: "One".to_string(),
                },
                QuestionOption {
                    id: "o2".to_string(),
                    title: "Two".to_string(),
                },
            ],
        }
    }

    fn answer(option_ids: &[&str], text: &str) -> AnswerSubmission {
        AnswerSubmission {
            question_id: "q1".to_string(),
            option_ids: option_ids.iter().map(|s| s.to_string()).collect(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_single_choice_requires_exactly_one() {
        let q = question(QuestionType::SingleChoice);
        assert_eq!(
            validate_answer(&q, &answer(&[], "")),
            Err(AnswerValidationError::SingleChoiceRequiresOne)
        );
        assert_eq!(
            validate_answer(&q, &answer(&["o1", "o2"], "")),
            Err(AnswerValidationError::SingleChoiceRequiresOne)
        );
        assert_eq!(validate_answer(&q, &answer(&["o1"], "")), Ok(()));
    }

    #[test]
    fn test_multiple_choice_requires_any() {
        let q = question(QuestionType::MultipleChoice);
        assert_eq!(
            validate_answer(&q, &answer(&[], "")),
            Err(AnswerValidationError::MultipleChoiceRequiresAny)
        );
        assert_eq!(validate_answer(&q, &answer(&["o2"], "")), Ok(()));
        assert_eq!(validate_answer(&q, &answer(&["o1", "o2"], "")), Ok(()));
    }

    #[test]
    fn test_text_rules() {
        let q = question(QuestionType::Text);
        assert_eq!(
            validate_answer(&q, &answer(&[], "")),
            Err(AnswerValidationError::TextRequired)
        );
        assert_eq!(validate_answer(&q, &answer(&[], "hello")), Ok(()));
        assert_eq!(
            validate_answer(&q, &answer(&["o1"], "hello")),
            Err(AnswerValidationError::TextWithOptions)
        );
    }

    #[test]
    fn test_choice_questions_ignore_text() {
        let q = question(QuestionType::SingleChoice);
        assert_eq!(validate_answer(&q, &answer(&["o1"], "note")), Ok(()));
    }
}
