use std::collections::HashSet;

use crate::models::form::Form;
use crate::models::submission::AnswerSubmission;

/// Share of the form's questions that have an answer, in percent.
///
/// Answers for unknown questions and repeated answers for one question are
/// counted once at most, so the result stays within `0.0..=100.0`. A form
/// without questions yields `0.0`.
pub fn calculate_progress(form: &Form, answers: &[AnswerSubmission]) -> f64 {
    let total = form.questions.len();
    if total == 0 {
        return 0.0;
    }

    let answered: HashSet<&str> = answers
        .iter()
        .filter(|answer| answer.is_answered())
        .filter(|answer| form.question(&answer.question_id).is_some())
        .map(|answer| answer.question_id.as_str())
        .collect();

    answered.len() as f64 / total as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::form::{Question, QuestionType};
    use chrono::Utc;

    fn form_with_questions(n: usize) -> Form {
        let now = Utc::now();
        Form {
            id: "f1".to_string(),
            title: "Survey".to_string(),
            description: String::new(),
            start_at: now,
            end_at: None,
            owner_id: "u1".to_string(),
            questions: (0..n)
                .map(|i| Question {
                    id: format!("q{}", i),
                    title: format!("Question {}", i),
                    question_type: QuestionType::Text,
                    options: Vec::new(),
                })
                .collect(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn text_answer(question_id: &str, text: &str) -> AnswerSubmission {
        AnswerSubmission {
            question_id: question_id.to_string(),
            option_ids: Vec::new(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_no_questions_is_zero() {
        let form = form_with_questions(0);
        assert_eq!(calculate_progress(&form, &[text_answer("q0", "x")]), 0.0);
    }

    #[test]
    fn test_fraction_of_answered_questions() {
        let form = form_with_questions(4);
        for k in 0..=4 {
            let answers: Vec<_> = (0..k).map(|i| text_answer(&format!("q{}", i), "yes")).collect();
            assert_eq!(
                calculate_progress(&form, &answers),
                k as f64 / 4.0 * 100.0
            );
        }
    }

    #[test]
    fn test_empty_answers_do_not_count() {
        let form = form_with_questions(2);
        let answers = vec![text_answer("q0", ""), text_answer("q1", "filled")];
        assert_eq!(calculate_progress(&form, &answers), 50.0);
    }

    #[test]
    fn test_option_answer_counts() {
        let form = form_with_questions(2);
        let answers = vec![AnswerSubmission {
            question_id: "q0".to_string(),
            option_ids: vec!["o1".to_string()],
            text: String::new(),
        }];
        assert_eq!(calculate_progress(&form, &answers), 50.0);
    }

    #[test]
    fn test_stray_and_repeated_answers_do_not_inflate() {
        let form = form_with_questions(2);
        let answers = vec![
            text_answer("q0", "a"),
            text_answer("q0", "again"),
            text_answer("unknown", "b"),
        ];
        assert_eq!(calculate_progress(&form, &answers), 50.0);
    }

    #[test]
    fn test_not_rounded() {
        let form = form_with_questions(3);
        let answers = vec![text_answer("q0", "a")];
        assert_eq!(calculate_progress(&form, &answers), 1.0 / 3.0 * 100.0);
    }
}
