// src/services/scoring.rs

use std::collections::{BTreeMap, HashMap};

use crate::models::{
    exam::{Question, QuestionKind},
    result::{Answer, AnswerStatus, ExamResult},
};

/// Scores a submission.
///
/// Multiple-choice answers earn full marks on an exact, case-sensitive match
/// with the correct option and are auto-graded. Written answers earn 0 and
/// wait for a grader. Every question gets an entry; unanswered ones carry an
/// empty answer.
pub fn score(questions: &[Question], raw: &BTreeMap<i64, String>) -> (BTreeMap<i64, Answer>, u32) {
    let mut answers = BTreeMap::new();

    for q in questions {
        let given = raw.get(&q.id).cloned().unwrap_or_default();
        let (marks, status) = match &q.kind {
            QuestionKind::MultipleChoice { correct_answer, .. } => {
                let marks = if given == *correct_answer { q.marks } else { 0 };
                (marks, AnswerStatus::AutoGraded)
            }
            QuestionKind::ShortAnswer | QuestionKind::LongAnswer => {
                (0, AnswerStatus::PendingEvaluation)
            }
        };
        answers.insert(
            q.id,
            Answer {
                answer: given,
                marks,
                status,
            },
        );
    }

    let total = total_marks(&answers);
    (answers, total)
}

/// Sum of awarded marks. Saturates instead of wrapping.
pub fn total_marks(answers: &BTreeMap<i64, Answer>) -> u32 {
    answers
        .values()
        .fold(0u32, |acc, a| acc.saturating_add(a.marks))
}

/// Saturates a requested mark into `[0, max]`.
pub fn clamp_marks(requested: i64, max: u32) -> u32 {
    requested.clamp(0, i64::from(max)) as u32
}

#[derive(Debug, PartialEq)]
pub enum GradeError {
    /// The request names question ids the result has no answer for.
    UnknownQuestions(Vec<i64>),
}

/// Applies grader marks to a result and recomputes its total.
///
/// Written answers become `evaluated`. Multiple-choice answers are left as
/// auto-graded and entries for them are skipped. Returns the ids that changed.
pub fn apply_grades(
    result: &mut ExamResult,
    questions: &[Question],
    requested: &HashMap<i64, i64>,
) -> Result<Vec<i64>, GradeError> {
    let mut unknown: Vec<i64> = requested
        .keys()
        .filter(|id| {
            !result.answers.contains_key(*id) || !questions.iter().any(|q| q.id == **id)
        })
        .copied()
        .collect();
    if !unknown.is_empty() {
        unknown.sort_unstable();
        return Err(GradeError::UnknownQuestions(unknown));
    }

    let mut changed = Vec::new();
    for q in questions {
        let Some(&marks) = requested.get(&q.id) else {
            continue;
        };
        if q.kind.is_objective() {
            continue;
        }
        if let Some(answer) = result.answers.get_mut(&q.id) {
            answer.marks = clamp_marks(marks, q.marks);
            answer.status = AnswerStatus::Evaluated;
            changed.push(q.id);
        }
    }

    result.total_marks = total_marks(&result.answers);
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn mcq(id: i64, marks: u32, correct: &str) -> Question {
        Question {
            id,
            text: format!("Question {}", id),
            marks,
            kind: QuestionKind::MultipleChoice {
                options: vec!["A".into(), "B".into(), "C".into()],
                correct_answer: correct.to_string(),
            },
        }
    }

    fn written(id: i64, marks: u32) -> Question {
        Question {
            id,
            text: format!("Explain {}", id),
            marks,
            kind: QuestionKind::LongAnswer,
        }
    }

    fn raw(pairs: &[(i64, &str)]) -> BTreeMap<i64, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    fn result_for(questions: &[Question], answers: &[(i64, &str)]) -> ExamResult {
        let (answers, total) = score(questions, &raw(answers));
        ExamResult {
            id: 1,
            exam_id: 1,
            student_id: 1,
            course_id: 1,
            session_id: 1,
            answers,
            total_marks: total,
            is_published: false,
            publish_date: None,
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn test_score_exact_match_only() {
        let questions = vec![mcq(1, 5, "B"), mcq(2, 3, "Paris")];
        let (answers, total) = score(&questions, &raw(&[(1, "B"), (2, "paris")]));

        assert_eq!(answers[&1].marks, 5);
        assert_eq!(answers[&2].marks, 0);
        assert_eq!(answers[&1].status, AnswerStatus::AutoGraded);
        assert_eq!(answers[&2].status, AnswerStatus::AutoGraded);
        assert_eq!(total, 5);
    }

    #[test]
    fn test_written_answers_wait_for_grader() {
        let questions = vec![
            mcq(1, 2, "A"),
            written(2, 10),
            Question {
                id: 3,
                text: "Define".into(),
                marks: 4,
                kind: QuestionKind::ShortAnswer,
            },
        ];
        let (answers, total) = score(&questions, &raw(&[(1, "A"), (2, "essay"), (3, "word")]));

        assert_eq!(answers[&2].status, AnswerStatus::PendingEvaluation);
        assert_eq!(answers[&3].status, AnswerStatus::PendingEvaluation);
        assert_eq!(answers[&2].marks, 0);
        assert_eq!(total, 2);
    }

    #[test]
    fn test_unanswered_questions_are_recorded_empty() {
        let questions = vec![mcq(1, 5, "B"), written(2, 5)];
        let (answers, total) = score(&questions, &BTreeMap::new());

        assert_eq!(answers.len(), 2);
        assert_eq!(answers[&1].answer, "");
        assert_eq!(answers[&1].marks, 0);
        assert_eq!(total, 0);
    }

    #[test]
    fn test_score_is_deterministic() {
        let questions = vec![mcq(1, 5, "B"), written(2, 5), mcq(3, 1, "C")];
        let input = raw(&[(1, "B"), (2, "text"), (3, "A")]);
        assert_eq!(score(&questions, &input), score(&questions, &input));
    }

    #[test]
    fn test_large_marks_saturate_instead_of_overflowing() {
        let questions = vec![mcq(1, 3_000_000_000, "B"), mcq(2, 3_000_000_000, "B")];
        let (answers, total) = score(&questions, &raw(&[(1, "B"), (2, "B")]));

        assert_eq!(answers[&1].marks, 3_000_000_000);
        assert_eq!(total, u32::MAX);
    }

    #[test]
    fn test_clamp_marks() {
        assert_eq!(clamp_marks(-3, 10), 0);
        assert_eq!(clamp_marks(4, 10), 4);
        assert_eq!(clamp_marks(25, 10), 10);
    }

    #[test]
    fn test_grading_recomputes_total() {
        let questions = vec![mcq(1, 5, "B"), written(2, 10), written(3, 10)];
        let mut result = result_for(&questions, &[(1, "B"), (2, "a"), (3, "b")]);

        let marks = HashMap::from([(2, 7), (3, 99)]);
        let changed = apply_grades(&mut result, &questions, &marks).unwrap();

        assert_eq!(changed, vec![2, 3]);
        assert_eq!(result.answers[&2].marks, 7);
        assert_eq!(result.answers[&3].marks, 10);
        assert_eq!(result.answers[&2].status, AnswerStatus::Evaluated);
        assert_eq!(result.total_marks, 22);
        assert_eq!(result.total_marks, total_marks(&result.answers));
    }

    #[test]
    fn test_grading_negative_marks_saturate_to_zero() {
        let questions = vec![written(1, 10)];
        let mut result = result_for(&questions, &[(1, "a")]);

        apply_grades(&mut result, &questions, &HashMap::from([(1, 6)])).unwrap();
        apply_grades(&mut result, &questions, &HashMap::from([(1, -4)])).unwrap();

        assert_eq!(result.answers[&1].marks, 0);
        assert_eq!(result.answers[&1].status, AnswerStatus::Evaluated);
        assert_eq!(result.total_marks, 0);
    }

    #[test]
    fn test_grading_leaves_multiple_choice_alone() {
        let questions = vec![mcq(1, 5, "B"), written(2, 10)];
        let mut result = result_for(&questions, &[(1, "A"), (2, "a")]);

        let changed =
            apply_grades(&mut result, &questions, &HashMap::from([(1, 5), (2, 3)])).unwrap();

        assert_eq!(changed, vec![2]);
        assert_eq!(result.answers[&1].marks, 0);
        assert_eq!(result.answers[&1].status, AnswerStatus::AutoGraded);
        assert_eq!(result.total_marks, 3);
    }

    #[test]
    fn test_grading_rejects_unknown_question() {
        let questions = vec![written(1, 10)];
        let mut result = result_for(&questions, &[(1, "a")]);

        let err = apply_grades(&mut result, &questions, &HashMap::from([(9, 1), (4, 1)]));
        assert_eq!(err, Err(GradeError::UnknownQuestions(vec![4, 9])));
        assert_eq!(result.answers[&1].status, AnswerStatus::PendingEvaluation);
    }
}
