// src/models/exam.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// An exam definition owned by a course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub course_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,

    /// Length of one attempt, in minutes.
    pub duration_minutes: u32,

    /// When false, a student may hold at most one result for this exam.
    pub multiple_attempts: bool,

    /// Questions in authoring order. Ids are 1..n.
    pub questions: Vec<Question>,
}

impl Exam {
    /// Whether `now` falls inside the exam's availability window (inclusive).
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now <= self.end_time
    }

    pub fn duration_secs(&self) -> i64 {
        i64::from(self.duration_minutes) * 60
    }

    pub fn question(&self, id: i64) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Highest total a result of this exam can reach.
    pub fn max_marks(&self) -> u32 {
        self.questions
            .iter()
            .fold(0u32, |acc, q| acc.saturating_add(q.marks))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub text: String,
    pub marks: u32,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

/// Question variants. Stored with a `type` tag:
/// `multiple-choice`, `short-answer` or `long-answer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum QuestionKind {
    MultipleChoice {
        options: Vec<String>,
        correct_answer: String,
    },
    ShortAnswer,
    LongAnswer,
}

impl QuestionKind {
    pub fn is_objective(&self) -> bool {
        matches!(self, QuestionKind::MultipleChoice { .. })
    }
}

/// Question as shown to a student taking the exam (no answer key).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub text: String,
    pub marks: u32,
    #[serde(rename = "type")]
    pub question_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        let (question_type, options) = match &q.kind {
            QuestionKind::MultipleChoice { options, .. } => {
                ("multiple-choice", Some(options.clone()))
            }
            QuestionKind::ShortAnswer => ("short-answer", None),
            QuestionKind::LongAnswer => ("long-answer", None),
        };
        Self {
            id: q.id,
            text: q.text.clone(),
            marks: q.marks,
            question_type,
            options,
        }
    }
}

/// Exam listing entry for students.
#[derive(Debug, Serialize)]
pub struct AvailableExam {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub course_id: i64,
    pub course_name: String,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: u32,
    pub question_count: usize,
}

/// Upper bound for the marks of one question.
pub const MAX_QUESTION_MARKS: u32 = 1000;

/// DTO for authoring a question. Ids are assigned by the service.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuestionInput {
    #[validate(length(min = 1, max = 2000))]
    pub text: String,
    #[validate(range(
        min = 1,
        max = MAX_QUESTION_MARKS,
        message = "Marks must be between 1 and 1000."
    ))]
    pub marks: u32,
    #[serde(flatten)]
    #[validate(custom(function = validate_kind))]
    pub kind: QuestionKind,
}

fn validate_kind(kind: &QuestionKind) -> Result<(), ValidationError> {
    if let QuestionKind::MultipleChoice {
        options,
        correct_answer,
    } = kind
    {
        if options.len() < 2 {
            return Err(ValidationError::new("options_need_at_least_two"));
        }
        if options.iter().any(|o| o.trim().is_empty()) {
            return Err(ValidationError::new("option_cannot_be_empty"));
        }
        if !options.contains(correct_answer) {
            return Err(ValidationError::new("correct_answer_not_in_options"));
        }
    }
    Ok(())
}

/// DTO for creating or replacing an exam.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = validate_window))]
pub struct ExamInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub description: String,
    pub course_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[validate(range(min = 1, max = 1440))]
    pub duration_minutes: u32,
    #[serde(default)]
    pub multiple_attempts: bool,
    #[validate(
        length(min = 1, max = 500, message = "An exam needs between 1 and 500 questions."),
        nested
    )]
    pub questions: Vec<QuestionInput>,
}

fn validate_window(input: &ExamInput) -> Result<(), ValidationError> {
    if input.end_time < input.start_time {
        return Err(ValidationError::new("end_time_before_start_time"));
    }
    Ok(())
}

impl ExamInput {
    /// Builds the stored exam, assigning question ids in authoring order.
    pub fn into_exam(self, id: i64) -> Exam {
        let questions = self
            .questions
            .into_iter()
            .zip(1..)
            .map(|(q, qid)| Question {
                id: qid,
                text: q.text,
                marks: q.marks,
                kind: q.kind,
            })
            .collect();

        Exam {
            id,
            name: self.name,
            description: self.description,
            course_id: self.course_id,
            start_time: self.start_time,
            end_time: self.end_time,
            duration_minutes: self.duration_minutes,
            multiple_attempts: self.multiple_attempts,
            questions,
        }
    }
}

/// Query string for staff exam listing.
#[derive(Debug, Deserialize)]
pub struct ExamListQuery {
    pub course_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn input(marks: u32) -> ExamInput {
        let now = Utc::now();
        serde_json::from_value(json!({
            "name": "Quiz",
            "course_id": 1,
            "start_time": now,
            "end_time": now + Duration::hours(1),
            "duration_minutes": 10,
            "questions": [
                {"text": "Pick B", "marks": marks, "type": "multiple-choice",
                 "options": ["A", "B"], "correct_answer": "B"},
                {"text": "Explain", "marks": 10, "type": "long-answer"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_question_marks_are_bounded() {
        assert!(input(MAX_QUESTION_MARKS).validate().is_ok());
        assert!(input(0).validate().is_err());
        assert!(input(MAX_QUESTION_MARKS + 1).validate().is_err());
        assert!(input(3_000_000_000).validate().is_err());
    }

    #[test]
    fn test_nested_question_rules_apply() {
        let mut exam = input(5);
        exam.questions[0].kind = QuestionKind::MultipleChoice {
            options: vec!["A".into(), "B".into()],
            correct_answer: "C".to_string(),
        };
        assert!(exam.validate().is_err());

        exam.questions.clear();
        assert!(exam.validate().is_err());
    }

    #[test]
    fn test_max_marks_sums_questions() {
        let exam = input(5).into_exam(1);
        assert_eq!(exam.max_marks(), 15);
        assert_eq!(exam.questions[1].id, 2);
    }
}
