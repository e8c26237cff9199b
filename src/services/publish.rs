// src/services/publish.rs

use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::result::{ExamResult, PublishRequest, PublishResponse},
    services::access::exam_not_found,
    store::Store,
};

/// A result is visible to its student once published and the publish date,
/// if any, has passed.
pub fn is_visible(result: &ExamResult, now: DateTime<Utc>) -> bool {
    result.is_published && result.publish_date.is_none_or(|date| date <= now)
}

/// Unpublishing always clears the publish date.
pub fn normalize(req: &PublishRequest) -> (bool, Option<DateTime<Utc>>) {
    if req.is_published {
        (true, req.publish_date)
    } else {
        (false, None)
    }
}

/// Applies the publish gate to every result of an exam.
pub async fn publish(
    store: &dyn Store,
    exam_id: i64,
    req: &PublishRequest,
) -> Result<PublishResponse, AppError> {
    if store.get_exam(exam_id).await?.is_none() {
        return Err(exam_not_found());
    }

    let (is_published, publish_date) = normalize(req);
    let updated = store
        .set_publish_state(exam_id, is_published, publish_date)
        .await?;

    tracing::info!(
        "Exam {} results: published={} date={:?} ({} updated)",
        exam_id,
        is_published,
        publish_date,
        updated
    );

    Ok(PublishResponse {
        exam_id,
        is_published,
        publish_date,
        updated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use chrono::{Duration, TimeZone};

    use crate::models::{
        exam::Exam,
        result::NewResult,
        session::NewSession,
    };
    use crate::store::MemoryStore;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()
    }

    fn result(is_published: bool, publish_date: Option<DateTime<Utc>>) -> ExamResult {
        ExamResult {
            id: 1,
            exam_id: 1,
            student_id: 1,
            course_id: 1,
            session_id: 1,
            answers: BTreeMap::new(),
            total_marks: 0,
            is_published,
            publish_date,
            submitted_at: now(),
        }
    }

    #[test]
    fn test_visibility_gate() {
        assert!(!is_visible(&result(false, None), now()));
        assert!(!is_visible(&result(false, Some(now() - Duration::days(1))), now()));
        assert!(is_visible(&result(true, None), now()));
        assert!(is_visible(&result(true, Some(now())), now()));

        let scheduled = result(true, Some(now() + Duration::hours(2)));
        assert!(!is_visible(&scheduled, now()));
        assert!(is_visible(&scheduled, now() + Duration::hours(3)));
    }

    #[test]
    fn test_unpublish_clears_date() {
        let req = PublishRequest {
            is_published: false,
            publish_date: Some(now()),
        };
        assert_eq!(normalize(&req), (false, None));
    }

    #[tokio::test]
    async fn test_publish_applies_to_every_result_of_exam() {
        let store = MemoryStore::new();
        let exam = store
            .create_exam(&Exam {
                id: 0,
                name: "Quiz".to_string(),
                description: String::new(),
                course_id: 1,
                start_time: now(),
                end_time: now() + Duration::hours(1),
                duration_minutes: 10,
                multiple_attempts: true,
                questions: Vec::new(),
            })
            .await
            .unwrap();

        for student_id in [1, 2] {
            let session = store
                .create_session(&NewSession {
                    exam_id: exam.id,
                    student_id,
                    course_id: 1,
                    started_at: now(),
                    deadline: now() + Duration::minutes(10),
                    single_attempt: false,
                })
                .await
                .unwrap();
            let build = |saved: &BTreeMap<i64, String>| {
                let result = NewResult {
                    exam_id: exam.id,
                    student_id,
                    course_id: 1,
                    answers: BTreeMap::new(),
                    total_marks: 0,
                    submitted_at: now(),
                };
                (saved.clone(), result)
            };
            store.finalize_session(session.id, &build).await.unwrap();
        }

        let later = now() + Duration::days(1);
        let response = publish(
            &store,
            exam.id,
            &PublishRequest {
                is_published: true,
                publish_date: Some(later),
            },
        )
        .await
        .unwrap();
        assert_eq!(response.updated, 2);

        let results = store.results_for_exam(exam.id).await.unwrap();
        assert!(results.iter().all(|r| r.is_published && r.publish_date == Some(later)));
        assert!(results.iter().all(|r| !is_visible(r, now())));

        let err = publish(
            &store,
            999,
            &PublishRequest {
                is_published: true,
                publish_date: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
