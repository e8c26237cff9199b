// src/services/eligibility.rs

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    models::user::UserProfile,
    services::attendance,
    store::{Store, StoreResult},
};

/// Exam access is allowed when the monthly percentage reaches the threshold.
pub fn is_eligible(monthly_percentage: f64, threshold: f64) -> bool {
    monthly_percentage >= threshold
}

#[derive(Debug, Clone, Serialize)]
pub struct Eligibility {
    pub eligible: bool,

    /// `None` when there was nothing to compute from (no course or no ledger).
    pub monthly_percentage: Option<f64>,
    pub threshold: f64,
}

impl Eligibility {
    pub fn message(&self) -> Option<String> {
        (!self.eligible).then(|| {
            format!(
                "Your attendance for this month is below the required {}%. Please contact your administrator.",
                self.threshold
            )
        })
    }
}

/// Evaluates the gate for one student.
///
/// Fails open: a student without a course, or whose course has no attendance
/// recorded at all, is eligible.
pub async fn check(
    store: &dyn Store,
    student: &UserProfile,
    today: NaiveDate,
) -> StoreResult<Eligibility> {
    let settings = store.attendance_settings().await?;
    let threshold = settings.exam_eligibility_threshold;

    let Some(course_id) = student.course_id else {
        return Ok(Eligibility {
            eligible: true,
            monthly_percentage: None,
            threshold,
        });
    };

    let ledger = store.course_ledger(course_id).await?;
    if ledger.is_empty() {
        return Ok(Eligibility {
            eligible: true,
            monthly_percentage: None,
            threshold,
        });
    }

    let pct = attendance::monthly_percentage(&ledger, student.id, today, &settings);
    Ok(Eligibility {
        eligible: is_eligible(pct, threshold),
        monthly_percentage: Some(pct),
        threshold,
    })
}
