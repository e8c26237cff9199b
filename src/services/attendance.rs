// src/services/attendance.rs

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::models::attendance::{
    AttendanceLedger, AttendanceSettings, AttendanceSummary, DayCounts,
};

fn same_month(date: NaiveDate, reference: NaiveDate) -> bool {
    date.year() == reference.year() && date.month() == reference.month()
}

/// Counts the student's marked days inside the calendar month of `reference`.
pub fn month_counts(ledger: &AttendanceLedger, student_id: i64, reference: NaiveDate) -> DayCounts {
    let mut counts = DayCounts::default();
    for (date, day) in ledger {
        if !same_month(*date, reference) {
            continue;
        }
        if let Some(status) = day.get(&student_id) {
            counts.record(*status);
        }
    }
    counts
}

/// Penalty formula: `100 - absent * absent_penalty - half * half_day_penalty`, floored at 0.
/// Present and unmarked days never subtract.
pub fn percentage_from_counts(counts: &DayCounts, settings: &AttendanceSettings) -> f64 {
    let pct = 100.0
        - f64::from(counts.absent) * settings.absent_penalty
        - f64::from(counts.half_day) * settings.half_day_penalty;
    pct.max(0.0)
}

/// Monthly attendance percentage of one student for the month containing `reference`.
pub fn monthly_percentage(
    ledger: &AttendanceLedger,
    student_id: i64,
    reference: NaiveDate,
    settings: &AttendanceSettings,
) -> f64 {
    percentage_from_counts(&month_counts(ledger, student_id, reference), settings)
}

/// Full attendance overview for a student dashboard.
pub fn summarize(
    ledger: &AttendanceLedger,
    student_id: i64,
    course_id: Option<i64>,
    reference: NaiveDate,
    settings: &AttendanceSettings,
) -> AttendanceSummary {
    let mut overall = DayCounts::default();
    let mut by_month: BTreeMap<String, DayCounts> = BTreeMap::new();

    for (date, day) in ledger {
        let Some(status) = day.get(&student_id) else {
            continue;
        };
        overall.record(*status);
        by_month
            .entry(date.format("%Y-%m").to_string())
            .or_default()
            .record(*status);
    }

    let total_percentage = match overall.marked() {
        0 => 0.0,
        marked => {
            (f64::from(overall.present) + f64::from(overall.half_day) * 0.5) / f64::from(marked)
                * 100.0
        }
    };

    let this_month = month_counts(ledger, student_id, reference);
    let monthly = percentage_from_counts(&this_month, settings);

    AttendanceSummary {
        student_id,
        course_id,
        total_percentage,
        monthly_percentage: monthly,
        overall,
        this_month,
        by_month,
        eligible: monthly >= settings.exam_eligibility_threshold,
        threshold: settings.exam_eligibility_threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::attendance::AttendanceStatus;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn mark(ledger: &mut AttendanceLedger, d: NaiveDate, student: i64, status: AttendanceStatus) {
        ledger.entry(d).or_default().insert(student, status);
    }

    #[test]
    fn test_two_absences_and_a_half_day() {
        let mut ledger = AttendanceLedger::new();
        mark(&mut ledger, date(2026, 3, 2), 1, AttendanceStatus::Absent);
        mark(&mut ledger, date(2026, 3, 3), 1, AttendanceStatus::Absent);
        mark(&mut ledger, date(2026, 3, 4), 1, AttendanceStatus::HalfDay);
        mark(&mut ledger, date(2026, 3, 5), 1, AttendanceStatus::Present);

        let pct = monthly_percentage(&ledger, 1, date(2026, 3, 20), &AttendanceSettings::default());
        assert_eq!(pct, 87.5);
    }

    #[test]
    fn test_no_marked_days_is_full_attendance() {
        let ledger = AttendanceLedger::new();
        let pct = monthly_percentage(&ledger, 1, date(2026, 3, 20), &AttendanceSettings::default());
        assert_eq!(pct, 100.0);
    }

    #[test]
    fn test_other_months_and_students_are_ignored() {
        let mut ledger = AttendanceLedger::new();
        mark(&mut ledger, date(2026, 2, 28), 1, AttendanceStatus::Absent);
        mark(&mut ledger, date(2026, 4, 1), 1, AttendanceStatus::Absent);
        mark(&mut ledger, date(2026, 3, 10), 2, AttendanceStatus::Absent);
        mark(&mut ledger, date(2026, 3, 31), 1, AttendanceStatus::HalfDay);

        let pct = monthly_percentage(&ledger, 1, date(2026, 3, 1), &AttendanceSettings::default());
        assert_eq!(pct, 97.5);
    }

    #[test]
    fn test_percentage_floors_at_zero() {
        let mut ledger = AttendanceLedger::new();
        for d in 1..=25 {
            mark(&mut ledger, date(2026, 3, d), 1, AttendanceStatus::Absent);
        }
        let pct = monthly_percentage(&ledger, 1, date(2026, 3, 15), &AttendanceSettings::default());
        assert_eq!(pct, 0.0);
    }

    #[test]
    fn test_percentage_stays_within_bounds() {
        let settings = AttendanceSettings {
            absent_penalty: 7.0,
            half_day_penalty: 3.0,
            exam_eligibility_threshold: 50.0,
        };
        for absent in 0..20u32 {
            for half_day in 0..20u32 {
                let counts = DayCounts {
                    present: 3,
                    absent,
                    half_day,
                };
                let pct = percentage_from_counts(&counts, &settings);
                assert!((0.0..=100.0).contains(&pct), "{} out of range", pct);
            }
        }
    }

    #[test]
    fn test_summary_totals_and_months() {
        let mut ledger = AttendanceLedger::new();
        mark(&mut ledger, date(2026, 2, 10), 1, AttendanceStatus::Present);
        mark(&mut ledger, date(2026, 2, 11), 1, AttendanceStatus::Absent);
        mark(&mut ledger, date(2026, 3, 2), 1, AttendanceStatus::HalfDay);
        mark(&mut ledger, date(2026, 3, 3), 1, AttendanceStatus::Present);

        let summary = summarize(
            &ledger,
            1,
            Some(9),
            date(2026, 3, 15),
            &AttendanceSettings::default(),
        );

        // (2 present + 0.5) / 4 marked
        assert_eq!(summary.total_percentage, 62.5);
        assert_eq!(summary.monthly_percentage, 97.5);
        assert_eq!(summary.overall.marked(), 4);
        assert_eq!(summary.this_month.half_day, 1);
        assert_eq!(
            summary.by_month.keys().cloned().collect::<Vec<_>>(),
            vec!["2026-02".to_string(), "2026-03".to_string()]
        );
        assert!(summary.eligible);
    }

    #[test]
    fn test_summary_without_records() {
        let summary = summarize(
            &AttendanceLedger::new(),
            1,
            None,
            date(2026, 3, 15),
            &AttendanceSettings::default(),
        );
        assert_eq!(summary.total_percentage, 0.0);
        assert_eq!(summary.monthly_percentage, 100.0);
        assert!(summary.by_month.is_empty());
    }
}
