use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{Grade, Period};

/// Grades that count towards `period`.
///
/// A cumulative period also folds in every period that started on or before
/// it, so the third term of a cumulative year carries the first two along.
pub fn grades_in_scope<'g>(
    period: &Period,
    periods: &[Period],
    grades: &'g [Grade],
) -> Vec<&'g Grade> {
    let included: Vec<Uuid> = if period.is_cumulative {
        periods
            .iter()
            .filter(|other| other.id == period.id || other.start_at <= period.start_at)
            .map(|other| other.id)
            .collect()
    } else {
        vec![period.id]
    };

    grades
        .iter()
        .filter(|grade| grade.period_id.is_some_and(|id| included.contains(&id)))
        .collect()
}

pub fn period_for_date(periods: &[Period], date: NaiveDate) -> Option<&Period> {
    periods
        .iter()
        .find(|period| period.start_at <= date && date <= period.end_at)
}
