use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{CustomAverage, CustomAverageSubject, Grade, Period, Subject};

pub fn id(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

/// `coefficient` is already in hundredths.
pub fn subject(n: u128, name: &str, coefficient: i64, parent: Option<u128>) -> Subject {
    Subject {
        id: id(n),
        name: name.to_string(),
        coefficient,
        parent_id: parent.map(id),
        depth: if parent.is_some() { 1 } else { 0 },
        is_main_subject: parent.is_none(),
        is_display_subject: false,
    }
}

pub fn display_subject(n: u128, name: &str, parent: Option<u128>) -> Subject {
    Subject {
        coefficient: 0,
        is_display_subject: true,
        ..subject(n, name, 0, parent)
    }
}

/// Whole-number arguments; grade ids live in the `1000+` range.
pub fn grade(n: u128, subject: u128, value: i64, out_of: i64, coefficient: i64) -> Grade {
    Grade {
        id: id(1000 + n),
        subject_id: id(subject),
        name: format!("Test {}", n),
        value: value * 100,
        out_of: out_of * 100,
        coefficient: coefficient * 100,
        passed_at: date(2026, 1, 15),
        period_id: None,
    }
}

pub fn entry(
    subject: u128,
    custom_coefficient: Option<i64>,
    include_children: Option<bool>,
) -> CustomAverageSubject {
    CustomAverageSubject {
        subject_id: id(subject),
        custom_coefficient,
        include_children,
    }
}

pub fn custom(name: &str, subjects: Vec<CustomAverageSubject>) -> CustomAverage {
    CustomAverage {
        id: id(9000),
        name: name.to_string(),
        subjects,
        is_main_average: false,
    }
}

pub fn period(
    n: u128,
    name: &str,
    start: NaiveDate,
    end: NaiveDate,
    is_cumulative: bool,
) -> Period {
    Period {
        id: id(5000 + n),
        name: name.to_string(),
        start_at: start,
        end_at: end,
        is_cumulative,
    }
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid fixture date")
}
