use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Scaled-by-100 quantities (`1500` is `15.00`) are stored as plain `i64`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: Uuid,
    pub name: String,
    /// Hundredths, `100` is a coefficient of 1.00.
    pub coefficient: i64,
    pub parent_id: Option<Uuid>,
    /// As stored; the tree index recomputes it from the parent chain.
    pub depth: i32,
    pub is_main_subject: bool,
    pub is_display_subject: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub name: String,
    pub value: i64,
    pub out_of: i64,
    pub coefficient: i64,
    pub passed_at: NaiveDate,
    pub period_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub id: Uuid,
    pub name: String,
    pub start_at: NaiveDate,
    pub end_at: NaiveDate,
    pub is_cumulative: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomAverageSubject {
    pub subject_id: Uuid,
    pub custom_coefficient: Option<i64>,
    pub include_children: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomAverage {
    pub id: Uuid,
    pub name: String,
    pub subjects: Vec<CustomAverageSubject>,
    pub is_main_average: bool,
}

/// Everything one user owns, read at a single point in time.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub subjects: Vec<Subject>,
    pub grades: Vec<Grade>,
    pub periods: Vec<Period>,
    pub custom_averages: Vec<CustomAverage>,
}

impl Snapshot {
    pub fn period_named(&self, name: &str) -> Option<&Period> {
        self.periods
            .iter()
            .find(|period| period.name.eq_ignore_ascii_case(name))
    }

    pub fn subject_named(&self, name: &str) -> Option<&Subject> {
        self.subjects
            .iter()
            .find(|subject| subject.name.eq_ignore_ascii_case(name))
    }

    pub fn custom_average_named(&self, name: &str) -> Option<&CustomAverage> {
        self.custom_averages
            .iter()
            .find(|custom| custom.name.eq_ignore_ascii_case(name))
    }
}
