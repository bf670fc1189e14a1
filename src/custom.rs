use std::collections::HashSet;

use crate::average::{AverageCalculator, CoefficientPolicy, OwnCoefficients};
use crate::error::Result;
use crate::models::{CustomAverage, Grade, Subject};
use crate::score::{weighted_mean, Score};
use crate::tree::SubjectTree;

impl<'a, P: CoefficientPolicy> AverageCalculator<'a, P> {
    /// Only the listed subjects are roots; real parent links are ignored.
    pub fn custom_average(&self, custom: &CustomAverage) -> Result<Option<Score>> {
        let mut seen = HashSet::new();
        let mut buckets = Vec::with_capacity(custom.subjects.len());

        for entry in &custom.subjects {
            let subject = self.tree().require(entry.subject_id)?;
            if !seen.insert(entry.subject_id) {
                continue;
            }

            let weight = entry.custom_coefficient.unwrap_or(subject.coefficient);
            let value = if entry.include_children.unwrap_or(true) {
                self.subject_average(entry.subject_id)?
            } else {
                self.own_average(entry.subject_id)?
            };
            buckets.push((Score::from_hundredths(weight), value));
        }

        let average = weighted_mean(buckets);
        tracing::debug!(custom_average = %custom.name, ?average, "resolved custom average");
        Ok(average)
    }
}

pub fn compute_custom_average(
    custom: &CustomAverage,
    subjects: &[Subject],
    grades: &[Grade],
) -> Result<Option<Score>> {
    let tree = SubjectTree::build(subjects)?;
    AverageCalculator::new(&tree, grades, OwnCoefficients).custom_average(custom)
}

pub fn main_custom_average(customs: &[CustomAverage]) -> Option<&CustomAverage> {
    customs.iter().find(|custom| custom.is_main_average)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::testing::{custom, entry, grade, id, subject};

    fn subjects() -> Vec<Subject> {
        vec![
            subject(1, "Maths", 400, None),
            subject(2, "Written", 700, Some(1)),
            subject(3, "Oral", 300, Some(1)),
            subject(4, "History", 200, None),
            subject(5, "Sport", 100, None),
        ]
    }

    fn grades() -> Vec<Grade> {
        vec![
            grade(1, 2, 14, 20, 1),
            grade(2, 3, 18, 20, 1),
            grade(3, 4, 10, 20, 1),
            grade(4, 1, 6, 20, 1),
        ]
    }

    #[test]
    fn uses_only_listed_subjects_with_their_coefficients() {
        let science = custom("Science track", vec![entry(2, None, None), entry(4, None, None)]);
        let average = compute_custom_average(&science, &subjects(), &grades()).unwrap();
        // (14 * 7 + 10 * 2) / 9
        assert_eq!(average, Score::ratio(1180, 90));
    }

    #[test]
    fn custom_coefficient_overrides_subject_weight() {
        let even = custom(
            "Even",
            vec![entry(2, Some(100), Some(true)), entry(4, Some(100), None)],
        );
        let average = compute_custom_average(&even, &subjects(), &grades()).unwrap();
        assert_eq!(average, Some(Score::from_integer(12)));
    }

    #[test]
    fn include_children_follows_subtree() {
        let only_maths = custom("Maths", vec![entry(1, None, Some(true))]);
        let tree_average = compute_custom_average(&only_maths, &subjects(), &grades()).unwrap();
        // own bucket 6 weighted 4, written 14 weighted 7, oral 18 weighted 3
        assert_eq!(tree_average, Score::ratio(6 * 4 + 14 * 7 + 18 * 3, 14));

        let maths_alone = custom("Maths alone", vec![entry(1, None, Some(false))]);
        let own_average = compute_custom_average(&maths_alone, &subjects(), &grades()).unwrap();
        assert_eq!(own_average, Some(Score::from_integer(6)));
    }

    #[test]
    fn grouping_subject_without_children_contributes_nothing() {
        let subjects = vec![
            subject(1, "Sciences", 100, None),
            subject(2, "Physics", 100, Some(1)),
            subject(3, "Biology", 100, Some(1)),
            subject(4, "History", 100, None),
        ];
        let grades = vec![
            grade(1, 2, 20, 20, 1),
            grade(2, 3, 20, 20, 1),
            grade(3, 4, 8, 20, 1),
        ];
        let flat = custom("Flat", vec![entry(1, Some(900), Some(false)), entry(4, None, None)]);
        let average = compute_custom_average(&flat, &subjects, &grades).unwrap();
        assert_eq!(average, Some(Score::from_integer(8)));
    }

    #[test]
    fn all_null_entries_give_none() {
        let empty = custom("Empty", vec![entry(5, None, None), entry(1, None, Some(false))]);
        let average = compute_custom_average(&empty, &subjects(), &[]).unwrap();
        assert_eq!(average, None);

        let nothing = custom("Nothing", Vec::new());
        assert_eq!(compute_custom_average(&nothing, &subjects(), &grades()).unwrap(), None);
    }

    #[test]
    fn duplicate_entries_count_once() {
        let doubled = custom(
            "Doubled",
            vec![entry(4, None, None), entry(4, Some(5000), None), entry(2, None, None)],
        );
        let single = custom("Single", vec![entry(4, None, None), entry(2, None, None)]);
        assert_eq!(
            compute_custom_average(&doubled, &subjects(), &grades()).unwrap(),
            compute_custom_average(&single, &subjects(), &grades()).unwrap()
        );
    }

    #[test]
    fn unknown_entry_is_an_error() {
        let broken = custom("Broken", vec![entry(42, None, None)]);
        let err = compute_custom_average(&broken, &subjects(), &grades()).unwrap_err();
        assert_eq!(err, EngineError::UnknownSubject(id(42)));
    }

    #[test]
    fn finds_pinned_custom_average() {
        let mut pinned = custom("Pinned", Vec::new());
        pinned.is_main_average = true;
        let customs = vec![custom("Other", Vec::new()), pinned];
        assert_eq!(main_custom_average(&customs).map(|c| c.name.as_str()), Some("Pinned"));
        assert!(main_custom_average(&customs[..1]).is_none());
    }
}
