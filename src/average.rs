use std::collections::HashMap;

use uuid::Uuid;

use crate::error::Result;
use crate::models::{Grade, Subject};
use crate::score::{weighted_mean, Score};
use crate::tree::SubjectTree;

/// Averages are reported out of 20.
pub const SCALE: i64 = 20;

pub trait CoefficientPolicy {
    /// Hundredths, like `Subject::coefficient`.
    fn coefficient(&self, subject: &Subject) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OwnCoefficients;

impl CoefficientPolicy for OwnCoefficients {
    fn coefficient(&self, subject: &Subject) -> i64 {
        subject.coefficient
    }
}

impl<F> CoefficientPolicy for F
where
    F: Fn(&Subject) -> i64,
{
    fn coefficient(&self, subject: &Subject) -> i64 {
        self(subject)
    }
}

type Memo = HashMap<Uuid, Option<Score>>;

pub struct AverageCalculator<'a, P = OwnCoefficients> {
    tree: &'a SubjectTree<'a>,
    grades: HashMap<Uuid, Vec<&'a Grade>>,
    policy: P,
}

impl<'a, P: CoefficientPolicy> AverageCalculator<'a, P> {
    pub fn new<I>(tree: &'a SubjectTree<'a>, grades: I, policy: P) -> Self
    where
        I: IntoIterator<Item = &'a Grade>,
    {
        let mut by_subject: HashMap<Uuid, Vec<&'a Grade>> = HashMap::new();
        for grade in grades {
            by_subject.entry(grade.subject_id).or_default().push(grade);
        }

        Self {
            tree,
            grades: by_subject,
            policy,
        }
    }

    pub fn tree(&self) -> &'a SubjectTree<'a> {
        self.tree
    }

    /// Average of the whole subtree rooted at `subject_id`.
    pub fn subject_average(&self, subject_id: Uuid) -> Result<Option<Score>> {
        self.tree.require(subject_id)?;
        Ok(self.average_of(subject_id, &mut Memo::new()))
    }

    /// Average of `subject_id`'s direct grades, children ignored.
    pub fn own_average(&self, subject_id: Uuid) -> Result<Option<Score>> {
        self.tree.require(subject_id)?;
        Ok(self.own_mean(subject_id))
    }

    pub fn general_average(&self) -> Option<Score> {
        let mut memo = Memo::new();
        let buckets = self.child_buckets(self.tree.roots(), &mut memo);
        weighted_mean(buckets)
    }

    pub fn subject_averages(&self) -> HashMap<Uuid, Option<Score>> {
        let mut memo = Memo::new();
        for &id in self.tree.by_depth() {
            self.average_of(id, &mut memo);
        }
        memo
    }

    fn average_of(&self, id: Uuid, memo: &mut Memo) -> Option<Score> {
        if let Some(cached) = memo.get(&id) {
            return cached.clone();
        }

        let children = self.tree.children(id);
        let average = if children.is_empty() {
            self.own_mean(id)
        } else {
            let own_weight = self
                .tree
                .subject(id)
                .map(|subject| subject.coefficient)
                .unwrap_or_default();
            let mut buckets = vec![(Score::from_hundredths(own_weight), self.own_mean(id))];
            buckets.extend(self.child_buckets(children, memo));
            weighted_mean(buckets)
        };

        memo.insert(id, average.clone());
        average
    }

    /// Display subjects have no weight of their own; their children are
    /// spliced in at the caller's level.
    fn child_buckets(&self, ids: &[Uuid], memo: &mut Memo) -> Vec<(Score, Option<Score>)> {
        let mut buckets = Vec::with_capacity(ids.len());
        for &child_id in ids {
            let Some(child) = self.tree.subject(child_id) else {
                continue;
            };
            if child.is_display_subject {
                buckets.push((Score::from_hundredths(child.coefficient), self.own_mean(child_id)));
                buckets.extend(self.child_buckets(self.tree.children(child_id), memo));
            } else {
                let weight = Score::from_hundredths(self.policy.coefficient(child));
                buckets.push((weight, self.average_of(child_id, memo)));
            }
        }
        buckets
    }

    /// Grades without a positive `out_of` or coefficient carry no weight.
    fn own_mean(&self, id: Uuid) -> Option<Score> {
        let grades = self.grades.get(&id)?;
        let mean = weighted_mean(grades.iter().filter(|grade| grade.out_of > 0).map(|grade| {
            (
                Score::from_hundredths(grade.coefficient),
                Score::ratio(grade.value as i128, grade.out_of as i128),
            )
        }))?;
        Some(mean * Score::from_integer(SCALE))
    }
}

/// Builds the index and computes one subject's average in a single call.
pub fn compute_average<P: CoefficientPolicy>(
    subject_id: Uuid,
    subjects: &[Subject],
    grades: &[Grade],
    policy: P,
) -> Result<Option<Score>> {
    let tree = SubjectTree::build(subjects)?;
    AverageCalculator::new(&tree, grades, policy).subject_average(subject_id)
}
