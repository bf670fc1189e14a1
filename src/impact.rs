use serde::Serialize;
use uuid::Uuid;

use crate::average::{AverageCalculator, OwnCoefficients};
use crate::error::Result;
use crate::models::{CustomAverage, Grade};
use crate::score::Score;
use crate::tree::SubjectTree;

/// Which average is being measured.
#[derive(Debug, Clone, Copy)]
pub enum Scope<'c> {
    General,
    Subject(Uuid),
    Custom(&'c CustomAverage),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GradeEdit {
    Add(Grade),
    Remove(Uuid),
    Modify {
        id: Uuid,
        value: i64,
        out_of: i64,
        coefficient: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Impact {
    pub difference: Score,
}

impl Impact {
    pub fn none() -> Self {
        Self {
            difference: Score::zero(),
        }
    }

    /// A missing average counts as zero here and nowhere else.
    fn between(from: Option<Score>, to: Option<Score>) -> Self {
        Self {
            difference: to.unwrap_or_else(Score::zero) - from.unwrap_or_else(Score::zero),
        }
    }
}

pub fn measure<'g, I>(
    scope: Scope<'_>,
    tree: &'g SubjectTree<'g>,
    grades: I,
) -> Result<Option<Score>>
where
    I: IntoIterator<Item = &'g Grade>,
{
    let calculator = AverageCalculator::new(tree, grades, OwnCoefficients);
    match scope {
        Scope::General => Ok(calculator.general_average()),
        Scope::Subject(subject_id) => calculator.subject_average(subject_id),
        Scope::Custom(custom) => calculator.custom_average(custom),
    }
}

/// The average with `grade_id` minus the average without it; `None` when the
/// grade is not in `grades`.
pub fn grade_impact(
    grade_id: Uuid,
    scope: Scope<'_>,
    tree: &SubjectTree<'_>,
    grades: &[Grade],
) -> Result<Option<Impact>> {
    let removal = what_if(&GradeEdit::Remove(grade_id), scope, tree, grades)?;
    Ok(removal.map(|impact| Impact {
        difference: -impact.difference,
    }))
}

pub fn what_if(
    edit: &GradeEdit,
    scope: Scope<'_>,
    tree: &SubjectTree<'_>,
    grades: &[Grade],
) -> Result<Option<Impact>> {
    let (subject_id, removed, replacement) = match edit {
        GradeEdit::Add(grade) => (grade.subject_id, None, Some(grade.clone())),
        GradeEdit::Remove(grade_id) => match find(grades, *grade_id) {
            Some(grade) => (grade.subject_id, Some(grade.id), None),
            None => return Ok(None),
        },
        GradeEdit::Modify {
            id,
            value,
            out_of,
            coefficient,
        } => match find(grades, *id) {
            Some(grade) => {
                let edited = Grade {
                    value: *value,
                    out_of: *out_of,
                    coefficient: *coefficient,
                    ..grade.clone()
                };
                (grade.subject_id, Some(grade.id), Some(edited))
            }
            None => return Ok(None),
        },
    };

    tree.require(subject_id)?;
    if !scope_covers(scope, tree, subject_id)? {
        tracing::trace!(%subject_id, "grade outside measured scope");
        return Ok(Some(Impact::none()));
    }

    let before = measure(scope, tree, grades)?;
    let edited = grades
        .iter()
        .filter(|grade| Some(grade.id) != removed)
        .chain(replacement.iter());
    let after = measure(scope, tree, edited)?;

    Ok(Some(Impact::between(before, after)))
}

fn find(grades: &[Grade], grade_id: Uuid) -> Option<&Grade> {
    grades.iter().find(|grade| grade.id == grade_id)
}

fn scope_covers(scope: Scope<'_>, tree: &SubjectTree<'_>, subject_id: Uuid) -> Result<bool> {
    match scope {
        Scope::General => Ok(true),
        Scope::Subject(target) => {
            tree.require(target)?;
            Ok(tree.is_ancestor_or_self(target, subject_id))
        }
        Scope::Custom(custom) => {
            let mut covered = false;
            for entry in &custom.subjects {
                tree.require(entry.subject_id)?;
                covered |= if entry.include_children.unwrap_or(true) {
                    tree.is_ancestor_or_self(entry.subject_id, subject_id)
                } else {
                    entry.subject_id == subject_id
                };
            }
            Ok(covered)
        }
    }
}
