use std::collections::HashMap;
use std::fmt::Write;

use uuid::Uuid;

use crate::average::{AverageCalculator, OwnCoefficients};
use crate::error::Result;
use crate::impact::{grade_impact, Scope};
use crate::models::{CustomAverage, Grade, Period, Subject};
use crate::score::Score;
use crate::tree::SubjectTree;

const EMPTY: &str = "-";

#[derive(Debug, Clone)]
pub struct GradeImpactLine {
    pub grade_name: String,
    pub subject_name: String,
    pub passed_at: chrono::NaiveDate,
    pub difference: Score,
}

pub fn format_average(average: Option<Score>) -> String {
    match average {
        Some(value) => format!("{} / 20", value),
        None => EMPTY.to_string(),
    }
}

pub fn format_difference(difference: &Score) -> String {
    if difference.is_positive() {
        format!("+{}", difference)
    } else {
        difference.to_string()
    }
}

/// Grades ranked by how far they move the general average, largest first.
pub fn rank_grade_impacts(
    tree: &SubjectTree<'_>,
    grades: &[Grade],
) -> Result<Vec<GradeImpactLine>> {
    let mut lines = Vec::with_capacity(grades.len());
    for grade in grades {
        let Some(impact) = grade_impact(grade.id, Scope::General, tree, grades)? else {
            continue;
        };
        let subject_name = tree
            .subject(grade.subject_id)
            .map(|subject| subject.name.clone())
            .unwrap_or_default();
        lines.push(GradeImpactLine {
            grade_name: grade.name.clone(),
            subject_name,
            passed_at: grade.passed_at,
            difference: impact.difference,
        });
    }

    lines.sort_by(|a, b| {
        b.difference
            .abs()
            .cmp(&a.difference.abs())
            .then_with(|| b.passed_at.cmp(&a.passed_at))
    });
    Ok(lines)
}

pub fn build_report(
    owner: &str,
    period: Option<&Period>,
    subjects: &[Subject],
    grades: &[Grade],
    customs: &[CustomAverage],
) -> Result<String> {
    let tree = SubjectTree::build(subjects)?;
    let calculator = AverageCalculator::new(&tree, grades, OwnCoefficients);
    let averages = calculator.subject_averages();

    let mut output = String::new();
    let period_label = period.map(|p| p.name.as_str()).unwrap_or("all periods");

    let _ = writeln!(output, "# Grade Averages Report");
    let _ = writeln!(output, "Generated for {} ({})", owner, period_label);
    let _ = writeln!(output);
    let _ = writeln!(output, "## General Average");
    let _ = writeln!(output, "{}", format_average(calculator.general_average()));

    let _ = writeln!(output);
    let _ = writeln!(output, "## Main Subjects");
    let mut main_subjects: Vec<&Subject> = subjects.iter().filter(|s| s.is_main_subject).collect();
    main_subjects.sort_by(|a, b| a.name.cmp(&b.name));

    if main_subjects.is_empty() {
        let _ = writeln!(output, "No main subjects configured.");
    } else {
        for subject in main_subjects {
            let _ = writeln!(
                output,
                "- {}: {}",
                subject.name,
                format_average(averages.get(&subject.id).cloned().flatten())
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Subjects");

    if tree.is_empty() {
        let _ = writeln!(output, "No subjects recorded yet.");
    } else {
        let mut roots = tree.roots().to_vec();
        sort_by_name(&tree, &mut roots);
        for root in roots {
            write_subject(&mut output, &tree, &averages, root, 0);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Custom Averages");

    if customs.is_empty() {
        let _ = writeln!(output, "No custom averages defined.");
    } else {
        let mut ordered: Vec<&CustomAverage> = customs.iter().collect();
        ordered.sort_by_key(|custom| !custom.is_main_average);
        for custom in ordered {
            let marker = if custom.is_main_average { " (pinned)" } else { "" };
            let _ = writeln!(
                output,
                "- {}{}: {}",
                custom.name,
                marker,
                format_average(calculator.custom_average(custom)?)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Grades Moving the Average Most");
    let impacts = rank_grade_impacts(&tree, grades)?;

    if impacts.is_empty() {
        let _ = writeln!(output, "No grades recorded for this period.");
    } else {
        for line in impacts.iter().take(5) {
            let _ = writeln!(
                output,
                "- {} ({}) on {}: {}",
                line.grade_name,
                line.subject_name,
                line.passed_at,
                format_difference(&line.difference)
            );
        }
    }

    Ok(output)
}

fn write_subject(
    output: &mut String,
    tree: &SubjectTree<'_>,
    averages: &HashMap<Uuid, Option<Score>>,
    id: Uuid,
    indent: usize,
) {
    let Some(subject) = tree.subject(id) else {
        return;
    };
    let weight = if subject.is_display_subject {
        "group".to_string()
    } else {
        format!("coef {}", Score::from_hundredths(subject.coefficient))
    };
    let _ = writeln!(
        output,
        "{}- {} ({}): {}",
        "  ".repeat(indent),
        subject.name,
        weight,
        format_average(averages.get(&id).cloned().flatten())
    );

    let mut children = tree.children(id).to_vec();
    sort_by_name(tree, &mut children);
    for child in children {
        write_subject(output, tree, averages, child, indent + 1);
    }
}

fn sort_by_name(tree: &SubjectTree<'_>, ids: &mut [Uuid]) {
    ids.sort_by_key(|id| tree.subject(*id).map(|s| s.name.clone()).unwrap_or_default());
}
