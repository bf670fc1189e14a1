use std::collections::HashMap;

use anyhow::Context;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{CustomAverage, CustomAverageSubject, Grade, Period, Snapshot, Subject};
use crate::period::period_for_date;
use crate::score::parse_hundredths;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

struct SeedSubject {
    name: &'static str,
    coefficient: i64,
    parent: Option<&'static str>,
    is_main_subject: bool,
    is_display_subject: bool,
}

impl SeedSubject {
    const fn root(name: &'static str, coefficient: i64) -> Self {
        Self {
            name,
            coefficient,
            parent: None,
            is_main_subject: true,
            is_display_subject: false,
        }
    }

    const fn child(name: &'static str, coefficient: i64, parent: &'static str) -> Self {
        Self {
            name,
            coefficient,
            parent: Some(parent),
            is_main_subject: false,
            is_display_subject: false,
        }
    }
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let user_id = upsert_user(
        pool,
        Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
        "Avery Lee",
        "avery.lee@groupscholar.com",
    )
    .await?;

    let period_rows = vec![
        (
            "Term 1",
            NaiveDate::from_ymd_opt(2025, 9, 1).context("invalid date")?,
            NaiveDate::from_ymd_opt(2025, 12, 20).context("invalid date")?,
            false,
        ),
        (
            "Term 2",
            NaiveDate::from_ymd_opt(2026, 1, 5).context("invalid date")?,
            NaiveDate::from_ymd_opt(2026, 3, 28).context("invalid date")?,
            true,
        ),
    ];

    let mut periods = Vec::new();
    for (name, start_at, end_at, is_cumulative) in period_rows {
        let id: Uuid = sqlx::query(
            r#"
            INSERT INTO grade_averages.periods (id, user_id, name, start_at, end_at, is_cumulative)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, name) DO UPDATE
            SET start_at = EXCLUDED.start_at, end_at = EXCLUDED.end_at,
                is_cumulative = EXCLUDED.is_cumulative
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(name)
        .bind(start_at)
        .bind(end_at)
        .bind(is_cumulative)
        .fetch_one(pool)
        .await?
        .get("id");

        periods.push(Period {
            id,
            name: name.to_string(),
            start_at,
            end_at,
            is_cumulative,
        });
    }

    let subjects = [
        SeedSubject::root("Mathematics", 400),
        SeedSubject::child("Mathematics - Written", 700, "Mathematics"),
        SeedSubject::child("Mathematics - Oral", 300, "Mathematics"),
        SeedSubject::root("Sciences", 300),
        SeedSubject::child("Physics", 200, "Sciences"),
        SeedSubject::child("Chemistry", 100, "Sciences"),
        SeedSubject {
            is_display_subject: true,
            ..SeedSubject::root("Languages", 0)
        },
        SeedSubject::child("English", 300, "Languages"),
        SeedSubject::child("Spanish", 200, "Languages"),
        SeedSubject::root("Sport", 100),
    ];

    let mut subject_ids: HashMap<&str, (Uuid, i32)> = HashMap::new();
    for subject in &subjects {
        let parent = match subject.parent {
            Some(name) => Some(
                *subject_ids
                    .get(name)
                    .with_context(|| format!("seed parent {name} must be inserted first"))?,
            ),
            None => None,
        };
        let depth = parent.map(|(_, depth)| depth + 1).unwrap_or(0);
        let id = upsert_subject(
            pool,
            user_id,
            &Subject {
                id: Uuid::new_v4(),
                name: subject.name.to_string(),
                coefficient: subject.coefficient,
                parent_id: parent.map(|(id, _)| id),
                depth,
                is_main_subject: subject.is_main_subject,
                is_display_subject: subject.is_display_subject,
            },
        )
        .await?;
        subject_ids.insert(subject.name, (id, depth));
    }

    let grades = vec![
        ("seed-g-001", "Mathematics - Written", "Algebra test", "14", "20", "2", (2025, 10, 3)),
        ("seed-g-002", "Mathematics - Oral", "Board exercise", "18", "20", "1", (2025, 11, 14)),
        ("seed-g-003", "Physics", "Mechanics lab", "7.5", "10", "1", (2025, 12, 2)),
        ("seed-g-004", "Chemistry", "Quiz", "11", "20", "0.5", (2026, 1, 20)),
        ("seed-g-005", "English", "Essay", "15.5", "20", "1", (2026, 2, 9)),
        ("seed-g-006", "Spanish", "Listening", "12", "20", "1", (2026, 2, 23)),
        ("seed-g-007", "Mathematics - Written", "Geometry test", "9", "20", "2", (2026, 3, 6)),
        ("seed-g-008", "Sport", "Athletics", "16", "20", "1", (2026, 3, 12)),
    ];

    for (source_key, subject, name, value, out_of, coefficient, (year, month, day)) in grades {
        let (subject_id, _) = *subject_ids
            .get(subject)
            .with_context(|| format!("unknown seed subject {subject}"))?;
        let passed_at = NaiveDate::from_ymd_opt(year, month, day).context("invalid date")?;
        let grade = Grade {
            id: Uuid::new_v4(),
            subject_id,
            name: name.to_string(),
            value: parse_hundredths(value).context("invalid seed value")?,
            out_of: parse_hundredths(out_of).context("invalid seed out_of")?,
            coefficient: parse_hundredths(coefficient).context("invalid seed coefficient")?,
            passed_at,
            period_id: period_for_date(&periods, passed_at).map(|period| period.id),
        };
        insert_grade(pool, user_id, &grade, source_key).await?;
    }

    let custom_average_id: Uuid = sqlx::query(
        r#"
        INSERT INTO grade_averages.custom_averages (id, user_id, name, is_main_average)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, name) DO UPDATE SET is_main_average = EXCLUDED.is_main_average
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind("Scientific track")
    .bind(true)
    .fetch_one(pool)
    .await?
    .get("id");

    let entries = [
        ("Mathematics", Some(600_i64), Some(true)),
        ("Sciences", None, None),
        ("English", Some(100_i64), Some(false)),
    ];

    for (position, (subject, custom_coefficient, include_children)) in entries.iter().enumerate() {
        let (subject_id, _) = *subject_ids
            .get(subject)
            .with_context(|| format!("unknown seed subject {subject}"))?;
        sqlx::query(
            r#"
            INSERT INTO grade_averages.custom_average_subjects
            (custom_average_id, subject_id, position, custom_coefficient, include_children)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (custom_average_id, subject_id) DO UPDATE
            SET position = EXCLUDED.position,
                custom_coefficient = EXCLUDED.custom_coefficient,
                include_children = EXCLUDED.include_children
            "#,
        )
        .bind(custom_average_id)
        .bind(subject_id)
        .bind(position as i32)
        .bind(*custom_coefficient)
        .bind(*include_children)
        .execute(pool)
        .await?;
    }

    tracing::info!(%user_id, subjects = subjects.len(), "seeded preset data");
    Ok(())
}

async fn upsert_user(
    pool: &PgPool,
    id: Uuid,
    full_name: &str,
    email: &str,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO grade_averages.users (id, full_name, email)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO UPDATE SET full_name = EXCLUDED.full_name
        RETURNING id
        "#,
    )
    .bind(id)
    .bind(full_name)
    .bind(email)
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(id)
}

/// Registers `email` on first sight without touching an existing profile.
async fn ensure_user(pool: &PgPool, email: &str) -> anyhow::Result<Uuid> {
    sqlx::query(
        r#"
        INSERT INTO grade_averages.users (id, full_name, email)
        VALUES ($1, $2, $2)
        ON CONFLICT (email) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .execute(pool)
    .await?;

    let id: Uuid = sqlx::query("SELECT id FROM grade_averages.users WHERE email = $1")
        .bind(email)
        .fetch_one(pool)
        .await?
        .get("id");

    Ok(id)
}

async fn upsert_subject(pool: &PgPool, user_id: Uuid, subject: &Subject) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO grade_averages.subjects
        (id, user_id, name, coefficient, parent_id, depth, is_main_subject, is_display_subject)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (user_id, name) DO UPDATE
        SET coefficient = EXCLUDED.coefficient, parent_id = EXCLUDED.parent_id,
            depth = EXCLUDED.depth, is_main_subject = EXCLUDED.is_main_subject,
            is_display_subject = EXCLUDED.is_display_subject
        RETURNING id
        "#,
    )
    .bind(subject.id)
    .bind(user_id)
    .bind(&subject.name)
    .bind(subject.coefficient)
    .bind(subject.parent_id)
    .bind(subject.depth)
    .bind(subject.is_main_subject)
    .bind(subject.is_display_subject)
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(id)
}

/// Returns whether a new row was written; an existing `source_key` is skipped.
async fn insert_grade(
    pool: &PgPool,
    user_id: Uuid,
    grade: &Grade,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO grade_averages.grades
        (id, user_id, subject_id, period_id, name, value, out_of, coefficient,
         passed_at, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(grade.id)
    .bind(user_id)
    .bind(grade.subject_id)
    .bind(grade.period_id)
    .bind(&grade.name)
    .bind(grade.value)
    .bind(grade.out_of)
    .bind(grade.coefficient)
    .bind(grade.passed_at)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Loads everything one user owns inside a single read-only transaction, so
/// subjects and grades always come from the same point in time.
pub async fn fetch_snapshot(pool: &PgPool, email: &str) -> anyhow::Result<Snapshot> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(&mut *tx)
        .await?;

    let user_id: Uuid = sqlx::query("SELECT id FROM grade_averages.users WHERE email = $1")
        .bind(email)
        .fetch_optional(&mut *tx)
        .await?
        .with_context(|| format!("no user registered with email {email}"))?
        .get("id");

    let subjects = sqlx::query(
        "SELECT id, name, coefficient, parent_id, depth, is_main_subject, is_display_subject \
         FROM grade_averages.subjects WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_all(&mut *tx)
    .await?
    .into_iter()
    .map(|row| Subject {
        id: row.get("id"),
        name: row.get("name"),
        coefficient: row.get("coefficient"),
        parent_id: row.get("parent_id"),
        depth: row.get("depth"),
        is_main_subject: row.get("is_main_subject"),
        is_display_subject: row.get("is_display_subject"),
    })
    .collect();

    let grades = sqlx::query(
        "SELECT id, subject_id, name, value, out_of, coefficient, passed_at, period_id \
         FROM grade_averages.grades WHERE user_id = $1 ORDER BY passed_at",
    )
    .bind(user_id)
    .fetch_all(&mut *tx)
    .await?
    .into_iter()
    .map(|row| Grade {
        id: row.get("id"),
        subject_id: row.get("subject_id"),
        name: row.get("name"),
        value: row.get("value"),
        out_of: row.get("out_of"),
        coefficient: row.get("coefficient"),
        passed_at: row.get("passed_at"),
        period_id: row.get("period_id"),
    })
    .collect();

    let periods = sqlx::query(
        "SELECT id, name, start_at, end_at, is_cumulative \
         FROM grade_averages.periods WHERE user_id = $1 ORDER BY start_at",
    )
    .bind(user_id)
    .fetch_all(&mut *tx)
    .await?
    .into_iter()
    .map(|row| Period {
        id: row.get("id"),
        name: row.get("name"),
        start_at: row.get("start_at"),
        end_at: row.get("end_at"),
        is_cumulative: row.get("is_cumulative"),
    })
    .collect();

    let mut custom_averages: Vec<CustomAverage> = sqlx::query(
        "SELECT id, name, is_main_average FROM grade_averages.custom_averages \
         WHERE user_id = $1 ORDER BY name",
    )
    .bind(user_id)
    .fetch_all(&mut *tx)
    .await?
    .into_iter()
    .map(|row| CustomAverage {
        id: row.get("id"),
        name: row.get("name"),
        subjects: Vec::new(),
        is_main_average: row.get("is_main_average"),
    })
    .collect();

    let entries = sqlx::query(
        "SELECT cas.custom_average_id, cas.subject_id, cas.custom_coefficient, \
                cas.include_children \
         FROM grade_averages.custom_average_subjects cas \
         JOIN grade_averages.custom_averages ca ON ca.id = cas.custom_average_id \
         WHERE ca.user_id = $1 ORDER BY cas.position",
    )
    .bind(user_id)
    .fetch_all(&mut *tx)
    .await?;

    for row in entries {
        let custom_average_id: Uuid = row.get("custom_average_id");
        if let Some(custom) = custom_averages.iter_mut().find(|c| c.id == custom_average_id) {
            custom.subjects.push(CustomAverageSubject {
                subject_id: row.get("subject_id"),
                custom_coefficient: row.get("custom_coefficient"),
                include_children: row.get("include_children"),
            });
        }
    }

    tx.commit().await?;

    let snapshot = Snapshot {
        subjects,
        grades,
        periods,
        custom_averages,
    };
    tracing::debug!(
        %user_id,
        subjects = snapshot.subjects.len(),
        grades = snapshot.grades.len(),
        "loaded snapshot"
    );
    Ok(snapshot)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        email: String,
        subject: String,
        name: Option<String>,
        value: String,
        out_of: String,
        coefficient: Option<String>,
        passed_at: NaiveDate,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;
    let mut snapshots: HashMap<String, (Uuid, Vec<Period>, HashMap<String, Uuid>)> = HashMap::new();

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let context = || format!("row {} of {}", line + 1, csv_path.display());

        if !snapshots.contains_key(&row.email) {
            let user_id = ensure_user(pool, &row.email).await?;
            let snapshot = fetch_snapshot(pool, &row.email).await?;
            let subjects = snapshot
                .subjects
                .into_iter()
                .map(|subject| (subject.name.to_lowercase(), subject.id))
                .collect();
            snapshots.insert(row.email.clone(), (user_id, snapshot.periods, subjects));
        }
        let Some((user_id, periods, subjects)) = snapshots.get_mut(&row.email) else {
            continue;
        };

        let subject_key = row.subject.to_lowercase();
        let subject_id = match subjects.get(&subject_key) {
            Some(id) => *id,
            None => {
                let id = upsert_subject(
                    pool,
                    *user_id,
                    &Subject {
                        id: Uuid::new_v4(),
                        name: row.subject.clone(),
                        coefficient: 100,
                        parent_id: None,
                        depth: 0,
                        is_main_subject: true,
                        is_display_subject: false,
                    },
                )
                .await?;
                tracing::info!(subject = %row.subject, "created subject from import");
                subjects.insert(subject_key, id);
                id
            }
        };

        let value = parse_hundredths(&row.value)
            .with_context(|| format!("invalid value {:?} in {}", row.value, context()))?;
        let out_of = parse_hundredths(&row.out_of)
            .filter(|out_of| *out_of > 0)
            .with_context(|| format!("invalid out_of {:?} in {}", row.out_of, context()))?;
        let coefficient = match &row.coefficient {
            Some(text) if !text.trim().is_empty() => parse_hundredths(text)
                .with_context(|| format!("invalid coefficient {:?} in {}", text, context()))?,
            _ => 100,
        };

        let grade = Grade {
            id: Uuid::new_v4(),
            subject_id,
            name: row.name.unwrap_or_else(|| row.subject.clone()),
            value,
            out_of,
            coefficient,
            passed_at: row.passed_at,
            period_id: period_for_date(periods, row.passed_at).map(|period| period.id),
        };
        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        if insert_grade(pool, *user_id, &grade, &source_key).await? {
            inserted += 1;
        }
    }

    Ok(inserted)
}
