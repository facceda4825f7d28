use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{
    Boundary, BoundaryLevel, RoleMembership, School, SchoolId, Snapshot, StateRecord, User,
};
use crate::window::ReportWindow;

/// Every read of one report run sees the same committed state.
const SNAPSHOT_ISOLATION: &str = "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY";

const STATE_COLUMNS: &str = "id, user_id, school_id, telephone, submitted_at, is_invalid, \
                             comments, answers";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn at(date: (i32, u32, u32), hour: u32) -> anyhow::Result<NaiveDateTime> {
    NaiveDate::from_ymd_opt(date.0, date.1, date.2)
        .and_then(|day| day.and_hms_opt(hour, 0, 0))
        .context("invalid seed timestamp")
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let boundaries = vec![
        (1_i64, "Bangalore Rural", None, "district"),
        (2, "Tumkur", None, "district"),
        (11, "Hoskote", Some(1_i64), "block"),
        (21, "Gubbi", Some(2), "block"),
        (111, "Nandagudi", Some(11), "cluster"),
        (211, "Chelur", Some(21), "cluster"),
    ];
    for (id, name, parent_id, level) in boundaries {
        sqlx::query(
            r#"
            INSERT INTO field_reports.boundaries (id, name, parent_id, level)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, parent_id = EXCLUDED.parent_id, level = EXCLUDED.level
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(parent_id)
        .bind(level)
        .execute(pool)
        .await?;
    }

    let schools = vec![
        (24001_i64, "GHPS Nandagudi", 111_i64),
        (24002, "GLPS Hasigala", 111),
        (31001, "GHPS Chelur", 211),
    ];
    for (id, name, boundary_id) in schools {
        sqlx::query(
            r#"
            INSERT INTO field_reports.schools (id, name, boundary_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, boundary_id = EXCLUDED.boundary_id
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(boundary_id)
        .execute(pool)
        .await?;
    }

    let users = vec![
        (1_i64, "Lakshmi Devi", "9845012345", Some("CRP")),
        (2, "Manjunath S", "9845067890", Some("BFC")),
        (3, "Ravi Kumar", "9900011122", None),
    ];
    for (id, name, mobile_no, role) in users {
        sqlx::query(
            r#"
            INSERT INTO field_reports.users (id, display_name, mobile_no)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET display_name = EXCLUDED.display_name, mobile_no = EXCLUDED.mobile_no
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(mobile_no)
        .execute(pool)
        .await?;

        if let Some(role) = role {
            sqlx::query(
                r#"
                INSERT INTO field_reports.user_roles (user_id, role_name)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(id)
            .bind(role)
            .execute(pool)
            .await?;
        }
    }

    let states = vec![
        (
            "6f1c2c9e-3f0a-4d1e-9b7a-0c1d2e3f4a01",
            1_i64,
            24001_i64,
            at((2026, 2, 2), 10)?,
            false,
            None,
        ),
        (
            "6f1c2c9e-3f0a-4d1e-9b7a-0c1d2e3f4a02",
            2,
            31001,
            at((2026, 2, 3), 11)?,
            true,
            Some("Expected 12 answers, received 9"),
        ),
        (
            "6f1c2c9e-3f0a-4d1e-9b7a-0c1d2e3f4a03",
            3,
            24002,
            at((2026, 2, 4), 9)?,
            true,
            Some("Logical error: school closed but class visited"),
        ),
    ];
    for (id, user_id, school_id, submitted_at, is_invalid, comments) in states {
        sqlx::query(
            r#"
            INSERT INTO field_reports.states
            (id, user_id, school_id, telephone, submitted_at, is_invalid, comments, answers)
            SELECT $1, $2, $3, u.mobile_no, $4, $5, $6, $7
            FROM field_reports.users u WHERE u.id = $2
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(Uuid::parse_str(id)?)
        .bind(user_id)
        .bind(school_id)
        .bind(submitted_at)
        .bind(is_invalid)
        .bind(comments)
        .bind(vec![school_id.to_string(), "Yes".to_string(), "4".to_string()])
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Imports submissions exported by the SMS gateway. Rows from numbers that
/// match no registered user are skipped.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        id: Option<Uuid>,
        telephone: String,
        school_id: SchoolId,
        submitted_at: NaiveDateTime,
        is_invalid: bool,
        comments: Option<String>,
        answers: String,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result
            .with_context(|| format!("bad row {} in {}", line + 2, csv_path.display()))?;

        let user_id: Option<i64> =
            sqlx::query("SELECT id FROM field_reports.users WHERE mobile_no = $1")
                .bind(&row.telephone)
                .fetch_optional(pool)
                .await?
                .map(|found| found.get("id"));
        let Some(user_id) = user_id else {
            warn!(telephone = %row.telephone, "skipping submission from unregistered number");
            continue;
        };

        let answers: Vec<String> = row
            .answers
            .split(';')
            .map(|answer| answer.trim().to_string())
            .collect();

        let result = sqlx::query(
            r#"
            INSERT INTO field_reports.states
            (id, user_id, school_id, telephone, submitted_at, is_invalid, comments, answers)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(row.id.unwrap_or_else(Uuid::new_v4))
        .bind(user_id)
        .bind(row.school_id)
        .bind(&row.telephone)
        .bind(row.submitted_at)
        .bind(row.is_invalid)
        .bind(row.comments.filter(|comment| !comment.is_empty()))
        .bind(answers)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

/// Opens a read-only transaction pinned to a single snapshot. Callers run
/// every fetch on it, then commit.
pub async fn begin_snapshot(pool: &PgPool) -> anyhow::Result<Transaction<'static, Postgres>> {
    let mut tx = pool.begin().await?;
    sqlx::query(SNAPSHOT_ISOLATION)
        .execute(&mut *tx)
        .await
        .context("failed to pin snapshot isolation")?;
    Ok(tx)
}

pub async fn fetch_geography(
    conn: &mut PgConnection,
) -> anyhow::Result<(Vec<Boundary>, Vec<School>)> {
    let rows = sqlx::query("SELECT id, name, parent_id, level FROM field_reports.boundaries")
        .fetch_all(&mut *conn)
        .await?;

    let mut boundaries = Vec::with_capacity(rows.len());
    for row in rows {
        let id: i64 = row.get("id");
        let level: String = row.get("level");
        match BoundaryLevel::parse(&level) {
            Some(level) => boundaries.push(Boundary {
                id,
                name: row.get("name"),
                parent_id: row.get("parent_id"),
                level,
            }),
            None => warn!(boundary_id = id, level = %level, "skipping boundary with unknown level"),
        }
    }

    let schools = sqlx::query("SELECT id, name, boundary_id FROM field_reports.schools")
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(|row| School {
            id: row.get("id"),
            name: row.get("name"),
            boundary_id: row.get("boundary_id"),
        })
        .collect();

    Ok((boundaries, schools))
}

pub async fn fetch_directory(
    conn: &mut PgConnection,
) -> anyhow::Result<(Vec<User>, Vec<RoleMembership>)> {
    let users = sqlx::query("SELECT id, display_name, mobile_no FROM field_reports.users")
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(|row| User {
            id: row.get("id"),
            display_name: row.get("display_name"),
            mobile_no: row.get("mobile_no"),
        })
        .collect();

    let memberships = sqlx::query("SELECT user_id, role_name FROM field_reports.user_roles")
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(|row| RoleMembership {
            user_id: row.get("user_id"),
            role_name: row.get("role_name"),
        })
        .collect();

    Ok((users, memberships))
}

fn state_from_row(row: PgRow) -> StateRecord {
    StateRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        school_id: row.get("school_id"),
        telephone: row.get("telephone"),
        submitted_at: row.get("submitted_at"),
        is_invalid: row.get("is_invalid"),
        comments: row.get("comments"),
        answers: row.get("answers"),
    }
}

pub async fn fetch_states(
    conn: &mut PgConnection,
    start: NaiveDate,
    end: NaiveDate,
) -> anyhow::Result<Vec<StateRecord>> {
    let query = format!(
        "SELECT {STATE_COLUMNS} FROM field_reports.states \
         WHERE submitted_at::date BETWEEN $1 AND $2 \
         ORDER BY submitted_at, id"
    );
    let rows = sqlx::query(&query)
        .bind(start)
        .bind(end)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.into_iter().map(state_from_row).collect())
}

pub async fn fetch_states_on(
    conn: &mut PgConnection,
    day: NaiveDate,
) -> anyhow::Result<Vec<StateRecord>> {
    fetch_states(conn, day, day).await
}

/// Schools that have ever submitted, earliest first.
pub async fn fetch_submitting_schools(conn: &mut PgConnection) -> anyhow::Result<Vec<SchoolId>> {
    let rows = sqlx::query(
        "SELECT school_id, MIN(submitted_at) AS first_seen FROM field_reports.states \
         GROUP BY school_id ORDER BY first_seen, school_id",
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(|row| row.get("school_id")).collect())
}

pub async fn fetch_snapshot(
    conn: &mut PgConnection,
    window: &ReportWindow,
) -> anyhow::Result<Snapshot> {
    let records = fetch_states(&mut *conn, window.start(), window.end()).await?;
    let submitting_schools = fetch_submitting_schools(&mut *conn).await?;
    info!(
        records = records.len(),
        schools = submitting_schools.len(),
        "snapshot fetched"
    );
    Ok(Snapshot {
        records,
        submitting_schools,
    })
}
