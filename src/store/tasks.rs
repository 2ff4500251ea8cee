use std::collections::BTreeSet;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use super::{datetime_from_ts, decode_list, encode_list, now_ts};
use crate::models::{Effort, Task};

const SELECT_TASK: &str = r#"
    SELECT t.id, t.project_id, t.description, t.source_commits, t.task_date,
        t.estimated_hours, t.created_at, p.name AS project_name
    FROM tasks t
    JOIN projects p ON p.id = t.project_id
"#;

/// Filters for [`list`]. Empty filters list everything.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub project_id: Option<i64>,
}

fn from_row(row: &SqliteRow) -> Result<Task> {
    let id: i64 = row.get("id");
    let sources: String = row.get("source_commits");
    Ok(Task {
        id,
        project_id: row.get("project_id"),
        description: row.get("description"),
        source_commits: decode_list(&sources, "tasks", "source_commits", id)?,
        task_date: datetime_from_ts(row.get("task_date"))?,
        estimated: Effort::from_hours(row.get("estimated_hours")),
        created_at: datetime_from_ts(row.get("created_at"))?,
        project_name: row.get("project_name"),
    })
}

/// Insert a derived task on an open connection, normally the derivation
/// transaction. Returns the new id.
pub async fn insert(
    conn: &mut SqliteConnection,
    project_id: i64,
    description: &str,
    source_commits: &BTreeSet<i64>,
    task_date: DateTime<Utc>,
    estimated: Effort,
) -> Result<i64> {
    let sources = encode_list(source_commits)?;
    let id = sqlx::query(
        r#"
        INSERT INTO tasks (project_id, description, source_commits, task_date, estimated_hours, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(project_id)
    .bind(description)
    .bind(sources)
    .bind(task_date.timestamp())
    .bind(estimated.hours())
    .bind(now_ts())
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();
    Ok(id)
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Task>> {
    let row = sqlx::query(&format!("{} WHERE t.id = ?", SELECT_TASK))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(from_row).transpose()
}

pub async fn list_by_project(pool: &SqlitePool, project_id: i64) -> Result<Vec<Task>> {
    list(
        pool,
        &TaskFilter {
            project_id: Some(project_id),
            ..TaskFilter::default()
        },
    )
    .await
}

/// Tasks ordered by date, then id. `since`/`until` are inclusive.
pub async fn list(pool: &SqlitePool, filter: &TaskFilter) -> Result<Vec<Task>> {
    let mut sql = format!("{} WHERE 1 = 1", SELECT_TASK);
    if filter.since.is_some() {
        sql.push_str(" AND t.task_date >= ?");
    }
    if filter.until.is_some() {
        sql.push_str(" AND t.task_date <= ?");
    }
    if filter.project_id.is_some() {
        sql.push_str(" AND t.project_id = ?");
    }
    sql.push_str(" ORDER BY t.task_date, t.id");

    let mut query = sqlx::query(&sql);
    if let Some(since) = filter.since {
        query = query.bind(since.timestamp());
    }
    if let Some(until) = filter.until {
        query = query.bind(until.timestamp());
    }
    if let Some(project_id) = filter.project_id {
        query = query.bind(project_id);
    }

    let rows = query.fetch_all(pool).await?;
    rows.iter().map(from_row).collect()
}

pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn count(pool: &SqlitePool) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM tasks")
        .fetch_one(pool)
        .await?)
}

/// When derivation last produced a task, if ever.
pub async fn last_processed_time(pool: &SqlitePool) -> Result<Option<DateTime<Utc>>> {
    let ts: Option<i64> = sqlx::query_scalar("SELECT MAX(created_at) FROM tasks")
        .fetch_one(pool)
        .await?;
    Ok(ts.map(datetime_from_ts).transpose()?)
}
