use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::{datetime_from_ts, now_ts};
use crate::models::Repo;

const SELECT_REPO: &str = r#"
    SELECT r.id, r.path, r.project_id, r.created_at,
        p.name AS project_name, c.name AS company_name
    FROM repos r
    LEFT JOIN projects p ON p.id = r.project_id
    LEFT JOIN companies c ON c.id = p.company_id
"#;

#[derive(Debug, Clone)]
pub struct RepoStats {
    pub repo: Repo,
    pub commit_count: i64,
    pub unprocessed_count: i64,
}

fn from_row(row: &SqliteRow) -> Result<Repo> {
    Ok(Repo {
        id: row.get("id"),
        path: row.get("path"),
        project_id: row.get("project_id"),
        created_at: datetime_from_ts(row.get("created_at"))?,
        project_name: row.get("project_name"),
        company_name: row.get("company_name"),
    })
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Repo>> {
    let row = sqlx::query(&format!("{} WHERE r.id = ?", SELECT_REPO))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(from_row).transpose()
}

pub async fn get_by_path(pool: &SqlitePool, path: &str) -> Result<Option<Repo>> {
    let row = sqlx::query(&format!("{} WHERE r.path = ?", SELECT_REPO))
        .bind(path)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(from_row).transpose()
}

/// Fetch the repository at `path`, creating it as an orphan on first sight.
///
/// Two processes can race here; `INSERT OR IGNORE` against the unique path
/// lets the loser fall through to the read.
pub async fn get_or_create(pool: &SqlitePool, path: &str) -> Result<Repo> {
    sqlx::query("INSERT OR IGNORE INTO repos (path, project_id, created_at) VALUES (?, NULL, ?)")
        .bind(path)
        .bind(now_ts())
        .execute(pool)
        .await
        .with_context(|| format!("Failed to register repository {}", path))?;

    get_by_path(pool, path)
        .await?
        .with_context(|| format!("Repository {} missing after insert", path))
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<Repo>> {
    let rows = sqlx::query(&format!("{} ORDER BY r.path", SELECT_REPO))
        .fetch_all(pool)
        .await?;
    rows.iter().map(from_row).collect()
}

pub async fn list_orphans(pool: &SqlitePool) -> Result<Vec<Repo>> {
    let rows = sqlx::query(&format!(
        "{} WHERE r.project_id IS NULL ORDER BY r.path",
        SELECT_REPO
    ))
    .fetch_all(pool)
    .await?;
    rows.iter().map(from_row).collect()
}

pub async fn list_by_project(pool: &SqlitePool, project_id: i64) -> Result<Vec<Repo>> {
    let rows = sqlx::query(&format!(
        "{} WHERE r.project_id = ? ORDER BY r.path",
        SELECT_REPO
    ))
    .bind(project_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(from_row).collect()
}

pub async fn list_with_stats(pool: &SqlitePool) -> Result<Vec<RepoStats>> {
    let rows = sqlx::query(
        r#"
        SELECT r.id, r.path, r.project_id, r.created_at,
            p.name AS project_name, c.name AS company_name,
            COUNT(rc.id) AS commit_count,
            COALESCE(SUM(CASE WHEN rc.processed = 0 THEN 1 ELSE 0 END), 0) AS unprocessed_count
        FROM repos r
        LEFT JOIN projects p ON p.id = r.project_id
        LEFT JOIN companies c ON c.id = p.company_id
        LEFT JOIN raw_commits rc ON rc.repo_id = r.id
        GROUP BY r.id
        ORDER BY r.path
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(RepoStats {
                repo: from_row(row)?,
                commit_count: row.get("commit_count"),
                unprocessed_count: row.get("unprocessed_count"),
            })
        })
        .collect()
}

/// Assign a repository to a project, or orphan it with `None`.
pub async fn assign_project(pool: &SqlitePool, id: i64, project_id: Option<i64>) -> Result<bool> {
    let result = sqlx::query("UPDATE repos SET project_id = ? WHERE id = ?")
        .bind(project_id)
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to assign repository {}", id))?;
    Ok(result.rows_affected() > 0)
}

/// Delete a repository together with all of its recorded commits.
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM repos WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
