use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::{datetime_from_ts, now_ts};
use crate::models::Project;

const SELECT_PROJECT: &str = r#"
    SELECT p.id, p.name, p.company_id, p.created_at, c.name AS company_name
    FROM projects p
    LEFT JOIN companies c ON c.id = p.company_id
"#;

#[derive(Debug, Clone)]
pub struct ProjectStats {
    pub project: Project,
    pub repo_count: i64,
    pub task_count: i64,
    pub unprocessed_count: i64,
}

fn from_row(row: &SqliteRow) -> Result<Project> {
    Ok(Project {
        id: row.get("id"),
        name: row.get("name"),
        company_id: row.get("company_id"),
        created_at: datetime_from_ts(row.get("created_at"))?,
        company_name: row.get("company_name"),
    })
}

pub async fn create(pool: &SqlitePool, name: &str, company_id: Option<i64>) -> Result<Project> {
    let id = sqlx::query("INSERT INTO projects (name, company_id, created_at) VALUES (?, ?, ?)")
        .bind(name)
        .bind(company_id)
        .bind(now_ts())
        .execute(pool)
        .await
        .with_context(|| format!("Failed to create project '{}'", name))?
        .last_insert_rowid();

    get(pool, id)
        .await?
        .with_context(|| format!("Project {} vanished after insert", id))
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Project>> {
    let row = sqlx::query(&format!("{} WHERE p.id = ?", SELECT_PROJECT))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(from_row).transpose()
}

/// Project names are not unique; this returns the oldest match.
pub async fn get_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Project>> {
    let row = sqlx::query(&format!(
        "{} WHERE p.name = ? ORDER BY p.id LIMIT 1",
        SELECT_PROJECT
    ))
    .bind(name)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(from_row).transpose()
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<Project>> {
    let rows = sqlx::query(&format!("{} ORDER BY p.name, p.id", SELECT_PROJECT))
        .fetch_all(pool)
        .await?;
    rows.iter().map(from_row).collect()
}

pub async fn list_by_company(pool: &SqlitePool, company_id: i64) -> Result<Vec<Project>> {
    let rows = sqlx::query(&format!(
        "{} WHERE p.company_id = ? ORDER BY p.name, p.id",
        SELECT_PROJECT
    ))
    .bind(company_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(from_row).collect()
}

pub async fn list_orphans(pool: &SqlitePool) -> Result<Vec<Project>> {
    let rows = sqlx::query(&format!(
        "{} WHERE p.company_id IS NULL ORDER BY p.name, p.id",
        SELECT_PROJECT
    ))
    .fetch_all(pool)
    .await?;
    rows.iter().map(from_row).collect()
}

pub async fn list_with_stats(pool: &SqlitePool) -> Result<Vec<ProjectStats>> {
    let rows = sqlx::query(
        r#"
        SELECT p.id, p.name, p.company_id, p.created_at, c.name AS company_name,
            (SELECT COUNT(*) FROM repos r WHERE r.project_id = p.id) AS repo_count,
            (SELECT COUNT(*) FROM tasks t WHERE t.project_id = p.id) AS task_count,
            (SELECT COUNT(*) FROM raw_commits rc
                JOIN repos r ON r.id = rc.repo_id
                WHERE r.project_id = p.id AND rc.processed = 0) AS unprocessed_count
        FROM projects p
        LEFT JOIN companies c ON c.id = p.company_id
        ORDER BY p.name, p.id
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(ProjectStats {
                project: from_row(row)?,
                repo_count: row.get("repo_count"),
                task_count: row.get("task_count"),
                unprocessed_count: row.get("unprocessed_count"),
            })
        })
        .collect()
}

pub async fn rename(pool: &SqlitePool, id: i64, name: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE projects SET name = ? WHERE id = ?")
        .bind(name)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Point a project at a company, or orphan it with `None`.
pub async fn assign_company(pool: &SqlitePool, id: i64, company_id: Option<i64>) -> Result<bool> {
    let result = sqlx::query("UPDATE projects SET company_id = ? WHERE id = ?")
        .bind(company_id)
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to assign project {}", id))?;
    Ok(result.rows_affected() > 0)
}

/// Delete a project. Its tasks go with it; its repositories become orphans.
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testutil::test_pool;
    use crate::store::{companies, repos};

    #[tokio::test]
    async fn company_name_is_joined() {
        let (_tmp, pool) = test_pool().await;
        let acme = companies::create(&pool, "Acme").await.unwrap();
        let p = create(&pool, "Website", Some(acme.id)).await.unwrap();
        assert_eq!(p.company_name.as_deref(), Some("Acme"));

        let loose = create(&pool, "Side", None).await.unwrap();
        let orphans = list_orphans(&pool).await.unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].id, loose.id);
        assert_eq!(list_by_company(&pool, acme.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_orphans_repos() {
        let (_tmp, pool) = test_pool().await;
        let p = create(&pool, "Website", None).await.unwrap();
        let repo = repos::get_or_create(&pool, "/src/site").await.unwrap();
        repos::assign_project(&pool, repo.id, Some(p.id)).await.unwrap();

        let stats = list_with_stats(&pool).await.unwrap();
        assert_eq!(stats[0].repo_count, 1);

        delete(&pool, p.id).await.unwrap();
        let repo = repos::get(&pool, repo.id).await.unwrap().unwrap();
        assert!(repo.is_orphan());
    }

    #[tokio::test]
    async fn unknown_company_is_rejected() {
        let (_tmp, pool) = test_pool().await;
        assert!(create(&pool, "Ghost", Some(999)).await.is_err());
    }
}
