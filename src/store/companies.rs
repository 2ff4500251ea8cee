use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::{datetime_from_ts, now_ts};
use crate::models::Company;

/// A company plus how many projects point at it.
#[derive(Debug, Clone)]
pub struct CompanyStats {
    pub company: Company,
    pub project_count: i64,
}

fn from_row(row: &SqliteRow) -> Result<Company> {
    Ok(Company {
        id: row.get("id"),
        name: row.get("name"),
        created_at: datetime_from_ts(row.get("created_at"))?,
    })
}

pub async fn create(pool: &SqlitePool, name: &str) -> Result<Company> {
    let created_at = now_ts();
    let id = sqlx::query("INSERT INTO companies (name, created_at) VALUES (?, ?)")
        .bind(name)
        .bind(created_at)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to create company '{}'", name))?
        .last_insert_rowid();

    Ok(Company {
        id,
        name: name.to_string(),
        created_at: datetime_from_ts(created_at)?,
    })
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Company>> {
    let row = sqlx::query("SELECT id, name, created_at FROM companies WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(from_row).transpose()
}

pub async fn get_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Company>> {
    let row = sqlx::query("SELECT id, name, created_at FROM companies WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(from_row).transpose()
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<Company>> {
    let rows = sqlx::query("SELECT id, name, created_at FROM companies ORDER BY name, id")
        .fetch_all(pool)
        .await?;
    rows.iter().map(from_row).collect()
}

pub async fn list_with_stats(pool: &SqlitePool) -> Result<Vec<CompanyStats>> {
    let rows = sqlx::query(
        r#"
        SELECT c.id, c.name, c.created_at, COUNT(p.id) AS project_count
        FROM companies c
        LEFT JOIN projects p ON p.company_id = c.id
        GROUP BY c.id
        ORDER BY c.name, c.id
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(CompanyStats {
                company: from_row(row)?,
                project_count: row.get("project_count"),
            })
        })
        .collect()
}

/// Returns false when no company has `id`.
pub async fn rename(pool: &SqlitePool, id: i64, name: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE companies SET name = ? WHERE id = ?")
        .bind(name)
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to rename company {}", id))?;
    Ok(result.rows_affected() > 0)
}

/// Delete a company. Its projects become orphans.
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM companies WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::projects;
    use crate::store::testutil::test_pool;

    #[tokio::test]
    async fn names_are_unique() {
        let (_tmp, pool) = test_pool().await;
        create(&pool, "Acme").await.unwrap();
        assert!(create(&pool, "Acme").await.is_err());
    }

    #[tokio::test]
    async fn delete_orphans_projects() {
        let (_tmp, pool) = test_pool().await;
        let acme = create(&pool, "Acme").await.unwrap();
        let project = projects::create(&pool, "Website", Some(acme.id))
            .await
            .unwrap();

        let stats = list_with_stats(&pool).await.unwrap();
        assert_eq!(stats[0].project_count, 1);

        assert!(delete(&pool, acme.id).await.unwrap());
        let project = projects::get(&pool, project.id).await.unwrap().unwrap();
        assert!(project.company_id.is_none());
        assert!(get(&pool, acme.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rename_reports_missing_rows() {
        let (_tmp, pool) = test_pool().await;
        let acme = create(&pool, "Acme").await.unwrap();
        assert!(rename(&pool, acme.id, "Acme Corp").await.unwrap());
        assert!(!rename(&pool, acme.id + 100, "Nope").await.unwrap());
        let found = get_by_name(&pool, "Acme Corp").await.unwrap().unwrap();
        assert_eq!(found.id, acme.id);
    }
}
