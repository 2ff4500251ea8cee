//! Raw commit records.
//!
//! `(repo_id, hash)` is unique. That constraint is the only thing standing
//! between concurrent hook invocations, so [`insert`] turns a unique
//! violation into [`InsertOutcome::Duplicate`] rather than an error.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use super::{datetime_from_ts, decode_list, encode_list, now_ts};
use crate::models::{CommitInfo, RawCommit};

const SELECT_COMMIT: &str = r#"
    SELECT rc.id, rc.repo_id, rc.hash, rc.message, rc.author, rc.branch,
        rc.files_changed, rc.committed_at, rc.processed, rc.created_at,
        r.path AS repo_path
    FROM raw_commits rc
    JOIN repos r ON r.id = rc.repo_id
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    Duplicate,
}

/// Which unprocessed commits to hand to derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitSelection {
    AllUnprocessed,
    /// Inclusive on both ends.
    Between {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

/// An unprocessed commit together with the project that owns its
/// repository, if any.
#[derive(Debug, Clone)]
pub struct OwnedCommit {
    pub commit: RawCommit,
    pub project_id: Option<i64>,
    pub project_name: Option<String>,
}

fn from_row(row: &SqliteRow) -> Result<RawCommit> {
    let id: i64 = row.get("id");
    let files: String = row.get("files_changed");
    Ok(RawCommit {
        id,
        repo_id: row.get("repo_id"),
        hash: row.get("hash"),
        message: row.get("message"),
        author: row.get("author"),
        branch: row.get("branch"),
        files_changed: decode_list(&files, "raw_commits", "files_changed", id)?,
        committed_at: datetime_from_ts(row.get("committed_at"))?,
        processed: row.get::<i64, _>("processed") != 0,
        created_at: datetime_from_ts(row.get("created_at"))?,
        repo_path: row.get("repo_path"),
    })
}

/// Insert a new, unprocessed commit.
pub async fn insert(pool: &SqlitePool, repo_id: i64, info: &CommitInfo) -> Result<InsertOutcome> {
    let files = encode_list(&info.files_changed)?;
    let result = sqlx::query(
        r#"
        INSERT INTO raw_commits
            (repo_id, hash, message, author, branch, files_changed, committed_at, processed, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(repo_id)
    .bind(&info.hash)
    .bind(&info.message)
    .bind(&info.author)
    .bind(&info.branch)
    .bind(files)
    .bind(info.committed_at.timestamp())
    .bind(now_ts())
    .execute(pool)
    .await;

    match result {
        Ok(done) => Ok(InsertOutcome::Inserted(done.last_insert_rowid())),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(InsertOutcome::Duplicate),
        Err(e) => Err(e).with_context(|| format!("Failed to insert commit {}", info.hash)),
    }
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<RawCommit>> {
    let row = sqlx::query(&format!("{} WHERE rc.id = ?", SELECT_COMMIT))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(from_row).transpose()
}

pub async fn get_by_hash(pool: &SqlitePool, repo_id: i64, hash: &str) -> Result<Option<RawCommit>> {
    let row = sqlx::query(&format!(
        "{} WHERE rc.repo_id = ? AND rc.hash = ?",
        SELECT_COMMIT
    ))
    .bind(repo_id)
    .bind(hash)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(from_row).transpose()
}

pub async fn list_by_repo(pool: &SqlitePool, repo_id: i64) -> Result<Vec<RawCommit>> {
    let rows = sqlx::query(&format!(
        "{} WHERE rc.repo_id = ? ORDER BY rc.committed_at, rc.id",
        SELECT_COMMIT
    ))
    .bind(repo_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(from_row).collect()
}

/// Overwrite a commit with fresh git data and retract everything derived
/// from it.
///
/// In one transaction: every task whose source set contains `id` is
/// deleted, the commit's fields are replaced and `processed` goes back to
/// false. Returns the number of tasks deleted.
pub async fn force_update(pool: &SqlitePool, id: i64, info: &CommitInfo) -> Result<u64> {
    let mut tx = pool.begin().await?;

    let rows = sqlx::query("SELECT id, source_commits FROM tasks")
        .fetch_all(&mut *tx)
        .await?;

    let mut doomed = Vec::new();
    for row in &rows {
        let task_id: i64 = row.get("id");
        let raw: String = row.get("source_commits");
        let sources: BTreeSet<i64> = decode_list(&raw, "tasks", "source_commits", task_id)?;
        if sources.contains(&id) {
            doomed.push(task_id);
        }
    }

    for task_id in &doomed {
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;
    }

    let files = encode_list(&info.files_changed)?;
    sqlx::query(
        r#"
        UPDATE raw_commits
        SET message = ?, author = ?, branch = ?, files_changed = ?, committed_at = ?, processed = 0
        WHERE id = ?
        "#,
    )
    .bind(&info.message)
    .bind(&info.author)
    .bind(&info.branch)
    .bind(files)
    .bind(info.committed_at.timestamp())
    .bind(id)
    .execute(&mut *tx)
    .await
    .with_context(|| format!("Failed to update commit {}", info.hash))?;

    tx.commit().await?;
    Ok(doomed.len() as u64)
}

/// Unprocessed commits matching `selection`, oldest first, each with its
/// owning project resolved through the repository.
pub async fn list_unprocessed(
    pool: &SqlitePool,
    selection: CommitSelection,
) -> Result<Vec<OwnedCommit>> {
    let base = r#"
        SELECT rc.id, rc.repo_id, rc.hash, rc.message, rc.author, rc.branch,
            rc.files_changed, rc.committed_at, rc.processed, rc.created_at,
            r.path AS repo_path, p.id AS project_id, p.name AS project_name
        FROM raw_commits rc
        JOIN repos r ON r.id = rc.repo_id
        LEFT JOIN projects p ON p.id = r.project_id
        WHERE rc.processed = 0
    "#;

    let rows = match selection {
        CommitSelection::AllUnprocessed => {
            sqlx::query(&format!("{} ORDER BY rc.committed_at, rc.id", base))
                .fetch_all(pool)
                .await?
        }
        CommitSelection::Between { from, to } => {
            sqlx::query(&format!(
                "{} AND rc.committed_at >= ? AND rc.committed_at <= ? ORDER BY rc.committed_at, rc.id",
                base
            ))
            .bind(from.timestamp())
            .bind(to.timestamp())
            .fetch_all(pool)
            .await?
        }
    };

    rows.iter()
        .map(|row| {
            Ok(OwnedCommit {
                commit: from_row(row)?,
                project_id: row.get("project_id"),
                project_name: row.get("project_name"),
            })
        })
        .collect()
}

/// Flag commits as summarized, but only rows that are still unprocessed and
/// still hold exactly the data in `seen`.
///
/// Returns false as soon as one row fails the check. The caller must then
/// roll back: a forced reimport rewrote the commit, or another run already
/// summarized it. Runs on the caller's connection so it can share a
/// transaction with the task inserts.
pub async fn mark_processed(conn: &mut SqliteConnection, seen: &[RawCommit]) -> Result<bool> {
    for commit in seen {
        let files = encode_list(&commit.files_changed)?;
        let result = sqlx::query(
            r#"
            UPDATE raw_commits SET processed = 1
            WHERE id = ? AND processed = 0
                AND message = ? AND author = ? AND branch = ?
                AND files_changed = ? AND committed_at = ?
            "#,
        )
        .bind(commit.id)
        .bind(&commit.message)
        .bind(&commit.author)
        .bind(&commit.branch)
        .bind(files)
        .bind(commit.committed_at.timestamp())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(id = commit.id, hash = %commit.hash, "commit changed since it was read");
            return Ok(false);
        }
    }
    Ok(true)
}

pub async fn count(pool: &SqlitePool) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM raw_commits")
        .fetch_one(pool)
        .await?)
}

pub async fn count_unprocessed(pool: &SqlitePool) -> Result<i64> {
    Ok(
        sqlx::query_scalar("SELECT COUNT(*) FROM raw_commits WHERE processed = 0")
            .fetch_one(pool)
            .await?,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testutil::test_pool;
    use crate::store::{projects, repos, tasks};
    use crate::models::Effort;

    fn info(hash: &str, ts: i64) -> CommitInfo {
        CommitInfo {
            hash: hash.to_string(),
            message: format!("commit {}", hash),
            author: "Dev <dev@example.com>".to_string(),
            branch: "main".to_string(),
            files_changed: vec!["src/lib.rs".to_string(), "README.md".to_string()],
            committed_at: DateTime::from_timestamp(ts, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn second_insert_is_duplicate() {
        let (_tmp, pool) = test_pool().await;
        let repo = repos::get_or_create(&pool, "/src/a").await.unwrap();

        let first = insert(&pool, repo.id, &info("aaa", 100)).await.unwrap();
        assert!(matches!(first, InsertOutcome::Inserted(_)));
        let second = insert(&pool, repo.id, &info("aaa", 100)).await.unwrap();
        assert_eq!(second, InsertOutcome::Duplicate);
        assert_eq!(count(&pool).await.unwrap(), 1);

        // same hash in another repository is a different commit
        let other = repos::get_or_create(&pool, "/src/b").await.unwrap();
        let third = insert(&pool, other.id, &info("aaa", 100)).await.unwrap();
        assert!(matches!(third, InsertOutcome::Inserted(_)));
    }

    #[tokio::test]
    async fn files_round_trip_in_order() {
        let (_tmp, pool) = test_pool().await;
        let repo = repos::get_or_create(&pool, "/src/a").await.unwrap();
        insert(&pool, repo.id, &info("abc", 100)).await.unwrap();
        let stored = get_by_hash(&pool, repo.id, "abc").await.unwrap().unwrap();
        assert_eq!(stored.files_changed, vec!["src/lib.rs", "README.md"]);
        assert_eq!(stored.repo_path, "/src/a");
        assert!(!stored.processed);
    }

    #[tokio::test]
    async fn malformed_files_column_is_an_error() {
        let (_tmp, pool) = test_pool().await;
        let repo = repos::get_or_create(&pool, "/src/a").await.unwrap();
        insert(&pool, repo.id, &info("abc", 100)).await.unwrap();
        sqlx::query("UPDATE raw_commits SET files_changed = 'oops'")
            .execute(&pool)
            .await
            .unwrap();
        assert!(get_by_hash(&pool, repo.id, "abc").await.is_err());
    }

    #[tokio::test]
    async fn force_update_retracts_tasks() {
        let (_tmp, pool) = test_pool().await;
        let project = projects::create(&pool, "P", None).await.unwrap();
        let repo = repos::get_or_create(&pool, "/src/a").await.unwrap();
        let InsertOutcome::Inserted(c1) = insert(&pool, repo.id, &info("c1", 100)).await.unwrap()
        else {
            panic!("expected insert");
        };
        let InsertOutcome::Inserted(c2) = insert(&pool, repo.id, &info("c2", 200)).await.unwrap()
        else {
            panic!("expected insert");
        };

        let mut tx = pool.begin().await.unwrap();
        let date = DateTime::from_timestamp(200, 0).unwrap();
        tasks::insert(&mut tx, project.id, "Both", &[c1, c2].into(), date, Effort::HALF_HOUR)
            .await
            .unwrap();
        tasks::insert(&mut tx, project.id, "Only c2", &[c2].into(), date, Effort::HALF_HOUR)
            .await
            .unwrap();
        let seen = vec![get(&pool, c1).await.unwrap().unwrap(), get(&pool, c2).await.unwrap().unwrap()];
        assert!(mark_processed(&mut tx, &seen).await.unwrap());
        tx.commit().await.unwrap();

        let mut changed = info("c1", 150);
        changed.message = "reworded".to_string();
        let deleted = force_update(&pool, c1, &changed).await.unwrap();
        assert_eq!(deleted, 1);

        let c1_row = get(&pool, c1).await.unwrap().unwrap();
        assert_eq!(c1_row.message, "reworded");
        assert_eq!(c1_row.committed_at.timestamp(), 150);
        assert!(!c1_row.processed);
        assert!(get(&pool, c2).await.unwrap().unwrap().processed);

        let remaining = tasks::list_by_project(&pool, project.id).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].description, "Only c2");
    }

    #[tokio::test]
    async fn mark_processed_refuses_changed_or_claimed_rows() {
        let (_tmp, pool) = test_pool().await;
        let repo = repos::get_or_create(&pool, "/src/a").await.unwrap();
        let InsertOutcome::Inserted(id) = insert(&pool, repo.id, &info("c1", 100)).await.unwrap()
        else {
            panic!("expected insert");
        };
        let seen = get(&pool, id).await.unwrap().unwrap();

        // rewritten after it was read
        let mut changed = info("c1", 100);
        changed.message = "reworded".to_string();
        force_update(&pool, id, &changed).await.unwrap();
        let mut tx = pool.begin().await.unwrap();
        assert!(!mark_processed(&mut tx, std::slice::from_ref(&seen)).await.unwrap());
        tx.rollback().await.unwrap();
        assert!(!get(&pool, id).await.unwrap().unwrap().processed);

        // fresh read goes through once, a second claim does not
        let fresh = get(&pool, id).await.unwrap().unwrap();
        let mut conn = pool.acquire().await.unwrap();
        assert!(mark_processed(&mut conn, std::slice::from_ref(&fresh)).await.unwrap());
        assert!(!mark_processed(&mut conn, std::slice::from_ref(&fresh)).await.unwrap());
    }

    #[tokio::test]
    async fn unprocessed_window_is_inclusive() {
        let (_tmp, pool) = test_pool().await;
        let repo = repos::get_or_create(&pool, "/src/a").await.unwrap();
        for (hash, ts) in [("a", 100), ("b", 200), ("c", 300), ("d", 400)] {
            insert(&pool, repo.id, &info(hash, ts)).await.unwrap();
        }

        let all = list_unprocessed(&pool, CommitSelection::AllUnprocessed)
            .await
            .unwrap();
        assert_eq!(all.len(), 4);
        assert!(all.iter().all(|c| c.project_id.is_none()));

        let window = CommitSelection::Between {
            from: DateTime::from_timestamp(200, 0).unwrap(),
            to: DateTime::from_timestamp(300, 0).unwrap(),
        };
        let hashes: Vec<String> = list_unprocessed(&pool, window)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.commit.hash)
            .collect();
        assert_eq!(hashes, vec!["b", "c"]);
    }
}
