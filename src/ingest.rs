//! Hook-triggered ingestion of a single commit.
//!
//! `worklog record` runs from `post-commit` and `post-merge`. It records the
//! HEAD commit of the working copy it was started in, provided the
//! repository sits under a configured scan path. Environment problems are
//! reported as skips; only storage failures are errors, and even those are
//! kept away from git by [`run_record`].

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::error::WorklogError;
use crate::error_log;
use crate::git;
use crate::scan_path;
use crate::store::commits::{self, InsertOutcome};
use crate::store::repos;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    GitUnavailable,
    NotARepository,
    NotTracked,
    Duplicate,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            SkipReason::GitUnavailable => "git is not available",
            SkipReason::NotARepository => "not a git repository",
            SkipReason::NotTracked => "repository path is not under any configured scan path",
            SkipReason::Duplicate => "commit already recorded",
        };
        f.write_str(msg)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Recorded {
        repo_path: String,
        hash: String,
        commit_id: i64,
    },
    Skipped(SkipReason),
}

/// Record HEAD of the working copy containing `dir`.
pub async fn record_current_commit(
    pool: &SqlitePool,
    config: &Config,
    dir: &Path,
) -> Result<IngestOutcome> {
    let root = match git::work_tree_root(dir) {
        Ok(Some(root)) => root,
        Ok(None) => return Ok(IngestOutcome::Skipped(SkipReason::NotARepository)),
        Err(e)
            if matches!(
                e.downcast_ref::<WorklogError>(),
                Some(WorklogError::GitUnavailable(_))
            ) =>
        {
            return Ok(IngestOutcome::Skipped(SkipReason::GitUnavailable))
        }
        Err(e) => return Err(e),
    };

    if !scan_path::is_path_tracked(&root, &config.tracking.scan_paths) {
        tracing::debug!(repo = %root.display(), "repository outside scan paths");
        return Ok(IngestOutcome::Skipped(SkipReason::NotTracked));
    }

    let info = git::head_commit(&root)
        .with_context(|| format!("Failed to read HEAD in {}", root.display()))?;

    let repo_path = root.to_string_lossy().into_owned();
    let repo = repos::get_or_create(pool, &repo_path).await?;

    if commits::get_by_hash(pool, repo.id, &info.hash).await?.is_some() {
        return Ok(IngestOutcome::Skipped(SkipReason::Duplicate));
    }

    match commits::insert(pool, repo.id, &info).await? {
        InsertOutcome::Inserted(commit_id) => {
            tracing::info!(repo = %repo_path, hash = %info.hash, "recorded commit");
            Ok(IngestOutcome::Recorded {
                repo_path,
                hash: info.hash,
                commit_id,
            })
        }
        InsertOutcome::Duplicate => {
            tracing::debug!(repo = %repo_path, hash = %info.hash, "lost insert race");
            Ok(IngestOutcome::Skipped(SkipReason::Duplicate))
        }
    }
}

/// `worklog record`. Never fails: hard errors go to the error log.
pub async fn run_record(config: &Config, verbose: bool) -> Result<()> {
    let dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let result = async {
        let pool = db::open(config).await?;
        let outcome = record_current_commit(&pool, config, &dir).await;
        pool.close().await;
        outcome
    }
    .await;

    match result {
        Ok(IngestOutcome::Recorded {
            repo_path, hash, ..
        }) => {
            if verbose {
                println!("recorded {} in {}", crate::models::short_hash(&hash), repo_path);
            }
        }
        Ok(IngestOutcome::Skipped(reason)) => {
            if verbose {
                println!("skipped: {}", reason);
            }
        }
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "record failed");
            if let Err(log_err) =
                error_log::append(&config.log.error_log, "record", &dir.to_string_lossy(), &e)
            {
                tracing::error!(error = %log_err, "could not write error log");
            }
            if verbose {
                eprintln!("Error: {:#}", e);
            }
        }
    }

    Ok(())
}
