//! Historical import of existing commits.
//!
//! Unlike hook ingestion this is user-invoked, so a directory that isn't a
//! working copy is an error and an untracked repository is only a warning.
//! With `force`, commits already on record are rewritten from git and any
//! task derived from them is deleted (see [`commits::force_update`]).

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::git::{self, HistoryOptions};
use crate::scan_path;
use crate::store::commits::{self, InsertOutcome};
use crate::store::repos;

/// How far back to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportBound {
    All,
    /// Most recent N commits. Zero means all.
    Count(usize),
    /// Commits on or after this day.
    Since(NaiveDate),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    pub bound: ImportBound,
    /// `None` reads every ref.
    pub branch: Option<String>,
    pub force: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            bound: ImportBound::All,
            branch: None,
            force: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub repo_path: String,
    pub total_found: usize,
    pub imported: usize,
    pub skipped: usize,
    pub updated: usize,
    pub tasks_deleted: u64,
    pub is_orphan: bool,
    pub not_in_scan_path: bool,
}

/// Parse the positional `import` argument: a commit count, else a
/// `YYYY-MM-DD` date.
pub fn parse_import_arg(arg: Option<&str>) -> Result<ImportBound> {
    let Some(arg) = arg.map(str::trim) else {
        return Ok(ImportBound::All);
    };
    if let Ok(count) = arg.parse::<usize>() {
        return Ok(if count == 0 {
            ImportBound::All
        } else {
            ImportBound::Count(count)
        });
    }
    match NaiveDate::parse_from_str(arg, "%Y-%m-%d") {
        Ok(date) => Ok(ImportBound::Since(date)),
        Err(_) => bail!(
            "Invalid import argument '{}': expected a commit count or a date (YYYY-MM-DD)",
            arg
        ),
    }
}

pub async fn import_history(
    pool: &SqlitePool,
    config: &Config,
    dir: &Path,
    opts: &ImportOptions,
) -> Result<ImportReport> {
    let root = git::work_tree_root(dir)?
        .with_context(|| format!("{} is not inside a git repository", dir.display()))?;
    let repo_path = root.to_string_lossy().into_owned();

    let not_in_scan_path = !scan_path::is_path_tracked(&root, &config.tracking.scan_paths);
    let repo = repos::get_or_create(pool, &repo_path).await?;

    let history = HistoryOptions {
        count: match opts.bound {
            ImportBound::Count(n) => Some(n),
            _ => None,
        },
        since: match opts.bound {
            ImportBound::Since(date) => Some(date),
            _ => None,
        },
        branch: opts.branch.clone(),
    };
    let found = git::commit_history(&root, &history)
        .with_context(|| format!("Failed to read history of {}", repo_path))?;

    let mut report = ImportReport {
        repo_path: repo_path.clone(),
        total_found: found.len(),
        is_orphan: repo.is_orphan(),
        not_in_scan_path,
        ..ImportReport::default()
    };

    for info in &found {
        match commits::get_by_hash(pool, repo.id, &info.hash).await? {
            None => match commits::insert(pool, repo.id, info).await? {
                InsertOutcome::Inserted(_) => report.imported += 1,
                // a hook got there first
                InsertOutcome::Duplicate => report.skipped += 1,
            },
            Some(_) if !opts.force => report.skipped += 1,
            Some(existing) => {
                let deleted = commits::force_update(pool, existing.id, info)
                    .await
                    .with_context(|| format!("Failed to reimport commit {}", info.hash))?;
                tracing::debug!(repo = %repo_path, hash = %info.hash, deleted, "forced reimport");
                report.updated += 1;
                report.tasks_deleted += deleted;
            }
        }
    }

    tracing::info!(
        repo = %repo_path,
        imported = report.imported,
        skipped = report.skipped,
        updated = report.updated,
        "import finished"
    );
    Ok(report)
}

/// `worklog import`.
pub async fn run_import(
    config: &Config,
    arg: Option<&str>,
    branch: Option<String>,
    force: bool,
) -> Result<()> {
    let opts = ImportOptions {
        bound: parse_import_arg(arg)?,
        branch,
        force,
    };
    let dir = std::env::current_dir().context("Failed to read current directory")?;

    let pool = db::open(config).await?;
    let report = import_history(&pool, config, &dir, &opts).await;
    pool.close().await;
    let report = report?;

    println!("import {}", report.repo_path);
    println!("  found:    {}", report.total_found);
    println!("  imported: {}", report.imported);
    println!("  skipped:  {}", report.skipped);
    if force {
        println!("  updated:  {}", report.updated);
        println!("  tasks deleted: {}", report.tasks_deleted);
    }
    if report.is_orphan {
        println!("warning: repository has no project; assign one with `worklog repo assign`");
    }
    if report.not_in_scan_path {
        println!("warning: repository is not under any configured scan path; hooks will not record it");
    }
    println!("ok");
    Ok(())
}
