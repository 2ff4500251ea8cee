//! Task derivation: unprocessed commits → agent → tasks.
//!
//! Commits are grouped by the project that owns their repository and each
//! group is summarized in one agent call. A group either commits its tasks
//! and processed flags together or leaves everything untouched, so a failed
//! agent run can simply be retried later. The same goes for a group whose
//! commits were rewritten by a forced import, or summarized by another run,
//! while its agent was busy. Commits of repositories without a project are
//! never sent to an agent.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sqlx::SqlitePool;

use crate::agent::{CommandAgent, Summarizer};
use crate::config::Config;
use crate::db;
use crate::models::RawCommit;
use crate::store::commits;
use crate::store::tasks;

pub use crate::store::commits::CommitSelection;

#[derive(Debug)]
pub enum GroupStatus {
    Derived { tasks: usize },
    Failed(anyhow::Error),
}

#[derive(Debug)]
pub struct GroupOutcome {
    pub project_id: i64,
    pub project_name: String,
    pub commit_count: usize,
    pub status: GroupStatus,
}

#[derive(Debug, Default)]
pub struct DeriveReport {
    /// One entry per project group, ordered by project id.
    pub groups: Vec<GroupOutcome>,
    pub orphan_commits_skipped: usize,
}

impl DeriveReport {
    pub fn tasks_created(&self) -> usize {
        self.groups
            .iter()
            .map(|g| match g.status {
                GroupStatus::Derived { tasks } => tasks,
                GroupStatus::Failed(_) => 0,
            })
            .sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &GroupOutcome> {
        self.groups
            .iter()
            .filter(|g| matches!(g.status, GroupStatus::Failed(_)))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

struct Group {
    name: String,
    commits: Vec<RawCommit>,
}

/// Summarize every matching unprocessed commit.
///
/// Agent failures are recorded per group and the remaining groups still
/// run. Storage failures abort the whole call.
pub async fn derive_tasks(
    pool: &SqlitePool,
    summarizer: &dyn Summarizer,
    selection: CommitSelection,
) -> Result<DeriveReport> {
    let pending = commits::list_unprocessed(pool, selection).await?;

    let mut report = DeriveReport::default();
    let mut groups: BTreeMap<i64, Group> = BTreeMap::new();
    for owned in pending {
        let (Some(project_id), Some(name)) = (owned.project_id, owned.project_name) else {
            report.orphan_commits_skipped += 1;
            continue;
        };
        groups
            .entry(project_id)
            .or_insert_with(|| Group {
                name,
                commits: Vec::new(),
            })
            .commits
            .push(owned.commit);
    }

    for (project_id, group) in groups {
        let status = match derive_group(pool, summarizer, project_id, &group).await {
            Ok(GroupResult::Persisted(count)) => GroupStatus::Derived { tasks: count },
            Ok(GroupResult::Failed(e)) => {
                tracing::warn!(
                    project = %group.name,
                    agent = summarizer.name(),
                    error = %format!("{:#}", e),
                    "derivation failed"
                );
                GroupStatus::Failed(e)
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to store tasks for project '{}'", group.name)
                })
            }
        };
        report.groups.push(GroupOutcome {
            project_id,
            project_name: group.name,
            commit_count: group.commits.len(),
            status,
        });
    }

    Ok(report)
}

enum GroupResult {
    Persisted(usize),
    Failed(anyhow::Error),
}

async fn derive_group(
    pool: &SqlitePool,
    summarizer: &dyn Summarizer,
    project_id: i64,
    group: &Group,
) -> Result<GroupResult> {
    let estimates = match summarizer.summarize(&group.name, &group.commits).await {
        Ok(estimates) if estimates.is_empty() => {
            return Ok(GroupResult::Failed(anyhow!("agent returned no tasks")))
        }
        Ok(estimates) => estimates,
        Err(e) => return Ok(GroupResult::Failed(e)),
    };

    let ids: Vec<i64> = group.commits.iter().map(|c| c.id).collect();
    let sources: BTreeSet<i64> = ids.iter().copied().collect();
    let Some(task_date) = group.commits.iter().map(|c| c.committed_at).max() else {
        return Ok(GroupResult::Persisted(0));
    };

    let mut tx = pool.begin().await?;
    // The agent ran outside the transaction; a forced reimport or another
    // run may have touched these commits in the meantime.
    if !commits::mark_processed(&mut tx, &group.commits).await? {
        tx.rollback().await?;
        return Ok(GroupResult::Failed(anyhow!(
            "commits changed while the agent was running; run process again"
        )));
    }
    for estimate in &estimates {
        tasks::insert(
            &mut tx,
            project_id,
            &estimate.description,
            &sources,
            task_date,
            estimate.estimated,
        )
        .await?;
    }
    tx.commit().await?;

    tracing::info!(
        project = %group.name,
        commits = ids.len(),
        tasks = estimates.len(),
        "derived tasks"
    );
    Ok(GroupResult::Persisted(estimates.len()))
}

/// Turn the `process` flags into a selection. `--last-days` wins over
/// explicit dates; no flags selects everything unprocessed.
pub fn selection_from_args(
    since: Option<&str>,
    until: Option<&str>,
    last_days: Option<u32>,
    now: DateTime<Utc>,
) -> Result<CommitSelection> {
    if let Some(days) = last_days {
        if days == 0 {
            bail!("--last-days must be at least 1");
        }
        let first_day = now.date_naive() - Duration::days(i64::from(days) - 1);
        return Ok(CommitSelection::Between {
            from: first_day.and_time(NaiveTime::MIN).and_utc(),
            to: now,
        });
    }

    if since.is_none() && until.is_none() {
        return Ok(CommitSelection::AllUnprocessed);
    }

    let from = match since {
        Some(s) => parse_day(s)?,
        None => NaiveDate::MIN,
    };
    let to = match until {
        Some(s) => parse_day(s)?,
        None => NaiveDate::MAX,
    };
    if from > to {
        bail!("--since {} is after --until {}", from, to);
    }

    Ok(CommitSelection::Between {
        from: from.and_time(NaiveTime::MIN).and_utc(),
        to: end_of_day(to),
    })
}

fn parse_day(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}': expected YYYY-MM-DD", s))
}

fn end_of_day(day: NaiveDate) -> DateTime<Utc> {
    let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    day.and_time(last_second).and_utc()
}

/// `worklog process`.
pub async fn run_process(
    config: &Config,
    since: Option<&str>,
    until: Option<&str>,
    last_days: Option<u32>,
    agent_name: Option<&str>,
) -> Result<()> {
    let selection = selection_from_args(since, until, last_days, Utc::now())?;
    let agent = CommandAgent::from_config(&config.agent, agent_name)?;

    let pool = db::open(config).await?;
    let report = derive_tasks(&pool, &agent, selection).await;
    pool.close().await;
    let report = report?;

    println!("process ({})", agent.kind());
    if report.groups.is_empty() {
        println!("  no unprocessed commits with a project");
    }
    for group in &report.groups {
        match &group.status {
            GroupStatus::Derived { tasks } => println!(
                "  {:<24} {:>3} commits -> {} tasks",
                group.project_name, group.commit_count, tasks
            ),
            GroupStatus::Failed(_) => println!(
                "  {:<24} {:>3} commits -> FAILED",
                group.project_name, group.commit_count
            ),
        }
    }
    if report.orphan_commits_skipped > 0 {
        println!(
            "  skipped {} commits from repositories without a project",
            report.orphan_commits_skipped
        );
    }
    println!("  tasks created: {}", report.tasks_created());

    if report.has_failures() {
        let mut summary = String::new();
        for group in report.failures() {
            if let GroupStatus::Failed(e) = &group.status {
                summary.push_str(&format!("\n  {}: {:#}", group.project_name, e));
            }
        }
        bail!(
            "{} project(s) failed; their commits stay unprocessed:{}",
            report.failures().count(),
            summary
        );
    }

    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 15, 30, 0).unwrap()
    }

    #[test]
    fn no_flags_selects_everything() {
        assert_eq!(
            selection_from_args(None, None, None, now()).unwrap(),
            CommitSelection::AllUnprocessed
        );
    }

    #[test]
    fn last_days_counts_today() {
        let sel = selection_from_args(None, None, Some(7), now()).unwrap();
        assert_eq!(
            sel,
            CommitSelection::Between {
                from: Utc.with_ymd_and_hms(2025, 3, 4, 0, 0, 0).unwrap(),
                to: now(),
            }
        );
        assert!(selection_from_args(None, None, Some(0), now()).is_err());
    }

    #[test]
    fn date_window_is_inclusive() {
        let sel = selection_from_args(Some("2025-01-01"), Some("2025-01-31"), None, now()).unwrap();
        assert_eq!(
            sel,
            CommitSelection::Between {
                from: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
                to: Utc.with_ymd_and_hms(2025, 1, 31, 23, 59, 59).unwrap(),
            }
        );
    }

    #[test]
    fn bad_windows_are_rejected() {
        assert!(selection_from_args(Some("2025-02-01"), Some("2025-01-01"), None, now()).is_err());
        assert!(selection_from_args(Some("last week"), None, None, now()).is_err());
    }
}
