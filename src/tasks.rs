//! Task listing and removal.
//!
//! `worklog tasks list` is also the read path the report renderer builds
//! on, so it can emit JSON in addition to the human table.

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveTime};

use crate::catalog;
use crate::config::Config;
use crate::db;
use crate::models::Task;
use crate::store::tasks::{self, TaskFilter};

/// Build a filter from CLI strings. Dates are `YYYY-MM-DD`, inclusive.
pub fn filter_from_args(since: Option<&str>, until: Option<&str>) -> Result<TaskFilter> {
    let parse = |s: &str| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("Invalid date '{}': expected YYYY-MM-DD", s))
    };

    let since = since.map(parse).transpose()?;
    let until = until.map(parse).transpose()?;
    if let (Some(s), Some(u)) = (since, until) {
        if s > u {
            bail!("--since {} is after --until {}", s, u);
        }
    }

    let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    Ok(TaskFilter {
        since: since.map(|d| d.and_time(NaiveTime::MIN).and_utc()),
        until: until.map(|d| d.and_time(end_of_day).and_utc()),
        project_id: None,
    })
}

pub async fn run_tasks_list(
    config: &Config,
    since: Option<&str>,
    until: Option<&str>,
    project: Option<&str>,
    json: bool,
) -> Result<()> {
    let mut filter = filter_from_args(since, until)?;

    let pool = db::open(config).await?;
    if let Some(reference) = project {
        filter.project_id = Some(catalog::resolve_project(&pool, reference).await?.id);
    }
    let found = tasks::list(&pool, &filter).await;
    pool.close().await;
    let found = found?;

    if json {
        println!("{}", serde_json::to_string_pretty(&found)?);
        return Ok(());
    }

    if found.is_empty() {
        println!("No tasks.");
        return Ok(());
    }
    print_table(&found);
    Ok(())
}

fn print_table(found: &[Task]) {
    println!(
        "{:>5}  {:<10}  {:<20} {:>6}  DESCRIPTION",
        "ID", "DATE", "PROJECT", "HOURS"
    );
    let mut total = 0u32;
    for task in found {
        total += task.estimated.halves();
        println!(
            "{:>5}  {:<10}  {:<20} {:>6}  {}",
            task.id,
            task.task_date.format("%Y-%m-%d"),
            task.project_name,
            task.estimated.to_string(),
            task.description
        );
    }
    println!();
    println!(
        "{} task{}, {:.1}h total",
        found.len(),
        if found.len() == 1 { "" } else { "s" },
        f64::from(total) / 2.0
    );
}

pub async fn run_tasks_rm(config: &Config, id: i64) -> Result<()> {
    let pool = db::open(config).await?;
    let deleted = tasks::delete(&pool, id).await;
    pool.close().await;

    if !deleted? {
        bail!("No task with id {}", id);
    }
    println!("deleted task {}", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_covers_whole_days() {
        let filter = filter_from_args(Some("2025-01-01"), Some("2025-01-01")).unwrap();
        let since = filter.since.unwrap();
        let until = filter.until.unwrap();
        assert_eq!(until.timestamp() - since.timestamp(), 86_399);
    }

    #[test]
    fn filter_rejects_reversed_range() {
        assert!(filter_from_args(Some("2025-02-01"), Some("2025-01-01")).is_err());
        assert!(filter_from_args(Some("01/02/2025"), None).is_err());
        let open = filter_from_args(None, None).unwrap();
        assert!(open.since.is_none() && open.until.is_none());
    }
}
