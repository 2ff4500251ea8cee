//! Database statistics and health overview.
//!
//! `worklog stats` answers the questions you have before running
//! `process`: are hooks recording anything, which repositories still need
//! a project, and how much is waiting to be summarized.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::db;
use crate::store::{commits, companies, projects, repos, tasks};

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::open(config).await?;

    let company_count = companies::list(&pool).await?.len();
    let project_rows = projects::list_with_stats(&pool).await?;
    let repo_rows = repos::list_with_stats(&pool).await?;
    let total_commits = commits::count(&pool).await?;
    let unprocessed = commits::count_unprocessed(&pool).await?;
    let total_tasks = tasks::count(&pool).await?;
    let last_processed = tasks::last_processed_time(&pool).await?;

    pool.close().await;

    let orphan_projects = project_rows
        .iter()
        .filter(|p| p.project.company_id.is_none())
        .count();
    let orphan_repos: Vec<_> = repo_rows.iter().filter(|r| r.repo.is_orphan()).collect();
    let orphan_unprocessed: i64 = orphan_repos.iter().map(|r| r.unprocessed_count).sum();

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("worklog database stats");
    println!("======================");
    println!();
    println!("  Database:     {}", config.db.path.display());
    println!("  Size:         {}", format_bytes(db_size));
    println!();
    println!("  Companies:    {}", company_count);
    println!(
        "  Projects:     {} ({} without company)",
        project_rows.len(),
        orphan_projects
    );
    println!(
        "  Repos:        {} ({} without project)",
        repo_rows.len(),
        orphan_repos.len()
    );
    println!(
        "  Commits:      {} ({} unprocessed)",
        total_commits, unprocessed
    );
    println!("  Tasks:        {}", total_tasks);
    println!(
        "  Last process: {}",
        match last_processed {
            Some(at) => format_relative(at, Utc::now()),
            None => "never".to_string(),
        }
    );

    if !project_rows.is_empty() {
        println!();
        println!("  By project:");
        println!(
            "  {:<24} {:<20} {:>5} {:>6} {:>11}",
            "PROJECT", "COMPANY", "REPOS", "TASKS", "UNPROCESSED"
        );
        println!("  {}", "-".repeat(70));
        for p in &project_rows {
            println!(
                "  {:<24} {:<20} {:>5} {:>6} {:>11}",
                p.project.name,
                p.project.company_name.as_deref().unwrap_or("-"),
                p.repo_count,
                p.task_count,
                p.unprocessed_count
            );
        }
    }

    if !orphan_repos.is_empty() {
        println!();
        println!(
            "  Repositories without a project ({} commits waiting):",
            orphan_unprocessed
        );
        for r in &orphan_repos {
            println!("    [{}] {}", r.repo.id, r.repo.path);
        }
        println!("  Assign them with `worklog repo assign <repo> <project>`.");
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// "3 hours ago" style, falling back to a date beyond a month or for
/// timestamps in the future.
fn format_relative(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = (now - at).num_seconds();
    if delta < 0 {
        return at.format("%Y-%m-%d %H:%M").to_string();
    }

    let plural = |n: i64| if n == 1 { "" } else { "s" };
    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, plural(mins))
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, plural(hours))
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, plural(days))
    } else {
        at.format("%Y-%m-%d %H:%M").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case(0, "0 B")]
    #[case(2048, "2.0 KB")]
    #[case(5 * 1024 * 1024, "5.0 MB")]
    fn bytes(#[case] n: u64, #[case] expected: &str) {
        assert_eq!(format_bytes(n), expected);
    }

    #[rstest]
    #[case(30, "just now")]
    #[case(60, "1 min ago")]
    #[case(7200, "2 hours ago")]
    #[case(86400 * 3, "3 days ago")]
    #[case(86400 * 40, "2025-01-20 12:00")]
    #[case(-60, "2025-03-01 12:01")]
    fn relative(#[case] seconds_ago: i64, #[case] expected: &str) {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let at = now - chrono::Duration::seconds(seconds_ago);
        assert_eq!(format_relative(at, now), expected);
    }
}
