//! `company`, `project` and `repo` subcommands.
//!
//! Companies and projects can be referred to by numeric id or by name.
//! Repositories take an id or a path; relative paths are resolved against
//! the current directory and `.` means the repository you are standing in.

use std::path::Path;

use anyhow::{bail, Context, Result};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::git;
use crate::models::{Company, Project, Repo};
use crate::store::{companies, projects, repos};

pub async fn resolve_company(pool: &SqlitePool, reference: &str) -> Result<Company> {
    if let Ok(id) = reference.parse::<i64>() {
        if let Some(company) = companies::get(pool, id).await? {
            return Ok(company);
        }
    }
    companies::get_by_name(pool, reference)
        .await?
        .with_context(|| format!("No company '{}'", reference))
}

pub async fn resolve_project(pool: &SqlitePool, reference: &str) -> Result<Project> {
    if let Ok(id) = reference.parse::<i64>() {
        if let Some(project) = projects::get(pool, id).await? {
            return Ok(project);
        }
    }
    projects::get_by_name(pool, reference)
        .await?
        .with_context(|| format!("No project '{}'", reference))
}

pub async fn resolve_repo(pool: &SqlitePool, reference: &str) -> Result<Repo> {
    if let Ok(id) = reference.parse::<i64>() {
        if let Some(repo) = repos::get(pool, id).await? {
            return Ok(repo);
        }
    }

    let path = Path::new(reference);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    // Prefer the working-copy root so `.` inside a subdirectory works.
    let key = match git::work_tree_root(&absolute) {
        Ok(Some(root)) => root,
        _ => std::fs::canonicalize(&absolute).unwrap_or(absolute),
    };

    repos::get_by_path(pool, &key.to_string_lossy())
        .await?
        .with_context(|| format!("No repository recorded at {}", key.display()))
}

pub async fn run_company_add(config: &Config, name: &str) -> Result<()> {
    let name = non_empty(name, "company")?;
    let pool = db::open(config).await?;
    let company = companies::create(&pool, name).await?;
    println!("created company {} ({})", company.name, company.id);
    pool.close().await;
    Ok(())
}

pub async fn run_company_list(config: &Config) -> Result<()> {
    let pool = db::open(config).await?;
    let rows = companies::list_with_stats(&pool).await?;
    pool.close().await;

    if rows.is_empty() {
        println!("No companies. Add one with `worklog company add <name>`.");
        return Ok(());
    }
    println!("{:>4}  {:<32} {:>8}", "ID", "COMPANY", "PROJECTS");
    for row in rows {
        println!(
            "{:>4}  {:<32} {:>8}",
            row.company.id, row.company.name, row.project_count
        );
    }
    Ok(())
}

pub async fn run_company_rename(config: &Config, reference: &str, name: &str) -> Result<()> {
    let name = non_empty(name, "company")?;
    let pool = db::open(config).await?;
    let company = resolve_company(&pool, reference).await?;
    companies::rename(&pool, company.id, name).await?;
    println!("renamed company {} -> {}", company.name, name);
    pool.close().await;
    Ok(())
}

pub async fn run_company_rm(config: &Config, reference: &str) -> Result<()> {
    let pool = db::open(config).await?;
    let company = resolve_company(&pool, reference).await?;
    let orphaned = projects::list_by_company(&pool, company.id).await?.len();
    companies::delete(&pool, company.id).await?;
    println!("deleted company {}", company.name);
    if orphaned > 0 {
        println!("  {} project(s) no longer have a company", orphaned);
    }
    pool.close().await;
    Ok(())
}

pub async fn run_project_add(config: &Config, name: &str, company: Option<&str>) -> Result<()> {
    let name = non_empty(name, "project")?;
    let pool = db::open(config).await?;
    let company_id = match company {
        Some(reference) => Some(resolve_company(&pool, reference).await?.id),
        None => None,
    };
    let project = projects::create(&pool, name, company_id).await?;
    match &project.company_name {
        Some(company) => println!("created project {} ({}) for {}", project.name, project.id, company),
        None => println!("created project {} ({})", project.name, project.id),
    }
    pool.close().await;
    Ok(())
}

pub async fn run_project_list(config: &Config, orphans: bool) -> Result<()> {
    let pool = db::open(config).await?;
    let mut rows = projects::list_with_stats(&pool).await?;
    pool.close().await;
    if orphans {
        rows.retain(|r| r.project.company_id.is_none());
    }

    if rows.is_empty() {
        println!("No projects.");
        return Ok(());
    }
    println!(
        "{:>4}  {:<24} {:<20} {:>5} {:>5} {:>11}",
        "ID", "PROJECT", "COMPANY", "REPOS", "TASKS", "UNPROCESSED"
    );
    for row in rows {
        println!(
            "{:>4}  {:<24} {:<20} {:>5} {:>5} {:>11}",
            row.project.id,
            row.project.name,
            row.project.company_name.as_deref().unwrap_or("-"),
            row.repo_count,
            row.task_count,
            row.unprocessed_count
        );
    }
    Ok(())
}

pub async fn run_project_rename(config: &Config, reference: &str, name: &str) -> Result<()> {
    let name = non_empty(name, "project")?;
    let pool = db::open(config).await?;
    let project = resolve_project(&pool, reference).await?;
    projects::rename(&pool, project.id, name).await?;
    println!("renamed project {} -> {}", project.name, name);
    pool.close().await;
    Ok(())
}

/// Attach a project to a company, or detach it when `company` is `None`.
pub async fn run_project_assign(config: &Config, reference: &str, company: Option<&str>) -> Result<()> {
    let pool = db::open(config).await?;
    let project = resolve_project(&pool, reference).await?;
    match company {
        Some(c) => {
            let company = resolve_company(&pool, c).await?;
            projects::assign_company(&pool, project.id, Some(company.id)).await?;
            println!("project {} -> company {}", project.name, company.name);
        }
        None => {
            projects::assign_company(&pool, project.id, None).await?;
            println!("project {} no longer has a company", project.name);
        }
    }
    pool.close().await;
    Ok(())
}

pub async fn run_project_rm(config: &Config, reference: &str) -> Result<()> {
    let pool = db::open(config).await?;
    let project = resolve_project(&pool, reference).await?;
    let repo_count = repos::list_by_project(&pool, project.id).await?.len();
    projects::delete(&pool, project.id).await?;
    println!("deleted project {} and its tasks", project.name);
    if repo_count > 0 {
        println!("  {} repositor{} no longer have a project", repo_count, if repo_count == 1 { "y" } else { "ies" });
    }
    pool.close().await;
    Ok(())
}

pub async fn run_repo_list(config: &Config, orphans: bool) -> Result<()> {
    let pool = db::open(config).await?;
    let mut rows = repos::list_with_stats(&pool).await?;
    pool.close().await;
    if orphans {
        rows.retain(|r| r.repo.is_orphan());
    }

    if rows.is_empty() {
        println!("No repositories.");
        return Ok(());
    }
    println!(
        "{:>4}  {:<48} {:<20} {:>7} {:>11}",
        "ID", "PATH", "PROJECT", "COMMITS", "UNPROCESSED"
    );
    for row in rows {
        println!(
            "{:>4}  {:<48} {:<20} {:>7} {:>11}",
            row.repo.id,
            row.repo.path,
            row.repo.project_name.as_deref().unwrap_or("(orphan)"),
            row.commit_count,
            row.unprocessed_count
        );
    }
    Ok(())
}

/// Assign a repository to a project, or orphan it when `project` is `None`.
pub async fn run_repo_assign(config: &Config, reference: &str, project: Option<&str>) -> Result<()> {
    let pool = db::open(config).await?;
    let repo = resolve_repo(&pool, reference).await?;
    match project {
        Some(p) => {
            let project = resolve_project(&pool, p).await?;
            repos::assign_project(&pool, repo.id, Some(project.id)).await?;
            println!("{} -> project {}", repo.path, project.name);
        }
        None => {
            repos::assign_project(&pool, repo.id, None).await?;
            println!("{} no longer has a project", repo.path);
        }
    }
    pool.close().await;
    Ok(())
}

pub async fn run_repo_rm(config: &Config, reference: &str) -> Result<()> {
    let pool = db::open(config).await?;
    let repo = resolve_repo(&pool, reference).await?;
    repos::delete(&pool, repo.id).await?;
    println!("deleted {} and its recorded commits", repo.path);
    pool.close().await;
    Ok(())
}

fn non_empty<'a>(name: &'a str, what: &str) -> Result<&'a str> {
    let name = name.trim();
    if name.is_empty() {
        bail!("{} name must not be empty", what);
    }
    Ok(name)
}
