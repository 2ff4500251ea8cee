//! Activity extractor: reads commit metadata from the local `git` binary.
//!
//! Everything here is read-only and text based. Callers pass the directory
//! to run in instead of relying on the process working directory, which
//! keeps the pipelines testable against temporary repositories.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::error::WorklogError;
use crate::models::CommitInfo;

/// Field separator used in `--format` strings. Commit subjects can contain
/// `|` and friends, but never the ASCII unit separator.
const FIELD_SEP: char = '\x1f';
const LOG_FORMAT: &str = "--format=%H%x1f%s%x1f%an <%ae>%x1f%ct";

/// Which slice of history to read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryOptions {
    /// Most-recent N commits. `None` (or 0) means no count limit.
    pub count: Option<usize>,
    /// Only commits on or after this day.
    pub since: Option<NaiveDate>,
    /// Restrict to one branch. `None` walks every ref.
    pub branch: Option<String>,
}

/// Root of the working copy containing `dir`, or `None` when `dir` is not
/// inside one.
///
/// Fails with [`WorklogError::GitUnavailable`] if git cannot be started.
pub fn work_tree_root(dir: &Path) -> Result<Option<PathBuf>> {
    let output = match Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(dir)
        .output()
    {
        Ok(output) => output,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(WorklogError::GitUnavailable(e).into())
        }
        Err(e) => {
            // current_dir may not exist any more; that is not a work tree
            if !dir.exists() {
                return Ok(None);
            }
            return Err(WorklogError::GitUnavailable(e).into());
        }
    };

    if !output.status.success() || String::from_utf8_lossy(&output.stdout).trim() != "true" {
        return Ok(None);
    }

    let top = run_git(dir, &["rev-parse", "--show-toplevel"])?;
    let top = PathBuf::from(top);
    let root = std::fs::canonicalize(&top).unwrap_or(top);
    Ok(Some(root))
}

/// Metadata for the HEAD commit of the working copy at `dir`.
pub fn head_commit(dir: &Path) -> Result<CommitInfo> {
    let line = run_git(dir, &["log", "-1", LOG_FORMAT, "HEAD"])?;
    let (hash, message, author, committed_at) = parse_log_line(&line)
        .with_context(|| format!("Unexpected git log output: {:?}", line))?;

    let branch = run_git(dir, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    let files_changed = files_changed(dir, &hash)?;

    Ok(CommitInfo {
        hash,
        message,
        author,
        branch,
        files_changed,
        committed_at,
    })
}

/// Commits selected by `opts`, oldest first.
///
/// The count limit is applied by git before `--reverse`, so `count = 3`
/// yields the three most recent commits in chronological order.
pub fn commit_history(dir: &Path, opts: &HistoryOptions) -> Result<Vec<CommitInfo>> {
    let mut args: Vec<String> = vec!["log".into(), "--reverse".into(), LOG_FORMAT.into()];

    if let Some(count) = opts.count.filter(|c| *c > 0) {
        args.push(format!("-n{}", count));
    }
    if let Some(since) = opts.since {
        args.push(format!("--since={} 00:00:00", since.format("%Y-%m-%d")));
    }
    match &opts.branch {
        Some(branch) => {
            args.push(branch.clone());
            args.push("--".into());
        }
        None => args.push("--all".into()),
    }

    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    let output = run_git(dir, &arg_refs).context("Failed to read git history")?;

    let mut commits = Vec::new();
    for line in output.lines().filter(|l| !l.trim().is_empty()) {
        let Some((hash, message, author, committed_at)) = parse_log_line(line) else {
            tracing::warn!(line, "skipping unparseable git log line");
            continue;
        };

        let files_changed = files_changed(dir, &hash)?;
        let branch = match &opts.branch {
            Some(branch) => branch.clone(),
            None => branch_containing(dir, &hash).unwrap_or_else(|_| "unknown".to_string()),
        };

        commits.push(CommitInfo {
            hash,
            message,
            author,
            branch,
            files_changed,
            committed_at,
        });
    }

    Ok(commits)
}

/// Paths touched by `hash`. `--root` makes the initial commit list its files.
pub fn files_changed(dir: &Path, hash: &str) -> Result<Vec<String>> {
    let output = run_git(
        dir,
        &["diff-tree", "--no-commit-id", "--name-only", "-r", "--root", hash],
    )?;
    Ok(output
        .lines()
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// First local branch that contains `hash`, or `unknown`.
pub fn branch_containing(dir: &Path, hash: &str) -> Result<String> {
    let output = run_git(
        dir,
        &["branch", "--contains", hash, "--format=%(refname:short)"],
    )?;
    Ok(output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("unknown")
        .to_string())
}

fn parse_log_line(line: &str) -> Option<(String, String, String, DateTime<Utc>)> {
    let mut parts = line.splitn(4, FIELD_SEP);
    let hash = parts.next()?.trim().to_string();
    let message = parts.next()?.to_string();
    let author = parts.next()?.to_string();
    let ts = parts.next()?.trim().parse::<i64>().ok()?;
    if hash.is_empty() {
        return None;
    }
    let committed_at = DateTime::from_timestamp(ts, 0)?;
    Some((hash, message, author, committed_at))
}

/// Run git in `dir` and return trimmed stdout.
pub(crate) fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = git_output(Command::new("git").args(args).current_dir(dir))?;
    check_output(dir, args, output)
}

pub(crate) fn git_output(cmd: &mut Command) -> Result<Output> {
    cmd.output().map_err(|e| WorklogError::GitUnavailable(e).into())
}

pub(crate) fn check_output(dir: &Path, args: &[&str], output: Output) -> Result<String> {
    if !output.status.success() {
        return Err(WorklogError::GitFailed {
            command: args.join(" "),
            dir: dir.to_path_buf(),
            exit_code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into());
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
