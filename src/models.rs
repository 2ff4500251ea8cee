//! Core data models used throughout worklog.
//!
//! These types represent the companies, projects, repositories, commits and
//! derived tasks that flow through the capture and derivation pipelines.
//! Row-shaped structs carry a few joined display fields (project and company
//! names) so list commands don't need extra round-trips.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Commit metadata read from git before it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub hash: String,
    pub message: String,
    pub author: String,
    pub branch: String,
    pub files_changed: Vec<String>,
    pub committed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    /// `None` marks an orphan project.
    pub company_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub company_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Repo {
    pub id: i64,
    pub path: String,
    /// `None` marks an orphan repository; its commits are never derived.
    pub project_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub project_name: Option<String>,
    pub company_name: Option<String>,
}

impl Repo {
    pub fn is_orphan(&self) -> bool {
        self.project_id.is_none()
    }
}

/// A stored commit.
#[derive(Debug, Clone, Serialize)]
pub struct RawCommit {
    pub id: i64,
    pub repo_id: i64,
    pub hash: String,
    pub message: String,
    pub author: String,
    pub branch: String,
    pub files_changed: Vec<String>,
    pub committed_at: DateTime<Utc>,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
    pub repo_path: String,
}

impl RawCommit {
    /// First eight characters of the hash.
    pub fn short_hash(&self) -> &str {
        short_hash(&self.hash)
    }
}

pub fn short_hash(hash: &str) -> &str {
    match hash.char_indices().nth(8) {
        Some((idx, _)) => &hash[..idx],
        None => hash,
    }
}

/// A derived unit of work.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: i64,
    pub project_id: i64,
    pub description: String,
    pub source_commits: BTreeSet<i64>,
    pub task_date: DateTime<Utc>,
    pub estimated: Effort,
    pub created_at: DateTime<Utc>,
    pub project_name: String,
}

/// Time spent on a task, in half-hour steps with a floor of one half hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Effort {
    halves: u32,
}

impl Effort {
    pub const HALF_HOUR: Effort = Effort { halves: 1 };

    /// Round an hour figure to the nearest half hour, never below 0.5h.
    pub fn from_hours(hours: f64) -> Self {
        if !hours.is_finite() || hours < 0.5 {
            return Self::HALF_HOUR;
        }
        let halves = (hours * 2.0).round() as u32;
        Self {
            halves: halves.max(1),
        }
    }

    pub fn from_halves(halves: u32) -> Self {
        Self {
            halves: halves.max(1),
        }
    }

    pub fn halves(self) -> u32 {
        self.halves
    }

    pub fn hours(self) -> f64 {
        f64::from(self.halves) / 2.0
    }
}

impl Default for Effort {
    fn default() -> Self {
        Self::HALF_HOUR
    }
}

/// Serialized as hours, e.g. `1.5`.
impl Serialize for Effort {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.hours())
    }
}

impl fmt::Display for Effort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}h", self.hours())
    }
}

/// One task line parsed out of an agent response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEstimate {
    pub description: String,
    pub estimated: Effort,
}
