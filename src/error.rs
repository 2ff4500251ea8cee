//! Typed failures that callers need to tell apart.
//!
//! Most functions in the crate return [`anyhow::Result`] and attach context
//! as they propagate. The variants here are the ones a caller matches on:
//! ingestion turns [`WorklogError::GitUnavailable`] into a skip, derivation
//! scopes the agent variants to a single project group.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorklogError {
    /// The `git` binary could not be spawned at all.
    #[error("git is not available: {0}")]
    GitUnavailable(#[source] std::io::Error),

    #[error("git {command} failed in {dir} (exit code: {exit_code}): {stderr}")]
    GitFailed {
        command: String,
        dir: PathBuf,
        exit_code: i32,
        stderr: String,
    },

    #[error("Unknown agent: '{0}'. Must be codex or claude.")]
    UnknownAgent(String),

    #[error("failed to launch agent '{program}': {source}")]
    AgentLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("agent '{program}' exited with status {exit_code}: {stderr}")]
    AgentFailed {
        program: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("agent '{program}' did not finish within {secs}s")]
    AgentTimeout { program: String, secs: u64 },

    /// A serialized list column could not be decoded.
    #[error("malformed {table}.{column} for row {id}: {source}")]
    MalformedList {
        table: &'static str,
        column: &'static str,
        id: i64,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid timestamp {0} in database")]
    InvalidTimestamp(i64),
}
