//! Append-only error log for the hook path.
//!
//! Hook-triggered recording runs detached from git with its output
//! discarded, so hard failures are written here instead of to stderr.

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use std::io::Write;
use std::path::Path;

/// Append one line: `[<RFC3339>] <operation> <subject>: <error chain>`.
pub fn append(log_path: &Path, operation: &str, subject: &str, err: &anyhow::Error) -> Result<()> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Failed to open error log {}", log_path.display()))?;

    // Keep one entry per line even when an error message spans several.
    let chain = format!("{:#}", err).replace('\n', " ");
    writeln!(
        file,
        "[{}] {} {}: {}",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        operation,
        subject,
        chain
    )?;
    Ok(())
}
