//! Repository-style access to the five tables.
//!
//! Each submodule owns one entity and exposes free async functions taking a
//! `&SqlitePool` (or an open transaction where several statements must
//! commit together). Row decoding lives here too: list columns are JSON
//! text and timestamps are integer seconds, and nothing outside `store`
//! sees either representation.

pub mod commits;
pub mod companies;
pub mod projects;
pub mod repos;
pub mod tasks;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::WorklogError;

pub(crate) fn now_ts() -> i64 {
    Utc::now().timestamp()
}

pub(crate) fn datetime_from_ts(ts: i64) -> Result<DateTime<Utc>, WorklogError> {
    DateTime::from_timestamp(ts, 0).ok_or(WorklogError::InvalidTimestamp(ts))
}

pub(crate) fn encode_list<T: Serialize>(items: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string(items)?)
}

pub(crate) fn decode_list<T: DeserializeOwned>(
    raw: &str,
    table: &'static str,
    column: &'static str,
    id: i64,
) -> Result<T, WorklogError> {
    serde_json::from_str(raw).map_err(|source| WorklogError::MalformedList {
        table,
        column,
        id,
        source,
    })
}
