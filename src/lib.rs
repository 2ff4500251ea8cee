//! # worklog
//!
//! A local-first git activity tracker that turns commits into
//! time-estimated work-log tasks.
//!
//! Global git hooks record every commit made under a configured scan path.
//! Older history can be imported on demand. Recorded commits are grouped
//! by project and handed to a command-line LLM agent, which answers with
//! manager-readable task lines that are stored alongside their source
//! commits.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────┐   ┌─────────────┐
//! │ git hooks /  │──▶│ ingest /     │──▶│  SQLite  │──▶│   derive    │
//! │ worklog      │   │ import       │   │  (WAL)   │◀──│ agent + CLI │
//! │ import       │   └──────────────┘   └──────────┘   └─────────────┘
//! └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! worklog init                       # create database
//! worklog hooks install              # record commits from now on
//! worklog import 50                  # pull in recent history
//! worklog project add Website --company Acme
//! worklog repo assign . Website
//! worklog process --last-days 7      # summarize into tasks
//! worklog tasks list --since 2025-03-01
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`git`] | Reading commit metadata from git |
//! | [`scan_path`] | Tracked-root predicate |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`store`] | Table access |
//! | [`ingest`] | Hook-triggered recording |
//! | [`import`] | Historical import with forced reimport |
//! | [`agent`] | Summarization agents |
//! | [`response`] | Agent response parsing |
//! | [`derive`] | Task derivation pipeline |
//! | [`hooks`] | Global hook installation |
//! | [`catalog`] | Company, project and repository commands |
//! | [`tasks`] | Task listing |
//! | [`stats`] | Database overview |

pub mod agent;
pub mod catalog;
pub mod config;
pub mod db;
pub mod derive;
pub mod error;
pub mod error_log;
pub mod git;
pub mod hooks;
pub mod import;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod response;
pub mod scan_path;
pub mod stats;
pub mod store;
pub mod tasks;
