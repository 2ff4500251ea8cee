//! External summarization agents.
//!
//! An agent is a command-line LLM client run once per derivation group: the
//! prompt goes in on stdin and the full stdout is parsed with
//! [`crate::response::parse_task_lines`]. The [`Summarizer`] trait is the
//! seam the derivation pipeline depends on, so tests can swap in a fake.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::AgentConfig;
use crate::error::WorklogError;
use crate::models::{RawCommit, TaskEstimate};
use crate::response::parse_task_lines;

/// Longest file list shown per commit in the prompt.
const MAX_FILES_CHARS: usize = 100;

/// Turns one project's commits into task estimates.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Short identifier used in logs and reports.
    fn name(&self) -> &str;

    async fn summarize(&self, project: &str, commits: &[RawCommit]) -> Result<Vec<TaskEstimate>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    Codex,
    Claude,
}

impl AgentKind {
    fn default_program(self) -> &'static str {
        match self {
            AgentKind::Codex => "codex",
            AgentKind::Claude => "claude",
        }
    }

    /// Arguments that make the client read its prompt from stdin and exit.
    fn args(self) -> &'static [&'static str] {
        match self {
            AgentKind::Codex => &["exec", "-"],
            AgentKind::Claude => &["-p"],
        }
    }
}

impl FromStr for AgentKind {
    type Err = WorklogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "codex" => Ok(AgentKind::Codex),
            "claude" => Ok(AgentKind::Claude),
            _ => Err(WorklogError::UnknownAgent(s.to_string())),
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_program())
    }
}

/// Runs an agent CLI as a child process.
#[derive(Debug, Clone)]
pub struct CommandAgent {
    kind: AgentKind,
    program: PathBuf,
    timeout: Option<Duration>,
}

impl CommandAgent {
    pub fn new(kind: AgentKind) -> Self {
        Self {
            kind,
            program: PathBuf::from(kind.default_program()),
            timeout: None,
        }
    }

    /// Build the agent named `name` (or `agent.default` when `None`),
    /// applying the configured command override and timeout.
    pub fn from_config(config: &AgentConfig, name: Option<&str>) -> Result<Self, WorklogError> {
        let kind: AgentKind = name.unwrap_or(config.default.as_str()).parse()?;
        let mut agent = Self::new(kind);
        if let Some(command) = &config.command {
            agent.program = command.clone();
        }
        agent.timeout = config.timeout_secs.map(Duration::from_secs);
        Ok(agent)
    }

    pub fn kind(&self) -> AgentKind {
        self.kind
    }

    async fn run(&self, prompt: String) -> Result<String> {
        let program = self.program.display().to_string();

        let mut child = Command::new(&self.program)
            .args(self.kind.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| WorklogError::AgentLaunch {
                program: program.clone(),
                source,
            })?;

        // Feed stdin concurrently so a chatty agent can't fill its stdout
        // pipe while we are still writing.
        if let Some(mut stdin) = child.stdin.take() {
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                    tracing::debug!(error = %e, "agent closed stdin early");
                }
            });
        }

        let wait = child.wait_with_output();
        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(output) => output?,
                Err(_) => {
                    return Err(WorklogError::AgentTimeout {
                        program,
                        secs: limit.as_secs(),
                    }
                    .into())
                }
            },
            None => wait.await?,
        };

        if !output.status.success() {
            return Err(WorklogError::AgentFailed {
                program,
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Summarizer for CommandAgent {
    fn name(&self) -> &str {
        self.kind.default_program()
    }

    async fn summarize(&self, project: &str, commits: &[RawCommit]) -> Result<Vec<TaskEstimate>> {
        let prompt = build_prompt(project, commits);
        tracing::debug!(agent = %self.kind, project, commits = commits.len(), "invoking agent");
        let response = self.run(prompt).await?;
        Ok(parse_task_lines(&response))
    }
}

/// The prompt for one derivation group. Deterministic for a given input.
pub fn build_prompt(project: &str, commits: &[RawCommit]) -> String {
    let mut prompt = String::new();

    prompt.push_str(
        "You are analyzing git commits to create human-readable task summaries for manager reports.\n\n",
    );
    prompt.push_str(&format!("Project: {}\n\n", project));
    prompt.push_str("Commits:\n");

    for commit in commits {
        prompt.push_str(&format!(
            "- {}: {} (branch: {}, files: {})\n",
            commit.short_hash(),
            commit.message,
            commit.branch,
            file_summary(&commit.files_changed)
        ));
    }

    prompt.push_str(
        "\nSummarize the work as a list of tasks.\n\
         - Merge commits that belong to the same piece of work into one task\n\
         - Write for a manager: plain language, no jargon\n\
         - Describe what was achieved rather than how\n\
         - One line per task, starting with a past-tense verb (Added, Fixed, Implemented, Updated)\n\
         \nEstimate the time each task took from the number of commits, the files touched \
         and how involved the messages suggest the change was.\n\
         Use half-hour steps with a minimum of 0.5h (0.5, 1.0, 1.5, 2.0, ...).\n\
         \nFormat every line as: - [X.Xh] Task description\n\
         For example:\n\
         - [2.0h] Implemented user authentication system\n\
         - [0.5h] Fixed login button styling\n\
         - [1.5h] Refactored database connection handling\n\
         \nReply with the task lines only:\n",
    );

    prompt
}

/// Comma-joined file list, cut to [`MAX_FILES_CHARS`] with a `...` tail.
fn file_summary(files: &[String]) -> String {
    let joined = files.join(", ");
    if joined.chars().count() <= MAX_FILES_CHARS {
        return joined;
    }
    let mut cut: String = joined.chars().take(MAX_FILES_CHARS - 3).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn commit(hash: &str, message: &str, files: Vec<String>) -> RawCommit {
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        RawCommit {
            id: 1,
            repo_id: 1,
            hash: hash.to_string(),
            message: message.to_string(),
            author: "Dev <dev@example.com>".to_string(),
            branch: "main".to_string(),
            files_changed: files,
            committed_at: at,
            processed: false,
            created_at: at,
            repo_path: "/src/app".to_string(),
        }
    }

    #[test]
    fn unknown_agent_fails_at_construction() {
        let err = CommandAgent::from_config(&AgentConfig::default(), Some("gpt")).unwrap_err();
        assert!(matches!(err, WorklogError::UnknownAgent(name) if name == "gpt"));
        assert_eq!("Claude".parse::<AgentKind>().unwrap(), AgentKind::Claude);
    }

    #[test]
    fn config_default_selects_agent() {
        let config = AgentConfig {
            default: "claude".to_string(),
            command: None,
            timeout_secs: Some(30),
        };
        let agent = CommandAgent::from_config(&config, None).unwrap();
        assert_eq!(agent.kind(), AgentKind::Claude);
        assert_eq!(agent.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn prompt_lists_commits_in_order() {
        let commits = vec![
            commit("0123456789abcdef", "Add login form", vec!["src/login.rs".into()]),
            commit("fedcba9876543210", "Fix redirect", vec![]),
        ];
        let prompt = build_prompt("Website", &commits);
        assert!(prompt.contains("Project: Website\n"));
        let first = prompt
            .find("- 01234567: Add login form (branch: main, files: src/login.rs)")
            .unwrap();
        let second = prompt.find("- fedcba98: Fix redirect (branch: main, files: )").unwrap();
        assert!(first < second);
        assert!(prompt.contains("[X.Xh]"));
        assert_eq!(prompt, build_prompt("Website", &commits));
    }

    #[test]
    fn long_file_lists_are_truncated() {
        let files: Vec<String> = (0..40).map(|i| format!("src/module_{}.rs", i)).collect();
        let summary = file_summary(&files);
        assert_eq!(summary.chars().count(), MAX_FILES_CHARS);
        assert!(summary.ends_with("..."));

        let short = vec!["a.rs".to_string(), "b.rs".to_string()];
        assert_eq!(file_summary(&short), "a.rs, b.rs");
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::path::Path;

        fn script(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("agent.sh");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn agent(program: PathBuf, timeout_secs: Option<u64>) -> CommandAgent {
            let config = AgentConfig {
                default: "codex".to_string(),
                command: Some(program),
                timeout_secs,
            };
            CommandAgent::from_config(&config, None).unwrap()
        }

        #[tokio::test]
        async fn reads_stdin_and_parses_stdout() {
            let tmp = tempfile::TempDir::new().unwrap();
            // echo the project line back so we know stdin arrived
            let program = script(
                tmp.path(),
                "test \"$1\" = exec || exit 9\n\
                 project=$(grep '^Project:' | cut -d' ' -f2)\n\
                 echo \"- [1.0h] Shipped $project\"",
            );
            let tasks = agent(program, None)
                .summarize("Website", &[commit("0123456789", "x", vec![])])
                .await
                .unwrap();
            assert_eq!(tasks.len(), 1);
            assert_eq!(tasks[0].description, "Shipped Website");
            assert_eq!(tasks[0].estimated.halves(), 2);
        }

        #[tokio::test]
        async fn non_zero_exit_is_an_error() {
            let tmp = tempfile::TempDir::new().unwrap();
            let program = script(tmp.path(), "cat >/dev/null\necho boom >&2\nexit 3");
            let err = agent(program, None).summarize("P", &[]).await.unwrap_err();
            match err.downcast_ref::<WorklogError>() {
                Some(WorklogError::AgentFailed {
                    exit_code, stderr, ..
                }) => {
                    assert_eq!(*exit_code, 3);
                    assert_eq!(stderr, "boom");
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }

        #[tokio::test]
        async fn slow_agent_times_out() {
            let tmp = tempfile::TempDir::new().unwrap();
            let program = script(tmp.path(), "sleep 10");
            let err = agent(program, Some(1)).summarize("P", &[]).await.unwrap_err();
            assert!(matches!(
                err.downcast_ref::<WorklogError>(),
                Some(WorklogError::AgentTimeout { secs: 1, .. })
            ));
        }

        #[tokio::test]
        async fn missing_program_is_a_launch_error() {
            let tmp = tempfile::TempDir::new().unwrap();
            let err = agent(tmp.path().join("nope"), None)
                .summarize("P", &[])
                .await
                .unwrap_err();
            assert!(matches!(
                err.downcast_ref::<WorklogError>(),
                Some(WorklogError::AgentLaunch { .. })
            ));
        }
    }
}
