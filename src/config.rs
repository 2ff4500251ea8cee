//! TOML configuration.
//!
//! Every section is optional. When the default config file
//! (`~/.worklog/config.toml`) does not exist it is written out with
//! defaults, so a fresh install works from a git hook without any setup.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: worklog_dir().join("db").join("worklog.sqlite"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TrackingConfig {
    /// Roots under which hook-triggered commits are recorded.
    #[serde(default = "default_scan_paths")]
    pub scan_paths: Vec<PathBuf>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            scan_paths: default_scan_paths(),
        }
    }
}

fn default_scan_paths() -> Vec<PathBuf> {
    vec![home_dir().join("Projects")]
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AgentConfig {
    /// Agent identifier: `codex` or `claude`.
    #[serde(default = "default_agent")]
    pub default: String,
    /// Overrides the executable that is launched for the selected agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<PathBuf>,
    /// Upper bound for a single agent invocation. No limit when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            default: default_agent(),
            command: None,
            timeout_secs: None,
        }
    }
}

fn default_agent() -> String {
    "codex".to_string()
}

/// Read by the report renderer, which lives outside this crate.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReportsConfig {
    pub output: PathBuf,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            output: home_dir().join("Documents").join("reports"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LogConfig {
    pub error_log: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            error_log: worklog_dir().join("error.log"),
        }
    }
}

/// `~/.worklog`
pub fn worklog_dir() -> PathBuf {
    home_dir().join(".worklog")
}

pub fn default_config_path() -> PathBuf {
    worklog_dir().join("config.toml")
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Expand `~` at the start of a path to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if s == "~" {
        return home_dir();
    }
    if let Some(rest) = s.strip_prefix("~/") {
        return home_dir().join(rest);
    }
    path.to_path_buf()
}

/// Load the config at `path`, or the default location when `path` is `None`.
///
/// A missing file at the default location is created with defaults; a
/// missing explicit path is an error.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => read_config(path)?,
        None => {
            let path = default_config_path();
            if path.exists() {
                read_config(&path)?
            } else {
                let config = Config::default();
                save_config(&config, &path)?;
                config
            }
        }
    };

    normalize(config)
}

fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    Ok(())
}

fn normalize(mut config: Config) -> Result<Config> {
    if config.db.path.as_os_str().is_empty() {
        bail!("db.path must not be empty");
    }
    if config.agent.timeout_secs == Some(0) {
        bail!("agent.timeout_secs must be > 0");
    }

    config.db.path = expand_tilde(&config.db.path);
    config.reports.output = expand_tilde(&config.reports.output);
    config.log.error_log = expand_tilde(&config.log.error_log);
    config.agent.command = config.agent.command.as_deref().map(expand_tilde);

    // Roots are compared against canonical repository paths, so resolve
    // symlinks where the root exists. Missing roots keep their lexical form.
    config.tracking.scan_paths = config
        .tracking
        .scan_paths
        .iter()
        .map(|p| {
            let expanded = expand_tilde(p);
            std::fs::canonicalize(&expanded).unwrap_or(expanded)
        })
        .collect();

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn partial_config_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[db]
path = "/tmp/worklog-test.sqlite"

[agent]
default = "claude"
"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.db.path, PathBuf::from("/tmp/worklog-test.sqlite"));
        assert_eq!(config.agent.default, "claude");
        assert!(config.agent.timeout_secs.is_none());
        assert_eq!(config.tracking.scan_paths.len(), 1);
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = load_config(Some(&tmp.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[agent]\ntimeout_secs = 0\n").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }

    #[test]
    fn scan_paths_are_canonicalized_when_present() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("projects");
        std::fs::create_dir_all(&root).unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            format!(
                "[tracking]\nscan_paths = [\"{}\", \"/does/not/exist\"]\n",
                root.join(".").display()
            ),
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(
            config.tracking.scan_paths[0],
            std::fs::canonicalize(&root).unwrap()
        );
        assert_eq!(
            config.tracking.scan_paths[1],
            PathBuf::from("/does/not/exist")
        );
    }

    #[test]
    fn saved_defaults_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.toml");
        save_config(&Config::default(), &path).unwrap();
        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.agent.default, "codex");
    }
}
