//! # worklog CLI
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `worklog init` | Create the SQLite database and schema |
//! | `worklog hooks install` | Install global post-commit/post-merge hooks |
//! | `worklog hooks uninstall` | Remove them and restore what was there before |
//! | `worklog import [COUNT\|DATE]` | Record existing history of the current repository |
//! | `worklog process` | Summarize unprocessed commits into tasks |
//! | `worklog company ...` | Manage companies |
//! | `worklog project ...` | Manage projects |
//! | `worklog repo ...` | Assign repositories to projects |
//! | `worklog tasks ...` | List or delete derived tasks |
//! | `worklog stats` | Database overview |
//!
//! Logging goes to stderr and is controlled by `WORKLOG_LOG`
//! (`WORKLOG_LOG=debug worklog process`).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use worklog::{catalog, config, db, derive, error_log, hooks, import, ingest, stats, tasks};

/// Track git activity across repositories and turn it into a work log.
#[derive(Parser)]
#[command(
    name = "worklog",
    about = "Track git activity across repositories and turn it into a work log",
    version,
    long_about = "worklog records commits from every repository under your scan paths through \
    global git hooks, groups them by project and asks a command-line LLM agent (codex or claude) \
    to summarize them as time-estimated tasks."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `~/.worklog/config.toml`, which is created with default
    /// settings on first use.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Record the HEAD commit of the current repository.
    ///
    /// Run by the installed git hooks. Always exits successfully; failures
    /// are appended to the error log.
    #[command(hide = true)]
    Record {
        /// Print what happened.
        #[arg(long)]
        verbose: bool,
    },

    /// Manage the global git hooks.
    Hooks {
        #[command(subcommand)]
        action: HooksAction,
    },

    /// Import existing commits of the current repository.
    ///
    /// ARG is a commit count (most recent N) or a date (YYYY-MM-DD).
    /// Without it the whole history is imported.
    Import {
        arg: Option<String>,

        /// Only read this branch instead of all refs.
        #[arg(short, long)]
        branch: Option<String>,

        /// Rewrite commits already recorded and delete tasks derived from them.
        #[arg(short, long)]
        force: bool,
    },

    /// Summarize unprocessed commits into tasks.
    Process {
        /// Only commits on or after this date (YYYY-MM-DD).
        #[arg(long)]
        since: Option<String>,

        /// Only commits on or before this date (YYYY-MM-DD).
        #[arg(long)]
        until: Option<String>,

        /// Only commits from the last N days, today included.
        #[arg(long, conflicts_with_all = ["since", "until"])]
        last_days: Option<u32>,

        /// Agent to use instead of `agent.default` (codex or claude).
        #[arg(long)]
        agent: Option<String>,
    },

    /// Manage companies.
    Company {
        #[command(subcommand)]
        action: CompanyAction,
    },

    /// Manage projects.
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Manage recorded repositories.
    Repo {
        #[command(subcommand)]
        action: RepoAction,
    },

    /// List or delete derived tasks.
    Tasks {
        #[command(subcommand)]
        action: TasksAction,
    },

    /// Show database statistics.
    Stats,
}

#[derive(Subcommand)]
enum HooksAction {
    Install,
    Uninstall,
}

#[derive(Subcommand)]
enum CompanyAction {
    Add {
        name: String,
    },
    List,
    /// COMPANY is an id or a name.
    Rename {
        company: String,
        name: String,
    },
    /// Projects of a deleted company are kept without a company.
    Rm {
        company: String,
    },
}

#[derive(Subcommand)]
enum ProjectAction {
    Add {
        name: String,
        #[arg(long)]
        company: Option<String>,
    },
    List {
        /// Only projects without a company.
        #[arg(long)]
        orphans: bool,
    },
    Rename {
        project: String,
        name: String,
    },
    /// Attach to a company; omit COMPANY to detach.
    Assign {
        project: String,
        company: Option<String>,
    },
    /// Deletes the project's tasks; its repositories are kept.
    Rm {
        project: String,
    },
}

#[derive(Subcommand)]
enum RepoAction {
    List {
        /// Only repositories without a project.
        #[arg(long)]
        orphans: bool,
    },
    /// REPO is an id or a path (`.` for the current repository). Omit
    /// PROJECT to detach.
    Assign {
        repo: String,
        project: Option<String>,
    },
    /// Deletes the repository and every commit recorded for it.
    Rm {
        repo: String,
    },
}

#[derive(Subcommand)]
enum TasksAction {
    List {
        #[arg(long)]
        since: Option<String>,
        #[arg(long)]
        until: Option<String>,
        /// Project id or name.
        #[arg(long)]
        project: Option<String>,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    Rm {
        id: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("WORKLOG_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // Hooks only touch git config and the hooks directory.
    if let Commands::Hooks { action } = &cli.command {
        match action {
            HooksAction::Install => hooks::run_install(cli.config.as_deref())?,
            HooksAction::Uninstall => hooks::run_uninstall(cli.config.as_deref())?,
        }
        return Ok(());
    }

    // A broken config must not make `git commit` noisy.
    let cfg = match (&cli.command, config::load_config(cli.config.as_deref())) {
        (_, Ok(cfg)) => cfg,
        (Commands::Record { .. }, Err(e)) => {
            tracing::error!(error = %format!("{:#}", e), "record: could not load config");
            let log = config::LogConfig::default().error_log;
            if let Err(log_err) = error_log::append(&log, "record", "config", &e) {
                tracing::error!(error = %log_err, "record: could not write error log");
            }
            return Ok(());
        }
        (_, Err(e)) => return Err(e),
    };

    match cli.command {
        Commands::Init => {
            let pool = db::open(&cfg).await?;
            pool.close().await;
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Record { verbose } => {
            ingest::run_record(&cfg, verbose).await?;
        }
        Commands::Hooks { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
        Commands::Import { arg, branch, force } => {
            import::run_import(&cfg, arg.as_deref(), branch, force).await?;
        }
        Commands::Process {
            since,
            until,
            last_days,
            agent,
        } => {
            derive::run_process(
                &cfg,
                since.as_deref(),
                until.as_deref(),
                last_days,
                agent.as_deref(),
            )
            .await?;
        }
        Commands::Company { action } => match action {
            CompanyAction::Add { name } => catalog::run_company_add(&cfg, &name).await?,
            CompanyAction::List => catalog::run_company_list(&cfg).await?,
            CompanyAction::Rename { company, name } => {
                catalog::run_company_rename(&cfg, &company, &name).await?
            }
            CompanyAction::Rm { company } => catalog::run_company_rm(&cfg, &company).await?,
        },
        Commands::Project { action } => match action {
            ProjectAction::Add { name, company } => {
                catalog::run_project_add(&cfg, &name, company.as_deref()).await?
            }
            ProjectAction::List { orphans } => catalog::run_project_list(&cfg, orphans).await?,
            ProjectAction::Rename { project, name } => {
                catalog::run_project_rename(&cfg, &project, &name).await?
            }
            ProjectAction::Assign { project, company } => {
                catalog::run_project_assign(&cfg, &project, company.as_deref()).await?
            }
            ProjectAction::Rm { project } => catalog::run_project_rm(&cfg, &project).await?,
        },
        Commands::Repo { action } => match action {
            RepoAction::List { orphans } => catalog::run_repo_list(&cfg, orphans).await?,
            RepoAction::Assign { repo, project } => {
                catalog::run_repo_assign(&cfg, &repo, project.as_deref()).await?
            }
            RepoAction::Rm { repo } => catalog::run_repo_rm(&cfg, &repo).await?,
        },
        Commands::Tasks { action } => match action {
            TasksAction::List {
                since,
                until,
                project,
                json,
            } => {
                tasks::run_tasks_list(
                    &cfg,
                    since.as_deref(),
                    until.as_deref(),
                    project.as_deref(),
                    json,
                )
                .await?
            }
            TasksAction::Rm { id } => tasks::run_tasks_rm(&cfg, id).await?,
        },
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
