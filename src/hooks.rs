//! Global git hook installation.
//!
//! Recording is wired into every repository at once through the global
//! `core.hooksPath`. Installing must not break automation that was already
//! there, so existing hooks are kept as `<name>.legacy` and the managed
//! script runs them first. Uninstall puts everything back the way it was.
//!
//! Layout of the managed directory after install:
//!
//! ```text
//! post-commit                  managed script (carries HOOK_MARKER)
//! post-commit.legacy           previous post-commit, if any
//! post-merge                   managed script
//! worklog.previous-hooks-path  core.hooksPath as it was before the first install
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};

use crate::config::{self, expand_tilde};
use crate::git;

/// Identifies scripts written by this module.
pub const HOOK_MARKER: &str = "# worklog-managed-hook";

/// Triggers that record a commit.
pub const MANAGED_HOOKS: [&str; 2] = ["post-commit", "post-merge"];

const PREVIOUS_PATH_FILE: &str = "worklog.previous-hooks-path";
const LEGACY_SUFFIX: &str = ".legacy";

/// Access to the global `core.hooksPath` setting.
pub trait HooksPathSetting {
    fn get(&self) -> Result<Option<PathBuf>>;
    fn set(&self, path: &Path) -> Result<()>;
    fn unset(&self) -> Result<()>;
}

/// `git config --global core.hooksPath`.
///
/// `global_file` points git at a different global config through
/// `GIT_CONFIG_GLOBAL`.
#[derive(Debug, Clone, Default)]
pub struct GitGlobalConfig {
    pub global_file: Option<PathBuf>,
}

impl GitGlobalConfig {
    /// Run `git config --global <args>`. An exit code equal to `tolerated`
    /// yields `None` instead of an error.
    fn run(&self, args: &[&str], tolerated: Option<i32>) -> Result<Option<String>> {
        let mut full = vec!["config", "--global"];
        full.extend_from_slice(args);

        let mut cmd = Command::new("git");
        cmd.args(&full);
        if let Some(file) = &self.global_file {
            cmd.env("GIT_CONFIG_GLOBAL", file);
        }
        let output = git::git_output(&mut cmd)?;
        if tolerated.is_some() && output.status.code() == tolerated {
            return Ok(None);
        }
        git::check_output(Path::new("."), &full, output).map(Some)
    }
}

impl HooksPathSetting for GitGlobalConfig {
    fn get(&self) -> Result<Option<PathBuf>> {
        // exit code 1: key not set
        let value = self.run(&["core.hooksPath"], Some(1))?;
        Ok(value.filter(|v| !v.is_empty()).map(PathBuf::from))
    }

    fn set(&self, path: &Path) -> Result<()> {
        let value = path.to_string_lossy();
        self.run(&["core.hooksPath", value.as_ref()], None)
            .context("Failed to set core.hooksPath")?;
        Ok(())
    }

    fn unset(&self) -> Result<()> {
        // exit code 5: nothing to unset
        self.run(&["--unset", "core.hooksPath"], Some(5))
            .context("Failed to unset core.hooksPath")?;
        Ok(())
    }
}

/// What `core.hooksPath` held before the first install, as kept in
/// [`PREVIOUS_PATH_FILE`].
#[derive(Debug, Clone, PartialEq, Eq)]
enum PriorHooksPath {
    Unset,
    /// Already pointed at the managed directory.
    Managed,
    Other(PathBuf),
}

impl PriorHooksPath {
    fn encode(&self) -> String {
        match self {
            PriorHooksPath::Unset => "unset\n".to_string(),
            PriorHooksPath::Managed => "managed\n".to_string(),
            PriorHooksPath::Other(path) => format!("path {}\n", path.display()),
        }
    }

    /// A bare path line is read as [`PriorHooksPath::Other`].
    fn decode(content: &str) -> Option<Self> {
        let line = content.trim_end_matches(['\n', '\r']);
        match line {
            "" => None,
            "unset" => Some(PriorHooksPath::Unset),
            "managed" => Some(PriorHooksPath::Managed),
            _ => Some(PriorHooksPath::Other(PathBuf::from(
                line.strip_prefix("path ").unwrap_or(line),
            ))),
        }
    }
}

/// `~/.config/git/hooks`
pub fn default_hooks_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("git")
        .join("hooks")
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub hooks_dir: PathBuf,
    /// Hooks path that was active before and whose files were copied in.
    pub migrated_from: Option<PathBuf>,
    pub migrated: Vec<String>,
    /// Triggers whose previous occupant was moved to `<name>.legacy`.
    pub backed_up: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum HooksPathChange {
    /// Pointed back at the path recorded during install.
    Restored(PathBuf),
    Unset,
    /// Left alone: it already pointed at the managed directory before
    /// install.
    Kept,
}

#[derive(Debug, PartialEq, Eq)]
pub struct UninstallReport {
    pub removed: Vec<String>,
    pub restored: Vec<String>,
    pub hooks_path: HooksPathChange,
}

/// Writes and removes the managed hook scripts.
#[derive(Debug, Clone)]
pub struct HookInstaller {
    pub hooks_dir: PathBuf,
    /// Absolute path of the `worklog` binary the scripts launch.
    pub exe: PathBuf,
    /// Config file the scripts pass via `--config`.
    pub config_path: PathBuf,
}

impl HookInstaller {
    pub fn new(hooks_dir: PathBuf, exe: PathBuf, config_path: PathBuf) -> Self {
        Self {
            hooks_dir,
            exe,
            config_path,
        }
    }

    /// The script written for every managed trigger.
    pub fn script(&self) -> String {
        format!(
            "#!/bin/sh\n\
             {marker}\n\
             # Records commits for worklog. Remove with `worklog hooks uninstall`.\n\
             status=0\n\
             if [ -x \"$0{legacy}\" ]; then\n\
             \x20   \"$0{legacy}\" \"$@\"\n\
             \x20   status=$?\n\
             fi\n\
             {exe} --config {config} record >/dev/null 2>&1 &\n\
             exit $status\n",
            marker = HOOK_MARKER,
            legacy = LEGACY_SUFFIX,
            exe = shell_quote(&self.exe.to_string_lossy()),
            config = shell_quote(&self.config_path.to_string_lossy()),
        )
    }

    pub fn install(&self, setting: &dyn HooksPathSetting) -> Result<InstallReport> {
        fs::create_dir_all(&self.hooks_dir)
            .with_context(|| format!("Failed to create {}", self.hooks_dir.display()))?;
        let managed_dir = canonical(&self.hooks_dir);

        let mut report = InstallReport {
            hooks_dir: managed_dir.clone(),
            ..InstallReport::default()
        };

        let current = setting.get()?;
        let previous = current
            .clone()
            .filter(|p| canonical(&expand_tilde(p)) != managed_dir);

        // Check every destination before touching anything.
        let migrations = match &previous {
            Some(prev) => self.plan_migration(&expand_tilde(prev))?,
            None => Vec::new(),
        };
        for name in MANAGED_HOOKS {
            let hook = self.hooks_dir.join(name);
            if !hook.is_file() || is_managed(&hook)? {
                continue;
            }
            // What will sit at `<name>.legacy` once migration has run.
            let legacy = match migrations.iter().find(|(n, _)| n == name) {
                Some((_, from)) => from.clone(),
                None => legacy_path(&hook),
            };
            if legacy.exists() && !same_content(&hook, &legacy)? {
                bail!(
                    "{} already exists and differs from {}; refusing to overwrite it",
                    legacy_path(&hook).display(),
                    hook.display()
                );
            }
        }

        if let Some(prev) = &previous {
            for (name, from) in &migrations {
                let to = self.hooks_dir.join(format!("{}{}", name, LEGACY_SUFFIX));
                fs::copy(from, &to)
                    .with_context(|| format!("Failed to copy {} to {}", from.display(), to.display()))?;
                make_executable(&to)?;
                report.migrated.push(name.clone());
            }
            report.migrated_from = Some(prev.clone());
        }

        // A reinstall over our own directory keeps the state from the first
        // install.
        let record = self.hooks_dir.join(PREVIOUS_PATH_FILE);
        let prior = match (&current, &previous) {
            (None, _) => Some(PriorHooksPath::Unset),
            (Some(_), Some(prev)) => Some(PriorHooksPath::Other(prev.clone())),
            (Some(_), None) if record.is_file() => None,
            (Some(_), None) => Some(PriorHooksPath::Managed),
        };
        if let Some(prior) = prior {
            fs::write(&record, prior.encode())
                .with_context(|| format!("Failed to write {}", record.display()))?;
        }

        let script = self.script();
        for name in MANAGED_HOOKS {
            let hook = self.hooks_dir.join(name);
            if hook.is_file() && !is_managed(&hook)? {
                let legacy = legacy_path(&hook);
                if legacy.exists() {
                    // identical copy already kept
                    fs::remove_file(&hook)?;
                } else {
                    fs::rename(&hook, &legacy).with_context(|| {
                        format!("Failed to back up {} hook", name)
                    })?;
                }
                report.backed_up.push(name.to_string());
            }
            fs::write(&hook, &script)
                .with_context(|| format!("Failed to write {} hook", name))?;
            make_executable(&hook)?;
        }

        setting
            .set(&managed_dir)
            .context("Failed to set core.hooksPath")?;

        tracing::info!(dir = %managed_dir.display(), "hooks installed");
        Ok(report)
    }

    /// Regular files in `prev` and the names they will take, refusing to
    /// clobber a different `.legacy` file.
    fn plan_migration(&self, prev: &Path) -> Result<Vec<(String, PathBuf)>> {
        let entries = match fs::read_dir(prev) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read hooks in {}", prev.display()))
            }
        };

        let mut plan = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let to = self.hooks_dir.join(format!("{}{}", name, LEGACY_SUFFIX));
            if to.exists() && !same_content(&path, &to)? {
                bail!(
                    "{} already exists and differs from {}; refusing to overwrite it",
                    to.display(),
                    path.display()
                );
            }
            plan.push((name, path));
        }
        plan.sort();
        Ok(plan)
    }

    pub fn uninstall(&self, setting: &dyn HooksPathSetting) -> Result<UninstallReport> {
        let mut removed = Vec::new();
        let mut restored = Vec::new();

        let record = self.hooks_dir.join(PREVIOUS_PATH_FILE);
        let prior = match fs::read_to_string(&record) {
            Ok(content) => PriorHooksPath::decode(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e).with_context(|| format!("Failed to read {}", record.display())),
        };

        // Drop copies made from the previous hooks path while they still
        // match their originals.
        if let Some(PriorHooksPath::Other(prev)) = &prior {
            let prev = expand_tilde(prev);
            if let Ok(entries) = fs::read_dir(&prev) {
                for entry in entries {
                    let original = entry?.path();
                    if !original.is_file() {
                        continue;
                    }
                    let Some(name) = original.file_name() else {
                        continue;
                    };
                    let copy = self
                        .hooks_dir
                        .join(format!("{}{}", name.to_string_lossy(), LEGACY_SUFFIX));
                    if copy.is_file() && same_content(&original, &copy)? {
                        fs::remove_file(&copy)?;
                    }
                }
            }
        }

        for name in MANAGED_HOOKS {
            let hook = self.hooks_dir.join(name);
            if !hook.is_file() || !is_managed(&hook)? {
                continue;
            }
            fs::remove_file(&hook).with_context(|| format!("Failed to remove {} hook", name))?;
            removed.push(name.to_string());

            let legacy = legacy_path(&hook);
            if legacy.is_file() {
                fs::rename(&legacy, &hook)
                    .with_context(|| format!("Failed to restore original {} hook", name))?;
                restored.push(name.to_string());
            }
        }

        if record.exists() {
            fs::remove_file(&record)
                .with_context(|| format!("Failed to remove {}", record.display()))?;
        }

        let hooks_path = match prior {
            Some(PriorHooksPath::Other(prev)) => {
                setting.set(&prev).context("Failed to restore core.hooksPath")?;
                remove_if_empty(&self.hooks_dir)?;
                HooksPathChange::Restored(prev)
            }
            Some(PriorHooksPath::Unset) => {
                setting.unset()?;
                remove_if_empty(&self.hooks_dir)?;
                HooksPathChange::Unset
            }
            Some(PriorHooksPath::Managed) => HooksPathChange::Kept,
            // installed before the prior state was recorded
            None if remove_if_empty(&self.hooks_dir)? => {
                setting.unset()?;
                HooksPathChange::Unset
            }
            None => HooksPathChange::Kept,
        };

        tracing::info!(dir = %self.hooks_dir.display(), "hooks uninstalled");
        Ok(UninstallReport {
            removed,
            restored,
            hooks_path,
        })
    }
}

fn legacy_path(hook: &Path) -> PathBuf {
    let mut name = hook.as_os_str().to_owned();
    name.push(LEGACY_SUFFIX);
    PathBuf::from(name)
}

fn is_managed(path: &Path) -> Result<bool> {
    let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&content).contains(HOOK_MARKER))
}

fn same_content(a: &Path, b: &Path) -> Result<bool> {
    let a = fs::read(a).with_context(|| format!("Failed to read {}", a.display()))?;
    let b = fs::read(b).with_context(|| format!("Failed to read {}", b.display()))?;
    Ok(a == b)
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Remove `dir` when it exists and is empty. Returns whether it is gone.
fn remove_if_empty(dir: &Path) -> Result<bool> {
    let mut entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", dir.display())),
    };
    if entries.next().is_some() {
        return Ok(false);
    }
    fs::remove_dir(dir).with_context(|| format!("Failed to remove {}", dir.display()))?;
    Ok(true)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("Failed to chmod {}", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

fn installer(config_path: Option<&Path>) -> Result<HookInstaller> {
    let exe = std::env::current_exe().context("Failed to locate the worklog executable")?;
    let config_path = match config_path {
        Some(p) => canonical(p),
        None => config::default_config_path(),
    };
    Ok(HookInstaller::new(default_hooks_dir(), canonical(&exe), config_path))
}

/// `worklog hooks install`.
pub fn run_install(config_path: Option<&Path>) -> Result<()> {
    let installer = installer(config_path)?;
    let report = installer.install(&GitGlobalConfig::default())?;

    if let Some(prev) = &report.migrated_from {
        println!("Note: found existing hooks at {}", prev.display());
        for name in &report.migrated {
            println!("  migrated {} -> {}{}", name, name, LEGACY_SUFFIX);
        }
    }
    for name in &report.backed_up {
        println!("Backed up existing {} hook to {}{}", name, name, LEGACY_SUFFIX);
    }
    println!("hooks installed in {}", report.hooks_dir.display());
    println!("  core.hooksPath = {}", report.hooks_dir.display());
    println!("ok");
    Ok(())
}

/// `worklog hooks uninstall`.
pub fn run_uninstall(config_path: Option<&Path>) -> Result<()> {
    let installer = installer(config_path)?;
    let report = installer.uninstall(&GitGlobalConfig::default())?;

    for name in &report.removed {
        println!("removed {} hook", name);
    }
    for name in &report.restored {
        println!("Restored original {} hook", name);
    }
    match &report.hooks_path {
        HooksPathChange::Restored(prev) => println!("  core.hooksPath = {}", prev.display()),
        HooksPathChange::Unset => println!("  core.hooksPath unset"),
        HooksPathChange::Kept => println!(
            "  core.hooksPath left at {} (it pointed there before install)",
            installer.hooks_dir.display()
        ),
    }
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeSetting(RefCell<Option<PathBuf>>);

    impl HooksPathSetting for FakeSetting {
        fn get(&self) -> Result<Option<PathBuf>> {
            Ok(self.0.borrow().clone())
        }
        fn set(&self, path: &Path) -> Result<()> {
            *self.0.borrow_mut() = Some(path.to_path_buf());
            Ok(())
        }
        fn unset(&self) -> Result<()> {
            *self.0.borrow_mut() = None;
            Ok(())
        }
    }

    fn installer(tmp: &TempDir) -> HookInstaller {
        HookInstaller::new(
            tmp.path().join("hooks"),
            PathBuf::from("/opt/worklog/bin/worklog"),
            PathBuf::from("/home/me/.worklog/config.toml"),
        )
    }

    #[test]
    fn fresh_install_and_uninstall() {
        let tmp = TempDir::new().unwrap();
        let inst = installer(&tmp);
        let setting = FakeSetting::default();

        let report = inst.install(&setting).unwrap();
        assert!(report.backed_up.is_empty());
        for name in MANAGED_HOOKS {
            let content = fs::read_to_string(inst.hooks_dir.join(name)).unwrap();
            assert!(content.contains(HOOK_MARKER));
            assert!(content.contains("'/opt/worklog/bin/worklog' --config '/home/me/.worklog/config.toml' record"));
        }
        assert_eq!(setting.get().unwrap(), Some(canonical(&inst.hooks_dir)));

        let report = inst.uninstall(&setting).unwrap();
        assert_eq!(report.removed.len(), 2);
        assert_eq!(report.hooks_path, HooksPathChange::Unset);
        assert!(!inst.hooks_dir.exists());
        assert_eq!(setting.get().unwrap(), None);
    }

    #[test]
    fn foreign_hook_survives_round_trip() {
        let tmp = TempDir::new().unwrap();
        let inst = installer(&tmp);
        let setting = FakeSetting::default();
        fs::create_dir_all(&inst.hooks_dir).unwrap();
        let foreign = b"#!/bin/sh\necho lint\n";
        fs::write(inst.hooks_dir.join("post-commit"), foreign).unwrap();

        let report = inst.install(&setting).unwrap();
        assert_eq!(report.backed_up, vec!["post-commit"]);
        assert_eq!(
            fs::read(inst.hooks_dir.join("post-commit.legacy")).unwrap(),
            foreign
        );

        // reinstall never backs up the managed script
        let report = inst.install(&setting).unwrap();
        assert!(report.backed_up.is_empty());
        assert_eq!(
            fs::read(inst.hooks_dir.join("post-commit.legacy")).unwrap(),
            foreign
        );

        let report = inst.uninstall(&setting).unwrap();
        assert_eq!(report.restored, vec!["post-commit"]);
        assert_eq!(fs::read(inst.hooks_dir.join("post-commit")).unwrap(), foreign);
        assert!(!inst.hooks_dir.join("post-merge").exists());
        assert!(!inst.hooks_dir.join(PREVIOUS_PATH_FILE).exists());
        assert_eq!(report.hooks_path, HooksPathChange::Unset);
        assert_eq!(setting.get().unwrap(), None);
    }

    #[test]
    fn hooks_path_already_managed_is_left_in_place() {
        let tmp = TempDir::new().unwrap();
        let inst = installer(&tmp);
        fs::create_dir_all(&inst.hooks_dir).unwrap();
        let managed = canonical(&inst.hooks_dir);
        let setting = FakeSetting(RefCell::new(Some(managed.clone())));

        let report = inst.install(&setting).unwrap();
        assert_eq!(report.migrated_from, None);
        assert_eq!(
            fs::read_to_string(inst.hooks_dir.join(PREVIOUS_PATH_FILE)).unwrap(),
            "managed\n"
        );

        let report = inst.uninstall(&setting).unwrap();
        assert_eq!(report.hooks_path, HooksPathChange::Kept);
        assert_eq!(setting.get().unwrap(), Some(managed));
        assert!(!inst.hooks_dir.join(PREVIOUS_PATH_FILE).exists());
    }

    #[test]
    fn prior_hooks_path_decodes_bare_paths() {
        assert_eq!(PriorHooksPath::decode(""), None);
        assert_eq!(PriorHooksPath::decode("unset\n"), Some(PriorHooksPath::Unset));
        assert_eq!(PriorHooksPath::decode("managed\n"), Some(PriorHooksPath::Managed));
        assert_eq!(
            PriorHooksPath::decode("path /srv/hooks dir\n"),
            Some(PriorHooksPath::Other(PathBuf::from("/srv/hooks dir")))
        );
        assert_eq!(
            PriorHooksPath::decode("/srv/hooks\n"),
            Some(PriorHooksPath::Other(PathBuf::from("/srv/hooks")))
        );
    }

    #[test]
    fn conflicting_legacy_aborts_install() {
        let tmp = TempDir::new().unwrap();
        let inst = installer(&tmp);
        let setting = FakeSetting::default();
        fs::create_dir_all(&inst.hooks_dir).unwrap();
        fs::write(inst.hooks_dir.join("post-commit"), "#!/bin/sh\necho new\n").unwrap();
        fs::write(inst.hooks_dir.join("post-commit.legacy"), "#!/bin/sh\necho old\n").unwrap();

        assert!(inst.install(&setting).is_err());
        assert_eq!(
            fs::read_to_string(inst.hooks_dir.join("post-commit")).unwrap(),
            "#!/bin/sh\necho new\n"
        );
        assert_eq!(setting.get().unwrap(), None);
    }

    #[test]
    fn previous_hooks_path_is_migrated_and_restored() {
        let tmp = TempDir::new().unwrap();
        let inst = installer(&tmp);
        let prev = tmp.path().join("husky");
        fs::create_dir_all(&prev).unwrap();
        fs::write(prev.join("post-commit"), "#!/bin/sh\necho husky\n").unwrap();
        fs::write(prev.join("pre-push"), "#!/bin/sh\necho push\n").unwrap();
        let setting = FakeSetting(RefCell::new(Some(prev.clone())));

        let report = inst.install(&setting).unwrap();
        assert_eq!(report.migrated_from, Some(prev.clone()));
        assert_eq!(report.migrated, vec!["post-commit", "pre-push"]);
        assert!(inst.hooks_dir.join("pre-push.legacy").is_file());
        assert!(inst.hooks_dir.join(PREVIOUS_PATH_FILE).is_file());

        let report = inst.uninstall(&setting).unwrap();
        assert_eq!(report.hooks_path, HooksPathChange::Restored(prev.clone()));
        assert!(report.restored.is_empty());
        assert_eq!(setting.get().unwrap(), Some(prev.clone()));
        assert!(!inst.hooks_dir.exists());
        assert_eq!(
            fs::read_to_string(prev.join("post-commit")).unwrap(),
            "#!/bin/sh\necho husky\n"
        );
    }

    #[test]
    fn script_quotes_paths() {
        let inst = HookInstaller::new(
            PathBuf::from("/h"),
            PathBuf::from("/it's/worklog"),
            PathBuf::from("/c.toml"),
        );
        assert!(inst.script().contains("'/it'\\''s/worklog' --config '/c.toml' record"));
        assert!(inst.script().starts_with("#!/bin/sh\n# worklog-managed-hook\n"));
    }

    #[cfg(unix)]
    #[test]
    fn script_chains_legacy_and_keeps_its_status() {
        let tmp = TempDir::new().unwrap();
        let inst = HookInstaller::new(
            tmp.path().join("hooks"),
            PathBuf::from("/bin/true"),
            tmp.path().join("c.toml"),
        );
        fs::create_dir_all(&inst.hooks_dir).unwrap();
        let marker = tmp.path().join("legacy-ran");
        fs::write(
            inst.hooks_dir.join("post-commit"),
            format!("#!/bin/sh\necho \"$1\" > '{}'\nexit 3\n", marker.display()),
        )
        .unwrap();
        make_executable(&inst.hooks_dir.join("post-commit")).unwrap();
        inst.install(&FakeSetting::default()).unwrap();

        let status = Command::new(inst.hooks_dir.join("post-commit"))
            .arg("arg-one")
            .status()
            .unwrap();
        assert_eq!(status.code(), Some(3));
        assert_eq!(fs::read_to_string(&marker).unwrap(), "arg-one\n");
    }
}
