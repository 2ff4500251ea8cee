//! Scan-path gate.
//!
//! Decides whether a repository lives under one of the configured tracking
//! roots. The check is purely lexical: it never touches the filesystem, so
//! it gives the same answer for repositories that have since been deleted.

use std::path::{Component, Path, PathBuf};

/// True when `repo_path` equals one of `roots` or sits below one of them.
pub fn is_path_tracked<P: AsRef<Path>>(repo_path: &Path, roots: &[P]) -> bool {
    let repo_path = normalize(repo_path);
    roots.iter().any(|root| {
        let root = normalize(root.as_ref());
        match relative_to(&root, &repo_path) {
            Some(rel) => !matches!(rel.components().next(), Some(Component::ParentDir)),
            None => false,
        }
    })
}

/// Lexical relative path from `base` to `target`.
///
/// Returns `None` when the two paths can't be related (one absolute and one
/// relative, or different prefixes such as Windows drives).
fn relative_to(base: &Path, target: &Path) -> Option<PathBuf> {
    if base.is_absolute() != target.is_absolute() {
        return None;
    }

    let base: Vec<Component> = base.components().collect();
    let target: Vec<Component> = target.components().collect();

    let common = base
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    if let (Some(Component::Prefix(a)), Some(Component::Prefix(b))) = (base.first(), target.first())
    {
        if a != b {
            return None;
        }
    }

    let mut rel = PathBuf::new();
    for _ in common..base.len() {
        rel.push(Component::ParentDir);
    }
    for component in &target[common..] {
        rel.push(component);
    }
    Some(rel)
}

/// Drop `.` segments and fold `..` into their parent without consulting
/// the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = match out.components().next_back() {
                    Some(Component::Normal(_)) => out.pop(),
                    Some(Component::RootDir) | Some(Component::Prefix(_)) => true,
                    _ => false,
                };
                if !popped {
                    out.push(Component::ParentDir);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/a/b", true)]
    #[case("/a/b/c", true)]
    #[case("/a/b/c/d/e", true)]
    #[case("/a/bc", false)]
    #[case("/a", false)]
    #[case("/x", false)]
    #[case("/a/b/../bc", false)]
    #[case("/a/b/./c", true)]
    #[case("/a/c/../b/d", true)]
    fn single_root(#[case] repo: &str, #[case] tracked: bool) {
        assert_eq!(is_path_tracked(Path::new(repo), &["/a/b"]), tracked);
    }

    #[test]
    fn any_root_matches() {
        let roots = vec![PathBuf::from("/work"), PathBuf::from("/home/me/src")];
        assert!(is_path_tracked(Path::new("/home/me/src/tool"), &roots));
        assert!(is_path_tracked(Path::new("/work"), &roots));
        assert!(!is_path_tracked(Path::new("/home/me"), &roots));
    }

    #[test]
    fn no_roots_tracks_nothing() {
        let roots: Vec<PathBuf> = Vec::new();
        assert!(!is_path_tracked(Path::new("/a/b"), &roots));
    }

    #[test]
    fn trailing_slash_on_root_is_ignored() {
        assert!(is_path_tracked(Path::new("/a/b/c"), &["/a/b/"]));
    }

    #[test]
    fn relative_repo_never_matches_absolute_root() {
        assert!(!is_path_tracked(Path::new("a/b"), &["/a/b"]));
    }

    #[test]
    fn relative_path_starts_with_parent_for_siblings() {
        let rel = relative_to(Path::new("/a/b"), Path::new("/a/bc")).unwrap();
        assert_eq!(rel, PathBuf::from("../bc"));
    }
}
