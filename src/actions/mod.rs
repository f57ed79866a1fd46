//! Actions module - Delete or move files from duplicate groups
//!
//! The first member of each group (earliest discovered) is the keeper and
//! is never touched; every other member is purged or relocated.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobMatcher};

use crate::group::{Group, GroupSnapshot};

/// Result of a purge or relocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Files deleted or moved (or that would be, on a dry run)
    pub affected: Vec<PathBuf>,
    /// One message per failed file
    pub errors: Vec<String>,
}

impl ActionOutcome {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Picks duplicate groups by member path.
#[derive(Debug, Clone)]
pub enum GroupSelector {
    /// Every group with two or more members
    All,
    /// Some member path starts with this prefix
    Prefix(PathBuf),
    /// Some member path matches this glob
    Glob(GlobMatcher),
}

impl GroupSelector {
    /// Plain text is a path prefix; text containing `*`, `?`, `[` or `{` is a
    /// glob.
    pub fn parse(pattern: Option<&str>) -> Result<Self> {
        let Some(pattern) = pattern.filter(|p| !p.is_empty()) else {
            return Ok(Self::All);
        };
        if pattern.contains(['*', '?', '[', '{']) {
            let glob = Glob::new(pattern)
                .with_context(|| format!("Invalid selection pattern: {}", pattern))?;
            Ok(Self::Glob(glob.compile_matcher()))
        } else {
            Ok(Self::Prefix(PathBuf::from(pattern)))
        }
    }

    pub fn matches(&self, group: &Group) -> bool {
        match self {
            Self::All => true,
            Self::Prefix(prefix) => group.members.iter().any(|m| m.starts_with(prefix)),
            Self::Glob(glob) => group.members.iter().any(|m| glob.is_match(m)),
        }
    }

    /// Duplicate groups picked by this selector, discovery order.
    pub fn select<'a>(&self, matches: &'a GroupSnapshot) -> Vec<&'a Group> {
        matches
            .duplicate_groups()
            .filter(|g| self.matches(g))
            .collect()
    }
}

/// Duplicate groups matching `pattern` (prefix or glob); `None` picks all.
pub fn select_groups<'a>(
    matches: &'a GroupSnapshot,
    pattern: Option<&str>,
) -> Result<Vec<&'a Group>> {
    Ok(GroupSelector::parse(pattern)?.select(matches))
}

fn non_keepers<'a>(groups: &'a [&'a Group]) -> impl Iterator<Item = &'a PathBuf> {
    groups.iter().flat_map(|g| g.members.iter().skip(1))
}

/// Delete every member except the keeper.
pub fn purge(groups: &[&Group], dry_run: bool) -> ActionOutcome {
    let mut outcome = ActionOutcome::default();

    for file in non_keepers(groups) {
        if dry_run {
            tracing::info!("[DRY RUN] Would delete: {}", file.display());
            outcome.affected.push(file.clone());
            continue;
        }
        match fs::remove_file(file) {
            Ok(()) => {
                tracing::info!("Deleted: {}", file.display());
                outcome.affected.push(file.clone());
            }
            Err(e) => {
                tracing::warn!("Failed to delete {}: {}", file.display(), e);
                outcome.errors.push(format!("{}: {}", file.display(), e));
            }
        }
    }

    outcome
}

/// Move every member except the keeper into `dest`. With `preserve_tree`
/// the path relative to `root` is kept; otherwise files land flat in `dest`.
/// Existing destination files are never overwritten.
pub fn relocate(
    groups: &[&Group],
    root: &Path,
    dest: &Path,
    preserve_tree: bool,
    dry_run: bool,
) -> ActionOutcome {
    let mut outcome = ActionOutcome::default();

    for file in non_keepers(groups) {
        let target = destination_for(file, root, dest, preserve_tree);

        if dry_run {
            tracing::info!(
                "[DRY RUN] Would move: {} -> {}",
                file.display(),
                target.display()
            );
            outcome.affected.push(file.clone());
            continue;
        }

        match move_file(file, &target) {
            Ok(()) => {
                tracing::info!("Moved: {} -> {}", file.display(), target.display());
                outcome.affected.push(file.clone());
            }
            Err(e) => {
                tracing::warn!("Failed to move {}: {:#}", file.display(), e);
                outcome.errors.push(format!("{}: {:#}", file.display(), e));
            }
        }
    }

    outcome
}

fn destination_for(file: &Path, root: &Path, dest: &Path, preserve_tree: bool) -> PathBuf {
    let flat = || dest.join(file.file_name().unwrap_or(file.as_os_str()));
    if !preserve_tree {
        return flat();
    }
    match pathdiff::diff_paths(file, root) {
        Some(rel) if !rel.starts_with("..") && rel.is_relative() => dest.join(rel),
        _ => flat(),
    }
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    if to.exists() {
        anyhow::bail!("destination {} already exists", to.display());
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    if fs::rename(from, to).is_err() {
        // Cross-device moves cannot rename.
        fs::copy(from, to)
            .with_context(|| format!("Failed to copy {} -> {}", from.display(), to.display()))?;
        fs::remove_file(from).with_context(|| format!("Failed to remove {}", from.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{MatchOptions, ScanSession};
    use tempfile::tempdir;

    fn snapshot_for<P: AsRef<Path>>(files: &[(P, f64)]) -> GroupSnapshot {
        let session = ScanSession::new(MatchOptions::default());
        for (path, x) in files {
            session.assign(path.as_ref(), &[*x]);
        }
        session.into_snapshot()
    }

    #[test]
    fn test_selector_parse() {
        assert!(matches!(GroupSelector::parse(None).unwrap(), GroupSelector::All));
        assert!(matches!(
            GroupSelector::parse(Some("/data/old")).unwrap(),
            GroupSelector::Prefix(_)
        ));
        assert!(matches!(
            GroupSelector::parse(Some("**/old/*.json")).unwrap(),
            GroupSelector::Glob(_)
        ));
        assert!(GroupSelector::parse(Some("[")).is_err());
    }

    #[test]
    fn test_select_by_prefix_and_glob() {
        let snap = snapshot_for(&[
            (Path::new("/data/new/a.json"), 1.0),
            (Path::new("/data/old/a.json"), 1.0),
            (Path::new("/data/new/b.json"), 2.0),
            (Path::new("/data/new/c.json"), 2.0),
            (Path::new("/data/old/solo.json"), 3.0),
        ]);

        assert_eq!(GroupSelector::All.select(&snap).len(), 2);

        let prefix = GroupSelector::parse(Some("/data/old")).unwrap();
        let picked = prefix.select(&snap);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].members[0], PathBuf::from("/data/new/a.json"));

        let picked = select_groups(&snap, Some("*/c.json")).unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].members[0], PathBuf::from("/data/new/b.json"));
    }

    #[test]
    fn test_purge_keeps_first_member() {
        let dir = tempdir().unwrap();
        let keep = dir.path().join("keep.json");
        let drop = dir.path().join("drop.json");
        fs::write(&keep, "{}").unwrap();
        fs::write(&drop, "{}").unwrap();

        let snap = snapshot_for(&[(&keep, 1.0), (&drop, 1.0)]);
        let groups = GroupSelector::All.select(&snap);

        let dry = purge(&groups, true);
        assert_eq!(dry.affected, vec![drop.clone()]);
        assert!(drop.exists());

        let real = purge(&groups, false);
        assert!(real.is_clean());
        assert!(keep.exists());
        assert!(!drop.exists());
    }

    #[test]
    fn test_relocate_preserves_tree() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root");
        let dest = dir.path().join("moved");
        fs::create_dir_all(root.join("nested")).unwrap();
        let keep = root.join("a.json");
        let dup = root.join("nested").join("a.json");
        fs::write(&keep, "{}").unwrap();
        fs::write(&dup, "{}").unwrap();

        let snap = snapshot_for(&[(&keep, 1.0), (&dup, 1.0)]);
        let groups = GroupSelector::All.select(&snap);
        let outcome = relocate(&groups, &root, &dest, true, false);

        assert!(outcome.is_clean());
        assert!(keep.exists());
        assert!(!dup.exists());
        assert!(dest.join("nested").join("a.json").exists());
    }

    #[test]
    fn test_relocate_flat_never_overwrites() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root");
        let dest = dir.path().join("moved");
        fs::create_dir_all(root.join("x")).unwrap();
        fs::create_dir_all(root.join("y")).unwrap();
        fs::create_dir_all(&dest).unwrap();
        let keep = root.join("k.json");
        let first = root.join("x").join("same.json");
        let second = root.join("y").join("same.json");
        for p in [&keep, &first, &second] {
            fs::write(p, "{}").unwrap();
        }

        let snap = snapshot_for(&[(&keep, 1.0), (&first, 1.0), (&second, 1.0)]);
        let groups = GroupSelector::All.select(&snap);
        let outcome = relocate(&groups, &root, &dest, false, false);

        assert_eq!(outcome.affected, vec![first.clone()]);
        assert_eq!(outcome.errors.len(), 1);
        assert!(second.exists());
        assert!(dest.join("same.json").exists());
    }
}
