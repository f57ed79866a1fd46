//! Group module - Exact and near-duplicate clustering of position vectors
//!
//! A [`ScanSession`] owns the group map, the exact/near marker sets and the
//! invalid set for one scan. Each file is placed by [`ScanSession::assign`]
//! inside a single critical section:
//!
//! 1. identical canonical key → join that group (exact)
//! 2. otherwise, with near matching on, the first group (insertion order)
//!    whose anchor is within tolerance on every component → join it (near)
//! 3. otherwise → new singleton group
//!
//! Groups are kept in discovery order, so near matching is deterministic.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::CanonicalKey;
use crate::error::ScanError;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// How a near duplicate picks among several groups within tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NearPolicy {
    /// First group in discovery order.
    #[default]
    FirstFit,
    /// Group with the smallest largest-component distance; ties go to the
    /// earlier group.
    BestFit,
}

/// Options controlling how files are matched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchOptions {
    /// Merge files into existing groups within `tolerance`.
    pub find_near_duplicates: bool,
    /// Largest allowed per-component absolute difference.
    pub tolerance: f64,
    /// Which qualifying group wins.
    pub near_policy: NearPolicy,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            find_near_duplicates: false,
            tolerance: 0.01,
            near_policy: NearPolicy::FirstFit,
        }
    }
}

impl MatchOptions {
    pub fn validate(&self) -> Result<(), ScanError> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(ScanError::InvalidOptions(format!(
                "tolerance must be a finite, non-negative number (got {})",
                self.tolerance
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How a file was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchKind {
    /// Joined a group with an identical key.
    Exact,
    /// Joined a group within tolerance.
    Near,
    /// Started a new group.
    New,
    /// The path was already placed earlier in this session; nothing changed.
    AlreadyAssigned,
}

/// Result of placing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Key of the group the file now belongs to.
    pub key: CanonicalKey,
    pub kind: MatchKind,
}

/// Summary classification of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupKind {
    Unique,
    Exact,
    Near,
    ExactAndNear,
}

/// Files sharing one canonical key, plus any merged in by tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub key: CanonicalKey,
    /// Vector decoded from `key`; near matching compares against this.
    pub anchor: Vec<f64>,
    /// Members in discovery order.
    pub members: Vec<PathBuf>,
    /// Grew by an identical key at least once.
    pub exact: bool,
    /// Grew by tolerance at least once.
    pub near: bool,
}

impl Group {
    fn new(key: CanonicalKey, vector: &[f64], path: &Path) -> Self {
        let anchor = match key.decode() {
            Ok(anchor) => anchor,
            Err(e) => {
                tracing::warn!("Falling back to raw vector for key {}: {}", key, e);
                vector.to_vec()
            }
        };
        Self {
            key,
            anchor,
            members: vec![path.to_path_buf()],
            exact: false,
            near: false,
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Two or more members.
    pub fn is_duplicate(&self) -> bool {
        self.members.len() > 1
    }

    pub fn kind(&self) -> GroupKind {
        match (self.exact, self.near) {
            (true, true) => GroupKind::ExactAndNear,
            (true, false) => GroupKind::Exact,
            (false, true) => GroupKind::Near,
            (false, false) => GroupKind::Unique,
        }
    }
}

/// True when both vectors have the same length and every component pair is
/// at most `tolerance` apart.
pub fn within_tolerance(a: &[f64], b: &[f64], tolerance: f64) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() <= tolerance)
}

/// Largest per-component absolute difference, `None` on length mismatch.
pub fn chebyshev_distance(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }
    Some(
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f64::max),
    )
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// A consistent copy of a session's state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    /// Every group in discovery order.
    pub groups: Vec<Group>,
    pub exact_duplicate_keys: BTreeSet<CanonicalKey>,
    pub near_duplicate_keys: BTreeSet<CanonicalKey>,
    /// Files without a usable position.
    pub invalid: BTreeSet<PathBuf>,
    /// Files that joined a group by identical key.
    pub exact_duplicate_files: BTreeSet<PathBuf>,
    /// Files that joined a group by tolerance.
    pub near_duplicate_files: BTreeSet<PathBuf>,
}

impl GroupSnapshot {
    pub fn group(&self, key: &CanonicalKey) -> Option<&Group> {
        self.groups.iter().find(|g| &g.key == key)
    }

    /// The group containing `path`, if any.
    pub fn group_of(&self, path: &Path) -> Option<&Group> {
        self.groups
            .iter()
            .find(|g| g.members.iter().any(|m| m == path))
    }

    /// Groups with two or more members, in discovery order.
    pub fn duplicate_groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter().filter(|g| g.is_duplicate())
    }

    /// Exact plus near marker counts.
    pub fn matches_found(&self) -> usize {
        self.exact_duplicate_keys.len() + self.near_duplicate_keys.len()
    }

    /// Number of files placed in some group.
    pub fn grouped_files(&self) -> usize {
        self.groups.iter().map(Group::len).sum()
    }
}

#[derive(Debug, Default)]
struct GroupState {
    groups: Vec<Group>,
    by_key: HashMap<CanonicalKey, usize>,
    by_member: HashMap<PathBuf, usize>,
    exact_keys: BTreeSet<CanonicalKey>,
    near_keys: BTreeSet<CanonicalKey>,
    invalid: BTreeSet<PathBuf>,
    exact_files: BTreeSet<PathBuf>,
    near_files: BTreeSet<PathBuf>,
}

impl GroupState {
    fn assign(
        &mut self,
        path: &Path,
        key: CanonicalKey,
        vector: &[f64],
        options: &MatchOptions,
    ) -> Assignment {
        if let Some(&idx) = self.by_member.get(path) {
            return Assignment {
                key: self.groups[idx].key.clone(),
                kind: MatchKind::AlreadyAssigned,
            };
        }

        if let Some(&idx) = self.by_key.get(&key) {
            self.join(idx, path);
            self.groups[idx].exact = true;
            self.exact_keys.insert(key.clone());
            self.exact_files.insert(path.to_path_buf());
            return Assignment {
                key,
                kind: MatchKind::Exact,
            };
        }

        if options.find_near_duplicates {
            if let Some(idx) = self.find_near(vector, options) {
                self.join(idx, path);
                let group = &mut self.groups[idx];
                group.near = true;
                let group_key = group.key.clone();
                self.near_keys.insert(group_key.clone());
                self.near_files.insert(path.to_path_buf());
                return Assignment {
                    key: group_key,
                    kind: MatchKind::Near,
                };
            }
        }

        let idx = self.groups.len();
        self.groups.push(Group::new(key.clone(), vector, path));
        self.by_key.insert(key.clone(), idx);
        self.by_member.insert(path.to_path_buf(), idx);
        Assignment {
            key,
            kind: MatchKind::New,
        }
    }

    fn join(&mut self, idx: usize, path: &Path) {
        self.groups[idx].members.push(path.to_path_buf());
        self.by_member.insert(path.to_path_buf(), idx);
    }

    fn find_near(&self, vector: &[f64], options: &MatchOptions) -> Option<usize> {
        match options.near_policy {
            NearPolicy::FirstFit => self
                .groups
                .iter()
                .position(|g| within_tolerance(vector, &g.anchor, options.tolerance)),
            NearPolicy::BestFit => self
                .groups
                .iter()
                .enumerate()
                .filter_map(|(idx, g)| {
                    chebyshev_distance(vector, &g.anchor)
                        .filter(|d| *d <= options.tolerance)
                        .map(|d| (idx, d))
                })
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(idx, _)| idx),
        }
    }

    fn snapshot(&self) -> GroupSnapshot {
        GroupSnapshot {
            groups: self.groups.clone(),
            exact_duplicate_keys: self.exact_keys.clone(),
            near_duplicate_keys: self.near_keys.clone(),
            invalid: self.invalid.clone(),
            exact_duplicate_files: self.exact_files.clone(),
            near_duplicate_files: self.near_files.clone(),
        }
    }

    fn into_snapshot(self) -> GroupSnapshot {
        GroupSnapshot {
            groups: self.groups,
            exact_duplicate_keys: self.exact_keys,
            near_duplicate_keys: self.near_keys,
            invalid: self.invalid,
            exact_duplicate_files: self.exact_files,
            near_duplicate_files: self.near_files,
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Group state for exactly one scan.
///
/// Safe to share across threads: every mutation of groups, markers and the
/// invalid set happens under one lock, so [`ScanSession::snapshot`] never
/// observes a half-placed file.
#[derive(Debug)]
pub struct ScanSession {
    id: Uuid,
    options: MatchOptions,
    state: Mutex<GroupState>,
}

impl ScanSession {
    pub fn new(options: MatchOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            options,
            state: Mutex::new(GroupState::default()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    /// Place `path` given its already rounded `vector`.
    pub fn assign(&self, path: &Path, vector: &[f64]) -> Assignment {
        let key = CanonicalKey::from_vector(vector);
        let assignment = self
            .state
            .lock()
            .assign(path, key, vector, &self.options);
        tracing::debug!(
            "{} -> {} ({:?})",
            path.display(),
            assignment.key,
            assignment.kind
        );
        assignment
    }

    /// Record a file without a usable position. Returns false if it was
    /// already recorded.
    pub fn mark_invalid(&self, path: &Path) -> bool {
        let inserted = self.state.lock().invalid.insert(path.to_path_buf());
        if inserted {
            tracing::debug!("{} has no usable position", path.display());
        }
        inserted
    }

    pub fn group_count(&self) -> usize {
        self.state.lock().groups.len()
    }

    pub fn matches_found(&self) -> usize {
        let state = self.state.lock();
        state.exact_keys.len() + state.near_keys.len()
    }

    /// Copy the current state.
    pub fn snapshot(&self) -> GroupSnapshot {
        self.state.lock().snapshot()
    }

    /// Consume the session and return its final state.
    pub fn into_snapshot(self) -> GroupSnapshot {
        self.state.into_inner().into_snapshot()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn near(tolerance: f64) -> MatchOptions {
        MatchOptions {
            find_near_duplicates: true,
            tolerance,
            near_policy: NearPolicy::FirstFit,
        }
    }

    #[test]
    fn test_identical_vectors_share_exact_group() {
        let session = ScanSession::new(MatchOptions::default());
        let a = session.assign(Path::new("a.json"), &[1.0, 2.0]);
        let b = session.assign(Path::new("b.json"), &[1.0, 2.0]);

        assert_eq!(a.kind, MatchKind::New);
        assert_eq!(b.kind, MatchKind::Exact);
        assert_eq!(a.key, b.key);

        let snap = session.into_snapshot();
        assert_eq!(snap.groups.len(), 1);
        assert_eq!(
            snap.groups[0].members,
            vec![PathBuf::from("a.json"), PathBuf::from("b.json")]
        );
        assert!(snap.exact_duplicate_keys.contains(&a.key));
        assert!(snap.near_duplicate_keys.is_empty());
        assert!(snap.exact_duplicate_files.contains(Path::new("b.json")));
        assert!(!snap.exact_duplicate_files.contains(Path::new("a.json")));
    }

    #[test]
    fn test_near_disabled_never_merges_distinct_keys() {
        let session = ScanSession::new(MatchOptions {
            find_near_duplicates: false,
            tolerance: 100.0,
            ..Default::default()
        });
        session.assign(Path::new("a.json"), &[0.0, 0.0]);
        let b = session.assign(Path::new("b.json"), &[0.5, 0.5]);

        assert_eq!(b.kind, MatchKind::New);
        let snap = session.snapshot();
        assert_eq!(snap.groups.len(), 2);
        assert_eq!(snap.matches_found(), 0);
    }

    #[test]
    fn test_first_fit_follows_discovery_order() {
        let session = ScanSession::new(near(0.5));
        let g1 = session.assign(Path::new("g1.json"), &[0.0, 0.0]);
        session.assign(Path::new("g2.json"), &[10.0, 10.0]);
        let hit = session.assign(Path::new("c.json"), &[0.3, 0.3]);

        assert_eq!(hit.kind, MatchKind::Near);
        assert_eq!(hit.key, g1.key);

        let snap = session.snapshot();
        assert_eq!(snap.groups.len(), 2);
        assert_eq!(snap.groups[0].kind(), GroupKind::Near);
        assert!(snap.near_duplicate_keys.contains(&g1.key));
        assert!(snap.near_duplicate_files.contains(Path::new("c.json")));
    }

    #[test]
    fn test_first_fit_takes_earliest_of_several() {
        let session = ScanSession::new(near(1.0));
        let first = session.assign(Path::new("a.json"), &[0.0]);
        session.assign(Path::new("b.json"), &[1.5]);
        let hit = session.assign(Path::new("c.json"), &[0.9]);
        assert_eq!(hit.key, first.key);
    }

    #[test]
    fn test_best_fit_takes_closest() {
        let session = ScanSession::new(MatchOptions {
            near_policy: NearPolicy::BestFit,
            ..near(1.0)
        });
        session.assign(Path::new("a.json"), &[0.0]);
        let closer = session.assign(Path::new("b.json"), &[1.5]);
        let hit = session.assign(Path::new("c.json"), &[0.9]);
        assert_eq!(hit.key, closer.key);
    }

    #[test]
    fn test_length_mismatch_never_matches() {
        let session = ScanSession::new(near(10.0));
        session.assign(Path::new("a.json"), &[1.0, 2.0]);
        let b = session.assign(Path::new("b.json"), &[1.0, 2.0, 3.0]);
        assert_eq!(b.kind, MatchKind::New);
        assert!(!within_tolerance(&[1.0], &[1.0, 1.0], 1.0));
        assert_eq!(chebyshev_distance(&[1.0], &[]), None);
    }

    #[test]
    fn test_tolerance_boundary_is_inclusive() {
        assert!(within_tolerance(&[1.0, 2.0], &[1.5, 2.5], 0.5));
        assert!(!within_tolerance(&[1.0, 2.0], &[1.5, 2.51], 0.5));
    }

    #[test]
    fn test_group_can_be_exact_and_near() {
        let session = ScanSession::new(near(0.1));
        let base = session.assign(Path::new("a.json"), &[1.0]);
        session.assign(Path::new("b.json"), &[1.05]);
        session.assign(Path::new("c.json"), &[1.0]);

        let snap = session.snapshot();
        assert_eq!(snap.groups.len(), 1);
        assert_eq!(snap.groups[0].kind(), GroupKind::ExactAndNear);
        assert!(snap.exact_duplicate_keys.contains(&base.key));
        assert!(snap.near_duplicate_keys.contains(&base.key));
        assert_eq!(snap.matches_found(), 2);
    }

    #[test]
    fn test_near_member_does_not_become_anchor() {
        // b joins a by tolerance without creating a [1.005] key of its own.
        let session = ScanSession::new(near(0.01));
        session.assign(Path::new("a.json"), &[1.0]);
        session.assign(Path::new("b.json"), &[1.005]);
        let c = session.assign(Path::new("c.json"), &[1.005]);
        assert_eq!(c.kind, MatchKind::Near);
        assert_eq!(session.group_count(), 1);
    }

    #[test]
    fn test_reassigning_path_is_noop() {
        let session = ScanSession::new(MatchOptions::default());
        let first = session.assign(Path::new("a.json"), &[1.0]);
        let again = session.assign(Path::new("a.json"), &[2.0]);

        assert_eq!(again.kind, MatchKind::AlreadyAssigned);
        assert_eq!(again.key, first.key);
        let snap = session.snapshot();
        assert_eq!(snap.grouped_files(), 1);
    }

    #[test]
    fn test_invalid_files_stay_out_of_groups() {
        let session = ScanSession::new(MatchOptions::default());
        assert!(session.mark_invalid(Path::new("x.json")));
        assert!(!session.mark_invalid(Path::new("x.json")));

        let snap = session.snapshot();
        assert!(snap.groups.is_empty());
        assert!(snap.group_of(Path::new("x.json")).is_none());
        assert_eq!(snap.invalid.len(), 1);
    }

    #[test]
    fn test_options_validation() {
        assert!(MatchOptions::default().validate().is_ok());
        assert!(near(-0.1).validate().is_err());
        assert!(near(f64::NAN).validate().is_err());
        assert!(near(f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_concurrent_assign_keeps_membership_unique() {
        let session = Arc::new(ScanSession::new(near(0.5)));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let session = Arc::clone(&session);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let path = PathBuf::from(format!("t{}_{}.json", t, i));
                        session.assign(&path, &[(i % 10) as f64]);
                        let _ = session.snapshot();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snap = session.snapshot();
        assert_eq!(snap.grouped_files(), 200);
        assert_eq!(snap.groups.len(), 10);
        for group in &snap.groups {
            for member in &group.members {
                assert_eq!(snap.group_of(member).map(|g| &g.key), Some(&group.key));
            }
        }
    }
}
