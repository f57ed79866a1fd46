//! Core module - Scan orchestration
//!
//! Contains the scan engine, file enumeration, progress reporting and the
//! terminal scan result.

mod engine;
mod scanner;

pub use engine::{ScanEngine, ScanHandle, ScanOptions};
pub use scanner::{FilePattern, Scanner, WalkOptions};

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::group::GroupSnapshot;

/// Progress information passed to observers after each file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Files handled so far, including the current one
    pub current: usize,
    /// Files found by enumeration
    pub total: usize,
    /// File just handled
    pub path: PathBuf,
}

impl Progress {
    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            100.0
        } else {
            (self.current as f32 / self.total as f32) * 100.0
        }
    }
}

/// Receives one call per handled file, on the scan worker, never while the
/// session lock is held.
pub trait ProgressObserver {
    fn on_progress(&mut self, progress: &Progress);
}

impl<F> ProgressObserver for F
where
    F: FnMut(&Progress),
{
    fn on_progress(&mut self, progress: &Progress) {
        self(progress)
    }
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&mut self, _progress: &Progress) {}
}

/// Cooperative stop flag, checked between files.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Terminal result of one scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub session_id: Uuid,
    /// Directory that was scanned
    pub root: PathBuf,
    /// Groups, marker sets and invalid files
    pub matches: GroupSnapshot,
    /// Files found by enumeration
    pub total_files: usize,
    /// Files handled before completion or cancellation
    pub files_processed: usize,
    /// Files skipped because they could not be read or parsed
    pub files_skipped: usize,
    /// Documents rewritten by field mutations
    pub files_mutated: usize,
    pub elapsed: Duration,
    /// True if the scan stopped early
    pub cancelled: bool,
}

impl ScanResult {
    /// `|exact keys| + |near keys|`
    pub fn matches_found(&self) -> usize {
        self.matches.matches_found()
    }

    pub fn files_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.files_processed as f64 / secs
        } else {
            0.0
        }
    }

    /// Share of position-bearing files that ended up in a duplicate group.
    /// Invalid and skipped files are excluded from the denominator.
    pub fn match_percentage(&self) -> f64 {
        let grouped = self.matches.grouped_files();
        if grouped == 0 {
            return 0.0;
        }
        let duplicated: usize = self.matches.duplicate_groups().map(|g| g.len()).sum();
        duplicated as f64 / grouped as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percentage() {
        let p = Progress {
            current: 1,
            total: 4,
            path: PathBuf::from("a.json"),
        };
        assert_eq!(p.percentage(), 25.0);

        let empty = Progress {
            current: 0,
            total: 0,
            path: PathBuf::new(),
        };
        assert_eq!(empty.percentage(), 100.0);
    }

    #[test]
    fn test_closure_observer() {
        let mut seen = Vec::new();
        {
            let mut observer = |p: &Progress| seen.push(p.current);
            observer.on_progress(&Progress {
                current: 3,
                total: 3,
                path: PathBuf::from("c.json"),
            });
        }
        assert_eq!(seen, vec![3]);
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
