//! ScanEngine - Drives one scan from enumeration to the final group map
//!
//! Files are handled strictly in enumeration order on a single worker:
//! read → extract → normalize → assign (or mark invalid) → mutate →
//! progress. Per-file failures are logged and skipped; only walk errors and
//! bad options abort the scan.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::scanner::{FilePattern, Scanner, WalkOptions};
use super::{CancelToken, Progress, ProgressObserver, ScanResult};
use crate::codec;
use crate::error::ScanError;
use crate::group::{GroupSnapshot, MatchOptions, ScanSession};
use crate::mutate::{FieldMutator, MutationOptions};
use crate::normalize::Normalizer;

/// Everything a scan needs to know
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanOptions {
    /// File-name suffix filter, e.g. `*.json`
    pub file_pattern: String,
    /// Decimal places used for keys; negative disables rounding
    pub rounding_decimals: i32,
    pub matching: MatchOptions,
    pub mutations: MutationOptions,
    /// Leave documents without a position untouched by mutations
    pub ignore_empty: bool,
    /// Skip hidden files and directories
    pub skip_hidden: bool,
    /// Maximum traversal depth
    pub max_depth: Option<usize>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            file_pattern: "*.json".to_string(),
            rounding_decimals: 2,
            matching: MatchOptions::default(),
            mutations: MutationOptions::default(),
            ignore_empty: true,
            skip_hidden: false,
            max_depth: None,
        }
    }
}

impl ScanOptions {
    pub fn validate(&self) -> Result<(), ScanError> {
        self.matching.validate()?;
        if self.max_depth == Some(0) {
            return Err(ScanError::InvalidOptions(
                "max depth 0 would only visit the root directory".to_string(),
            ));
        }
        Ok(())
    }

    fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            pattern: FilePattern::new(&self.file_pattern),
            skip_hidden: self.skip_hidden,
            max_depth: self.max_depth,
        }
    }
}

/// Counters gathered while a scan runs
#[derive(Debug, Default)]
struct ScanStats {
    total_files: usize,
    processed: usize,
    skipped: usize,
    mutated: usize,
    elapsed: Duration,
    cancelled: bool,
}

enum FileOutcome {
    Skipped,
    Handled { mutated: bool },
}

/// Runs scans with fixed options
#[derive(Debug)]
pub struct ScanEngine {
    options: ScanOptions,
    scanner: Scanner,
    normalizer: Normalizer,
    mutator: FieldMutator,
    cancel: CancelToken,
}

impl ScanEngine {
    /// Create an engine; fails on invalid options before touching the disk.
    pub fn new(options: ScanOptions) -> Result<Self, ScanError> {
        options.validate()?;
        Ok(Self {
            scanner: Scanner::new(options.walk_options()),
            normalizer: Normalizer::new(options.rounding_decimals),
            mutator: FieldMutator::new(options.mutations, options.rounding_decimals),
            cancel: CancelToken::new(),
            options,
        })
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Token that stops this engine's scans between files.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Scan `root` on the calling thread with a fresh session.
    pub fn scan(
        &self,
        root: &Path,
        observer: &mut dyn ProgressObserver,
    ) -> Result<ScanResult, ScanError> {
        let session = ScanSession::new(self.options.matching);
        let session_id = session.id();
        let stats = self.run(root, &session, observer)?;
        Ok(build_result(
            session_id,
            root.to_path_buf(),
            session.into_snapshot(),
            stats,
        ))
    }

    /// Scan `root` on a dedicated worker thread. The returned handle can
    /// snapshot the session while the scan runs.
    pub fn spawn<O>(self, root: PathBuf, observer: O) -> Result<ScanHandle, ScanError>
    where
        O: ProgressObserver + Send + 'static,
    {
        let session = Arc::new(ScanSession::new(self.options.matching));
        let cancel = self.cancel.clone();
        let worker_session = Arc::clone(&session);
        let worker_root = root.clone();

        let handle = thread::Builder::new()
            .name("posdup-scan".to_string())
            .spawn(move || {
                let mut observer = observer;
                self.run(&worker_root, &worker_session, &mut observer)
            })
            .map_err(ScanError::Spawn)?;

        Ok(ScanHandle {
            root,
            session,
            cancel,
            handle,
        })
    }

    fn run(
        &self,
        root: &Path,
        session: &ScanSession,
        observer: &mut dyn ProgressObserver,
    ) -> Result<ScanStats, ScanError> {
        let start = Instant::now();
        let files = self.scanner.collect(root)?;

        let mut stats = ScanStats {
            total_files: files.len(),
            ..Default::default()
        };
        tracing::info!(
            "Scanning {} files under {} (session {})",
            stats.total_files,
            root.display(),
            session.id()
        );

        for (i, path) in files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!(
                    "Scan cancelled after {} of {} files",
                    stats.processed,
                    stats.total_files
                );
                stats.cancelled = true;
                break;
            }

            match self.process_file(path, session) {
                FileOutcome::Skipped => stats.skipped += 1,
                FileOutcome::Handled { mutated } => {
                    if mutated {
                        stats.mutated += 1;
                    }
                }
            }
            stats.processed = i + 1;

            observer.on_progress(&Progress {
                current: i + 1,
                total: stats.total_files,
                path: path.clone(),
            });
        }

        stats.elapsed = start.elapsed();
        tracing::info!(
            "Scan finished: {} files in {:.2?}, {} groups, {} matches, {} skipped",
            stats.processed,
            stats.elapsed,
            session.group_count(),
            session.matches_found(),
            stats.skipped
        );
        Ok(stats)
    }

    fn process_file(&self, path: &Path, session: &ScanSession) -> FileOutcome {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", path.display(), e);
                return FileOutcome::Skipped;
            }
        };

        let position = match codec::extract(&bytes) {
            Ok(position) => position,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                return FileOutcome::Skipped;
            }
        };

        match self.normalizer.key_input(position.as_deref()) {
            Some(vector) => {
                session.assign(path, &vector);
            }
            None => {
                session.mark_invalid(path);
                if self.options.ignore_empty {
                    return FileOutcome::Handled { mutated: false };
                }
            }
        }

        FileOutcome::Handled {
            mutated: self.mutate(path),
        }
    }

    fn mutate(&self, path: &Path) -> bool {
        if self.mutator.is_noop() {
            return false;
        }
        match self.mutator.apply(path) {
            Ok(outcome) => outcome.written,
            Err(e) => {
                tracing::warn!("Failed to update fields in {}: {}", path.display(), e);
                false
            }
        }
    }
}

/// A scan running on its own worker thread
#[derive(Debug)]
pub struct ScanHandle {
    root: PathBuf,
    session: Arc<ScanSession>,
    cancel: CancelToken,
    handle: JoinHandle<Result<ScanStats, ScanError>>,
}

impl ScanHandle {
    /// Ask the worker to stop after the current file.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Consistent copy of the groups found so far.
    pub fn snapshot(&self) -> GroupSnapshot {
        self.session.snapshot()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker and collect the result.
    pub fn join(self) -> Result<ScanResult, ScanError> {
        let stats = self
            .handle
            .join()
            .map_err(|_| ScanError::WorkerPanicked)??;

        let session_id = self.session.id();
        let snapshot = match Arc::try_unwrap(self.session) {
            Ok(session) => session.into_snapshot(),
            Err(shared) => shared.snapshot(),
        };
        Ok(build_result(session_id, self.root, snapshot, stats))
    }
}

fn build_result(
    session_id: uuid::Uuid,
    root: PathBuf,
    matches: GroupSnapshot,
    stats: ScanStats,
) -> ScanResult {
    ScanResult {
        session_id,
        root,
        matches,
        total_files: stats.total_files,
        files_processed: stats.processed,
        files_skipped: stats.skipped,
        files_mutated: stats.mutated,
        elapsed: stats.elapsed,
        cancelled: stats.cancelled,
    }
}
