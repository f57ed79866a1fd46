//! posdup Library
//!
//! Finds JSON documents whose `position` vectors coincide, either exactly
//! after rounding or within a tolerance, and optionally tidies their fields
//! in place while scanning.
//!
//! # Features
//!
//! - **Canonical keys**: rounded positions render to stable text keys
//! - **Near matching**: first-fit (or best-fit) tolerance grouping
//! - **Field edits**: name from file stem, description removal, in-file rounding
//! - **Live snapshots**: inspect groups while a scan runs on its worker
//!
//! # Example
//!
//! ```no_run
//! use posdup::core::{NoProgress, ScanEngine, ScanOptions};
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut options = ScanOptions::default();
//!     options.matching.find_near_duplicates = true;
//!     options.matching.tolerance = 0.5;
//!
//!     let engine = ScanEngine::new(options)?;
//!     let result = engine.scan(Path::new("./documents"), &mut NoProgress)?;
//!
//!     println!("{} matches found", result.matches_found());
//!     Ok(())
//! }
//! ```

pub mod actions;
pub mod cli;
pub mod codec;
pub mod config;
pub mod core;
pub mod error;
pub mod group;
pub mod mutate;
pub mod normalize;
pub mod report;

// Re-export commonly used types
pub use actions::{purge, relocate, select_groups, ActionOutcome, GroupSelector};
pub use codec::CanonicalKey;
pub use config::Config;
pub use core::{
    CancelToken, Progress, ProgressObserver, ScanEngine, ScanHandle, ScanOptions, ScanResult,
};
pub use error::{CodecError, MutateError, ScanError};
pub use group::{Group, GroupKind, GroupSnapshot, MatchOptions, NearPolicy, ScanSession};
pub use mutate::{FieldMutator, MutationOptions};
pub use normalize::Normalizer;
pub use report::ScanReport;
