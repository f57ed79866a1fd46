//! Report module - Rendering and saving scan results
//!
//! A [`ScanReport`] is a serializable view of a [`ScanResult`] with member
//! paths made relative to the scanned root.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::CanonicalKey;
use crate::core::ScanResult;
use crate::group::{Group, GroupKind};

/// One group as shown to the user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportGroup {
    pub key: CanonicalKey,
    pub kind: GroupKind,
    /// Members relative to the scan root, discovery order
    pub files: Vec<PathBuf>,
}

impl ReportGroup {
    fn from_group(group: &Group, root: &Path) -> Self {
        Self {
            key: group.key.clone(),
            kind: group.kind(),
            files: group.members.iter().map(|m| relative_to(root, m)).collect(),
        }
    }

    fn is_exact(&self) -> bool {
        matches!(self.kind, GroupKind::Exact | GroupKind::ExactAndNear)
    }

    fn is_near(&self) -> bool {
        matches!(self.kind, GroupKind::Near | GroupKind::ExactAndNear)
    }
}

/// Full scan report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub root: PathBuf,
    pub session_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub total_files: usize,
    pub files_processed: usize,
    pub files_skipped: usize,
    pub files_mutated: usize,
    pub exact_duplicate_positions: usize,
    pub near_duplicate_positions: usize,
    pub matches_found: usize,
    pub elapsed_ms: u64,
    pub files_per_second: f64,
    pub cancelled: bool,
    /// Every group, discovery order
    pub groups: Vec<ReportGroup>,
    /// Files without a usable position, relative to root
    pub invalid: Vec<PathBuf>,
}

impl ScanReport {
    pub fn from_result(result: &ScanResult) -> Self {
        let root = &result.root;
        Self {
            root: root.clone(),
            session_id: result.session_id,
            generated_at: Utc::now(),
            total_files: result.total_files,
            files_processed: result.files_processed,
            files_skipped: result.files_skipped,
            files_mutated: result.files_mutated,
            exact_duplicate_positions: result.matches.exact_duplicate_keys.len(),
            near_duplicate_positions: result.matches.near_duplicate_keys.len(),
            matches_found: result.matches_found(),
            elapsed_ms: result.elapsed.as_millis() as u64,
            files_per_second: result.files_per_second(),
            cancelled: result.cancelled,
            groups: result
                .matches
                .groups
                .iter()
                .map(|g| ReportGroup::from_group(g, root))
                .collect(),
            invalid: result
                .matches
                .invalid
                .iter()
                .map(|p| relative_to(root, p))
                .collect(),
        }
    }

    /// Groups with two or more members.
    pub fn duplicate_groups(&self) -> impl Iterator<Item = &ReportGroup> {
        self.groups.iter().filter(|g| g.files.len() > 1)
    }

    /// Format as human-readable summary.
    pub fn to_human_string(&self) -> String {
        let mut out = String::new();

        out.push_str(&format!("\n  Position Duplicate Report\n  {}\n\n", "=".repeat(40)));
        out.push_str(&format!("  Root:             {}\n", self.root.display()));
        out.push_str(&format!(
            "  Exact positions:  {}\n",
            self.exact_duplicate_positions
        ));
        out.push_str(&format!(
            "  Near positions:   {}\n",
            self.near_duplicate_positions
        ));
        out.push_str(&format!("  Matches found:    {}\n", self.matches_found));
        out.push_str(&format!(
            "  Files scanned:    {}/{}\n",
            self.files_processed, self.total_files
        ));
        out.push_str(&format!("  No position:      {}\n", self.invalid.len()));
        if self.files_skipped > 0 {
            out.push_str(&format!("  Skipped (errors): {}\n", self.files_skipped));
        }
        if self.files_mutated > 0 {
            out.push_str(&format!("  Files updated:    {}\n", self.files_mutated));
        }
        out.push_str(&format!(
            "  Files per second: {:.2}\n",
            self.files_per_second
        ));
        out.push_str(&format!(
            "  Elapsed:          {}\n",
            humantime::format_duration(Duration::from_millis(self.elapsed_ms))
        ));
        if self.cancelled {
            out.push_str("  Status:           cancelled before completion\n");
        }
        out.push_str(&format!(
            "  Generated:        {}\n\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));

        for (i, group) in self.duplicate_groups().enumerate() {
            let label = match group.kind {
                GroupKind::Exact => "EXACT",
                GroupKind::Near => "NEAR",
                GroupKind::ExactAndNear => "EXACT+NEAR",
                GroupKind::Unique => "UNIQUE",
            };
            out.push_str(&format!(
                "  Group #{} [{}] {} ({} files)\n",
                i + 1,
                label,
                group.key,
                group.files.len()
            ));
            for file in &group.files {
                out.push_str(&format!("    {}\n", file.display()));
            }
            out.push('\n');
        }

        out
    }

    /// Plain-text listing with an exact section and a near section.
    /// A group carrying both markers appears in both.
    pub fn to_results_text(&self) -> String {
        let mut out = String::from("Exact Duplicate Positions:\n");
        for group in self.groups.iter().filter(|g| g.is_exact()) {
            push_group_listing(&mut out, group);
        }

        out.push_str("\nNear Duplicate Positions:\n");
        for group in self.groups.iter().filter(|g| g.is_near()) {
            push_group_listing(&mut out, group);
        }
        out
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize report")
    }

    /// Write to `path`: JSON for a `.json` extension, results text otherwise.
    pub fn save(&self, path: &Path) -> Result<()> {
        let is_json = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let content = if is_json {
            self.to_json()?
        } else {
            self.to_results_text()
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, content)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;

        tracing::info!("Saved results to {}", path.display());
        Ok(())
    }
}

fn push_group_listing(out: &mut String, group: &ReportGroup) {
    out.push_str(&format!("Position: {}\n", group.key));
    out.push_str("Files:\n");
    for file in &group.files {
        out.push_str(&format!("{}\n", file.display()));
    }
    out.push('\n');
}

fn relative_to(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{MatchOptions, NearPolicy, ScanSession};
    use tempfile::tempdir;

    fn sample_result() -> ScanResult {
        let root = PathBuf::from("/data");
        let session = ScanSession::new(MatchOptions {
            find_near_duplicates: true,
            tolerance: 0.5,
            near_policy: NearPolicy::FirstFit,
        });
        session.assign(&root.join("a.json"), &[1.0, 2.0]);
        session.assign(&root.join("sub/b.json"), &[1.0, 2.0]);
        session.assign(&root.join("c.json"), &[5.0, 5.0]);
        session.assign(&root.join("d.json"), &[5.2, 5.1]);
        session.assign(&root.join("e.json"), &[9.0, 9.0]);
        session.mark_invalid(&root.join("x.json"));

        ScanResult {
            session_id: session.id(),
            root,
            matches: session.into_snapshot(),
            total_files: 6,
            files_processed: 6,
            files_skipped: 0,
            files_mutated: 0,
            elapsed: Duration::from_millis(1500),
            cancelled: false,
        }
    }

    #[test]
    fn test_report_counts() {
        let report = ScanReport::from_result(&sample_result());
        assert_eq!(report.exact_duplicate_positions, 1);
        assert_eq!(report.near_duplicate_positions, 1);
        assert_eq!(report.matches_found, 2);
        assert_eq!(report.groups.len(), 3);
        assert_eq!(report.duplicate_groups().count(), 2);
        assert_eq!(report.invalid, vec![PathBuf::from("x.json")]);
        assert_eq!(
            report.groups[0].files,
            vec![PathBuf::from("a.json"), PathBuf::from("sub/b.json")]
        );
    }

    #[test]
    fn test_human_string() {
        let output = ScanReport::from_result(&sample_result()).to_human_string();
        assert!(output.contains("Matches found:    2"));
        assert!(output.contains("Files scanned:    6/6"));
        assert!(output.contains("[EXACT] [1, 2]"));
        assert!(output.contains("[NEAR] [5, 5]"));
        assert!(output.contains("1s 500ms"));
        assert!(!output.contains("e.json"));
    }

    #[test]
    fn test_results_text_sections() {
        let text = ScanReport::from_result(&sample_result()).to_results_text();
        let near_at = text.find("Near Duplicate Positions:").unwrap();
        let exact_entry = text.find("Position: [1, 2]").unwrap();
        let near_entry = text.find("Position: [5, 5]").unwrap();

        assert!(text.starts_with("Exact Duplicate Positions:\n"));
        assert!(exact_entry < near_at);
        assert!(near_entry > near_at);
        assert!(text.contains("Files:\nc.json\nd.json\n"));
    }

    #[test]
    fn test_save_picks_format_by_extension() {
        let dir = tempdir().unwrap();
        let report = ScanReport::from_result(&sample_result());

        let json_path = dir.path().join("out").join("results.json");
        report.save(&json_path).unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(parsed["matches_found"], 2);
        assert_eq!(parsed["groups"][1]["kind"], "near");

        let text_path = dir.path().join("results.txt");
        report.save(&text_path).unwrap();
        assert!(fs::read_to_string(&text_path)
            .unwrap()
            .starts_with("Exact Duplicate Positions:"));
    }
}
