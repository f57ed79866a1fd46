//! CLI module - Command line interface definitions and handlers

pub mod scan;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use crate::config::{generate_sample_config, Config};
use crate::core::ScanOptions;
use crate::group::NearPolicy;

/// posdup - Find JSON documents that share a position
///
/// Groups `*.json` files by their `position` array, either exactly (after
/// rounding) or within a tolerance, and can tidy fields in place while
/// scanning.
#[derive(Parser, Debug)]
#[command(name = "posdup")]
#[command(version)]
#[command(about = "Find exact and near duplicate positions in JSON files", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Config file (default: platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a directory and group files by position
    Scan(ScanArgs),

    /// Show, create or locate the config file
    Config(ConfigArgs),
}

#[derive(Debug, Clone, Parser)]
pub struct ScanArgs {
    /// Directory to scan
    #[arg(required = true)]
    pub root: PathBuf,

    /// File-name suffix filter (e.g. *.json)
    #[arg(long, short)]
    pub pattern: Option<String>,

    /// Decimal places used to compare positions (negative = exact values)
    #[arg(long, short, allow_negative_numbers = true)]
    pub decimals: Option<i32>,

    /// Also group positions within --tolerance of each other
    #[arg(long, short, overrides_with = "no_near")]
    pub near: bool,

    /// Only group identical rounded positions
    #[arg(long, overrides_with = "near")]
    pub no_near: bool,

    /// Largest per-component difference still counted as near
    #[arg(long, short)]
    pub tolerance: Option<f64>,

    /// Which group a near position joins when several qualify
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// Set "name" to the file name without extension
    #[arg(long, overrides_with = "no_update_name")]
    pub update_name: bool,

    /// Leave "name" alone even if the config updates it
    #[arg(long, overrides_with = "update_name")]
    pub no_update_name: bool,

    /// Remove the "description" field
    #[arg(long, overrides_with = "no_remove_description")]
    pub remove_description: bool,

    /// Keep "description" even if the config removes it
    #[arg(long, overrides_with = "remove_description")]
    pub no_remove_description: bool,

    /// Set "name" to an empty string
    #[arg(long, overrides_with = "no_clear_name")]
    pub clear_name: bool,

    /// Keep "name" even if the config clears it
    #[arg(long, overrides_with = "clear_name")]
    pub no_clear_name: bool,

    /// Rewrite "position" rounded to --decimals
    #[arg(long, overrides_with = "no_round_in_file")]
    pub round_in_file: bool,

    /// Leave "position" as written on disk
    #[arg(long, overrides_with = "round_in_file")]
    pub no_round_in_file: bool,

    /// Skip hidden files
    #[arg(long, overrides_with = "no_skip_hidden")]
    pub skip_hidden: bool,

    /// Include hidden files even if the config skips them
    #[arg(long, overrides_with = "skip_hidden")]
    pub no_skip_hidden: bool,

    /// Maximum depth to traverse
    #[arg(long)]
    pub depth: Option<usize>,

    /// Output format for report
    #[arg(long, value_enum, default_value = "human")]
    pub report: ReportFormat,

    /// Save results (JSON for .json paths, text otherwise)
    #[arg(long, short)]
    pub save: Option<PathBuf>,

    /// Only act on groups with a member matching this path prefix or glob
    #[arg(long)]
    pub select: Option<String>,

    /// Delete every duplicate except the first file of each group
    #[arg(long, conflicts_with = "move_to")]
    pub purge: bool,

    /// Move every duplicate except the first file of each group here
    #[arg(long)]
    pub move_to: Option<PathBuf>,

    /// Keep paths relative to the scan root when moving
    #[arg(long, requires = "move_to")]
    pub preserve_tree: bool,

    /// Show what --purge or --move-to would do without touching files
    #[arg(long)]
    pub dry_run: bool,
}

impl ScanArgs {
    /// Overlay command line flags on config-derived options.
    pub fn apply_to(&self, options: &mut ScanOptions) {
        if let Some(pattern) = &self.pattern {
            options.file_pattern = pattern.clone();
        }
        if let Some(decimals) = self.decimals {
            options.rounding_decimals = decimals;
        }
        toggle(
            &mut options.matching.find_near_duplicates,
            self.near,
            self.no_near,
        );
        if let Some(tolerance) = self.tolerance {
            options.matching.tolerance = tolerance;
        }
        if let Some(policy) = self.policy {
            options.matching.near_policy = policy.into();
        }

        let edits = &mut options.mutations;
        toggle(
            &mut edits.update_name_from_filename,
            self.update_name,
            self.no_update_name,
        );
        toggle(
            &mut edits.remove_description,
            self.remove_description,
            self.no_remove_description,
        );
        toggle(&mut edits.clear_name, self.clear_name, self.no_clear_name);
        toggle(
            &mut edits.round_positions_in_file,
            self.round_in_file,
            self.no_round_in_file,
        );

        toggle(&mut options.skip_hidden, self.skip_hidden, self.no_skip_hidden);
        if self.depth.is_some() {
            options.max_depth = self.depth;
        }
    }
}

/// Apply an `--x` / `--no-x` pair; clap keeps only the last one given.
fn toggle(value: &mut bool, on: bool, off: bool) {
    if on {
        *value = true;
    } else if off {
        *value = false;
    }
}

#[derive(Debug, Clone, Parser)]
pub struct ConfigArgs {
    /// Write the sample config if no config file exists yet
    #[arg(long, conflicts_with = "path")]
    pub init: bool,

    /// Print the config file path
    #[arg(long)]
    pub path: bool,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum ReportFormat {
    /// Human readable (default)
    #[default]
    Human,
    /// JSON output
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    /// Earliest group within tolerance
    FirstFit,
    /// Closest group within tolerance
    BestFit,
}

impl From<PolicyArg> for NearPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::FirstFit => NearPolicy::FirstFit,
            PolicyArg::BestFit => NearPolicy::BestFit,
        }
    }
}

/// Handle `posdup config`.
pub fn run_config(args: &ConfigArgs, config_path: Option<PathBuf>) -> Result<()> {
    let path = config_path.unwrap_or_else(Config::default_path);

    if args.path {
        println!("{}", path.display());
    } else if args.init {
        if Config::ensure_exists(&path)? {
            println!("{} Wrote sample config to {}", "✓".green(), path.display());
        } else {
            println!(
                "{} Config already exists at {}",
                "•".bright_cyan(),
                path.display()
            );
        }
    } else {
        print!("{}", generate_sample_config());
    }

    Ok(())
}
