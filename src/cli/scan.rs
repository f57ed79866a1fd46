//! `posdup scan` - runs a scan with a progress bar, prints the report and
//! applies the requested group actions.

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use super::{ReportFormat, ScanArgs};
use crate::actions::{self, ActionOutcome};
use crate::config::Config;
use crate::core::{Progress, ScanEngine, ScanResult};
use crate::report::ScanReport;

/// Handle `posdup scan`.
pub async fn run_scan(args: &ScanArgs, config: &Config) -> Result<()> {
    if !args.root.is_dir() {
        anyhow::bail!("Not a directory: {}", args.root.display());
    }

    let mut options = config.to_scan_options();
    args.apply_to(&mut options);
    tracing::debug!("Scan options: {:?}", options);

    let engine = ScanEngine::new(options).context("Invalid scan options")?;
    let cancel = engine.cancel_token();

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("Invalid progress template")?
            .progress_chars("█▓▒░"),
    );

    let bar = pb.clone();
    let observer = move |progress: &Progress| {
        bar.set_length(progress.total as u64);
        bar.set_position(progress.current as u64);
        if let Some(name) = progress.path.file_name() {
            bar.set_message(name.to_string_lossy().into_owned());
        }
    };

    let handle = engine.spawn(args.root.clone(), observer)?;

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after the current file");
            cancel.cancel();
        }
    });

    let result = tokio::task::spawn_blocking(move || handle.join())
        .await
        .context("Scan worker failed")??;
    interrupt.abort();
    pb.finish_and_clear();

    let report = ScanReport::from_result(&result);
    match args.report {
        ReportFormat::Human => print!("{}", report.to_human_string()),
        ReportFormat::Json => println!("{}", report.to_json()?),
    }

    if result.cancelled {
        println!(
            "{} Scan was interrupted; results cover {} of {} files",
            "⚠".yellow(),
            result.files_processed,
            result.total_files
        );
    }

    if let Some(path) = &args.save {
        report.save(path)?;
        println!("{} Results saved to {}", "✓".green(), path.display());
    }

    apply_actions(args, &result)
}

fn apply_actions(args: &ScanArgs, result: &ScanResult) -> Result<()> {
    if !args.purge && args.move_to.is_none() {
        if result.matches.duplicate_groups().next().is_some() {
            println!("Run with --purge or --move-to <DIR> to handle duplicates.");
        }
        return Ok(());
    }

    let groups = actions::select_groups(&result.matches, args.select.as_deref())?;
    if groups.is_empty() {
        println!("No duplicate groups selected.");
        return Ok(());
    }

    let outcome = if let Some(dest) = &args.move_to {
        actions::relocate(&groups, &result.root, dest, args.preserve_tree, args.dry_run)
    } else {
        actions::purge(&groups, args.dry_run)
    };

    print_outcome(args, groups.len(), &outcome);
    Ok(())
}

fn print_outcome(args: &ScanArgs, group_count: usize, outcome: &ActionOutcome) {
    let verb = match (&args.move_to, args.dry_run) {
        (Some(_), true) => "Would move",
        (Some(_), false) => "Moved",
        (None, true) => "Would delete",
        (None, false) => "Deleted",
    };

    println!(
        "{} {} {} files from {} groups",
        "✓".green(),
        verb,
        outcome.affected.len(),
        group_count
    );
    if args.dry_run {
        for file in &outcome.affected {
            println!("    {}", file.display());
        }
    }
    if !outcome.is_clean() {
        eprintln!("\n{}", "Errors:".red().bold());
        for err in &outcome.errors {
            eprintln!("  {}", err);
        }
    }
}
