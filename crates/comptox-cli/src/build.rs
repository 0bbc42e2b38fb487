//! `comptox build`: run the configured pipeline into a snapshot.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use comptox_build::{BuildReport, CancelToken, Orchestrator, StageStatus};
use comptox_graphdb::GraphDb;
use comptox_ingest::PipelineConfig;
use std::path::{Path, PathBuf};

pub struct BuildArgs {
    pub config: PathBuf,
    pub out: Option<PathBuf>,
    pub report: Option<PathBuf>,
    pub resume: bool,
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

fn read_report(path: &Path) -> Result<BuildReport> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("--resume needs the previous report at {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid build report {}", path.display()))
}

pub fn cmd_build(args: &BuildArgs) -> Result<()> {
    let config = PipelineConfig::load(&args.config)?;
    let snapshot = args.out.clone().unwrap_or_else(|| config.snapshot.clone());
    let report_path = args.report.clone().unwrap_or_else(|| config.report.clone());
    let ontology = config.load_ontology()?;
    let importers = config.build_importers()?;

    let (mut db, previous) = if args.resume {
        let previous = read_report(&report_path)?;
        let db = GraphDb::load(&snapshot)
            .with_context(|| format!("--resume needs the previous snapshot at {}", snapshot.display()))?;
        (db, Some(previous))
    } else {
        (GraphDb::new(), None)
    };

    let cancel = CancelToken::new();
    signal_hook::flag::register(signal_hook::consts::SIGINT, cancel.flag())
        .context("failed to install the SIGINT handler")?;

    let mut orchestrator = Orchestrator::new(&ontology).with_cancel(cancel);
    if let Some(previous) = &previous {
        orchestrator = orchestrator.resume_from(previous);
    }
    let report = orchestrator.run(&mut db, importers)?;

    ensure_parent(&snapshot)?;
    db.save(&snapshot)?;
    ensure_parent(&report_path)?;
    std::fs::write(&report_path, serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("failed to write {}", report_path.display()))?;

    print_report(&report);
    eprintln!("{} {}", "wrote".green().bold(), snapshot.display().to_string().bold());
    eprintln!("{} {}", "wrote".green().bold(), report_path.display().to_string().bold());

    if report.was_cancelled() {
        bail!("build cancelled; rerun with --resume to continue");
    }
    if !report.is_success() {
        let failed = report
            .stages
            .iter()
            .filter(|s| !matches!(s.status, StageStatus::Completed | StageStatus::AlreadyCompleted))
            .count();
        bail!("{failed} importer(s) did not complete");
    }
    Ok(())
}

fn print_report(report: &BuildReport) {
    eprintln!("{} {}", "run".bold(), report.run_id);
    for stage in &report.stages {
        let status = match &stage.status {
            StageStatus::Completed => "ok".green().bold(),
            StageStatus::AlreadyCompleted => "done".dimmed(),
            StageStatus::Failed { .. } => "failed".red().bold(),
            StageStatus::SkippedDependencyFailed { .. } => "skipped".yellow().bold(),
            StageStatus::Cancelled => "cancelled".yellow().bold(),
        };
        let r = &stage.result;
        eprintln!(
            "{:>9} {:<16} rows={} created={} merged={} skipped={} edges={} edges_skipped={}",
            status,
            stage.importer,
            r.rows_read,
            r.created,
            r.merged,
            r.rows_skipped(),
            r.edges_created,
            r.edges_skipped()
        );
        match &stage.status {
            StageStatus::Failed { error } => eprintln!("{:>9} {}", "", error.red()),
            StageStatus::SkippedDependencyFailed { dependency } => {
                eprintln!("{:>9} requires `{dependency}`", "")
            }
            _ => {}
        }
    }
    eprintln!(
        "{} nodes={} edges={}",
        "graph".bold(),
        report.node_count,
        report.edge_count
    );
}
