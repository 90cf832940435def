use anyhow::{bail, Context, Result};
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use fraudlab::pipeline::{run, PipelineConfig, PipelineReport};
use std::io::{stdout, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "fraudlab=info".into()))
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().map(PathBuf::from);
    if args.next().is_some() {
        bail!("usage: fraudlab [CONFIG.toml]");
    }

    let config = PipelineConfig::load(config_path.as_deref()).context("loading configuration")?;
    info!(data = %config.data.path.display(), models = config.models.roster.len(), "configuration loaded");

    let report = run(&config)?;
    print_report(&report)?;
    if let Some(path) = &config.output.report {
        info!(path = %path.display(), "report saved");
    }
    Ok(())
}

fn section(out: &mut impl Write, title: &str) -> Result<()> {
    execute!(
        out,
        SetForegroundColor(Color::Cyan),
        Print(format!("\n{}\n", title)),
        ResetColor,
        SetForegroundColor(Color::DarkGrey),
        Print(format!("{}\n", "-".repeat(title.len()))),
        ResetColor
    )?;
    Ok(())
}

fn print_report(report: &PipelineReport) -> Result<()> {
    let mut out = stdout();

    section(&mut out, "Dataset")?;
    writeln!(out, "rows loaded      {}", report.loaded.rows)?;
    writeln!(out, "class balance    {}", report.loaded.counts)?;
    for col in &report.loaded.columns {
        writeln!(
            out,
            "{:<16} min {:.2}  max {:.2}  mean {:.2}",
            col.name, col.min, col.max, col.mean
        )?;
    }
    match &report.dedupe {
        Some(dedupe) => writeln!(out, "deduplicated     {}", dedupe)?,
        None => writeln!(out, "deduplicated     skipped")?,
    }
    writeln!(out, "after SMOTE      {}", report.balanced)?;
    writeln!(out, "train / test     {} / {}", report.train_rows, report.test_rows)?;

    section(&mut out, "Holdout evaluation")?;
    write!(out, "{}", report.holdout)?;

    let title = if report.cv.rebalanced_per_fold {
        format!("{}-fold cross-validation (training folds oversampled)", report.cv.folds)
    } else {
        format!("{}-fold cross-validation", report.cv.folds)
    };
    section(&mut out, &title)?;
    write!(out, "{}", report.cv)?;

    execute!(
        out,
        SetForegroundColor(Color::Green),
        Print("\nDone.\n"),
        ResetColor
    )?;
    Ok(())
}
