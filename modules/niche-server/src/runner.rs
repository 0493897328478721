//! Drives one run from the command line until it is done.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use niche_engine::{ProgressSummary, RowOutcome, RowReport, RunEngine, RunSpec};
use tracing::{info, warn};

/// Load a TOML run spec. Keys use the same camelCase names as the HTTP body.
pub fn load_run_spec(path: &Path) -> Result<RunSpec> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read run spec: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse run spec: {}", path.display()))
}

/// `start`, then `step` until done. Ctrl-C cancels the run so the remaining
/// rows drain instead of being left mid-flight.
pub async fn run_to_completion(engine: Arc<RunEngine>, spec: RunSpec) -> Result<ProgressSummary> {
    let started = engine.start(spec).await?;
    info!(
        run_id = started.run_id.as_str(),
        rows = started.end_row - started.start_row + 1,
        "Run started"
    );

    let interrupt = {
        let engine = engine.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling run");
                engine.cancel().await;
            }
        })
    };

    let mut reported = 0;
    let result = loop {
        let summary = match engine.step(Some(&started.run_id)).await {
            Ok(summary) => summary,
            Err(e) => break Err(e.into()),
        };
        for report in summary.per_row.iter().skip(reported) {
            println!("{}", row_line(report));
        }
        reported = summary.per_row.len();
        if summary.done {
            break Ok(summary);
        }
    };

    interrupt.abort();
    result
}

pub fn row_line(report: &RowReport) -> String {
    match &report.outcome {
        RowOutcome::Succeeded { leads, .. } => {
            format!("row {:>4}  succeeded  {leads} leads", report.row)
        }
        RowOutcome::Skipped { message } => format!("row {:>4}  skipped    {message}", report.row),
        RowOutcome::Failed { message } => format!("row {:>4}  failed     {message}", report.row),
    }
}

pub fn summary_line(summary: &ProgressSummary) -> String {
    format!(
        "{} rows processed: {} skipped, {} failed, {} leads",
        summary.processed, summary.skipped, summary.failed, summary.total_leads
    )
}
