//! Document commands: list, upload, delete

use anyhow::Result;
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use ragbridge_core::{IngestionStatus, TaskId, UploadMode};
use ragbridge_ingestion::{IngestionResult, ProgressEvent, UploadRequest};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tabled::{Table, Tabled};
use tokio::sync::mpsc::unbounded_channel;
use tracing::{info, warn};

use super::confirm;
use crate::context::AppContext;
use crate::output::{self, format_duration, print_structured};
use crate::DocumentCommands;

pub async fn run(ctx: &AppContext, cmd: &DocumentCommands) -> Result<()> {
    match cmd {
        DocumentCommands::List { collection } => list_documents(ctx, collection).await,
        DocumentCommands::Upload {
            collection,
            files,
            mode,
            concurrency,
        } => upload_documents(ctx, collection, files, *mode, *concurrency).await,
        DocumentCommands::Delete {
            collection,
            names,
            force,
        } => delete_documents(ctx, collection, names, *force).await,
    }
}

async fn list_documents(ctx: &AppContext, collection: &str) -> Result<()> {
    let documents = ctx.knowledge_base()?.list_documents(collection).await?;

    if print_structured(&documents, ctx.format)? {
        return Ok(());
    }

    if documents.is_empty() {
        output::dimmed(&format!("No documents in {}.", collection));
        return Ok(());
    }

    #[derive(Tabled)]
    struct DocumentRow {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "ID")]
        id: String,
    }

    let rows: Vec<DocumentRow> = documents
        .iter()
        .map(|d| DocumentRow {
            name: output::truncate(&d.name, 60),
            id: d.id.clone().unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    println!("{}", Table::new(rows));
    Ok(())
}

async fn delete_documents(
    ctx: &AppContext,
    collection: &str,
    names: &[String],
    force: bool,
) -> Result<()> {
    let prompt = format!("Delete {} document(s) from '{}'?", names.len(), collection);
    if !confirm(&prompt, force)? {
        println!("{}", "Cancelled.".yellow());
        return Ok(());
    }

    ctx.knowledge_base()?
        .delete_documents(collection, names)
        .await?;
    output::success(&format!(
        "Deleted {} document(s) from {}",
        names.len(),
        collection.cyan()
    ));
    Ok(())
}

async fn upload_documents(
    ctx: &AppContext,
    collection: &str,
    files: &[PathBuf],
    mode: Option<UploadMode>,
    concurrency: Option<usize>,
) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;
    let mode = mode.unwrap_or(orchestrator.config().default_mode);
    let concurrency = concurrency.unwrap_or(orchestrator.config().batch_concurrency);
    let max_polls = orchestrator.config().max_poll_attempts;
    let show_bars = ctx.format == output::OutputFormat::Text;

    let multi = MultiProgress::new();
    if !show_bars {
        multi.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }
    let style = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.cyan} {prefix:.bold} {msg} {elapsed:.dim}")?;

    let mut bars = HashMap::new();
    let mut requests = Vec::with_capacity(files.len());
    for file in files {
        let id = TaskId::new();
        let bar = multi.add(ProgressBar::new_spinner());
        bar.set_style(style.clone());
        bar.set_prefix(file.display().to_string());
        bar.set_message("queued".dimmed().to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        bars.insert(id.clone(), bar);

        requests.push(
            UploadRequest::new(file, collection)
                .with_mode(mode)
                .with_task_id(id),
        );
    }

    let (tx, mut rx) = unbounded_channel::<ProgressEvent>();
    let renderer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Some(bar) = bars.get(&event.task_id) {
                render(bar, &event, max_polls);
            }
        }
        bars
    });

    let interrupt = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling uploads");
                orchestrator.shutdown();
            }
        })
    };

    info!(
        collection = %collection,
        files = requests.len(),
        mode = %mode,
        concurrency,
        "Starting upload batch"
    );
    let (results, report) = orchestrator
        .upload_batch_with(requests, Arc::new(tx), concurrency)
        .await;
    interrupt.abort();

    let bars = renderer.await?;
    for bar in bars.values() {
        if !bar.is_finished() {
            bar.finish();
        }
    }

    info!(
        completed = report.completed,
        failed = report.failed,
        timed_out = report.timed_out,
        cancelled = report.cancelled,
        "Upload batch finished"
    );

    if !print_structured(&results, ctx.format)? {
        print_summary(&results);
    }

    if !report.all_completed() {
        anyhow::bail!(
            "{} of {} upload(s) did not complete ({} failed, {} timed out, {} cancelled)",
            report.total() - report.completed,
            report.total(),
            report.failed,
            report.timed_out,
            report.cancelled
        );
    }
    Ok(())
}

fn render(bar: &ProgressBar, event: &ProgressEvent, max_polls: u32) {
    match &event.status {
        IngestionStatus::Uploading => bar.set_message("uploading".to_string()),
        IngestionStatus::Processing if event.attempt == 0 => {
            bar.set_message("processing".to_string())
        }
        IngestionStatus::Processing => bar.set_message(format!(
            "processing (poll {}/{})",
            event.attempt, max_polls
        )),
        IngestionStatus::Completed => {
            bar.finish_with_message("completed".green().to_string())
        }
        IngestionStatus::Cancelled => {
            bar.finish_with_message("cancelled".yellow().to_string())
        }
        other => bar.finish_with_message(other.to_string().red().to_string()),
    }
}

fn print_summary(results: &[IngestionResult]) {
    #[derive(Tabled)]
    struct UploadRow {
        #[tabled(rename = "File")]
        file: String,
        #[tabled(rename = "Status")]
        status: String,
        #[tabled(rename = "Elapsed")]
        elapsed: String,
        #[tabled(rename = "Polls")]
        polls: u32,
    }

    let rows: Vec<UploadRow> = results
        .iter()
        .map(|r| UploadRow {
            file: r.file_name.clone(),
            status: output::truncate(&r.status.to_string(), 80),
            elapsed: format_duration(r.elapsed),
            polls: r.poll_attempts,
        })
        .collect();

    println!();
    println!("{}", Table::new(rows));
}
