//! Subcommand handlers.

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use mythos_ai::{classify_message, user_message_for, Collaborators, DiffusionClient, HostedClient, HostedConfig};
use mythos_batch::{BatchCache, BatchProcessor, BatchStatus, FileKvStore, TaskStatus};
use mythos_shared::constants::BATCH_STATE_KEY;
use mythos_shared::GenerationSettings;
use mythos_store::{History, ImportMode, ImportSource};
use tracing::info;

use crate::cli::{BatchCommand, Command};
use crate::config::AppConfig;

pub async fn dispatch(command: Command, config: &AppConfig) -> Result<()> {
    match command {
        Command::Batch(batch) => run_batch(batch, config).await,
        Command::List => list(config),
        Command::Rename { id, name } => {
            open_history(config)?.update_creation_name(id, &name)?;
            println!("Renamed {id} to \"{name}\"");
            Ok(())
        }
        Command::Translated { id, value } => {
            open_history(config)?.update_creation_translated_status(id, value)?;
            println!("{id} translated = {value}");
            Ok(())
        }
        Command::Delete { id } => {
            if open_history(config)?.delete_creation(id)? {
                println!("Deleted {id}");
            } else {
                println!("No creation {id}");
            }
            Ok(())
        }
        Command::Export { path } => export(config, path),
        Command::Import { path, replace } => import(config, &path, replace),
        Command::ClearAll { yes } => {
            if !yes {
                bail!("clear-all deletes every creation; pass --yes to confirm");
            }
            open_history(config)?.clear_all_data()?;
            println!("All data cleared");
            Ok(())
        }
        Command::Stats => {
            let stats = open_history(config)?.stats()?;
            println!("creations: {}", stats.creations);
            println!("images:    {}", stats.images);
            println!("outputs:   {}", stats.outputs);
            Ok(())
        }
    }
}

fn open_history(config: &AppConfig) -> Result<History> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating {}", config.data_dir.display()))?;
    let history = History::open_at(&config.db_path()).context("opening the creation store")?;
    Ok(history)
}

// ---------------------------------------------------------------------------
// Gallery
// ---------------------------------------------------------------------------

fn list(config: &AppConfig) -> Result<()> {
    let creations = open_history(config)?.creations()?;
    if creations.is_empty() {
        println!("No creations yet");
        return Ok(());
    }
    for c in creations {
        let when = chrono::DateTime::from_timestamp_millis(c.created_at)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let translated = if c.is_translated { " [translated]" } else { "" };
        println!(
            "{}  {when}  {:<10}  {} ({}){translated}",
            c.id,
            c.kind(),
            c.name,
            c.params.culture()
        );
    }
    Ok(())
}

fn export(config: &AppConfig, path: Option<PathBuf>) -> Result<()> {
    let archive = open_history(config)?.export_data()?;
    let target = match path {
        Some(p) if p.is_dir() => p.join(&archive.file_name),
        Some(p) => p,
        None => PathBuf::from(&archive.file_name),
    };
    std::fs::write(&target, &archive.bytes)
        .with_context(|| format!("writing {}", target.display()))?;
    println!("Exported {} bytes to {}", archive.bytes.len(), target.display());
    Ok(())
}

fn import(config: &AppConfig, path: &Path, replace: bool) -> Result<()> {
    let source = ImportSource::from_path(path).with_context(|| format!("reading {}", path.display()))?;
    let mode = if replace { ImportMode::Replace } else { ImportMode::Merge };
    let stats = open_history(config)?.import_data(&source, mode)?;
    println!(
        "Imported {} creations, {} images, {} outputs",
        stats.creations_imported, stats.images_imported, stats.outputs_imported
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

fn build_processor(config: &AppConfig) -> Result<BatchProcessor> {
    let history = Arc::new(Mutex::new(open_history(config)?));

    let hosted = Arc::new(HostedClient::new(HostedConfig {
        api_base: config.api_base.clone(),
        api_key: config.api_key.clone(),
        text_model: config.text_model.clone(),
        image_model: config.image_model.clone(),
        request_timeout: config.task_timeout,
    })?);
    let diffusion = Arc::new(DiffusionClient::new(
        config.diffusion_url.clone(),
        config.task_timeout,
    )?);
    let collaborators = Collaborators {
        text: hosted.clone(),
        hosted,
        diffusion,
    };

    let store = FileKvStore::open(&config.cache_dir(), config.cache_quota_bytes)?;
    let cache = BatchCache::new(Arc::new(store), BATCH_STATE_KEY);

    Ok(BatchProcessor::new(collaborators, history, cache, config.task_timeout))
}

async fn run_batch(command: BatchCommand, config: &AppConfig) -> Result<()> {
    let mut processor = build_processor(config)?;

    let starts_new = matches!(command, BatchCommand::Run { .. });
    if !starts_new && !processor.restore()? {
        println!("No saved batch");
        return Ok(());
    }

    match command {
        BatchCommand::Run {
            file,
            culture,
            style,
            aspect,
            quality,
            provider,
            negative_prompt,
        } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let defaults = GenerationSettings::default();
            let settings = GenerationSettings {
                default_culture: culture.unwrap_or_else(|| config.default_culture.clone()),
                style: style.unwrap_or(defaults.style),
                aspect_ratio: aspect.unwrap_or(defaults.aspect_ratio),
                quality: quality.unwrap_or(defaults.quality),
                provider: provider.unwrap_or(defaults.provider),
                negative_prompt,
            };
            if processor.submit(&text, settings) == 0 {
                bail!("{} has no prompt lines", file.display());
            }
            let status = with_cancellation(&mut processor, RunKind::Pending).await;
            print_tasks(&processor, status);
        }
        BatchCommand::Resume => {
            let status = with_cancellation(&mut processor, RunKind::Pending).await;
            print_tasks(&processor, status);
        }
        BatchCommand::RetryAll => {
            let status = with_cancellation(&mut processor, RunKind::RetryAll).await;
            print_tasks(&processor, status);
        }
        BatchCommand::Retry { task } => {
            let outcome = processor.retry(task_index(task)?).await?;
            report_task(&processor, task, outcome);
        }
        BatchCommand::Edit { task, text } => {
            let outcome = processor.edit_and_retry(task_index(task)?, &text).await?;
            report_task(&processor, task, outcome);
        }
        BatchCommand::Repair { task } => {
            let outcome = processor.repair_and_retry(task_index(task)?).await?;
            report_task(&processor, task, outcome);
        }
        BatchCommand::Prune { task } => {
            let removed = processor.prune(task_index(task)?)?;
            println!("Removed \"{}\" from the batch", removed.prompt);
        }
        BatchCommand::Status => print_tasks(&processor, processor.status()),
        BatchCommand::Clear => {
            processor.clear()?;
            println!("Saved batch cleared");
        }
    }
    Ok(())
}

enum RunKind {
    Pending,
    RetryAll,
}

/// Drive a run while Ctrl+C sets the cancellation flag and progress is
/// printed to stderr.
async fn with_cancellation(processor: &mut BatchProcessor, kind: RunKind) -> BatchStatus {
    let flag = processor.cancel_flag();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling after the current task...");
            flag.store(true, Ordering::SeqCst);
        }
    });

    let mut progress = processor.progress();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let p = *progress.borrow();
            if p.running && p.total > 0 {
                eprintln!("[{}/{}]", p.current, p.total);
            }
        }
    });

    let status = match kind {
        RunKind::Pending => processor.run().await,
        RunKind::RetryAll => processor.retry_all().await,
    };
    ctrl_c.abort();
    reporter.abort();
    info!(?status, "batch finished");
    status
}

fn task_index(task: usize) -> Result<usize> {
    if task == 0 {
        bail!("tasks are numbered from 1");
    }
    Ok(task - 1)
}

fn report_task(processor: &BatchProcessor, number: usize, outcome: TaskStatus) {
    println!("Task {number}: {outcome}");
    if let Some(task) = processor.tasks().get(number - 1) {
        print_detail(task);
    }
}

fn print_tasks(processor: &BatchProcessor, status: BatchStatus) {
    for (i, task) in processor.tasks().iter().enumerate() {
        let culture = task.culture_or(&processor.settings().default_culture);
        println!("{:>3}. [{:<10}] {culture}; {}", i + 1, task.status, task.prompt);
        print_detail(task);
    }
    println!(
        "{} tasks: {} done, {} failed, {} pending",
        status.total, status.success, status.error, status.pending
    );
    if let Some(warning) = processor.storage_warning() {
        eprintln!("warning: {warning}");
    }
}

fn print_detail(task: &mythos_batch::BatchTask) {
    if let Some(result) = &task.result {
        println!("       -> {} ({})", result.name, result.creation_id);
    }
    if let Some(error) = &task.error {
        println!("       !! {error}");
        println!("          {}", user_message_for(classify_message(error)));
    }
}
