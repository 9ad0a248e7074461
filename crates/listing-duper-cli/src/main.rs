mod commands;
mod logging;
mod progress;

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use listing_duper_core::analysis::{normalize, similarity, AnnotatedTable, ColumnMap, NormalizeMode};
use listing_duper_core::export::{write_csv, ExportFilter};
use listing_duper_core::ingest;
use listing_duper_core::storage::{Database, TieredStore};
use listing_duper_core::{
    AppConfig, ChunkedController, DetectionEngine, PipelineResult, ProcessStatus, RunStatus,
};
use progress::CliReporter;
use tracing::{error, info, warn};

const ANNOTATED_FILE: &str = "duplicates_annotated.csv";
const END_ITEMS_FILE: &str = "end_items.csv";

fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match listing_duper_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    let outcome = match args.command {
        Some(Commands::Detect { input, output_dir }) => run_detect(&config, &input, &output_dir),
        Some(Commands::Start { input }) => run_start(&config, &input),
        Some(Commands::Continue {
            process_id,
            output_dir,
        }) => run_continue(&config, &process_id, &output_dir),
        Some(Commands::Status { process_id }) => controller(&config)
            .and_then(|c| Ok(c.status(&process_id)?))
            .map(|status| print_status(&status)),
        Some(Commands::PurgeStale { hours }) => controller(&config).and_then(|c| {
            let purged = c.purge_stale(chrono::Duration::hours(hours))?;
            info!("Purged {} stale processes", purged);
            Ok(())
        }),
        Some(Commands::Export { annotated, output }) => run_export(&config, &annotated, &output),
        Some(Commands::Normalize { title, advanced }) => {
            let mode = if advanced {
                NormalizeMode::Advanced
            } else {
                NormalizeMode::Basic
            };
            println!("{}", normalize(&title, mode));
            Ok(())
        }
        Some(Commands::Similarity { a, b }) => {
            println!("{:.3}", similarity(&a, &b));
            Ok(())
        }
        Some(Commands::PrintConfig) => toml::to_string_pretty(&config)
            .map(|rendered| println!("{}", rendered))
            .context("rendering configuration"),
        Some(Commands::TruncateState) => match prompt_confirm(
            "Are you SURE you want to delete ALL stored processes?",
            Some(false),
        ) {
            Ok(true) => truncate_state(&config),
            _ => process::exit(0),
        },
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = outcome {
        error!("Error: {:#}", err);
        process::exit(1);
    }

    Ok(())
}

fn controller(config: &AppConfig) -> anyhow::Result<ChunkedController> {
    let store = TieredStore::from_config(&config.storage).context("opening process store")?;
    Ok(ChunkedController::new(config.clone(), store))
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    String::from_utf8(bytes).with_context(|| format!("{} is not valid UTF-8", path.display()))
}

fn run_detect(config: &AppConfig, input: &Path, output_dir: &Path) -> anyhow::Result<()> {
    let text = read_input(input)?;
    let engine = DetectionEngine::new(config.clone());
    let data_rows = ingest::count_data_rows(&text);

    let result = if engine.needs_chunking(data_rows) {
        info!(
            "{} rows is over the single-pass threshold; running in chunks",
            data_rows
        );
        let controller = controller(config)?;
        let mut status = controller.start(&text)?;
        loop {
            status = controller.continue_process(&status.process_id)?;
            match status.status {
                RunStatus::Completed | RunStatus::Failed => break,
                RunStatus::Running | RunStatus::Paused => print_status(&status),
            }
        }
        match status.result {
            Some(result) => result,
            None => anyhow::bail!(status.error.unwrap_or_else(|| "run did not complete".to_string())),
        }
    } else {
        engine.run(&text, &CliReporter::new())?
    };

    write_outputs(config, &result, output_dir)
}

fn run_start(config: &AppConfig, input: &Path) -> anyhow::Result<()> {
    let text = read_input(input)?;
    let status = controller(config)?.start(&text)?;
    println!("{}", status.process_id);
    print_status(&status);
    Ok(())
}

fn run_continue(config: &AppConfig, process_id: &str, output_dir: &Path) -> anyhow::Result<()> {
    let status = controller(config)?.continue_process(process_id)?;
    print_status(&status);
    if let Some(result) = &status.result {
        write_outputs(config, result, output_dir)?;
    }
    Ok(())
}

fn run_export(config: &AppConfig, annotated_path: &Path, output: &Path) -> anyhow::Result<()> {
    let text = read_input(annotated_path)?;
    let annotated = AnnotatedTable::from_rendered(&ingest::parse(&text))?;
    if annotated.skipped_rows > 0 {
        warn!(
            "{} annotated rows skipped: unreadable Decision or Position cell",
            annotated.skipped_rows
        );
    }
    let columns = ColumnMap::resolve(&annotated.header, &config.columns)?;
    let outcome = ExportFilter::new(columns, &config.export).filter(&annotated);

    let file = File::create(output).with_context(|| format!("creating {}", output.display()))?;
    write_csv(BufWriter::new(file), &outcome.to_rows(&config.export))?;
    info!("{} -> {}", outcome.message(), output.display());
    Ok(())
}

fn write_outputs(config: &AppConfig, result: &PipelineResult, output_dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    for step in &result.steps {
        info!(
            "{}: {} ({})",
            step.phase,
            step.message,
            format!("{:.2}s", step.duration_secs()).green()
        );
    }

    let quality = &result.quality;
    if quality.repaired_rows() > 0 || quality.fallback_lines > 0 {
        warn!(
            "{} lines needed lenient parsing, {} rows were padded or truncated",
            quality.fallback_lines,
            quality.repaired_rows()
        );
    }
    if quality.missing_titles > 0 || quality.missing_item_ids > 0 {
        warn!(
            "{} rows without a title, {} rows without an item id",
            quality.missing_titles, quality.missing_item_ids
        );
    }

    if result.duplicate_groups == 0 {
        info!("{}", result.message().green());
        return Ok(());
    }

    info!(
        "{} duplicate groups, {} duplicate listings, {} to end",
        format!("{}", result.duplicate_groups).red(),
        format!("{}", result.duplicate_items).red(),
        format!("{}", result.export_count).red(),
    );

    let annotated_path = output_dir.join(ANNOTATED_FILE);
    let file = File::create(&annotated_path)
        .with_context(|| format!("creating {}", annotated_path.display()))?;
    write_csv(BufWriter::new(file), &result.annotated.to_rows())?;
    info!("Annotated listings written to {}", annotated_path.display());

    if result.export_count > 0 {
        let export_path = output_dir.join(END_ITEMS_FILE);
        let file = File::create(&export_path)
            .with_context(|| format!("creating {}", export_path.display()))?;
        write_csv(BufWriter::new(file), &result.export.to_rows(&config.export))?;
        info!("End-item export written to {}", export_path.display());
    }

    Ok(())
}

fn truncate_state(config: &AppConfig) -> anyhow::Result<()> {
    for path in [&config.storage.durable_db_path, &config.storage.cache_db_path] {
        let db = Database::open(path).with_context(|| format!("opening {}", path))?;
        db.truncate_all()?;
        info!("Truncated {}", path);
    }
    Ok(())
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}

fn print_status(status: &ProcessStatus) {
    let label = match status.status {
        RunStatus::Running => "running".cyan(),
        RunStatus::Paused => "paused".yellow(),
        RunStatus::Completed => "completed".green(),
        RunStatus::Failed => "failed".red(),
    };
    info!(
        "Process {} {} in {} phase ({:.0}%)",
        status.process_id, label, status.phase, status.progress_percent
    );
    if let Some(detect) = &status.detect {
        info!(
            "  {}/{} rows scanned, {} duplicate groups so far",
            detect.processed_rows, detect.total_rows, detect.duplicate_group_count
        );
    }
    if let Some(err) = &status.error {
        error!("  {}", err);
    }
}
