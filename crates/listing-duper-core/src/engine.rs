use std::time::Instant;
use tracing::{debug, info};

use crate::analysis::{AnnotatedTable, ColumnMap, DataQualityReport, DuplicateGrouper, GroupAccumulator};
use crate::batch::optimal_chunk_size;
use crate::config::AppConfig;
use crate::error::Error;
use crate::export::ExportFilter;
use crate::ingest::{parse_with_report, Table};
use crate::pipeline::{Phase, PipelineResult, StepSummary};
use crate::progress::ProgressReporter;

/// One-pass detection pipeline for data sets small enough to finish in a
/// single call.
pub struct DetectionEngine {
    config: AppConfig,
}

impl DetectionEngine {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Whether a data set of `rows` data rows should go through the chunked controller instead.
    pub fn needs_chunking(&self, rows: usize) -> bool {
        rows >= self.config.detection.chunked_threshold_rows
    }

    /// Run the full pipeline:
    /// 1. Parse the CSV and resolve columns
    /// 2. Group rows by normalized title, in batch-sized windows
    /// 3. Build the annotated table and data-quality report
    /// 4. Select End rows for export
    pub fn run(&self, csv_text: &str, reporter: &dyn ProgressReporter) -> Result<PipelineResult, Error> {
        let mut steps = Vec::with_capacity(Phase::PIPELINE.len());

        // Phase 1: Import
        reporter.on_import_start();
        let import_start = Instant::now();
        let parsed = parse_with_report(csv_text);
        let table = Table::from_rows(parsed.rows).ok_or(Error::EmptyInput)?;
        let columns = ColumnMap::resolve(&table.header, &self.config.columns)?;
        let import_duration = import_start.elapsed();
        reporter.on_import_complete(table.len(), import_duration.as_secs_f64());
        steps.push(step(Phase::Import, format!("Imported {} rows", table.len()), import_start));

        // Phase 2: Detect
        let detect_start = Instant::now();
        let grouper = DuplicateGrouper::new(columns, &self.config.detection);
        let mut acc = GroupAccumulator::new();
        let window = optimal_chunk_size(table.len());
        reporter.on_detect_start(table.len());
        let mut processed = 0;
        while processed < table.len() {
            let end = (processed + window).min(table.len());
            grouper.ingest(&mut acc, &table, processed..end);
            processed = end;
            reporter.on_detect_progress(processed, table.len());
        }
        debug!(
            "Detect completed in {:.2}s: {} distinct titles",
            detect_start.elapsed().as_secs_f64(),
            acc.distinct_titles()
        );
        steps.push(step(
            Phase::Detect,
            format!("Scanned {} rows, {} duplicate groups", table.len(), acc.duplicate_key_count()),
            detect_start,
        ));

        // Phase 3: Analyze
        let analyze_start = Instant::now();
        let report = grouper.finish(&acc, &table);
        let annotated = AnnotatedTable::from_groups(&table.header, &report.groups);
        let quality = DataQualityReport::build(&table, &parsed.report, &columns);
        reporter.on_detect_complete(report.duplicate_groups, detect_start.elapsed().as_secs_f64());
        steps.push(step(Phase::Analyze, report.message(), analyze_start));

        // Phase 4: Export
        let export_start = Instant::now();
        let export = ExportFilter::new(columns, &self.config.export).filter(&annotated);
        reporter.on_export_complete(export.item_count(), export_start.elapsed().as_secs_f64());
        steps.push(step(Phase::Export, export.message(), export_start));

        let result = PipelineResult {
            success: true,
            steps,
            duplicate_groups: report.duplicate_groups,
            duplicate_items: report.duplicate_items,
            export_count: export.item_count(),
            quality,
            annotated,
            export,
        };
        info!("{}", result.message());
        Ok(result)
    }

    /// Like [`run`](Self::run) for raw file bytes. Non-UTF-8 input is empty input.
    pub fn run_bytes(&self, bytes: &[u8], reporter: &dyn ProgressReporter) -> Result<PipelineResult, Error> {
        let text = std::str::from_utf8(bytes).map_err(|_| Error::EmptyInput)?;
        self.run(text, reporter)
    }
}

fn step(phase: Phase, message: String, started: Instant) -> StepSummary {
    StepSummary {
        phase,
        message,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}
