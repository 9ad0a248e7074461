//! Resumable import → detect → analyze → export runs.
//!
//! Each call to [`ChunkedController::continue_process`] works through bounded
//! steps (one detect chunk, one export window, or a whole short phase),
//! persists the state after every step, and re-checks the wall clock before
//! taking the next one. Once the pause threshold is reached it returns
//! [`RunStatus::Paused`]; the caller re-invokes with the same process id,
//! possibly from another process, since state lives in the [`TieredStore`].

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::state::{AnalyzeState, DetectState, ExportState, PhaseState, ProcessState};
use super::{Phase, PipelineResult, ProcessStatus, RunStatus};
use crate::analysis::{AnnotatedTable, ColumnMap, DataQualityReport, DuplicateGrouper, GroupAccumulator};
use crate::batch::optimal_chunk_size;
use crate::config::AppConfig;
use crate::error::Error;
use crate::export::ExportFilter;
use crate::ingest::{parse_with_report, ParseReport, Table};
use crate::storage::TieredStore;

const STATE_PREFIX: &str = "state:";

fn state_key(process_id: &str) -> String {
    format!("{}{}", STATE_PREFIX, process_id)
}

fn csv_key(process_id: &str) -> String {
    format!("csv:{}", process_id)
}

fn table_key(process_id: &str) -> String {
    format!("table:{}", process_id)
}

fn annotated_key(process_id: &str) -> String {
    format!("annotated:{}", process_id)
}

enum StepOutcome {
    Progressed,
    Finished(Box<PipelineResult>),
}

/// Data loaded from the store at most once per invocation.
#[derive(Default)]
struct StepContext {
    table: Option<Table>,
    annotated: Option<AnnotatedTable>,
}

pub struct ChunkedController {
    config: AppConfig,
    store: TieredStore,
}

impl ChunkedController {
    pub fn new(config: AppConfig, store: TieredStore) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Register a new run over `csv_text`. No work is done until the first
    /// [`continue_process`](Self::continue_process).
    pub fn start(&self, csv_text: &str) -> Result<ProcessStatus, Error> {
        let process_id = Uuid::new_v4().simple().to_string();
        let state = ProcessState::new(process_id.clone());

        self.store.put(&csv_key(&process_id), csv_text)?;
        self.save_state(&state)?;
        info!(
            "Started process {} ({} bytes of CSV)",
            process_id,
            csv_text.len()
        );

        Ok(Self::status_of(&state, RunStatus::Running))
    }

    /// Report progress without doing any work.
    pub fn status(&self, process_id: &str) -> Result<ProcessStatus, Error> {
        let state = self.load_state(process_id)?;
        Ok(Self::status_of(&state, state.run_status()))
    }

    /// Advance the run until it completes, fails, or the time budget is spent.
    pub fn continue_process(&self, process_id: &str) -> Result<ProcessStatus, Error> {
        let invocation_start = Instant::now();
        let pause_after = self.config.chunking.pause_after();
        let mut state = self.load_state(process_id)?;

        if state.failure().is_some() {
            return Ok(Self::status_of(&state, RunStatus::Failed));
        }

        let mut ctx = StepContext::default();
        loop {
            let phase = state.phase.phase();
            let step_start = Instant::now();
            let outcome = self.step(&mut state, &mut ctx);
            state.phase_elapsed_ms += step_start.elapsed().as_millis() as u64;

            match outcome {
                Ok(StepOutcome::Progressed) => {}
                Ok(StepOutcome::Finished(result)) => {
                    self.cleanup(process_id);
                    info!("Process {} completed: {}", process_id, result.message());
                    let mut status = Self::status_of(&state, RunStatus::Completed);
                    status.phase = Phase::Completed;
                    status.progress_percent = 100.0;
                    status.result = Some(*result);
                    return Ok(status);
                }
                Err(e) => {
                    error!("Process {}: {} phase failed: {}", process_id, phase, e);
                    state.fail(phase, e.to_string());
                    if let Err(save_err) = self.save_state(&state) {
                        warn!("Could not persist failure for {}: {}", process_id, save_err);
                    }
                    return Ok(Self::status_of(&state, RunStatus::Failed));
                }
            }

            state.paused = invocation_start.elapsed() >= pause_after;
            self.save_state(&state)?;

            if state.paused {
                debug!(
                    "Process {} pausing in {} after {:.2}s",
                    process_id,
                    state.phase.phase(),
                    invocation_start.elapsed().as_secs_f64()
                );
                return Ok(Self::status_of(&state, RunStatus::Paused));
            }
        }
    }

    /// Delete runs started more than `max_age` ago. Returns how many were removed.
    pub fn purge_stale(&self, max_age: chrono::Duration) -> Result<usize, Error> {
        let cutoff = Utc::now() - max_age;
        let mut purged = 0;

        for key in self.store.keys(STATE_PREFIX)? {
            let process_id = &key[STATE_PREFIX.len()..];
            let stale = match self.load_json::<ProcessState>(&key) {
                Ok(Some(state)) => state.started_at < cutoff,
                Ok(None) => false,
                Err(e) => {
                    warn!("Unreadable state '{}', purging: {}", key, e);
                    true
                }
            };
            if stale {
                self.cleanup(process_id);
                purged += 1;
            }
        }

        if purged > 0 {
            info!("Purged {} stale processes", purged);
        }
        Ok(purged)
    }

    fn step(&self, state: &mut ProcessState, ctx: &mut StepContext) -> Result<StepOutcome, Error> {
        let process_id = state.process_id.clone();
        match &mut state.phase {
            PhaseState::Import => {
                let (next, message) = self.run_import(&process_id, ctx)?;
                state.advance(next, message);
                Ok(StepOutcome::Progressed)
            }
            PhaseState::Detect(detect) => {
                let table = self.table(&process_id, ctx)?;
                let grouper = DuplicateGrouper::new(detect.columns, &self.config.detection);
                let start = detect.processed_rows;
                let end = (start + detect.chunk_size).min(detect.total_rows);

                grouper.ingest(&mut detect.accumulator, table, start..end);
                detect.processed_rows = end;
                detect.duplicate_group_count = detect.accumulator.duplicate_key_count();
                debug!(
                    "Detect chunk {}..{} of {}: {} duplicate groups so far",
                    start, end, detect.total_rows, detect.duplicate_group_count
                );

                if detect.processed_rows >= detect.total_rows {
                    let message = format!(
                        "Scanned {} rows, {} duplicate groups",
                        detect.total_rows, detect.duplicate_group_count
                    );
                    let next = PhaseState::Analyze(AnalyzeState {
                        columns: detect.columns,
                        parse_report: detect.parse_report,
                        accumulator: std::mem::take(&mut detect.accumulator),
                    });
                    state.advance(next, message);
                }
                Ok(StepOutcome::Progressed)
            }
            PhaseState::Analyze(analyze) => {
                let columns = analyze.columns;
                let parse_report = analyze.parse_report;
                let accumulator = std::mem::take(&mut analyze.accumulator);
                let (next, message) =
                    self.run_analyze(&process_id, ctx, columns, &parse_report, &accumulator)?;
                state.advance(next, message);
                Ok(StepOutcome::Progressed)
            }
            PhaseState::Export(export) => {
                let annotated = self.annotated(&process_id, ctx)?;
                let filter = ExportFilter::new(export.columns, &self.config.export);
                let start = export.processed_rows;
                let end = (start + export.chunk_size).min(export.total_rows);
                filter.extend(&mut export.outcome, annotated.rows.get(start..end).unwrap_or(&[]));
                export.processed_rows = end;

                if export.processed_rows < export.total_rows {
                    return Ok(StepOutcome::Progressed);
                }

                let export = export.clone();
                let annotated = ctx.annotated.take().unwrap_or_default();
                state.record_step(export.outcome.message());
                Ok(StepOutcome::Finished(Box::new(PipelineResult {
                    success: true,
                    steps: state.steps.clone(),
                    duplicate_groups: export.duplicate_groups,
                    duplicate_items: export.duplicate_items,
                    export_count: export.outcome.item_count(),
                    quality: export.quality,
                    annotated,
                    export: export.outcome,
                })))
            }
            PhaseState::Failed(f) => Err(Error::Other(format!(
                "process already failed in {} phase",
                f.phase
            ))),
        }
    }

    fn run_import(
        &self,
        process_id: &str,
        ctx: &mut StepContext,
    ) -> Result<(PhaseState, String), Error> {
        let csv_text = self
            .store
            .get(&csv_key(process_id))?
            .ok_or_else(|| Error::Storage(format!("CSV input for '{}' is missing", process_id)))?;

        let parsed = parse_with_report(&csv_text);
        let table = Table::from_rows(parsed.rows).ok_or(Error::EmptyInput)?;
        let columns = ColumnMap::resolve(&table.header, &self.config.columns)?;

        self.save_json(&table_key(process_id), &table)?;
        self.store.delete(&csv_key(process_id))?;

        let total_rows = table.len();
        let message = format!("Imported {} rows", total_rows);
        info!("Process {}: {}", process_id, message);
        ctx.table = Some(table);

        let next = PhaseState::Detect(DetectState {
            chunk_size: self.config.chunking.detect_chunk_size.max(1),
            processed_rows: 0,
            total_rows,
            duplicate_group_count: 0,
            columns,
            parse_report: parsed.report,
            accumulator: GroupAccumulator::new(),
        });
        Ok((next, message))
    }

    fn run_analyze(
        &self,
        process_id: &str,
        ctx: &mut StepContext,
        columns: ColumnMap,
        parse_report: &ParseReport,
        accumulator: &GroupAccumulator,
    ) -> Result<(PhaseState, String), Error> {
        let table = self.table(process_id, ctx)?;
        let grouper = DuplicateGrouper::new(columns, &self.config.detection);
        let report = grouper.finish(accumulator, table);
        let annotated = AnnotatedTable::from_groups(&table.header, &report.groups);
        let quality = DataQualityReport::build(table, parse_report, &columns);

        self.save_json(&annotated_key(process_id), &annotated)?;
        let message = report.message();
        info!("Process {}: {}", process_id, message);

        let total_rows = annotated.len();
        ctx.annotated = Some(annotated);

        let next = PhaseState::Export(ExportState {
            columns,
            chunk_size: optimal_chunk_size(total_rows),
            processed_rows: 0,
            total_rows,
            duplicate_groups: report.duplicate_groups,
            duplicate_items: report.duplicate_items,
            quality,
            outcome: Default::default(),
        });
        Ok((next, message))
    }

    fn table<'a>(&self, process_id: &str, ctx: &'a mut StepContext) -> Result<&'a Table, Error> {
        if ctx.table.is_none() {
            let table = self
                .load_json::<Table>(&table_key(process_id))?
                .ok_or_else(|| Error::Storage(format!("imported table for '{}' is missing", process_id)))?;
            ctx.table = Some(table);
        }
        ctx.table
            .as_ref()
            .ok_or_else(|| Error::Other("table cache empty".to_string()))
    }

    fn annotated<'a>(
        &self,
        process_id: &str,
        ctx: &'a mut StepContext,
    ) -> Result<&'a AnnotatedTable, Error> {
        if ctx.annotated.is_none() {
            let annotated = self
                .load_json::<AnnotatedTable>(&annotated_key(process_id))?
                .ok_or_else(|| {
                    Error::Storage(format!("annotated table for '{}' is missing", process_id))
                })?;
            ctx.annotated = Some(annotated);
        }
        ctx.annotated
            .as_ref()
            .ok_or_else(|| Error::Other("annotated cache empty".to_string()))
    }

    fn load_state(&self, process_id: &str) -> Result<ProcessState, Error> {
        self.load_json(&state_key(process_id))?
            .ok_or_else(|| Error::StateNotFound(process_id.to_string()))
    }

    fn save_state(&self, state: &ProcessState) -> Result<(), Error> {
        self.save_json(&state_key(&state.process_id), state)
    }

    fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error> {
        match self.store.get(key)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), Error> {
        let json = serde_json::to_string(value)?;
        self.store.put(key, &json)
    }

    fn cleanup(&self, process_id: &str) {
        for key in [
            state_key(process_id),
            csv_key(process_id),
            table_key(process_id),
            annotated_key(process_id),
        ] {
            if let Err(e) = self.store.delete(&key) {
                warn!("Could not delete '{}': {}", key, e);
            }
        }
    }

    fn status_of(state: &ProcessState, status: RunStatus) -> ProcessStatus {
        ProcessStatus {
            process_id: state.process_id.clone(),
            status,
            phase: state.phase.phase(),
            progress_percent: state.progress_percent(),
            detect: state.detect_progress(),
            error: state.failure().map(|f| {
                Error::PhaseFailed {
                    phase: f.phase,
                    message: f.message.clone(),
                }
                .to_string()
            }),
            result: None,
        }
    }
}
