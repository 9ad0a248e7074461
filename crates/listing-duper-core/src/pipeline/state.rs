use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DetectProgress, Phase, RunStatus, StepSummary};
use crate::analysis::{ColumnMap, DataQualityReport, GroupAccumulator};
use crate::export::ExportOutcome;
use crate::ingest::ParseReport;

/// Persisted progress of one chunked run. Each phase variant carries only
/// the fields that phase needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessState {
    pub process_id: String,
    pub started_at: DateTime<Utc>,
    pub current_phase_index: usize,
    pub total_phases: usize,
    pub steps: Vec<StepSummary>,
    /// Time spent in the current phase across invocations.
    pub phase_elapsed_ms: u64,
    /// Whether the last invocation stopped on the time budget.
    #[serde(default)]
    pub paused: bool,
    pub phase: PhaseState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum PhaseState {
    Import,
    Detect(DetectState),
    Analyze(AnalyzeState),
    Export(ExportState),
    Failed(FailureState),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectState {
    pub chunk_size: usize,
    pub processed_rows: usize,
    pub total_rows: usize,
    pub duplicate_group_count: usize,
    pub columns: ColumnMap,
    pub parse_report: ParseReport,
    pub accumulator: GroupAccumulator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeState {
    pub columns: ColumnMap,
    pub parse_report: ParseReport,
    pub accumulator: GroupAccumulator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportState {
    pub columns: ColumnMap,
    pub chunk_size: usize,
    pub processed_rows: usize,
    pub total_rows: usize,
    pub duplicate_groups: usize,
    pub duplicate_items: usize,
    pub quality: DataQualityReport,
    pub outcome: ExportOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureState {
    pub phase: Phase,
    pub message: String,
}

impl PhaseState {
    pub fn phase(&self) -> Phase {
        match self {
            PhaseState::Import => Phase::Import,
            PhaseState::Detect(_) => Phase::Detect,
            PhaseState::Analyze(_) => Phase::Analyze,
            PhaseState::Export(_) => Phase::Export,
            PhaseState::Failed(_) => Phase::Failed,
        }
    }
}

impl ProcessState {
    pub fn new(process_id: String) -> Self {
        Self {
            process_id,
            started_at: Utc::now(),
            current_phase_index: 0,
            total_phases: Phase::PIPELINE.len(),
            steps: Vec::new(),
            phase_elapsed_ms: 0,
            paused: false,
            phase: PhaseState::Import,
        }
    }

    /// Record a summary for the current phase.
    pub fn record_step(&mut self, message: String) {
        self.steps.push(StepSummary {
            phase: self.phase.phase(),
            message,
            duration_ms: self.phase_elapsed_ms,
        });
    }

    /// Move to the next phase, recording a summary of the one just finished.
    pub fn advance(&mut self, next: PhaseState, message: String) {
        self.record_step(message);
        self.phase_elapsed_ms = 0;
        self.phase = next;
        self.current_phase_index = self.phase.phase().index().min(self.total_phases);
    }

    pub fn fail(&mut self, phase: Phase, message: String) {
        self.phase = PhaseState::Failed(FailureState { phase, message });
    }

    pub fn progress_percent(&self) -> f64 {
        let fraction = |done: usize, total: usize| {
            if total == 0 {
                0.0
            } else {
                done.min(total) as f64 / total as f64
            }
        };
        let within = match &self.phase {
            PhaseState::Detect(d) => fraction(d.processed_rows, d.total_rows),
            PhaseState::Export(e) => fraction(e.processed_rows, e.total_rows),
            _ => 0.0,
        };
        let index = match &self.phase {
            PhaseState::Failed(f) => f.phase.index(),
            _ => self.current_phase_index,
        };
        ((index as f64 + within) / self.total_phases as f64 * 100.0).min(100.0)
    }

    pub fn detect_progress(&self) -> Option<DetectProgress> {
        match &self.phase {
            PhaseState::Detect(d) => Some(DetectProgress {
                processed_rows: d.processed_rows,
                total_rows: d.total_rows,
                duplicate_group_count: d.duplicate_group_count,
            }),
            _ => None,
        }
    }

    /// Status as last left by `start` or `continue`.
    pub fn run_status(&self) -> RunStatus {
        if self.failure().is_some() {
            RunStatus::Failed
        } else if self.paused {
            RunStatus::Paused
        } else {
            RunStatus::Running
        }
    }

    pub fn failure(&self) -> Option<&FailureState> {
        match &self.phase {
            PhaseState::Failed(f) => Some(f),
            _ => None,
        }
    }
}
