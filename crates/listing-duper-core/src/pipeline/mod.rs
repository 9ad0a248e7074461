pub mod controller;
pub mod state;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::analysis::{AnnotatedTable, DataQualityReport};
use crate::export::ExportOutcome;

pub use controller::ChunkedController;
pub use state::{DetectState, PhaseState, ProcessState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Import,
    Detect,
    Analyze,
    Export,
    Completed,
    Failed,
}

impl Phase {
    /// The working phases, in execution order.
    pub const PIPELINE: [Phase; 4] = [Phase::Import, Phase::Detect, Phase::Analyze, Phase::Export];

    /// Position within [`Phase::PIPELINE`]; terminal phases sit past the end.
    pub fn index(self) -> usize {
        Self::PIPELINE
            .iter()
            .position(|&p| p == self)
            .unwrap_or(Self::PIPELINE.len())
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Import => "Import",
            Phase::Detect => "Detect",
            Phase::Analyze => "Analyze",
            Phase::Export => "Export",
            Phase::Completed => "Completed",
            Phase::Failed => "Failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Running,
    Paused,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    pub phase: Phase,
    pub message: String,
    pub duration_ms: u64,
}

impl StepSummary {
    pub fn duration_secs(&self) -> f64 {
        self.duration_ms as f64 / 1000.0
    }
}

/// Final output of a full run, one-pass or chunked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub success: bool,
    pub steps: Vec<StepSummary>,
    pub duplicate_groups: usize,
    pub duplicate_items: usize,
    pub export_count: usize,
    pub quality: DataQualityReport,
    pub annotated: AnnotatedTable,
    pub export: ExportOutcome,
}

impl PipelineResult {
    pub fn message(&self) -> String {
        if self.duplicate_groups == 0 {
            "No duplicate listings found".to_string()
        } else {
            format!(
                "{} duplicate groups, {} duplicate listings, {} to end",
                self.duplicate_groups, self.duplicate_items, self.export_count
            )
        }
    }
}

/// Detect-phase counters exposed to callers while a run is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectProgress {
    pub processed_rows: usize,
    pub total_rows: usize,
    pub duplicate_group_count: usize,
}

/// Answer to `start`, `continue` and `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessStatus {
    pub process_id: String,
    pub status: RunStatus,
    pub phase: Phase,
    pub progress_percent: f64,
    pub detect: Option<DetectProgress>,
    pub error: Option<String>,
    pub result: Option<PipelineResult>,
}
