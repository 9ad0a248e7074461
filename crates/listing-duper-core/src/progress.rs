/// Trait for reporting detection progress.
///
/// The CLI implements it with indicatif progress bars.
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_import_start(&self) {}
    fn on_import_complete(&self, _rows: usize, _duration_secs: f64) {}
    fn on_detect_start(&self, _total_rows: usize) {}
    fn on_detect_progress(&self, _processed_rows: usize, _total_rows: usize) {}
    fn on_detect_complete(&self, _duplicate_groups: usize, _duration_secs: f64) {}
    fn on_export_complete(&self, _items: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
