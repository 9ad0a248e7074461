pub mod analysis;
pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod ingest;
pub mod pipeline;
pub mod progress;
pub mod storage;

pub use config::AppConfig;
pub use engine::DetectionEngine;
pub use error::Error;
pub use pipeline::{ChunkedController, PipelineResult, ProcessStatus, RunStatus};
pub use progress::{ProgressReporter, SilentReporter};
