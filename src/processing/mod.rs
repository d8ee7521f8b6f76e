//! Per-pair processing and run-level orchestration

pub mod pipeline;
pub mod batch;
pub mod coverage;

pub use pipeline::{process_request, CellRecord, ProcessingRequest, ProcessingResult};
pub use batch::{summarize, DeformationPipeline, IntervalHistogram, RunReport, RunSummary};
pub use coverage::CoverageMap;
