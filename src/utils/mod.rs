//! Configuration of processing runs

pub mod config;

pub use config::{
    ConfigError, CoverageConfig, FilterConfig, GridConfig, PipelineConfig, ProjectionConfig,
    StrainRateConfig, ValidationReport,
};
