//! Sea-Ice Deformation
//!
//! Derives sea-ice deformation (divergence, shear, vorticity) from pairs of
//! tracked ice positions observed at two times. Each image pair is projected
//! into a local planar frame, triangulated, and every triangle's velocity
//! gradient is reconstructed with a line integral around its boundary.

pub mod core;
pub mod algorithms;
pub mod processing;
pub mod validation;
pub mod utils;

// Re-export commonly used types
pub use core::{Coordinate, ImagePair, ProjectedPoint, ProjectionMode, TrackedPoint};
pub use algorithms::grid::{LocalBasis, ReferenceGrid, RegularProjectedGrid};
pub use algorithms::projection::{AzimuthalEquidistant, MapProjection, PolarStereographic};
pub use algorithms::cell_builder::DeformationCell;
pub use algorithms::strain_rate::{compute_strain_rate, StrainRate, StrainRateCalculator};
pub use processing::{
    process_request, CellRecord, CoverageMap, DeformationPipeline, ProcessingRequest, ProcessingResult,
    RunReport, RunSummary,
};
pub use validation::{classify, DeformationError, DropReason, DroppedPoint, StrainRateError, ValidityFlag};
pub use utils::config::{ConfigError, FilterConfig, GridConfig, PipelineConfig};
