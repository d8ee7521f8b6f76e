//! Geometric and numerical core of the deformation pipeline

pub mod projection;
pub mod grid;
pub mod projector;
pub mod triangulation;
pub mod cell_builder;
pub mod strain_rate;

pub use projection::{AzimuthalEquidistant, MapProjection, PolarStereographic};
pub use grid::{LocalBasis, ReferenceGrid, RegularProjectedGrid};
pub use projector::{ProjectionOutcome, Projector};
pub use triangulation::{triangulate, Triangle};
pub use cell_builder::{build_cells, signed_area, DeformationCell};
pub use strain_rate::{compute_strain_rate, StrainRate, StrainRateCalculator, VelocityGradient};
