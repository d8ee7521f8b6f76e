//! Error taxonomy for the deformation pipeline
//!
//! Per-pair failures (`DeformationError`) abort only the pair they occur in;
//! per-cell failures (`StrainRateError`) are mapped onto validity flags;
//! per-point problems never become errors and are reported as
//! [`DroppedPoint`] diagnostics instead.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::core::ProjectionMode;

/// Failures that abort the processing of one image pair
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeformationError {
    /// Fewer than three usable points survived projection
    #[error("pair {pair_id}: insufficient points ({available} usable, {required} required)")]
    InsufficientPoints {
        pair_id: String,
        available: usize,
        required: usize,
    },

    /// A point's coordinates do not match the pipeline's projection mode
    #[error("pair {pair_id}: point {point_id} is not in {expected:?} coordinates")]
    CoordinateModeMismatch {
        pair_id: String,
        point_id: u64,
        expected: ProjectionMode,
    },

    /// Geographic input was supplied without a reference grid
    #[error("geographic projection requires a reference grid")]
    MissingReferenceGrid,

    /// The triangulation library rejected a vertex
    #[error("pair {pair_id}: triangulation failed: {reason}")]
    Triangulation { pair_id: String, reason: String },
}

impl DeformationError {
    /// Short label used when counting failures in run summaries
    pub fn kind(&self) -> &'static str {
        match self {
            DeformationError::InsufficientPoints { .. } => "insufficient_points",
            DeformationError::CoordinateModeMismatch { .. } => "coordinate_mode_mismatch",
            DeformationError::MissingReferenceGrid => "missing_reference_grid",
            DeformationError::Triangulation { .. } => "triangulation",
        }
    }
}

/// Failure to compute a strain rate for a single cell
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum StrainRateError {
    /// Start-time area too small for the gradient reconstruction
    #[error("degenerate triangle: signed area {area_m2:e} m²")]
    DegenerateGeometry { area_m2: f64 },
}

/// Why a tracked point was left out of its pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Start position outside the reference grid
    OutsideGridCoverage,
    /// A start or end coordinate was NaN or infinite
    NonFiniteCoordinate,
    /// Interval was zero, negative or not finite
    NonPositiveInterval,
    /// Tracking error was negative or not finite
    NegativeTrackingError,
    /// Another point of the pair already used this id
    DuplicateId,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DropReason::OutsideGridCoverage => "outside reference grid coverage",
            DropReason::NonFiniteCoordinate => "non-finite coordinate",
            DropReason::NonPositiveInterval => "non-positive time interval",
            DropReason::NegativeTrackingError => "negative tracking error",
            DropReason::DuplicateId => "duplicate point id",
        };
        f.write_str(text)
    }
}

/// Diagnostic record for a point removed from a pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DroppedPoint {
    pub id: u64,
    pub reason: DropReason,
}
