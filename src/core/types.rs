//! Core data types for the deformation pipeline

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Coordinate system a pair's positions are expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionMode {
    /// Latitude/longitude in degrees, projected through a reference grid
    Geographic,
    /// Metres in a fixed regional projection, used as-is
    Planar,
}

/// A single observed position, tagged with its coordinate system
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Coordinate {
    Geographic { lat: f64, lon: f64 },
    Planar { x: f64, y: f64 },
}

impl Coordinate {
    /// Mode this coordinate belongs to
    pub fn mode(&self) -> ProjectionMode {
        match self {
            Coordinate::Geographic { .. } => ProjectionMode::Geographic,
            Coordinate::Planar { .. } => ProjectionMode::Planar,
        }
    }

    pub fn is_finite(&self) -> bool {
        match *self {
            Coordinate::Geographic { lat, lon } => lat.is_finite() && lon.is_finite(),
            Coordinate::Planar { x, y } => x.is_finite() && y.is_finite(),
        }
    }

    /// Latitude in degrees, if geographic
    pub fn latitude(&self) -> Option<f64> {
        match *self {
            Coordinate::Geographic { lat, .. } => Some(lat),
            Coordinate::Planar { .. } => None,
        }
    }
}

/// One tracked ice feature in one image pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedPoint {
    /// Identifier, unique within the pair
    pub id: u64,
    /// Position in the first image
    pub start: Coordinate,
    /// Position in the second image
    pub end: Coordinate,
    /// Elapsed time between the two observations (hours)
    pub interval_hours: f64,
    /// Positional uncertainty of the tracker (m)
    pub tracking_error_m: f64,
}

impl TrackedPoint {
    pub fn geographic(
        id: u64,
        start: (f64, f64),
        end: (f64, f64),
        interval_hours: f64,
        tracking_error_m: f64,
    ) -> Self {
        Self {
            id,
            start: Coordinate::Geographic { lat: start.0, lon: start.1 },
            end: Coordinate::Geographic { lat: end.0, lon: end.1 },
            interval_hours,
            tracking_error_m,
        }
    }

    pub fn planar(
        id: u64,
        start: (f64, f64),
        end: (f64, f64),
        interval_hours: f64,
        tracking_error_m: f64,
    ) -> Self {
        Self {
            id,
            start: Coordinate::Planar { x: start.0, y: start.1 },
            end: Coordinate::Planar { x: end.0, y: end.1 },
            interval_hours,
            tracking_error_m,
        }
    }

    /// Mode shared by both positions, or `None` when start and end disagree
    pub fn mode(&self) -> Option<ProjectionMode> {
        let mode = self.start.mode();
        (mode == self.end.mode()).then_some(mode)
    }
}

/// A tracked point expressed in the pair-local planar frame (m)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPoint {
    pub id: u64,
    pub start: Point2<f64>,
    pub end: Point2<f64>,
    pub interval_hours: f64,
    pub tracking_error_m: f64,
    /// Start latitude (degrees) when the pair was geographic
    pub start_latitude: Option<f64>,
}

impl ProjectedPoint {
    /// Displacement between start and end (m)
    pub fn displacement(&self) -> nalgebra::Vector2<f64> {
        self.end - self.start
    }
}

/// One image pair as delivered by a tracker reader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePair {
    /// Identifier of the pair (typically derived from the source file name)
    pub id: String,
    pub points: Vec<TrackedPoint>,
}

impl ImagePair {
    pub fn new(id: impl Into<String>, points: Vec<TrackedPoint>) -> Self {
        Self { id: id.into(), points }
    }
}
