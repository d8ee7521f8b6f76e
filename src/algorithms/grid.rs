//! Reference grids for geographic (Mode A) projection
//!
//! A reference grid answers two questions for the projector: which cell
//! contains a geographic position, and what the local orthogonal basis of
//! that cell looks like. The basis is the linearization of the grid's map
//! projection at the cell centre, expressed as a Jacobian from local
//! east/north metres to map metres.

use nalgebra::{Matrix2, Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::algorithms::projection::{AzimuthalEquidistant, MapProjection};

/// Finite-difference step used to linearize map projections (m)
const JACOBIAN_STEP_M: f64 = 100.0;

/// Local orthogonal basis of one grid cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalBasis {
    /// (column, row) index of the cell
    pub cell: (usize, usize),
    /// Geographic anchor of the linearization (cell centre), degrees
    pub anchor_lat: f64,
    pub anchor_lon: f64,
    /// Map position of the anchor (m)
    pub anchor_xy: Point2<f64>,
    /// d(map x, map y) / d(east m, north m) at the anchor
    pub jacobian: Matrix2<f64>,
}

impl LocalBasis {
    /// Linearize `projection` at (`lat`, `lon`) with central differences
    ///
    /// The stencil is laid out in the anchor's tangent plane, so the basis
    /// stays defined at and around the pole.
    pub fn from_projection<P: MapProjection + ?Sized>(
        projection: &P,
        cell: (usize, usize),
        lat: f64,
        lon: f64,
    ) -> Option<Self> {
        let tangent = AzimuthalEquidistant::new(lat, lon);
        let map_at = |east: f64, north: f64| {
            tangent
                .inverse(east, north)
                .and_then(|(la, lo)| projection.forward(la, lo))
        };

        let h = JACOBIAN_STEP_M;
        let (x, y) = projection.forward(lat, lon)?;
        let east_plus = map_at(h, 0.0)?;
        let east_minus = map_at(-h, 0.0)?;
        let north_plus = map_at(0.0, h)?;
        let north_minus = map_at(0.0, -h)?;

        let two_h = 2.0 * h;
        let jacobian = Matrix2::new(
            (east_plus.0 - east_minus.0) / two_h,
            (north_plus.0 - north_minus.0) / two_h,
            (east_plus.1 - east_minus.1) / two_h,
            (north_plus.1 - north_minus.1) / two_h,
        );
        if !jacobian.iter().all(|v| v.is_finite()) || jacobian.determinant().abs() < 1e-12 {
            return None;
        }

        Some(Self {
            cell,
            anchor_lat: lat,
            anchor_lon: lon,
            anchor_xy: Point2::new(x, y),
            jacobian,
        })
    }

    /// East/north offset of (`lat`, `lon`) in the anchor's tangent plane (m)
    ///
    /// `None` only at the anchor's antipode.
    pub fn local_offset(&self, lat: f64, lon: f64) -> Option<Vector2<f64>> {
        AzimuthalEquidistant::new(self.anchor_lat, self.anchor_lon)
            .forward(lat, lon)
            .map(|(east, north)| Vector2::new(east, north))
    }

    /// Map (`lat`, `lon`) into the grid frame through this cell's basis
    pub fn project(&self, lat: f64, lon: f64) -> Option<Point2<f64>> {
        self.local_offset(lat, lon).map(|offset| self.anchor_xy + self.jacobian * offset)
    }

    /// Local map scale factor (map metres per true metre)
    pub fn scale(&self) -> f64 {
        self.jacobian.determinant().abs().sqrt()
    }

    /// Unit vectors of local east and north, expressed in the map frame
    pub fn axes(&self) -> (Vector2<f64>, Vector2<f64>) {
        let east = self.jacobian.column(0).normalize();
        let north = self.jacobian.column(1).normalize();
        (east, north)
    }
}

/// Grid collaborator consulted by the projector in geographic mode
///
/// Implementations must be immutable once built so one grid can be shared
/// by every pair processed in parallel.
pub trait ReferenceGrid: Send + Sync {
    /// Basis of the cell containing (`lat`, `lon`), or `None` outside coverage
    fn locate_cell(&self, lat: f64, lon: f64) -> Option<LocalBasis>;
}

/// Regular mesh of `nx` × `ny` cells laid over a map projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegularProjectedGrid<P> {
    pub projection: P,
    /// Lower-left corner of the mesh in map metres
    pub origin_x: f64,
    pub origin_y: f64,
    /// Cell size (m)
    pub dx: f64,
    pub dy: f64,
    pub nx: usize,
    pub ny: usize,
}

impl<P: MapProjection> RegularProjectedGrid<P> {
    pub fn new(projection: P, origin: (f64, f64), spacing: (f64, f64), shape: (usize, usize)) -> Self {
        Self {
            projection,
            origin_x: origin.0,
            origin_y: origin.1,
            dx: spacing.0,
            dy: spacing.1,
            nx: shape.0,
            ny: shape.1,
        }
    }

    /// (column, row) of the cell containing map position (`x`, `y`)
    pub fn cell_index(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let fi = ((x - self.origin_x) / self.dx).floor();
        let fj = ((y - self.origin_y) / self.dy).floor();
        if !(fi.is_finite() && fj.is_finite()) || fi < 0.0 || fj < 0.0 {
            return None;
        }
        let (i, j) = (fi as usize, fj as usize);
        (i < self.nx && j < self.ny).then_some((i, j))
    }

    /// Map position of a cell centre
    pub fn cell_center(&self, cell: (usize, usize)) -> (f64, f64) {
        (
            self.origin_x + (cell.0 as f64 + 0.5) * self.dx,
            self.origin_y + (cell.1 as f64 + 0.5) * self.dy,
        )
    }

    /// Exact map position of (`lat`, `lon`)
    pub fn map_xy(&self, lat: f64, lon: f64) -> Option<Point2<f64>> {
        self.projection.forward(lat, lon).map(|(x, y)| Point2::new(x, y))
    }
}

impl<P: MapProjection> ReferenceGrid for RegularProjectedGrid<P> {
    fn locate_cell(&self, lat: f64, lon: f64) -> Option<LocalBasis> {
        let (x, y) = self.projection.forward(lat, lon)?;
        let cell = self.cell_index(x, y)?;
        let (cx, cy) = self.cell_center(cell);
        let (clat, clon) = self.projection.inverse(cx, cy)?;
        LocalBasis::from_projection(&self.projection, cell, clat, clon)
    }
}
