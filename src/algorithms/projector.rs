//! Projection of tracked points into a pair-local planar frame
//!
//! Geographic pairs go through the reference grid: each point is mapped with
//! the local basis of the cell containing its start position, so start and
//! end share one linear map. Planar pairs are passed through unchanged.
//! Either way the frame is then centred on the start-position centroid.

use nalgebra::{Point2, Vector2};
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::algorithms::grid::ReferenceGrid;
use crate::core::{Coordinate, ProjectedPoint, ProjectionMode, TrackedPoint, MIN_POINTS_PER_PAIR};
use crate::validation::error::{DeformationError, DropReason, DroppedPoint};

/// Projected points of one pair plus the diagnostics of the points left out
#[derive(Debug, Clone)]
pub struct ProjectionOutcome {
    pub points: Vec<ProjectedPoint>,
    pub dropped: Vec<DroppedPoint>,
    /// Grid/planar position of the pair frame origin (m)
    pub frame_origin: Point2<f64>,
    /// Map metres per frame metre
    pub frame_scale: f64,
}

/// Maps tracked points into the planar frame used by the triangulator
#[derive(Clone, Copy)]
pub struct Projector<'g> {
    mode: ProjectionMode,
    grid: Option<&'g dyn ReferenceGrid>,
}

impl<'g> Projector<'g> {
    /// Create a projector; geographic mode needs a grid
    pub fn new(mode: ProjectionMode, grid: Option<&'g dyn ReferenceGrid>) -> Result<Self, DeformationError> {
        if mode == ProjectionMode::Geographic && grid.is_none() {
            return Err(DeformationError::MissingReferenceGrid);
        }
        Ok(Self { mode, grid })
    }

    pub fn planar() -> Self {
        Self {
            mode: ProjectionMode::Planar,
            grid: None,
        }
    }

    pub fn mode(&self) -> ProjectionMode {
        self.mode
    }

    /// Project one pair's points
    ///
    /// Points that cannot be used are dropped with a diagnostic; the pair only
    /// fails when fewer than three points remain or a point is expressed in
    /// the wrong coordinate system.
    pub fn project(&self, pair_id: &str, points: &[TrackedPoint]) -> Result<ProjectionOutcome, DeformationError> {
        let mut placed: Vec<(ProjectedPoint, f64)> = Vec::with_capacity(points.len());
        let mut dropped = Vec::new();
        let mut seen = BTreeSet::new();

        for point in points {
            if point.mode() != Some(self.mode) {
                return Err(DeformationError::CoordinateModeMismatch {
                    pair_id: pair_id.to_string(),
                    point_id: point.id,
                    expected: self.mode,
                });
            }

            if !seen.insert(point.id) {
                warn!(pair = pair_id, point = point.id, "repeated point id, keeping the first occurrence");
                dropped.push(DroppedPoint {
                    id: point.id,
                    reason: DropReason::DuplicateId,
                });
                continue;
            }

            match self.place(point) {
                Ok(entry) => placed.push(entry),
                Err(reason) => {
                    debug!(pair = pair_id, point = point.id, %reason, "dropping point");
                    dropped.push(DroppedPoint { id: point.id, reason });
                }
            }
        }

        if placed.len() < MIN_POINTS_PER_PAIR {
            return Err(DeformationError::InsufficientPoints {
                pair_id: pair_id.to_string(),
                available: placed.len(),
                required: MIN_POINTS_PER_PAIR,
            });
        }

        let count = placed.len() as f64;
        let centroid = placed
            .iter()
            .fold(Vector2::<f64>::zeros(), |acc, (p, _)| acc + p.start.coords)
            / count;
        let frame_origin = Point2::from(centroid);
        let frame_scale = placed.iter().map(|(_, scale)| scale).sum::<f64>() / count;

        let points = placed
            .into_iter()
            .map(|(mut p, _)| {
                p.start = Point2::from((p.start - frame_origin) / frame_scale);
                p.end = Point2::from((p.end - frame_origin) / frame_scale);
                p
            })
            .collect();

        Ok(ProjectionOutcome {
            points,
            dropped,
            frame_origin,
            frame_scale,
        })
    }

    /// Map one point into grid/planar metres along with its local map scale
    fn place(&self, point: &TrackedPoint) -> Result<(ProjectedPoint, f64), DropReason> {
        if !(point.interval_hours.is_finite() && point.interval_hours > 0.0) {
            return Err(DropReason::NonPositiveInterval);
        }
        if !(point.tracking_error_m.is_finite() && point.tracking_error_m >= 0.0) {
            return Err(DropReason::NegativeTrackingError);
        }
        if !(point.start.is_finite() && point.end.is_finite()) {
            return Err(DropReason::NonFiniteCoordinate);
        }

        let (start, end, scale) = match (point.start, point.end, self.grid) {
            (Coordinate::Planar { x: x0, y: y0 }, Coordinate::Planar { x: x1, y: y1 }, _) => {
                (Point2::new(x0, y0), Point2::new(x1, y1), 1.0)
            }
            (
                Coordinate::Geographic { lat: lat0, lon: lon0 },
                Coordinate::Geographic { lat: lat1, lon: lon1 },
                Some(grid),
            ) => {
                let basis = grid
                    .locate_cell(lat0, lon0)
                    .ok_or(DropReason::OutsideGridCoverage)?;
                let start = basis.project(lat0, lon0).ok_or(DropReason::OutsideGridCoverage)?;
                let end = basis.project(lat1, lon1).ok_or(DropReason::OutsideGridCoverage)?;
                (start, end, basis.scale())
            }
            _ => return Err(DropReason::OutsideGridCoverage),
        };

        let finite = start.iter().chain(end.iter()).all(|v| v.is_finite());
        if !finite || !(scale.is_finite() && scale > 0.0) {
            return Err(DropReason::NonFiniteCoordinate);
        }

        Ok((
            ProjectedPoint {
                id: point.id,
                start,
                end,
                interval_hours: point.interval_hours,
                tracking_error_m: point.tracking_error_m,
                start_latitude: point.start.latitude(),
            },
            scale,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::grid::LocalBasis;
    use crate::core::EARTH_RADIUS_M;
    use approx::assert_abs_diff_eq;
    use nalgebra::Matrix2;

    /// Flat grid covering 70N..80N, 0..20E with an east/north aligned basis
    struct MockGrid;

    impl ReferenceGrid for MockGrid {
        fn locate_cell(&self, lat: f64, lon: f64) -> Option<LocalBasis> {
            if !(70.0..80.0).contains(&lat) || !(0.0..20.0).contains(&lon) {
                return None;
            }
            Some(LocalBasis {
                cell: (lon.floor() as usize, (lat - 70.0).floor() as usize),
                anchor_lat: 75.0,
                anchor_lon: 10.0,
                anchor_xy: Point2::origin(),
                jacobian: Matrix2::identity(),
            })
        }
    }

    fn planar_points() -> Vec<TrackedPoint> {
        vec![
            TrackedPoint::planar(1, (0.0, 0.0), (10.0, 0.0), 24.0, 100.0),
            TrackedPoint::planar(2, (3000.0, 0.0), (3010.0, 5.0), 24.0, 100.0),
            TrackedPoint::planar(3, (0.0, 3000.0), (12.0, 3000.0), 24.0, 100.0),
        ]
    }

    #[test]
    fn test_planar_identity_up_to_centering() {
        let outcome = Projector::planar().project("p", &planar_points()).unwrap();
        assert_eq!(outcome.points.len(), 3);
        assert_abs_diff_eq!(outcome.frame_origin.x, 1000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(outcome.frame_origin.y, 1000.0, epsilon = 1e-9);
        assert_eq!(outcome.frame_scale, 1.0);

        let second = &outcome.points[1];
        assert_abs_diff_eq!(second.start.x, 2000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(second.displacement().x, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(second.displacement().y, 5.0, epsilon = 1e-9);
        assert!(second.start_latitude.is_none());
    }

    #[test]
    fn test_invalid_points_are_dropped() {
        let mut points = planar_points();
        points.push(TrackedPoint::planar(4, (f64::NAN, 0.0), (0.0, 0.0), 24.0, 100.0));
        points.push(TrackedPoint::planar(5, (1.0, 1.0), (2.0, 2.0), 0.0, 100.0));
        points.push(TrackedPoint::planar(6, (1.0, 1.0), (2.0, 2.0), 24.0, -1.0));

        let outcome = Projector::planar().project("p", &points).unwrap();
        assert_eq!(outcome.points.len(), 3);
        let reasons: Vec<_> = outcome.dropped.iter().map(|d| (d.id, d.reason)).collect();
        assert_eq!(
            reasons,
            vec![
                (4, DropReason::NonFiniteCoordinate),
                (5, DropReason::NonPositiveInterval),
                (6, DropReason::NegativeTrackingError),
            ]
        );
    }

    #[test]
    fn test_two_points_is_insufficient() {
        let points = &planar_points()[..2];
        let err = Projector::planar().project("pair-a", points).unwrap_err();
        assert_eq!(
            err,
            DeformationError::InsufficientPoints {
                pair_id: "pair-a".to_string(),
                available: 2,
                required: 3,
            }
        );
    }

    #[test]
    fn test_mode_mismatch_is_fatal() {
        let mut points = planar_points();
        points.push(TrackedPoint::geographic(9, (75.0, 5.0), (75.0, 5.1), 24.0, 100.0));
        let err = Projector::planar().project("p", &points).unwrap_err();
        assert!(matches!(err, DeformationError::CoordinateModeMismatch { point_id: 9, .. }));
    }

    #[test]
    fn test_geographic_requires_grid() {
        assert!(matches!(
            Projector::new(ProjectionMode::Geographic, None),
            Err(DeformationError::MissingReferenceGrid)
        ));
    }

    #[test]
    fn test_geographic_projection_with_mock_grid() {
        let grid = MockGrid;
        let projector = Projector::new(ProjectionMode::Geographic, Some(&grid)).unwrap();
        let points = vec![
            TrackedPoint::geographic(1, (75.0, 10.0), (75.01, 10.0), 24.0, 100.0),
            TrackedPoint::geographic(2, (75.1, 10.0), (75.11, 10.0), 24.0, 100.0),
            TrackedPoint::geographic(3, (75.0, 10.5), (75.01, 10.5), 24.0, 100.0),
            // Outside the mock grid
            TrackedPoint::geographic(4, (85.0, 10.0), (85.01, 10.0), 24.0, 100.0),
        ];
        let outcome = projector.project("g", &points).unwrap();
        assert_eq!(outcome.points.len(), 3);
        assert_eq!(outcome.dropped, vec![DroppedPoint { id: 4, reason: DropReason::OutsideGridCoverage }]);

        // Uniform northward drift of 0.01 degrees
        let expected = EARTH_RADIUS_M * 0.01_f64.to_radians();
        for p in &outcome.points {
            assert_abs_diff_eq!(p.displacement().norm(), expected, epsilon = 1e-2);
            assert!(p.start_latitude.is_some());
        }
        // On the anchor meridian north is the tangent-plane y axis
        for p in outcome.points.iter().filter(|p| p.id != 3) {
            assert_abs_diff_eq!(p.displacement().x, 0.0, epsilon = 1e-6);
        }
        // Half a degree east the meridian converges towards the anchor's
        let tilted = outcome.points.iter().find(|p| p.id == 3).unwrap().displacement();
        assert!(tilted.x < 0.0 && tilted.x > -0.02 * expected, "east component {}", tilted.x);
    }

    #[test]
    fn test_repeated_ids_keep_first_occurrence() {
        let mut points = planar_points();
        points.push(TrackedPoint::planar(2, (500.0, 500.0), (510.0, 500.0), 24.0, 100.0));
        let outcome = Projector::planar().project("p", &points).unwrap();
        assert_eq!(outcome.points.len(), 3);
        assert_eq!(outcome.dropped, vec![DroppedPoint { id: 2, reason: DropReason::DuplicateId }]);
        let kept = outcome.points.iter().find(|p| p.id == 2).unwrap();
        assert_abs_diff_eq!(kept.displacement().y, 5.0, epsilon = 1e-9);
    }
}
