//! Assembly of deformation cells from triangles
//!
//! Every triangle becomes a cell, degenerate or not; rejection happens later
//! in the cell filter so the full triangulation stays inspectable.

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::algorithms::triangulation::Triangle;
use crate::core::{ProjectedPoint, SECONDS_PER_HOUR};

/// One triangle with the vertex data the strain-rate calculator needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeformationCell {
    /// Position of the triangle in the pair's triangle list
    pub index: usize,
    pub triangle: Triangle,
    /// Tracker ids of the three vertices
    pub point_ids: [u64; 3],
    /// Vertex positions at start and end time, pair frame (m)
    pub start: [Point2<f64>; 3],
    pub end: [Point2<f64>; 3],
    /// Mean of the vertices' intervals (hours)
    pub interval_hours: f64,
    pub tracking_errors_m: [f64; 3],
    /// Signed start-time area, counter-clockwise positive (m²)
    pub area_m2: f64,
    pub mean_tracking_error_m: f64,
    /// Mean start latitude of the vertices, geographic pairs only
    pub centroid_latitude: Option<f64>,
}

impl DeformationCell {
    pub fn interval_seconds(&self) -> f64 {
        self.interval_hours * SECONDS_PER_HOUR
    }

    /// Per-vertex displacement over the interval (m)
    pub fn displacements(&self) -> [Vector2<f64>; 3] {
        [0, 1, 2].map(|i| self.end[i] - self.start[i])
    }

    /// Start-time centroid in the pair frame
    pub fn centroid(&self) -> Point2<f64> {
        Point2::from((self.start[0].coords + self.start[1].coords + self.start[2].coords) / 3.0)
    }

    /// Length of the longest start-time edge (m)
    pub fn longest_edge(&self) -> f64 {
        (0..3)
            .map(|i| (self.start[(i + 1) % 3] - self.start[i]).norm())
            .fold(0.0, f64::max)
    }
}

/// Shoelace area of a triangle, positive when counter-clockwise
pub fn signed_area(vertices: &[Point2<f64>; 3]) -> f64 {
    let mut twice_area = 0.0;
    for i in 0..3 {
        let (p, q) = (vertices[i], vertices[(i + 1) % 3]);
        twice_area += p.x * q.y - q.x * p.y;
    }
    0.5 * twice_area
}

/// Build one cell per triangle
///
/// A triangle referring past the end of `points` has no cell; `index` still
/// counts it so cells keep their triangle-list position.
pub fn build_cells(triangles: &[Triangle], points: &[ProjectedPoint]) -> Vec<DeformationCell> {
    triangles
        .iter()
        .enumerate()
        .filter_map(|(index, triangle)| match triangle.vertices.map(|i| points.get(i)) {
            [Some(a), Some(b), Some(c)] => Some(build_cell(index, *triangle, [a, b, c])),
            _ => {
                warn!(triangle = index, vertices = ?triangle.vertices, points = points.len(), "triangle vertex out of range");
                None
            }
        })
        .collect()
}

fn build_cell(index: usize, triangle: Triangle, vertices: [&ProjectedPoint; 3]) -> DeformationCell {
    let start = vertices.map(|p| p.start);
    let end = vertices.map(|p| p.end);
    let tracking_errors_m = vertices.map(|p| p.tracking_error_m);

    let centroid_latitude = match vertices.map(|p| p.start_latitude) {
        [Some(a), Some(b), Some(c)] => Some((a + b + c) / 3.0),
        _ => None,
    };

    DeformationCell {
        index,
        triangle,
        point_ids: vertices.map(|p| p.id),
        start,
        end,
        interval_hours: vertices.iter().map(|p| p.interval_hours).sum::<f64>() / 3.0,
        tracking_errors_m,
        area_m2: signed_area(&start),
        mean_tracking_error_m: tracking_errors_m.iter().sum::<f64>() / 3.0,
        centroid_latitude,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn point(id: u64, start: (f64, f64), end: (f64, f64), error: f64) -> ProjectedPoint {
        ProjectedPoint {
            id,
            start: Point2::new(start.0, start.1),
            end: Point2::new(end.0, end.1),
            interval_hours: 24.0,
            tracking_error_m: error,
            start_latitude: None,
        }
    }

    #[test]
    fn test_unit_triangle_area() {
        let ccw = [Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(0.0, 1.0)];
        assert_abs_diff_eq!(signed_area(&ccw), 0.5, epsilon = 1e-15);
        let cw = [ccw[0], ccw[2], ccw[1]];
        assert_abs_diff_eq!(signed_area(&cw), -0.5, epsilon = 1e-15);
    }

    #[test]
    fn test_build_cells_copies_vertex_data() {
        let points = vec![
            point(10, (0.0, 0.0), (1.0, 0.0), 100.0),
            point(11, (1000.0, 0.0), (1001.0, 2.0), 200.0),
            point(12, (0.0, 1000.0), (0.0, 1003.0), 300.0),
        ];
        let triangles = vec![Triangle { vertices: [0, 1, 2] }];
        let cells = build_cells(&triangles, &points);
        assert_eq!(cells.len(), 1);

        let cell = &cells[0];
        assert_eq!(cell.point_ids, [10, 11, 12]);
        assert_abs_diff_eq!(cell.area_m2, 500_000.0, epsilon = 1e-6);
        assert_abs_diff_eq!(cell.mean_tracking_error_m, 200.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cell.interval_seconds(), 86_400.0, epsilon = 1e-9);
        assert_eq!(cell.displacements()[2], Vector2::new(0.0, 3.0));
        assert_abs_diff_eq!(cell.longest_edge(), 1000.0 * 2f64.sqrt(), epsilon = 1e-9);
        assert!(cell.centroid_latitude.is_none());
    }

    #[test]
    fn test_collinear_triangle_kept_with_zero_area() {
        let points = vec![
            point(1, (0.0, 0.0), (0.0, 0.0), 10.0),
            point(2, (1.0, 1.0), (1.0, 1.0), 10.0),
            point(3, (2.0, 2.0), (2.0, 2.0), 10.0),
        ];
        let cells = build_cells(&[Triangle { vertices: [0, 1, 2] }], &points);
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].area_m2, 0.0);
    }

    #[test]
    fn test_out_of_range_vertex_skips_triangle() {
        let points = vec![
            point(1, (0.0, 0.0), (0.0, 0.0), 10.0),
            point(2, (10.0, 0.0), (10.0, 0.0), 10.0),
            point(3, (0.0, 10.0), (0.0, 10.0), 10.0),
        ];
        let triangles = [
            Triangle { vertices: [0, 1, 7] },
            Triangle { vertices: [0, 1, 2] },
        ];
        let cells = build_cells(&triangles, &points);
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].index, 1);
        assert_eq!(cells[0].point_ids, [1, 2, 3]);

        assert!(build_cells(&triangles, &[]).is_empty());
    }

    #[test]
    fn test_centroid_latitude_from_geographic_vertices() {
        let mut points = vec![
            point(1, (0.0, 0.0), (0.0, 0.0), 10.0),
            point(2, (10.0, 0.0), (10.0, 0.0), 10.0),
            point(3, (0.0, 10.0), (0.0, 10.0), 10.0),
        ];
        for (p, lat) in points.iter_mut().zip([80.0, 81.0, 82.0]) {
            p.start_latitude = Some(lat);
        }
        let cells = build_cells(&[Triangle { vertices: [0, 1, 2] }], &points);
        assert_abs_diff_eq!(cells[0].centroid_latitude.unwrap(), 81.0, epsilon = 1e-12);
    }
}
