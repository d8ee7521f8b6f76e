//! Delaunay triangulation of pair start positions
//!
//! Built on `spade`'s incremental Delaunay triangulation with exact
//! predicates. Points are inserted in lexicographic (x, y, id) order so
//! that co-circular configurations and repeated positions resolve the same
//! way regardless of the order the tracker reported them in; spade's
//! insertion order is the only tie-breaker it has.

use serde::{Deserialize, Serialize};
use spade::{DelaunayTriangulation, HasPosition, InsertionError, Triangulation as _};
use std::cmp::Ordering;
use tracing::debug;

use crate::core::ProjectedPoint;

/// Three indices into the pair's projected point array, counter-clockwise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triangle {
    pub vertices: [usize; 3],
}

impl Triangle {
    /// Rotate so the smallest index comes first, keeping the winding
    pub fn canonical(vertices: [usize; 3]) -> Self {
        let [a, b, c] = vertices;
        let vertices = if a <= b && a <= c {
            [a, b, c]
        } else if b <= a && b <= c {
            [b, c, a]
        } else {
            [c, a, b]
        };
        Self { vertices }
    }

    /// Vertex indices as an unordered set (sorted)
    pub fn sorted_vertices(&self) -> [usize; 3] {
        let mut v = self.vertices;
        v.sort_unstable();
        v
    }
}

/// Vertex payload carried through spade
#[derive(Debug, Clone, Copy)]
struct Site {
    position: spade::Point2<f64>,
    index: usize,
}

impl HasPosition for Site {
    type Scalar = f64;

    fn position(&self) -> spade::Point2<f64> {
        self.position
    }
}

fn canonical_order(a: &ProjectedPoint, b: &ProjectedPoint) -> Ordering {
    a.start
        .x
        .total_cmp(&b.start.x)
        .then_with(|| a.start.y.total_cmp(&b.start.y))
        .then_with(|| a.id.cmp(&b.id))
}

/// Triangulate the start positions of `points`; fewer than three distinct
/// or all-collinear positions give an empty list
///
/// Triangle vertices index into `points`. Of several points sharing a start
/// position only the one with the smallest id is used.
pub fn triangulate(points: &[ProjectedPoint]) -> Result<Vec<Triangle>, InsertionError> {
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&i, &j| canonical_order(&points[i], &points[j]).then(i.cmp(&j)));
    order.dedup_by(|later, earlier| points[*later].start == points[*earlier].start);

    let duplicates = points.len() - order.len();
    if duplicates > 0 {
        debug!(duplicates, "ignoring repeated start positions");
    }
    if order.len() < 3 {
        return Ok(Vec::new());
    }

    let mut delaunay: DelaunayTriangulation<Site> = DelaunayTriangulation::new();
    for &index in &order {
        let p = points[index].start;
        delaunay.insert(Site {
            position: spade::Point2::new(p.x, p.y),
            index,
        })?;
    }

    let mut triangles: Vec<Triangle> = delaunay
        .inner_faces()
        .map(|face| {
            let [a, b, c] = face.vertices();
            Triangle::canonical([a.data().index, b.data().index, c.data().index])
        })
        .collect();
    triangles.sort_unstable();

    debug!(points = order.len(), triangles = triangles.len(), "triangulated pair");
    Ok(triangles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;
    use std::collections::BTreeSet;

    fn site(id: u64, x: f64, y: f64) -> ProjectedPoint {
        ProjectedPoint {
            id,
            start: Point2::new(x, y),
            end: Point2::new(x, y),
            interval_hours: 24.0,
            tracking_error_m: 50.0,
            start_latitude: None,
        }
    }

    /// Points numbered by position in the slice
    fn sites(positions: &[(f64, f64)]) -> Vec<ProjectedPoint> {
        positions
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| site(i as u64, x, y))
            .collect()
    }

    fn signed_area(p: &[ProjectedPoint], t: &Triangle) -> f64 {
        let [a, b, c] = t.vertices.map(|i| p[i].start);
        0.5 * ((b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y))
    }

    fn as_id_sets(points: &[ProjectedPoint], triangles: &[Triangle]) -> BTreeSet<[u64; 3]> {
        triangles
            .iter()
            .map(|t| {
                let mut v = t.vertices.map(|i| points[i].id);
                v.sort_unstable();
                v
            })
            .collect()
    }

    #[test]
    fn test_canonical_rotation_preserves_winding() {
        assert_eq!(Triangle::canonical([4, 1, 7]).vertices, [1, 7, 4]);
        assert_eq!(Triangle::canonical([7, 4, 1]).vertices, [1, 7, 4]);
        assert_eq!(Triangle::canonical([1, 7, 4]).vertices, [1, 7, 4]);
        assert_eq!(Triangle::canonical([7, 4, 1]).sorted_vertices(), [1, 4, 7]);
    }

    #[test]
    fn test_square_with_center() {
        let points = sites(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.5, 0.5)]);
        let triangles = triangulate(&points).unwrap();
        assert_eq!(triangles.len(), 4);
        for t in &triangles {
            assert!(t.vertices.contains(&4));
            assert!(signed_area(&points, t) > 0.0, "triangle not counter-clockwise");
        }
    }

    #[test]
    fn test_degenerate_inputs_give_no_triangles() {
        assert!(triangulate(&[]).unwrap().is_empty());
        assert!(triangulate(&sites(&[(0.0, 0.0), (1.0, 0.0)])).unwrap().is_empty());

        let collinear: Vec<_> = (0..6).map(|i| (i as f64, 2.0 * i as f64)).collect();
        assert!(triangulate(&sites(&collinear)).unwrap().is_empty());

        assert!(triangulate(&sites(&[(1.0, 1.0); 5])).unwrap().is_empty());
    }

    #[test]
    fn test_repeated_position_keeps_smallest_id() {
        let forward = vec![
            site(10, 0.0, 0.0),
            site(20, 0.0, 0.0),
            site(30, 1000.0, 0.0),
            site(40, 0.0, 1000.0),
        ];
        let expected: BTreeSet<[u64; 3]> = [[10, 30, 40]].into_iter().collect();
        assert_eq!(as_id_sets(&forward, &triangulate(&forward).unwrap()), expected);

        for permutation in [[1, 0, 2, 3], [3, 1, 2, 0], [2, 3, 1, 0]] {
            let permuted: Vec<_> = permutation.iter().map(|&i| forward[i].clone()).collect();
            let triangles = triangulate(&permuted).unwrap();
            assert_eq!(as_id_sets(&permuted, &triangles), expected);
        }
    }

    #[test]
    fn test_order_invariance_on_cocircular_grid() {
        // Regular lattice: every unit square is co-circular
        let mut base = Vec::new();
        for i in 0..4 {
            for j in 0..4 {
                base.push(site((i * 4 + j) as u64, i as f64 * 100.0, j as f64 * 100.0));
            }
        }
        let reference = as_id_sets(&base, &triangulate(&base).unwrap());
        assert_eq!(reference.len(), 18);

        let mut permuted = base.clone();
        for step in [5usize, 7, 11] {
            permuted.rotate_left(step);
            permuted.reverse();
            let triangles = triangulate(&permuted).unwrap();
            assert_eq!(as_id_sets(&permuted, &triangles), reference);
        }
    }
}
