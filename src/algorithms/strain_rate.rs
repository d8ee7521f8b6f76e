//! Strain rates from the discrete line-integral (Green's theorem) method
//!
//! For a triangle with start-time vertices (x_i, y_i) and velocities
//! (u_i, v_i) the velocity gradient is the closed line integral of velocity
//! around the boundary, trapezoidal along each edge, divided by the signed
//! area:
//!
//! ```text
//! ∂u/∂x =  (1/A) Σ ū_e Δy_e      ∂u/∂y = -(1/A) Σ ū_e Δx_e
//! ∂v/∂x =  (1/A) Σ v̄_e Δy_e      ∂v/∂y = -(1/A) Σ v̄_e Δx_e
//! ```
//!
//! Edges are traversed in vertex order; a clockwise triangle flips both the
//! sums and the area, so the gradient does not depend on winding.
//!
//! Positional uncertainties are propagated through the equivalent linear
//! form ∂u/∂x = Σ a_i u_i, ∂u/∂y = Σ b_i u_i with a_i = (y_{i+1} - y_{i-1})/2A
//! and b_i = -(x_{i+1} - x_{i-1})/2A. Every start and end coordinate carries
//! the vertex's tracking error; their partial derivatives are summed in
//! quadrature.
//!
//! Writing B_i = (a_i, b_i) and F = I + ∇u·Δt for the deformation gradient,
//! moving end position i by ε changes the gradient by (ε/Δt) ⊗ B_i, and moving
//! start position i by δ changes it by -(Fδ/Δt) ⊗ B_i. The second form
//! includes the change of the coefficients themselves.

use nalgebra::{Matrix2, Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::algorithms::cell_builder::DeformationCell;
use crate::core::{DEFAULT_DEGENERATE_AREA_M2, DEGENERATE_SHAPE_TOLERANCE};
use crate::validation::error::StrainRateError;

/// Components of the velocity gradient tensor (s⁻¹)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VelocityGradient {
    pub dudx: f64,
    pub dudy: f64,
    pub dvdx: f64,
    pub dvdy: f64,
}

impl VelocityGradient {
    pub fn as_matrix(&self) -> Matrix2<f64> {
        Matrix2::new(self.dudx, self.dudy, self.dvdx, self.dvdy)
    }

    pub fn divergence(&self) -> f64 {
        self.dudx + self.dvdy
    }

    /// Maximum shear rate magnitude
    pub fn shear(&self) -> f64 {
        (self.dudx - self.dvdy).hypot(self.dudy + self.dvdx)
    }

    pub fn vorticity(&self) -> f64 {
        self.dvdx - self.dudy
    }
}

/// Strain-rate invariants of one cell (s⁻¹)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrainRate {
    pub divergence: f64,
    pub shear: f64,
    pub vorticity: f64,
    pub total_deformation: f64,
    pub uncertainty_divergence: f64,
    pub uncertainty_shear: f64,
    pub gradient: VelocityGradient,
}

/// Strain-rate calculator with its degeneracy threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrainRateCalculator {
    /// Cells with |area| below this are rejected as degenerate (m²)
    pub degenerate_area_m2: f64,
}

impl Default for StrainRateCalculator {
    fn default() -> Self {
        Self {
            degenerate_area_m2: DEFAULT_DEGENERATE_AREA_M2,
        }
    }
}

impl StrainRateCalculator {
    pub fn new(degenerate_area_m2: f64) -> Self {
        Self { degenerate_area_m2 }
    }

    /// Whether `cell` is too thin or too small for a gradient reconstruction
    pub fn is_degenerate(&self, cell: &DeformationCell) -> bool {
        let area = cell.area_m2.abs();
        let edge = cell.longest_edge();
        !area.is_finite()
            || area < self.degenerate_area_m2
            || area <= DEGENERATE_SHAPE_TOLERANCE * edge * edge
    }

    /// Compute the strain rate and its propagated uncertainty for one cell
    pub fn compute(&self, cell: &DeformationCell) -> Result<StrainRate, StrainRateError> {
        let dt = cell.interval_seconds();
        if self.is_degenerate(cell) || !(dt.is_finite() && dt > 0.0) {
            return Err(StrainRateError::DegenerateGeometry { area_m2: cell.area_m2 });
        }

        let velocities = cell.displacements().map(|d| d / dt);
        let gradient = line_integral_gradient(&cell.start.map(|p| p.coords), &velocities, cell.area_m2);

        let divergence = gradient.divergence();
        let shear = gradient.shear();
        let (uncertainty_divergence, uncertainty_shear) = propagate_uncertainty(cell, &gradient, dt);

        Ok(StrainRate {
            divergence,
            shear,
            vorticity: gradient.vorticity(),
            total_deformation: divergence.hypot(shear),
            uncertainty_divergence,
            uncertainty_shear,
            gradient,
        })
    }
}

/// Convenience wrapper around [`StrainRateCalculator::compute`]
pub fn compute_strain_rate(
    cell: &DeformationCell,
    calculator: &StrainRateCalculator,
) -> Result<StrainRate, StrainRateError> {
    calculator.compute(cell)
}

/// Gradient from the trapezoidal boundary integral of velocity
fn line_integral_gradient(
    vertices: &[Vector2<f64>; 3],
    velocities: &[Vector2<f64>; 3],
    area: f64,
) -> VelocityGradient {
    let (mut dudx, mut dudy, mut dvdx, mut dvdy) = (0.0, 0.0, 0.0, 0.0);
    for i in 0..3 {
        let j = (i + 1) % 3;
        let mean = (velocities[i] + velocities[j]) * 0.5;
        let edge = vertices[j] - vertices[i];
        dudx += mean.x * edge.y;
        dudy -= mean.x * edge.x;
        dvdx += mean.y * edge.y;
        dvdy -= mean.y * edge.x;
    }
    VelocityGradient {
        dudx: dudx / area,
        dudy: dudy / area,
        dvdx: dvdx / area,
        dvdy: dvdy / area,
    }
}

/// Linear-element coefficients (a, b) such that ∂u/∂x = a·u and ∂u/∂y = b·u
fn gradient_coefficients(cell: &DeformationCell) -> (Vector3<f64>, Vector3<f64>) {
    let p = &cell.start;
    let twice_area = 2.0 * cell.area_m2;
    let a = Vector3::from_fn(|i, _| (p[(i + 1) % 3].y - p[(i + 2) % 3].y) / twice_area);
    let b = Vector3::from_fn(|i, _| -(p[(i + 1) % 3].x - p[(i + 2) % 3].x) / twice_area);
    (a, b)
}

/// First-order propagation of per-vertex position errors at both ends
fn propagate_uncertainty(cell: &DeformationCell, gradient: &VelocityGradient, dt: f64) -> (f64, f64) {
    let (a, b) = gradient_coefficients(cell);
    let coefficients: [Vector2<f64>; 3] = [0, 1, 2].map(|i| Vector2::new(a[i], b[i]));
    let deformation = Matrix2::identity() + gradient.as_matrix() * dt;
    let variance = |i: usize, sensitivity: Vector2<f64>| {
        let start_term = deformation.transpose() * sensitivity;
        cell.tracking_errors_m[i].powi(2) * (sensitivity.norm_squared() + start_term.norm_squared())
    };

    let var_divergence = (0..3).map(|i| variance(i, coefficients[i])).sum::<f64>() / (dt * dt);

    let p = gradient.dudx - gradient.dvdy;
    let q = gradient.dudy + gradient.dvdx;
    let shear = p.hypot(q);
    let var_shear = if shear > f64::EPSILON * gradient.as_matrix().norm() && shear > 0.0 {
        (0..3)
            .map(|i| {
                let [ai, bi] = [coefficients[i].x, coefficients[i].y];
                let sensitivity = Vector2::new(p * ai + q * bi, q * ai - p * bi) / shear;
                variance(i, sensitivity)
            })
            .sum::<f64>()
            / (dt * dt)
    } else {
        // Directional limit at zero shear: same magnitude for any direction
        var_divergence
    };

    (var_divergence.sqrt(), var_shear.sqrt())
}
