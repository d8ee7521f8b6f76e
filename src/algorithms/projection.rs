//! Spherical map projections backing the reference grids
//!
//! Two projections are supported: north polar stereographic (the usual
//! frame for Arctic ocean-model grids) and azimuthal equidistant centred on
//! an arbitrary point. Both work on a sphere of radius [`EARTH_RADIUS_M`];
//! the deformation engine only needs local consistency, not geodetic
//! accuracy.

use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use crate::core::EARTH_RADIUS_M;

/// Forward/inverse mapping between geographic degrees and map metres
pub trait MapProjection: Send + Sync {
    /// Map (lat, lon) in degrees to (x, y) in metres; `None` where undefined
    fn forward(&self, lat: f64, lon: f64) -> Option<(f64, f64)>;

    /// Map (x, y) in metres back to (lat, lon) in degrees
    fn inverse(&self, x: f64, y: f64) -> Option<(f64, f64)>;
}

/// Wrap a longitude difference into [-180, 180) degrees
pub fn wrap_longitude(delta_deg: f64) -> f64 {
    (delta_deg + 180.0).rem_euclid(360.0) - 180.0
}

/// North polar stereographic projection with true scale at `true_scale_lat`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolarStereographic {
    /// Latitude of true scale (degrees north)
    pub true_scale_lat: f64,
    /// Longitude pointing down the negative y axis (degrees)
    pub central_meridian: f64,
}

impl Default for PolarStereographic {
    fn default() -> Self {
        Self {
            true_scale_lat: 70.0,
            central_meridian: -45.0,
        }
    }
}

impl PolarStereographic {
    pub fn new(true_scale_lat: f64, central_meridian: f64) -> Self {
        Self { true_scale_lat, central_meridian }
    }

    /// Radius scale term R·(1 + sin φc)
    fn rho_scale(&self) -> f64 {
        EARTH_RADIUS_M * (1.0 + self.true_scale_lat.to_radians().sin())
    }
}

impl MapProjection for PolarStereographic {
    fn forward(&self, lat: f64, lon: f64) -> Option<(f64, f64)> {
        // Southern hemisphere blows up towards the far pole
        if !(-30.0..=90.0).contains(&lat) {
            return None;
        }
        let rho = self.rho_scale() * (FRAC_PI_4 - lat.to_radians() / 2.0).tan();
        let dlon = wrap_longitude(lon - self.central_meridian).to_radians();
        Some((rho * dlon.sin(), -rho * dlon.cos()))
    }

    fn inverse(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        if !(x.is_finite() && y.is_finite()) {
            return None;
        }
        let rho = x.hypot(y);
        let lat = FRAC_PI_2 - 2.0 * (rho / self.rho_scale()).atan();
        let lon = if rho == 0.0 {
            self.central_meridian
        } else {
            self.central_meridian + x.atan2(-y).to_degrees()
        };
        Some((lat.to_degrees(), wrap_longitude(lon)))
    }
}

/// Azimuthal equidistant projection centred on (`center_lat`, `center_lon`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AzimuthalEquidistant {
    pub center_lat: f64,
    pub center_lon: f64,
}

impl Default for AzimuthalEquidistant {
    fn default() -> Self {
        Self {
            center_lat: 90.0,
            center_lon: 0.0,
        }
    }
}

impl AzimuthalEquidistant {
    pub fn new(center_lat: f64, center_lon: f64) -> Self {
        Self { center_lat, center_lon }
    }
}

impl MapProjection for AzimuthalEquidistant {
    fn forward(&self, lat: f64, lon: f64) -> Option<(f64, f64)> {
        let (phi1, phi) = (self.center_lat.to_radians(), lat.to_radians());
        let dlon = wrap_longitude(lon - self.center_lon).to_radians();

        // Haversine keeps short distances accurate
        let hav = ((phi - phi1) / 2.0).sin().powi(2) + phi1.cos() * phi.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * hav.clamp(0.0, 1.0).sqrt().asin();
        // Antipode maps to a circle, not a point
        if PI - c < 1e-9 {
            return None;
        }
        let k = if c < 1e-12 { 1.0 } else { c / c.sin() };

        let x = EARTH_RADIUS_M * k * phi.cos() * dlon.sin();
        let y = EARTH_RADIUS_M * k * (phi1.cos() * phi.sin() - phi1.sin() * phi.cos() * dlon.cos());
        Some((x, y))
    }

    fn inverse(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        if !(x.is_finite() && y.is_finite()) {
            return None;
        }
        let rho = x.hypot(y);
        if rho < 1e-9 {
            return Some((self.center_lat, self.center_lon));
        }
        let c = rho / EARTH_RADIUS_M;
        if c >= PI {
            return None;
        }
        let phi1 = self.center_lat.to_radians();
        let lat = (c.cos() * phi1.sin() + y * c.sin() * phi1.cos() / rho).clamp(-1.0, 1.0).asin();
        let dlon = (x * c.sin()).atan2(rho * phi1.cos() * c.cos() - y * phi1.sin() * c.sin());
        Some((lat.to_degrees(), wrap_longitude(self.center_lon + dlon.to_degrees())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_wrap_longitude() {
        assert_abs_diff_eq!(wrap_longitude(190.0), -170.0, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_longitude(-190.0), 170.0, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_longitude(359.5), -0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_polar_stereographic_pole_is_origin() {
        let ps = PolarStereographic::default();
        let (x, y) = ps.forward(90.0, 123.0).unwrap();
        assert_abs_diff_eq!(x, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_polar_stereographic_round_trip() {
        let ps = PolarStereographic::new(70.0, -45.0);
        for &(lat, lon) in &[(75.0, -140.0), (80.5, 179.9), (66.0, 10.0), (85.0, -179.5)] {
            let (x, y) = ps.forward(lat, lon).unwrap();
            let (lat2, lon2) = ps.inverse(x, y).unwrap();
            assert_abs_diff_eq!(lat, lat2, epsilon = 1e-9);
            assert_abs_diff_eq!(wrap_longitude(lon - lon2), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_polar_stereographic_true_scale() {
        // One degree of latitude at the true-scale latitude spans R·π/180 metres
        let ps = PolarStereographic::new(70.0, 0.0);
        let (_, y1) = ps.forward(69.5, 0.0).unwrap();
        let (_, y2) = ps.forward(70.5, 0.0).unwrap();
        let expected = EARTH_RADIUS_M * 1.0_f64.to_radians();
        assert!(((y2 - y1).abs() - expected).abs() / expected < 1e-4);
    }

    #[test]
    fn test_polar_stereographic_rejects_far_south() {
        assert!(PolarStereographic::default().forward(-60.0, 0.0).is_none());
    }

    #[test]
    fn test_azimuthal_equidistant_distance_preserved() {
        let aeqd = AzimuthalEquidistant::new(75.0, -150.0);
        // Due north by one degree
        let (x, y) = aeqd.forward(76.0, -150.0).unwrap();
        assert_abs_diff_eq!(x, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(y, EARTH_RADIUS_M * 1.0_f64.to_radians(), epsilon = 1e-6);
    }

    #[test]
    fn test_azimuthal_equidistant_round_trip_across_dateline() {
        let aeqd = AzimuthalEquidistant::new(78.0, 179.0);
        for &(lat, lon) in &[(78.0, -179.0), (80.0, 175.0), (76.5, -170.0)] {
            let (x, y) = aeqd.forward(lat, lon).unwrap();
            let (lat2, lon2) = aeqd.inverse(x, y).unwrap();
            assert_abs_diff_eq!(lat, lat2, epsilon = 1e-9);
            assert_abs_diff_eq!(wrap_longitude(lon - lon2), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_azimuthal_equidistant_antipode_undefined() {
        let aeqd = AzimuthalEquidistant::new(45.0, 0.0);
        assert!(aeqd.forward(-45.0, 180.0).is_none());
    }
}
