//! Admissibility checks on computed cells
//!
//! Classification is a pure function of a cell, its strain rate and the
//! thresholds: nothing is deleted, so cells can be re-classified under new
//! thresholds without recomputing geometry.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::algorithms::cell_builder::DeformationCell;
use crate::algorithms::strain_rate::StrainRate;
use crate::utils::config::FilterConfig;

/// Outcome of the cell filter, ordered from most to least severe
///
/// The order matches the order in which checks run, so loosening any
/// threshold can only move a cell towards `Valid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidityFlag {
    Degenerate,
    AreaOutOfRange,
    ErrorTooLarge,
    LatitudeOutOfRange,
    Valid,
}

impl ValidityFlag {
    pub const ALL: [ValidityFlag; 5] = [
        ValidityFlag::Degenerate,
        ValidityFlag::AreaOutOfRange,
        ValidityFlag::ErrorTooLarge,
        ValidityFlag::LatitudeOutOfRange,
        ValidityFlag::Valid,
    ];

    pub fn is_valid(&self) -> bool {
        *self == ValidityFlag::Valid
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValidityFlag::Degenerate => "DEGENERATE",
            ValidityFlag::AreaOutOfRange => "AREA_OUT_OF_RANGE",
            ValidityFlag::ErrorTooLarge => "ERROR_TOO_LARGE",
            ValidityFlag::LatitudeOutOfRange => "LATITUDE_OUT_OF_RANGE",
            ValidityFlag::Valid => "VALID",
        }
    }
}

impl fmt::Display for ValidityFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify one cell; `strain_rate` is `None` when the calculator rejected it
pub fn classify(cell: &DeformationCell, strain_rate: Option<&StrainRate>, config: &FilterConfig) -> ValidityFlag {
    let area = cell.area_m2.abs();
    let rate = match strain_rate {
        Some(rate) if area.is_finite() && area > 0.0 => rate,
        _ => return ValidityFlag::Degenerate,
    };

    if area < config.min_area_m2 || area > config.max_area_m2 {
        return ValidityFlag::AreaOutOfRange;
    }

    let ratio = config.max_relative_uncertainty;
    if exceeds(rate.uncertainty_divergence, rate.divergence, ratio)
        || exceeds(rate.uncertainty_shear, rate.shear, ratio)
    {
        return ValidityFlag::ErrorTooLarge;
    }

    if let Some(lat) = cell.centroid_latitude {
        if lat < config.min_latitude || lat > config.max_latitude {
            return ValidityFlag::LatitudeOutOfRange;
        }
    }

    ValidityFlag::Valid
}

fn exceeds(uncertainty: f64, rate: f64, max_ratio: f64) -> bool {
    if max_ratio.is_infinite() {
        return false;
    }
    uncertainty > max_ratio * rate.abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::cell_builder::signed_area;
    use crate::algorithms::strain_rate::{StrainRateCalculator, VelocityGradient};
    use crate::algorithms::triangulation::Triangle;
    use nalgebra::Point2;

    fn cell(scale: f64, latitude: Option<f64>) -> DeformationCell {
        let start = [Point2::new(0.0, 0.0), Point2::new(scale, 0.0), Point2::new(0.0, scale)];
        DeformationCell {
            index: 0,
            triangle: Triangle { vertices: [0, 1, 2] },
            point_ids: [1, 2, 3],
            start,
            end: start,
            interval_hours: 24.0,
            tracking_errors_m: [100.0; 3],
            area_m2: signed_area(&start),
            mean_tracking_error_m: 100.0,
            centroid_latitude: latitude,
        }
    }

    fn rate(divergence: f64, shear: f64, uncertainty: f64) -> StrainRate {
        StrainRate {
            divergence,
            shear,
            vorticity: 0.0,
            total_deformation: divergence.hypot(shear),
            uncertainty_divergence: uncertainty,
            uncertainty_shear: uncertainty,
            gradient: VelocityGradient {
                dudx: divergence / 2.0,
                dudy: 0.0,
                dvdx: 0.0,
                dvdy: divergence / 2.0,
            },
        }
    }

    #[test]
    fn test_flag_order_matches_check_order() {
        assert!(ValidityFlag::Degenerate < ValidityFlag::AreaOutOfRange);
        assert!(ValidityFlag::LatitudeOutOfRange < ValidityFlag::Valid);
        assert_eq!(ValidityFlag::ErrorTooLarge.to_string(), "ERROR_TOO_LARGE");
        assert_eq!(
            serde_json::to_string(&ValidityFlag::AreaOutOfRange).unwrap(),
            "\"AREA_OUT_OF_RANGE\""
        );
    }

    #[test]
    fn test_default_config_accepts_everything_computable() {
        let c = cell(10_000.0, Some(89.9));
        let r = rate(0.0, 0.0, 1e-6);
        assert_eq!(classify(&c, Some(&r), &FilterConfig::default()), ValidityFlag::Valid);
    }

    #[test]
    fn test_missing_strain_rate_is_degenerate() {
        let c = cell(10_000.0, None);
        assert_eq!(classify(&c, None, &FilterConfig::default()), ValidityFlag::Degenerate);
    }

    #[test]
    fn test_collinear_cell_never_valid() {
        let start = [Point2::new(0.0, 0.0), Point2::new(1e3, 1e3), Point2::new(2e3, 2e3)];
        let mut c = cell(1.0, None);
        c.start = start;
        c.end = start;
        c.area_m2 = signed_area(&start);
        let computed = StrainRateCalculator::default().compute(&c).ok();
        assert!(computed.is_none());
        assert_eq!(classify(&c, computed.as_ref(), &FilterConfig::default()), ValidityFlag::Degenerate);
        // Even a fabricated finite rate cannot make a zero-area cell valid
        let fake = rate(1e-6, 1e-6, 0.0);
        assert_eq!(classify(&c, Some(&fake), &FilterConfig::default()), ValidityFlag::Degenerate);
    }

    #[test]
    fn test_check_order_first_match_wins() {
        let config = FilterConfig::default()
            .with_area_range(1e6, 1e8)
            .with_max_relative_uncertainty(0.5)
            .with_latitude_range(70.0, 85.0);

        // 5e5 m² area, noisy, and too far north: area is reported
        let small = cell(1_000.0, Some(89.0));
        assert_eq!(classify(&small, Some(&rate(1e-7, 1e-7, 1e-6)), &config), ValidityFlag::AreaOutOfRange);

        // 5e7 m² area: noise reported before latitude
        let ok_area = cell(10_000.0, Some(89.0));
        assert_eq!(classify(&ok_area, Some(&rate(1e-7, 1e-7, 1e-6)), &config), ValidityFlag::ErrorTooLarge);
        assert_eq!(classify(&ok_area, Some(&rate(1e-6, 1e-6, 1e-7)), &config), ValidityFlag::LatitudeOutOfRange);

        let inside = cell(10_000.0, Some(80.0));
        assert_eq!(classify(&inside, Some(&rate(1e-6, 1e-6, 1e-7)), &config), ValidityFlag::Valid);
    }

    #[test]
    fn test_latitude_ignored_for_planar_cells() {
        let config = FilterConfig::default().with_latitude_range(70.0, 85.0);
        let planar = cell(10_000.0, None);
        assert_eq!(classify(&planar, Some(&rate(1e-6, 1e-6, 0.0)), &config), ValidityFlag::Valid);
    }

    #[test]
    fn test_widening_thresholds_is_monotone() {
        let cells = [
            cell(500.0, Some(60.0)),
            cell(2_000.0, Some(75.0)),
            cell(20_000.0, Some(86.0)),
            cell(80_000.0, Some(72.0)),
            cell(5_000.0, None),
        ];
        let rates = [
            rate(1e-6, 2e-6, 1e-7),
            rate(1e-8, 1e-6, 5e-7),
            rate(0.0, 0.0, 1e-8),
            rate(-3e-6, 1e-7, 2e-7),
        ];

        let narrow = FilterConfig::default()
            .with_area_range(1e6, 1e9)
            .with_max_relative_uncertainty(0.3)
            .with_latitude_range(70.0, 85.0);
        let widened = [
            narrow.with_area_range(1e5, 1e9),
            narrow.with_area_range(1e6, 1e12),
            narrow.with_max_relative_uncertainty(3.0),
            narrow.with_max_relative_uncertainty(f64::INFINITY),
            narrow.with_latitude_range(55.0, 85.0),
            narrow.with_latitude_range(70.0, 90.0),
            FilterConfig::default(),
        ];

        for c in &cells {
            for r in rates.iter().map(Some).chain(std::iter::once(None)) {
                let before = classify(c, r, &narrow);
                for wide in &widened {
                    let after = classify(c, r, wide);
                    assert!(after >= before, "{:?} -> {:?} under {:?}", before, after, wide);
                    if before.is_valid() {
                        assert!(after.is_valid());
                    }
                }
            }
        }
    }
}
