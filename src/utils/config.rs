use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

use crate::algorithms::grid::{ReferenceGrid, RegularProjectedGrid};
use crate::algorithms::projection::{AzimuthalEquidistant, PolarStereographic};
use crate::algorithms::strain_rate::StrainRateCalculator;
use crate::core::{
    ProjectionMode, COVERAGE_X_MAX_M, COVERAGE_X_MIN_M, COVERAGE_Y_MAX_M, COVERAGE_Y_MIN_M,
    DEFAULT_DEGENERATE_AREA_M2,
};

/// Thresholds of the cell filter
///
/// Every bound can be disabled independently by setting it to ±infinity;
/// in JSON a disabled bound is written as `null` (or left out).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Smallest admissible |area| (m²)
    #[serde(default = "neg_infinity", with = "lower_bound")]
    pub min_area_m2: f64,
    /// Largest admissible |area| (m²)
    #[serde(default = "infinity", with = "upper_bound")]
    pub max_area_m2: f64,
    /// Largest admissible uncertainty / |rate| ratio
    #[serde(default = "infinity", with = "upper_bound")]
    pub max_relative_uncertainty: f64,
    /// Admissible centroid latitude band (degrees), geographic pairs only
    #[serde(default = "neg_infinity", with = "lower_bound")]
    pub min_latitude: f64,
    #[serde(default = "infinity", with = "upper_bound")]
    pub max_latitude: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_area_m2: f64::NEG_INFINITY,
            max_area_m2: f64::INFINITY,
            max_relative_uncertainty: f64::INFINITY,
            min_latitude: f64::NEG_INFINITY,
            max_latitude: f64::INFINITY,
        }
    }
}

impl FilterConfig {
    pub fn with_area_range(mut self, min_area_m2: f64, max_area_m2: f64) -> Self {
        self.min_area_m2 = min_area_m2;
        self.max_area_m2 = max_area_m2;
        self
    }

    pub fn with_max_relative_uncertainty(mut self, ratio: f64) -> Self {
        self.max_relative_uncertainty = ratio;
        self
    }

    pub fn with_latitude_range(mut self, min_latitude: f64, max_latitude: f64) -> Self {
        self.min_latitude = min_latitude;
        self.max_latitude = max_latitude;
        self
    }
}

fn infinity() -> f64 {
    f64::INFINITY
}

fn neg_infinity() -> f64 {
    f64::NEG_INFINITY
}

/// (De)serialize an upper bound, `null` meaning +∞
mod upper_bound {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}

/// (De)serialize a lower bound, `null` meaning -∞
mod lower_bound {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NEG_INFINITY))
    }
}

/// Settings of the strain-rate calculator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrainRateConfig {
    /// Triangles with |area| below this are degenerate (m²)
    pub degenerate_area_m2: f64,
}

impl Default for StrainRateConfig {
    fn default() -> Self {
        Self {
            degenerate_area_m2: DEFAULT_DEGENERATE_AREA_M2,
        }
    }
}

impl StrainRateConfig {
    pub fn calculator(&self) -> StrainRateCalculator {
        StrainRateCalculator::new(self.degenerate_area_m2)
    }
}

/// Map projection underlying a reference grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProjectionConfig {
    PolarStereographic(PolarStereographic),
    AzimuthalEquidistant(AzimuthalEquidistant),
}

/// Regular reference grid description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    pub projection: ProjectionConfig,
    /// Left edge of the grid in map metres
    pub origin_x: f64,
    /// Lower edge of the grid in map metres
    pub origin_y: f64,
    /// Cell size (m)
    pub spacing_m: f64,
    /// Number of cells along map x
    pub nx: usize,
    /// Number of cells along map y
    pub ny: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        // 5 km polar stereographic mesh over the default coverage extent
        Self {
            projection: ProjectionConfig::PolarStereographic(PolarStereographic::default()),
            origin_x: COVERAGE_X_MIN_M,
            origin_y: COVERAGE_Y_MIN_M,
            spacing_m: 5_000.0,
            nx: 1380,
            ny: 1200,
        }
    }
}

impl GridConfig {
    /// Build the immutable grid shared by every pair of a run
    pub fn build(&self) -> Box<dyn ReferenceGrid> {
        let origin = (self.origin_x, self.origin_y);
        let spacing = (self.spacing_m, self.spacing_m);
        let shape = (self.nx, self.ny);
        match self.projection {
            ProjectionConfig::PolarStereographic(p) => {
                Box::new(RegularProjectedGrid::new(p, origin, spacing, shape))
            }
            ProjectionConfig::AzimuthalEquidistant(p) => {
                Box::new(RegularProjectedGrid::new(p, origin, spacing, shape))
            }
        }
    }
}

/// Coverage frequency map extent and resolution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// Bin size (km)
    pub resolution_km: f64,
    /// Left edge of the extent in map metres
    pub x_min_m: f64,
    /// Right edge, exclusive (m)
    pub x_max_m: f64,
    /// Bottom edge of the extent in map metres
    pub y_min_m: f64,
    /// Top edge, exclusive (m)
    pub y_max_m: f64,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            resolution_km: 10.0,
            x_min_m: COVERAGE_X_MIN_M,
            x_max_m: COVERAGE_X_MAX_M,
            y_min_m: COVERAGE_Y_MIN_M,
            y_max_m: COVERAGE_Y_MAX_M,
        }
    }
}

/// Complete configuration of a processing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub mode: ProjectionMode,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub strain_rate: StrainRateConfig,
    /// Required in geographic mode
    #[serde(default)]
    pub grid: Option<GridConfig>,
    #[serde(default)]
    pub coverage: Option<CoverageConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: ProjectionMode::Planar,
            filter: FilterConfig::default(),
            strain_rate: StrainRateConfig::default(),
            grid: None,
            coverage: None,
        }
    }
}

/// Configuration errors; all of them are fatal before any pair is processed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid parameter '{parameter}' = '{value}': {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("serialization error: {message}")]
    Serialization { message: String },
}

impl ConfigError {
    fn invalid(parameter: &str, value: impl ToString, reason: &str) -> Self {
        ConfigError::InvalidParameter {
            parameter: parameter.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Outcome of validating a configuration
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigError>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl PipelineConfig {
    pub fn planar(filter: FilterConfig) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    pub fn geographic(grid: GridConfig, filter: FilterConfig) -> Self {
        Self {
            mode: ProjectionMode::Geographic,
            filter,
            grid: Some(grid),
            ..Default::default()
        }
    }

    /// Load a configuration from a JSON file and validate it
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::Io {
            message: format!("failed to read config file '{}': {}", path_str, e),
        })?;

        let config: PipelineConfig = serde_json::from_str(&content).map_err(|e| ConfigError::Serialization {
            message: format!("failed to parse config file '{}': {}", path_str, e),
        })?;

        config.ensure_valid()?;
        Ok(config)
    }

    /// Save the configuration as pretty-printed JSON
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialization {
            message: format!("failed to serialize config: {}", e),
        })?;

        fs::write(&path, content).map_err(|e| ConfigError::Io {
            message: format!("failed to write config file '{}': {}", path_str, e),
        })
    }

    /// Fail on the first validation error, logging any warnings
    pub fn ensure_valid(&self) -> Result<(), ConfigError> {
        let report = self.validate();
        for warning in &report.warnings {
            warn!("{}", warning);
        }
        match report.errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Check every parameter, collecting errors and warnings
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();
        self.validate_filter(&mut report);

        let degenerate = self.strain_rate.degenerate_area_m2;
        if !(degenerate.is_finite() && degenerate >= 0.0) {
            report.errors.push(ConfigError::invalid(
                "strain_rate.degenerate_area_m2",
                degenerate,
                "degenerate area threshold must be finite and non-negative",
            ));
        }

        match (self.mode, &self.grid) {
            (ProjectionMode::Geographic, None) => {
                report.errors.push(ConfigError::invalid(
                    "grid",
                    "none",
                    "geographic mode requires a reference grid",
                ));
            }
            (ProjectionMode::Planar, Some(_)) => {
                report.warnings.push("reference grid is ignored in planar mode".to_string());
            }
            _ => {}
        }
        if let Some(grid) = &self.grid {
            Self::validate_grid(grid, &mut report);
        }

        if self.mode == ProjectionMode::Planar
            && (self.filter.min_latitude.is_finite() || self.filter.max_latitude.is_finite())
        {
            report.warnings.push("latitude filter has no effect in planar mode".to_string());
        }

        if let Some(coverage) = &self.coverage {
            Self::validate_coverage(coverage, &mut report);
        }

        report
    }

    fn validate_filter(&self, report: &mut ValidationReport) {
        let f = &self.filter;
        let all = [
            ("filter.min_area_m2", f.min_area_m2),
            ("filter.max_area_m2", f.max_area_m2),
            ("filter.max_relative_uncertainty", f.max_relative_uncertainty),
            ("filter.min_latitude", f.min_latitude),
            ("filter.max_latitude", f.max_latitude),
        ];
        for (name, value) in all {
            if value.is_nan() {
                report.errors.push(ConfigError::invalid(name, value, "threshold must not be NaN"));
            }
        }

        if f.min_area_m2 > f.max_area_m2 {
            report.errors.push(ConfigError::invalid(
                "filter.min_area_m2",
                f.min_area_m2,
                "minimum area exceeds maximum area",
            ));
        }
        if f.max_area_m2 <= 0.0 {
            report.errors.push(ConfigError::invalid(
                "filter.max_area_m2",
                f.max_area_m2,
                "maximum area must be positive",
            ));
        }
        if f.max_relative_uncertainty < 0.0 {
            report.errors.push(ConfigError::invalid(
                "filter.max_relative_uncertainty",
                f.max_relative_uncertainty,
                "relative uncertainty must be non-negative",
            ));
        }
        for (name, value) in [("filter.min_latitude", f.min_latitude), ("filter.max_latitude", f.max_latitude)] {
            if value.is_finite() && value.abs() > 90.0 {
                report.errors.push(ConfigError::invalid(
                    name,
                    value,
                    "latitude must be between -90 and 90 degrees",
                ));
            }
        }
        if f.min_latitude > f.max_latitude {
            report.errors.push(ConfigError::invalid(
                "filter.min_latitude",
                f.min_latitude,
                "minimum latitude exceeds maximum latitude",
            ));
        }
    }

    fn validate_grid(grid: &GridConfig, report: &mut ValidationReport) {
        if !(grid.spacing_m.is_finite() && grid.spacing_m > 0.0) {
            report.errors.push(ConfigError::invalid(
                "grid.spacing_m",
                grid.spacing_m,
                "grid spacing must be positive",
            ));
        }
        if grid.nx == 0 || grid.ny == 0 {
            report.errors.push(ConfigError::invalid(
                "grid.shape",
                format!("{}x{}", grid.nx, grid.ny),
                "grid must have at least one cell",
            ));
        }
        if !(grid.origin_x.is_finite() && grid.origin_y.is_finite()) {
            report.errors.push(ConfigError::invalid(
                "grid.origin",
                format!("({}, {})", grid.origin_x, grid.origin_y),
                "grid origin must be finite",
            ));
        }
        match grid.projection {
            ProjectionConfig::PolarStereographic(p) => {
                if !(p.true_scale_lat > 0.0 && p.true_scale_lat <= 90.0) {
                    report.errors.push(ConfigError::invalid(
                        "grid.projection.true_scale_lat",
                        p.true_scale_lat,
                        "true-scale latitude must be in (0, 90]",
                    ));
                }
            }
            ProjectionConfig::AzimuthalEquidistant(p) => {
                if !(p.center_lat.abs() <= 90.0 && p.center_lon.is_finite()) {
                    report.errors.push(ConfigError::invalid(
                        "grid.projection.center",
                        format!("({}, {})", p.center_lat, p.center_lon),
                        "projection centre must be a valid geographic position",
                    ));
                }
            }
        }
    }

    fn validate_coverage(coverage: &CoverageConfig, report: &mut ValidationReport) {
        if !(coverage.resolution_km.is_finite() && coverage.resolution_km > 0.0) {
            report.errors.push(ConfigError::invalid(
                "coverage.resolution_km",
                coverage.resolution_km,
                "resolution must be positive",
            ));
        }
        if !(coverage.x_min_m < coverage.x_max_m && coverage.y_min_m < coverage.y_max_m) {
            report.errors.push(ConfigError::invalid(
                "coverage.extent",
                format!(
                    "x [{}, {}], y [{}, {}]",
                    coverage.x_min_m, coverage.x_max_m, coverage.y_min_m, coverage.y_max_m
                ),
                "extent must have positive width and height",
            ));
        }
    }
}
