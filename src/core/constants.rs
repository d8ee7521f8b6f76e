//! Physical constants and default processing parameters

/// Mean Earth radius used by the spherical map projections (m)
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Seconds in one hour
pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// Minimum number of tracked points needed to form a triangle
pub const MIN_POINTS_PER_PAIR: usize = 3;

/// Absolute area below which a triangle is treated as degenerate (m²)
pub const DEFAULT_DEGENERATE_AREA_M2: f64 = 1.0;

/// Relative collinearity tolerance: |area| / (longest edge)² at or below this is
/// degenerate, i.e. a height under 2e-3 of the longest edge
pub const DEGENERATE_SHAPE_TOLERANCE: f64 = 1e-3;

/// Arctic Ocean area used to express coverage as a fraction (km²)
pub const ARCTIC_OCEAN_AREA_KM2: f64 = 15_558_000.0;

/// Default map extents for coverage frequency maps (m)
pub const COVERAGE_X_MIN_M: f64 = -4_400_000.0;
pub const COVERAGE_X_MAX_M: f64 = 2_500_000.0;
pub const COVERAGE_Y_MIN_M: f64 = -2_500_000.0;
pub const COVERAGE_Y_MAX_M: f64 = 3_500_000.0;
