//! Spatial coverage frequency of processed image pairs
//!
//! Counts, for every bin of a fixed map extent, how many image pairs had at
//! least one tracked start position inside it.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::utils::config::CoverageConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageMap {
    pub config: CoverageConfig,
    pub nx: usize,
    pub ny: usize,
    /// Row-major (y, x) pair counts
    pub counts: Vec<u32>,
    pub pairs: usize,
}

impl CoverageMap {
    pub fn new(config: CoverageConfig) -> Self {
        let resolution = config.resolution_km * 1000.0;
        let nx = (((config.x_max_m - config.x_min_m) / resolution).floor() as usize).max(1);
        let ny = (((config.y_max_m - config.y_min_m) / resolution).floor() as usize).max(1);
        Self {
            config,
            nx,
            ny,
            counts: vec![0; nx * ny],
            pairs: 0,
        }
    }

    /// Bin containing `p`, if inside the extent
    pub fn bin(&self, p: &Point2<f64>) -> Option<(usize, usize)> {
        let c = &self.config;
        if !(p.x >= c.x_min_m && p.x < c.x_max_m && p.y >= c.y_min_m && p.y < c.y_max_m) {
            return None;
        }
        let i = ((p.x - c.x_min_m) / (c.x_max_m - c.x_min_m) * self.nx as f64) as usize;
        let j = ((p.y - c.y_min_m) / (c.y_max_m - c.y_min_m) * self.ny as f64) as usize;
        Some((i.min(self.nx - 1), j.min(self.ny - 1)))
    }

    /// Register one pair's start positions; returns the number of bins it touched
    pub fn add_pair<I>(&mut self, positions: I) -> usize
    where
        I: IntoIterator<Item = Point2<f64>>,
    {
        let touched: BTreeSet<(usize, usize)> = positions.into_iter().filter_map(|p| self.bin(&p)).collect();
        for &(i, j) in &touched {
            self.counts[j * self.nx + i] += 1;
        }
        self.pairs += 1;
        touched.len()
    }

    pub fn count(&self, i: usize, j: usize) -> u32 {
        self.counts[j * self.nx + i]
    }

    pub fn max_count(&self) -> u32 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// Number of bins seen by at least one pair
    pub fn covered_bins(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }

    /// Area of one bin (km²)
    pub fn bin_area_km2(&self) -> f64 {
        let c = &self.config;
        let width = (c.x_max_m - c.x_min_m) / self.nx as f64;
        let height = (c.y_max_m - c.y_min_m) / self.ny as f64;
        width * height / 1e6
    }

    /// Total area of the bins seen by at least one pair (km²)
    pub fn covered_area_km2(&self) -> f64 {
        self.covered_bins() as f64 * self.bin_area_km2()
    }

    /// Covered area as a fraction of `ocean_area_km2`, e.g.
    /// [`ARCTIC_OCEAN_AREA_KM2`](crate::core::ARCTIC_OCEAN_AREA_KM2)
    pub fn covered_fraction(&self, ocean_area_km2: f64) -> f64 {
        if ocean_area_km2 > 0.0 {
            self.covered_area_km2() / ocean_area_km2
        } else {
            0.0
        }
    }

    /// Fraction of pairs covering each bin
    pub fn frequencies(&self) -> Vec<f64> {
        let pairs = self.pairs.max(1) as f64;
        self.counts.iter().map(|&c| c as f64 / pairs).collect()
    }
}
