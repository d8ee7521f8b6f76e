//! Per-pair processing: projection → triangulation → cells → strain rates → flags

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::algorithms::cell_builder::{build_cells, DeformationCell};
use crate::algorithms::grid::ReferenceGrid;
use crate::algorithms::projector::Projector;
use crate::algorithms::strain_rate::{StrainRate, StrainRateCalculator};
use crate::algorithms::triangulation::triangulate;
use crate::core::{ProjectedPoint, ProjectionMode, TrackedPoint};
use crate::utils::config::FilterConfig;
use crate::validation::error::{DeformationError, DroppedPoint};
use crate::validation::filter::{classify, ValidityFlag};

/// Everything needed to process one image pair
#[derive(Clone, Copy)]
pub struct ProcessingRequest<'a> {
    pub pair_id: &'a str,
    pub points: &'a [TrackedPoint],
    pub mode: ProjectionMode,
    pub reference_grid: Option<&'a dyn ReferenceGrid>,
    pub thresholds: FilterConfig,
}

/// A cell with its strain rate (absent when degenerate) and validity flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRecord {
    pub cell: DeformationCell,
    pub strain_rate: Option<StrainRate>,
    pub flag: ValidityFlag,
}

/// Output of one pair; invalid cells are kept for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub pair_id: String,
    pub cells: Vec<CellRecord>,
    /// Points that entered the triangulation, in the pair frame
    pub points: Vec<ProjectedPoint>,
    pub dropped_points: Vec<DroppedPoint>,
    /// Pair frame origin in grid/planar metres
    pub frame_origin: Point2<f64>,
    pub frame_scale: f64,
}

impl ProcessingResult {
    /// Cells that passed every check, as consumed by aggregation
    pub fn valid_cells(&self) -> impl Iterator<Item = &CellRecord> {
        self.cells.iter().filter(|record| record.flag.is_valid())
    }

    pub fn flag_counts(&self) -> BTreeMap<ValidityFlag, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.cells {
            *counts.entry(record.flag).or_insert(0) += 1;
        }
        counts
    }

    /// Re-run the cell filter under new thresholds without touching geometry
    pub fn reclassify(&mut self, thresholds: &FilterConfig) {
        for record in &mut self.cells {
            record.flag = classify(&record.cell, record.strain_rate.as_ref(), thresholds);
        }
    }

    /// Mean observation interval of the pair's points (hours)
    pub fn mean_interval_hours(&self) -> Option<f64> {
        if self.points.is_empty() {
            return None;
        }
        Some(self.points.iter().map(|p| p.interval_hours).sum::<f64>() / self.points.len() as f64)
    }

    /// Start positions back in grid/planar metres, comparable across pairs
    pub fn absolute_start_positions(&self) -> impl Iterator<Item = Point2<f64>> + '_ {
        self.points
            .iter()
            .map(|p| self.frame_origin + p.start.coords * self.frame_scale)
    }
}

/// Run the full chain on one pair
pub fn process_request(
    request: &ProcessingRequest<'_>,
    calculator: &StrainRateCalculator,
) -> Result<ProcessingResult, DeformationError> {
    let projector = Projector::new(request.mode, request.reference_grid)?;
    let outcome = projector.project(request.pair_id, request.points)?;

    let triangles = triangulate(&outcome.points).map_err(|e| DeformationError::Triangulation {
        pair_id: request.pair_id.to_string(),
        reason: format!("{:?}", e),
    })?;

    let cells: Vec<CellRecord> = build_cells(&triangles, &outcome.points)
        .into_iter()
        .map(|cell| {
            let strain_rate = match calculator.compute(&cell) {
                Ok(rate) => Some(rate),
                Err(e) => {
                    debug!(pair = request.pair_id, cell = cell.index, error = %e, "no strain rate");
                    None
                }
            };
            let flag = classify(&cell, strain_rate.as_ref(), &request.thresholds);
            CellRecord { cell, strain_rate, flag }
        })
        .collect();

    let result = ProcessingResult {
        pair_id: request.pair_id.to_string(),
        cells,
        points: outcome.points,
        dropped_points: outcome.dropped,
        frame_origin: outcome.frame_origin,
        frame_scale: outcome.frame_scale,
    };

    info!(
        pair = request.pair_id,
        points = result.points.len(),
        dropped = result.dropped_points.len(),
        cells = result.cells.len(),
        valid = result.valid_cells().count(),
        "processed pair"
    );
    Ok(result)
}
