//! Run-level orchestration over many image pairs
//!
//! Pairs share nothing but the read-only configuration and reference grid,
//! so they are processed with a rayon parallel map. A failing pair is
//! counted and skipped; it never affects its siblings.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::algorithms::grid::ReferenceGrid;
use crate::algorithms::strain_rate::StrainRateCalculator;
use crate::core::{ImagePair, ProjectionMode};
use crate::processing::coverage::CoverageMap;
use crate::processing::pipeline::{process_request, ProcessingRequest, ProcessingResult};
use crate::utils::config::{ConfigError, PipelineConfig};
use crate::validation::error::DeformationError;
use crate::validation::filter::ValidityFlag;

/// Histogram of pair time intervals: [0, 6) h then 12-hour bins
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntervalHistogram {
    pub edges_hours: Vec<f64>,
    pub counts: Vec<usize>,
}

impl IntervalHistogram {
    pub fn from_intervals(intervals: &[f64]) -> Self {
        let max = intervals.iter().copied().filter(|v| v.is_finite()).fold(0.0, f64::max);
        let mut edges_hours = vec![0.0, 6.0];
        while let Some(&last) = edges_hours.last() {
            if last > max {
                break;
            }
            edges_hours.push(last + 12.0);
        }

        let mut counts = vec![0; edges_hours.len() - 1];
        for &value in intervals.iter().filter(|v| v.is_finite() && **v >= 0.0) {
            if let Some(bin) = edges_hours.windows(2).position(|w| value >= w[0] && value < w[1]) {
                counts[bin] += 1;
            }
        }
        Self { edges_hours, counts }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Counts reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub pairs_processed: usize,
    pub pairs_skipped: usize,
    /// Skipped pairs by failure kind
    pub skipped_by_kind: BTreeMap<String, usize>,
    pub cells_computed: usize,
    pub cells_by_flag: BTreeMap<ValidityFlag, usize>,
    pub points_dropped: usize,
    pub interval_histogram: IntervalHistogram,
}

impl RunSummary {
    pub fn cells_valid(&self) -> usize {
        self.cells_by_flag.get(&ValidityFlag::Valid).copied().unwrap_or(0)
    }

    /// Cells excluded from aggregation
    pub fn cells_filtered(&self) -> usize {
        self.cells_computed - self.cells_valid()
    }
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub results: Vec<ProcessingResult>,
    pub failures: Vec<DeformationError>,
    pub summary: RunSummary,
    pub coverage: Option<CoverageMap>,
}

/// Validated pipeline ready to process image pairs
pub struct DeformationPipeline<'g> {
    config: PipelineConfig,
    grid: Option<&'g dyn ReferenceGrid>,
    calculator: StrainRateCalculator,
}

impl<'g> DeformationPipeline<'g> {
    /// Validate `config` and bind the run's reference grid
    pub fn new(config: PipelineConfig, grid: Option<&'g dyn ReferenceGrid>) -> Result<Self, ConfigError> {
        config.ensure_valid()?;
        if config.mode == ProjectionMode::Geographic && grid.is_none() {
            return Err(ConfigError::InvalidParameter {
                parameter: "grid".to_string(),
                value: "none".to_string(),
                reason: "geographic mode requires a reference grid".to_string(),
            });
        }

        let calculator = config.strain_rate.calculator();
        Ok(Self { config, grid, calculator })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Every point must be in the pipeline's coordinate system
    pub fn check_modes(&self, pairs: &[ImagePair]) -> Result<(), DeformationError> {
        for pair in pairs {
            if let Some(point) = pair.points.iter().find(|p| p.mode() != Some(self.config.mode)) {
                return Err(DeformationError::CoordinateModeMismatch {
                    pair_id: pair.id.clone(),
                    point_id: point.id,
                    expected: self.config.mode,
                });
            }
        }
        Ok(())
    }

    pub fn process_pair(&self, pair: &ImagePair) -> Result<ProcessingResult, DeformationError> {
        let request = ProcessingRequest {
            pair_id: &pair.id,
            points: &pair.points,
            mode: self.config.mode,
            reference_grid: self.grid,
            thresholds: self.config.filter,
        };
        process_request(&request, &self.calculator)
    }

    /// Process all pairs in parallel
    ///
    /// Coordinate-system mismatches are detected up front and abort the run
    /// before any pair is processed; every other failure only skips its pair.
    pub fn run(&self, pairs: &[ImagePair]) -> Result<RunReport, DeformationError> {
        self.check_modes(pairs)?;

        let outcomes: Vec<Result<ProcessingResult, DeformationError>> =
            pairs.par_iter().map(|pair| self.process_pair(pair)).collect();

        let mut results = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(result) => results.push(result),
                Err(error) => {
                    warn!(%error, "skipping pair");
                    failures.push(error);
                }
            }
        }

        let summary = summarize(&results, &failures);
        let coverage = self.config.coverage.map(|config| {
            let mut map = CoverageMap::new(config);
            for result in &results {
                map.add_pair(result.absolute_start_positions());
            }
            map
        });

        info!(
            processed = summary.pairs_processed,
            skipped = summary.pairs_skipped,
            cells = summary.cells_computed,
            valid = summary.cells_valid(),
            "run complete"
        );

        Ok(RunReport {
            results,
            failures,
            summary,
            coverage,
        })
    }
}

/// Aggregate per-pair outcomes into run counts
pub fn summarize(results: &[ProcessingResult], failures: &[DeformationError]) -> RunSummary {
    let mut summary = RunSummary {
        pairs_processed: results.len(),
        pairs_skipped: failures.len(),
        ..Default::default()
    };

    for failure in failures {
        *summary.skipped_by_kind.entry(failure.kind().to_string()).or_insert(0) += 1;
    }
    for flag in ValidityFlag::ALL {
        summary.cells_by_flag.insert(flag, 0);
    }

    let mut intervals = Vec::with_capacity(results.len());
    for result in results {
        summary.cells_computed += result.cells.len();
        summary.points_dropped += result.dropped_points.len();
        for (flag, count) in result.flag_counts() {
            *summary.cells_by_flag.entry(flag).or_insert(0) += count;
        }
        if let Some(interval) = result.mean_interval_hours() {
            intervals.push(interval);
        }
    }
    summary.interval_histogram = IntervalHistogram::from_intervals(&intervals);
    summary
}
