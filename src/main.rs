use serde::{Deserialize, Serialize};
use std::fs;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;

use seaice_deformation::processing::{DeformationPipeline, ProcessingResult, RunSummary};
use seaice_deformation::core::ARCTIC_OCEAN_AREA_KM2;
use seaice_deformation::{ImagePair, PipelineConfig};

/// Input file: every image pair of the run
#[derive(Debug, Deserialize)]
struct PairsJson {
    pairs: Vec<ImagePair>,
}

/// Command-line options
#[derive(Debug, PartialEq)]
struct Options {
    config_path: String,
    pairs_path: String,
    cells_path: Option<String>,
    coverage_path: Option<String>,
    log_level: LevelFilter,
}

#[derive(Serialize)]
struct CellsJson<'a> {
    results: &'a [ProcessingResult],
}

fn usage(program: &str) -> String {
    format!(
        "Usage: {} <config.json> <pairs.json> [--cells <out.json>] [--coverage <out.json>] [--log-level <level>]",
        program
    )
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let program = args.first().map_or("seaice-deformation", |s| s.as_str());
    let mut positional = Vec::new();
    let mut options = Options {
        config_path: String::new(),
        pairs_path: String::new(),
        cells_path: None,
        coverage_path: None,
        log_level: LevelFilter::INFO,
    };

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--cells" | "--coverage" | "--log-level" => {
                let value = iter
                    .next()
                    .ok_or_else(|| format!("missing value for {}\n{}", arg, usage(program)))?;
                match arg.as_str() {
                    "--cells" => options.cells_path = Some(value.clone()),
                    "--coverage" => options.coverage_path = Some(value.clone()),
                    _ => {
                        options.log_level = value
                            .parse::<LevelFilter>()
                            .map_err(|_| format!("invalid log level '{}'", value))?;
                    }
                }
            }
            flag if flag.starts_with("--") => {
                return Err(format!("unknown option {}\n{}", flag, usage(program)));
            }
            _ => positional.push(arg.clone()),
        }
    }

    if positional.len() != 2 {
        return Err(usage(program));
    }
    options.pairs_path = positional.pop().unwrap_or_default();
    options.config_path = positional.pop().unwrap_or_default();
    Ok(options)
}

fn print_summary(summary: &RunSummary) {
    println!(
        "Pairs: {} processed, {} skipped",
        summary.pairs_processed, summary.pairs_skipped
    );
    for (kind, count) in &summary.skipped_by_kind {
        println!("  skipped ({}): {}", kind, count);
    }
    println!(
        "Cells: {} computed, {} valid, {} filtered; {} points dropped",
        summary.cells_computed,
        summary.cells_valid(),
        summary.cells_filtered(),
        summary.points_dropped
    );
    for (flag, count) in &summary.cells_by_flag {
        println!("  {:<22} {}", flag, count);
    }

    let histogram = &summary.interval_histogram;
    println!("Pair intervals (hours):");
    for (bounds, count) in histogram.edges_hours.windows(2).zip(&histogram.counts) {
        println!("  [{:>5.1}, {:>5.1})  {}", bounds[0], bounds[1], count);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{}", message);
            return Err("Invalid arguments".into());
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(options.log_level)
        .with_target(false)
        .init();

    let config = PipelineConfig::from_file(&options.config_path)?;
    let json_data = fs::read_to_string(&options.pairs_path)?;
    let input: PairsJson = serde_json::from_str(&json_data)?;
    info!(pairs = input.pairs.len(), mode = ?config.mode, "loaded input");

    // Built once and shared read-only by every pair
    let grid = config.grid.as_ref().map(|g| g.build());
    let pipeline = DeformationPipeline::new(config, grid.as_deref())?;
    let report = pipeline.run(&input.pairs)?;

    print_summary(&report.summary);

    if let Some(path) = &options.cells_path {
        let content = serde_json::to_string_pretty(&CellsJson { results: &report.results })?;
        fs::write(path, content)?;
        info!(path = %path, "wrote cells");
    }
    if let Some(path) = &options.coverage_path {
        match &report.coverage {
            Some(coverage) => {
                fs::write(path, serde_json::to_string(coverage)?)?;
                info!(
                    path = %path,
                    max_count = coverage.max_count(),
                    covered_fraction = coverage.covered_fraction(ARCTIC_OCEAN_AREA_KM2),
                    "wrote coverage map"
                );
            }
            None => eprintln!("No coverage section in config; {} not written", path),
        }
    }

    Ok(())
}
