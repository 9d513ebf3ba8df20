//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - runs the calibration pipeline
//! - prints reports
//! - writes optional exports

use clap::Parser;
use tracing::info;

use crate::cli::{CalibrationArgs, Command, FitArgs, GridArgs, LookupArgs, ResolveArgs};
use crate::domain::{AssayConfig, GridSpec};
use crate::error::AppError;
use crate::io::curve::{build_curve_file, read_curve_json, write_curve_json};
use crate::io::export::{write_results, write_results_json};
use crate::io::ingest::parse_concentrations;
use crate::report::{format_fit_summary, format_results, grid_precision};

pub mod pipeline;

/// Entry point for the `hcg` binary.
pub fn run() -> Result<(), AppError> {
    // A missing `.env` is the common case; only a malformed one is worth reporting.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(AppError::InvalidConfig(format!("Failed to load .env: {e}")));
        }
    }

    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Resolve(args) => handle_resolve(args),
        Command::Fit(args) => handle_fit(args),
        Command::Lookup(args) => handle_lookup(args),
    }
}

fn handle_resolve(args: ResolveArgs) -> Result<(), AppError> {
    let config = resolve_config_from_args(&args)?;
    let run = pipeline::run_assay(&config)?;
    let cal = &run.calibration;

    if !args.quiet {
        println!(
            "{}",
            format_fit_summary(&cal.standards, &cal.fit, &cal.grid, config.precision)
        );
        println!(
            "Samples: {} reading(s) from column '{}'\n",
            run.samples.readings.len(),
            run.samples.column
        );
    }
    println!("{}", format_results(&run.records, config.precision));

    if let Some(path) = &config.export_results {
        let format = write_results(path, &run.records, config.precision)?;
        info!(path = %path.display(), ?format, "results table written");
    }
    if let Some(path) = &config.export_json {
        write_results_json(path, &run.records, config.precision)?;
        info!(path = %path.display(), "results JSON written");
    }
    if let Some(path) = &config.export_curve {
        let curve = build_curve_file(config.label.as_deref(), &cal.standards, &cal.fit, cal.grid.spec());
        write_curve_json(path, &curve)?;
        info!(path = %path.display(), "curve JSON written");
    }

    Ok(())
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = config_from_calibration(&args.calibration)?;
    let cal = pipeline::calibrate(&config)?;

    println!(
        "{}",
        format_fit_summary(&cal.standards, &cal.fit, &cal.grid, config.precision)
    );

    if let Some(path) = &args.export_curve {
        let curve = build_curve_file(config.label.as_deref(), &cal.standards, &cal.fit, cal.grid.spec());
        write_curve_json(path, &curve)?;
        info!(path = %path.display(), "curve JSON written");
    }
    Ok(())
}

fn handle_lookup(args: LookupArgs) -> Result<(), AppError> {
    let curve = read_curve_json(&args.curve)?;
    let grid = args.regrid.then(|| grid_spec_from_args(&args.grid));
    let cal = pipeline::calibration_from_curve(&curve, grid)?;
    if let Some(label) = &curve.label {
        println!("Curve: {label} ({})", curve.created_at.format("%Y-%m-%d %H:%M UTC"));
    }

    let precision = args
        .grid
        .precision
        .unwrap_or_else(|| grid_precision(cal.grid.spec().step));
    let records = crate::fit::resolve_samples(&cal.grid, &args.readings)?;

    println!("{}", format_results(&records, precision));
    Ok(())
}

fn grid_spec_from_args(args: &GridArgs) -> GridSpec {
    GridSpec {
        start: args.grid_start,
        end: args.grid_end,
        step: args.grid_step,
    }
}

/// Build the pipeline configuration shared by `fit` and `resolve`.
pub fn config_from_calibration(args: &CalibrationArgs) -> Result<AssayConfig, AppError> {
    let grid = grid_spec_from_args(&args.grid);
    Ok(AssayConfig {
        label: args.label.clone(),
        concentrations: parse_concentrations(&args.concentrations)?,
        readings: args.readings.clone(),
        grid,
        max_evaluations: args.max_evals,
        precision: args.grid.precision.unwrap_or_else(|| grid_precision(grid.step)),
        ..AssayConfig::default()
    })
}

/// Build the full pipeline configuration for `resolve`.
pub fn resolve_config_from_args(args: &ResolveArgs) -> Result<AssayConfig, AppError> {
    let base = config_from_calibration(&args.calibration)?;
    Ok(AssayConfig {
        samples_path: Some(args.samples.clone()),
        reading_column: args.column.clone(),
        export_results: args.export.clone(),
        export_json: args.export_json.clone(),
        export_curve: args.export_curve.clone(),
        ..base
    })
}

/// Rewrite argv so `hcg <flags>` means `hcg resolve <flags>`.
///
/// Rules:
/// - `hcg`                          -> unchanged (prints help)
/// - `hcg --samples plate.csv ...`  -> `hcg resolve --samples plate.csv ...`
/// - `hcg --help/--version/-h`      -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    // If the first token is a flag, treat it as "resolve flags".
    if arg1.starts_with('-') {
        argv.insert(1, "resolve".to_string());
    }
    argv
}
