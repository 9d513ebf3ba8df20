//! Input parsing: standards readings text and the sample table (CSV or workbook).
//!
//! Design goals:
//! - **Strict schema**: the sample table must carry the reading column
//!   (default `Abs`); a missing column is reported before any fitting happens.
//! - **All-or-nothing rows**: every result row must line up with an input row,
//!   so bad cells are collected (with line numbers) and reject the whole table.
//! - **Separation of concerns**: no fitting logic here

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use csv::StringRecord;
use tracing::{debug, info};

use crate::domain::StandardPoint;
use crate::error::AppError;

/// Maximum number of row errors listed in the rejection message.
const MAX_REPORTED_ROW_ERRORS: usize = 5;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    /// 1-based line number in the CSV (the header is line 1).
    pub line: usize,
    pub message: String,
}

/// On-disk format of a sample table, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    /// Spreadsheet workbook (`.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`); the first sheet is read.
    Workbook,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("xlsx" | "xlsm" | "xlsb" | "xls" | "ods") => TableFormat::Workbook,
            _ => TableFormat::Csv,
        }
    }
}

/// Readings loaded from the sample table, in row order.
#[derive(Debug, Clone)]
pub struct SampleTable {
    pub column: String,
    pub readings: Vec<f64>,
}

/// Parse a comma-separated list of numbers.
///
/// Every item must be a finite number; empty items are errors.
pub fn parse_number_list(text: &str) -> Result<Vec<f64>, String> {
    text.split(',')
        .map(str::trim)
        .map(|item| match item.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            Ok(_) => Err(format!("'{item}' is not a finite number")),
            Err(_) if item.is_empty() => Err("empty value in list".to_string()),
            Err(_) => Err(format!("'{item}' is not a valid number")),
        })
        .collect()
}

/// Parse the standards readings text and pair it with the concentration levels.
pub fn parse_standards(text: &str, concentrations: &[f64]) -> Result<Vec<StandardPoint>, AppError> {
    let readings = parse_number_list(text)
        .map_err(|e| AppError::InvalidStandards(format!("ensure the readings are valid numbers ({e})")))?;

    if readings.len() != concentrations.len() {
        return Err(AppError::InvalidStandards(format!(
            "please enter exactly {} values, got {}",
            concentrations.len(),
            readings.len()
        )));
    }

    Ok(concentrations
        .iter()
        .zip(readings)
        .map(|(&concentration, reading)| StandardPoint {
            concentration,
            reading,
        })
        .collect())
}

/// Parse the concentration levels of the standards.
pub fn parse_concentrations(text: &str) -> Result<Vec<f64>, AppError> {
    let values = parse_number_list(text)
        .map_err(|e| AppError::InvalidConfig(format!("invalid standard concentrations ({e})")))?;
    if let Some(v) = values.iter().find(|v| **v < 0.0) {
        return Err(AppError::InvalidConfig(format!(
            "standard concentrations must be >= 0, got {v}"
        )));
    }
    Ok(values)
}

/// Load the sample table from a CSV file or a spreadsheet workbook.
pub fn load_samples(path: &Path, column: &str) -> Result<SampleTable, AppError> {
    match TableFormat::from_path(path) {
        TableFormat::Csv => {
            let file = File::open(path)
                .map_err(|e| AppError::io(format!("Failed to open sample CSV '{}'", path.display()), e))?;
            read_samples(file, column, path)
        }
        TableFormat::Workbook => read_workbook_samples(path, column),
    }
}

/// Read the sample table from any CSV source. `path` is used for messages only.
pub fn read_samples<R: Read>(source: R, column: &str, path: &Path) -> Result<SampleTable, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader
        .headers()
        .map_err(|e| AppError::csv("Failed to read CSV headers", e))?
        .clone();
    let col_idx = locate_column(headers.iter(), column, path)?;

    let mut rows = RowCollector::default();

    for (idx, result) in reader.records().enumerate() {
        // +2 because:
        // - records() starts at line 1 after headers
        // - CSV is 1-based line numbers
        let line = idx + 2;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                rows.push(line, Err(format!("CSV parse error: {e}")));
                continue;
            }
        };

        // Fully blank lines (trailing spreadsheet rows) are not samples.
        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }

        rows.push(line, parse_reading(&record, col_idx, column));
    }

    rows.finish(column, path)
}

/// Read the sample table from the first sheet of a spreadsheet workbook.
///
/// The first used row holds the headers. Line numbers in errors are the
/// spreadsheet's own 1-based row numbers.
pub fn read_workbook_samples(path: &Path, column: &str) -> Result<SampleTable, AppError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| {
        AppError::workbook_read(format!("Failed to open sample workbook '{}'", path.display()), e)
    })?;
    let Some(sheet) = workbook.sheet_names().first().cloned() else {
        return Err(AppError::InvalidSamples(format!(
            "'{}' has no worksheets",
            path.display()
        )));
    };
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| AppError::workbook_read(format!("Failed to read sheet '{sheet}'"), e))?;
    debug!(sheet = %sheet, "reading sample sheet");

    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let mut cells = range.rows();
    let headers: Vec<String> = cells
        .next()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .unwrap_or_default();
    let col_idx = locate_column(headers.iter().map(String::as_str), column, path)?;

    let mut rows = RowCollector::default();
    for (idx, row) in cells.enumerate() {
        // The header sits on spreadsheet row `first_row + 1`.
        let line = first_row + idx + 2;
        if row.iter().all(is_blank_cell) {
            continue;
        }
        rows.push(line, parse_workbook_reading(row.get(col_idx), column));
    }

    rows.finish(column, path)
}

/// Accumulates parsed readings and row errors for one table.
#[derive(Debug, Default)]
struct RowCollector {
    readings: Vec<f64>,
    errors: Vec<RowError>,
}

impl RowCollector {
    fn push(&mut self, line: usize, parsed: Result<f64, String>) {
        match parsed {
            Ok(v) => self.readings.push(v),
            Err(message) => self.errors.push(RowError { line, message }),
        }
    }

    fn finish(self, column: &str, path: &Path) -> Result<SampleTable, AppError> {
        if !self.errors.is_empty() {
            return Err(AppError::InvalidSamples(summarize_row_errors(&self.errors)));
        }
        if self.readings.is_empty() {
            return Err(AppError::InvalidSamples(format!(
                "'{}' has no sample rows",
                path.display()
            )));
        }

        info!(rows = self.readings.len(), column, "loaded sample table");
        Ok(SampleTable {
            column: column.to_string(),
            readings: self.readings,
        })
    }
}

fn locate_column<'a>(
    headers: impl IntoIterator<Item = &'a str>,
    column: &str,
    path: &Path,
) -> Result<usize, AppError> {
    let header_map = build_header_map(headers);
    let Some(&col_idx) = header_map.get(column) else {
        return Err(AppError::MissingColumn {
            column: column.to_string(),
            path: path.to_path_buf(),
        });
    };
    debug!(column, col_idx, "located reading column");
    Ok(col_idx)
}

fn build_header_map<'a>(headers: impl IntoIterator<Item = &'a str>) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, name) in headers.into_iter().enumerate() {
        // First occurrence wins when a header is duplicated.
        map.entry(normalize_header_name(name)).or_insert(idx);
    }
    map
}

fn normalize_header_name(name: &str) -> String {
    // Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on the
    // first header. If we don't strip it, schema validation will incorrectly
    // report missing columns.
    name.trim().trim_start_matches('\u{feff}').trim().to_string()
}

fn parse_reading(record: &StringRecord, col_idx: usize, column: &str) -> Result<f64, String> {
    parse_reading_text(record.get(col_idx), column)
}

fn parse_reading_text(cell: Option<&str>, column: &str) -> Result<f64, String> {
    let raw = cell
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing `{column}` value."))?;
    let v = raw
        .parse::<f64>()
        .map_err(|_| format!("Invalid `{column}` value '{raw}'."))?;
    if !v.is_finite() {
        return Err(format!("Non-finite `{column}` value '{raw}'."));
    }
    Ok(v)
}

fn parse_workbook_reading(cell: Option<&Data>, column: &str) -> Result<f64, String> {
    match cell {
        None | Some(Data::Empty) => Err(format!("Missing `{column}` value.")),
        Some(Data::Float(v)) if v.is_finite() => Ok(*v),
        Some(Data::Int(v)) => Ok(*v as f64),
        Some(Data::String(text)) => parse_reading_text(Some(text.as_str()), column),
        Some(other) => Err(format!("Invalid `{column}` value '{other}'.")),
    }
}

fn is_blank_cell(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

fn summarize_row_errors(errors: &[RowError]) -> String {
    let mut parts: Vec<String> = errors
        .iter()
        .take(MAX_REPORTED_ROW_ERRORS)
        .map(|e| format!("line {}: {}", e.line, e.message))
        .collect();
    if errors.len() > MAX_REPORTED_ROW_ERRORS {
        parts.push(format!("... and {} more", errors.len() - MAX_REPORTED_ROW_ERRORS));
    }
    format!("{} bad row(s): {}", errors.len(), parts.join("; "))
}
