//! Export resolved samples.
//!
//! The results table has exactly two columns, `Reading` and `hCG Concentration`,
//! one row per input sample in input order. It is written as a workbook with a
//! single `Results` sheet, or as CSV when the target ends in `.csv`. The JSON
//! export additionally carries the range flag.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;

use crate::domain::{
    RESULT_CONCENTRATION_HEADER, RESULT_READING_HEADER, RESULTS_SHEET_NAME, RangeFlag, SampleRecord,
};
use crate::error::AppError;
use crate::report::round_to;

/// Output format of the results table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultsFormat {
    Workbook,
    Csv,
}

impl ResultsFormat {
    /// `.csv` targets get CSV; everything else gets a workbook.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => ResultsFormat::Csv,
            _ => ResultsFormat::Workbook,
        }
    }
}

/// Write the results table in the format implied by `path`.
pub fn write_results(
    path: &Path,
    records: &[SampleRecord],
    precision: usize,
) -> Result<ResultsFormat, AppError> {
    let format = ResultsFormat::from_path(path);
    match format {
        ResultsFormat::Workbook => write_results_xlsx(path, records, precision)?,
        ResultsFormat::Csv => write_results_csv(path, records, precision)?,
    }
    Ok(format)
}

/// Write the results table as a workbook with a single `Results` sheet.
///
/// Concentrations are stored rounded to `precision` decimals and displayed
/// with the matching number format; readings are stored as given.
pub fn write_results_xlsx(path: &Path, records: &[SampleRecord], precision: usize) -> Result<(), AppError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let context = || format!("Failed to write results workbook '{}'", path.display());

    sheet
        .set_name(RESULTS_SHEET_NAME)
        .map_err(|e| AppError::workbook_write(context(), e))?;

    let header = Format::new().set_bold();
    let concentration = Format::new().set_num_format(number_format(precision));

    sheet
        .write_string_with_format(0, 0, RESULT_READING_HEADER, &header)
        .and_then(|s| s.write_string_with_format(0, 1, RESULT_CONCENTRATION_HEADER, &header))
        .map_err(|e| AppError::workbook_write(context(), e))?;

    for (i, r) in records.iter().enumerate() {
        let row = u32::try_from(i + 1).map_err(|_| {
            AppError::InvalidSamples(format!("{} samples do not fit in one worksheet", records.len()))
        })?;
        sheet
            .write_number(row, 0, r.reading)
            .and_then(|s| {
                s.write_number_with_format(row, 1, round_to(r.concentration, precision), &concentration)
            })
            .map_err(|e| AppError::workbook_write(context(), e))?;
    }
    sheet.set_column_width(1, 18).map_err(|e| AppError::workbook_write(context(), e))?;

    workbook
        .save(path)
        .map_err(|e| AppError::workbook_write(context(), e))?;
    Ok(())
}

/// Spreadsheet number format showing `precision` decimals (`0`, `0.0`, `0.00`, ...).
fn number_format(precision: usize) -> String {
    if precision == 0 {
        "0".to_string()
    } else {
        format!("0.{}", "0".repeat(precision))
    }
}

/// Write the results table as CSV to a file.
pub fn write_results_csv(path: &Path, records: &[SampleRecord], precision: usize) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create results CSV '{}'", path.display()), e))?;
    write_results_csv_to(file, records, precision)
}

/// Write the results table as CSV to any writer.
pub fn write_results_csv_to<W: Write>(
    out: W,
    records: &[SampleRecord],
    precision: usize,
) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(out);
    writer
        .write_record([RESULT_READING_HEADER, RESULT_CONCENTRATION_HEADER])
        .map_err(|e| AppError::csv("Failed to write results CSV header", e))?;

    for r in records {
        writer
            .write_record([
                r.reading.to_string(),
                format!("{:.*}", precision, r.concentration),
            ])
            .map_err(|e| AppError::csv("Failed to write results CSV row", e))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::io("Failed to flush results CSV", e))?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct JsonRow {
    reading: f64,
    concentration: f64,
    flag: RangeFlag,
}

/// Write the results as a JSON array of `{ reading, concentration, flag }`.
pub fn write_results_json(path: &Path, records: &[SampleRecord], precision: usize) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create results JSON '{}'", path.display()), e))?;

    let rows: Vec<JsonRow> = records
        .iter()
        .map(|r| JsonRow {
            reading: r.reading,
            concentration: round_to(r.concentration, precision),
            flag: r.flag,
        })
        .collect();

    serde_json::to_writer_pretty(file, &rows)
        .map_err(|e| AppError::json("Failed to write results JSON", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<SampleRecord> {
        vec![
            SampleRecord {
                reading: 0.376,
                concentration: 49.300000000000004,
                flag: RangeFlag::InRange,
            },
            SampleRecord {
                reading: 0.001,
                concentration: 0.0,
                flag: RangeFlag::AtLowerBound,
            },
        ]
    }

    #[test]
    fn csv_has_two_columns_in_input_order() {
        let mut buf = Vec::new();
        write_results_csv_to(&mut buf, &records(), 1).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "Reading,hCG Concentration\n0.376,49.3\n0.001,0.0\n");
    }

    #[test]
    fn json_export_round_trips_through_serde() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        write_results_json(&path, &records(), 1).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v[0]["concentration"], 49.3);
        assert_eq!(v[1]["flag"], "at_lower_bound");
    }

    fn read_back(path: &Path) -> (Vec<String>, Vec<Vec<calamine::Data>>) {
        use calamine::Reader;

        let mut workbook = calamine::open_workbook_auto(path).unwrap();
        let names = workbook.sheet_names();
        let range = workbook.worksheet_range(&names[0]).unwrap();
        let rows = range.rows().map(|row| row.to_vec()).collect();
        (names, rows)
    }

    #[test]
    fn results_format_follows_extension() {
        assert_eq!(ResultsFormat::from_path(Path::new("hcg_results.xlsx")), ResultsFormat::Workbook);
        assert_eq!(ResultsFormat::from_path(Path::new("out.CSV")), ResultsFormat::Csv);
        assert_eq!(ResultsFormat::from_path(Path::new("out")), ResultsFormat::Workbook);
    }

    #[test]
    fn workbook_has_a_single_results_sheet() {
        use calamine::Data;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hcg_results.xlsx");
        assert_eq!(write_results(&path, &records(), 1).unwrap(), ResultsFormat::Workbook);

        let (names, rows) = read_back(&path);
        assert_eq!(names, vec!["Results".to_string()]);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec![
            Data::String("Reading".to_string()),
            Data::String("hCG Concentration".to_string()),
        ]);
        assert_eq!(rows[1], vec![Data::Float(0.376), Data::Float(49.3)]);
        assert_eq!(rows[2], vec![Data::Float(0.001), Data::Float(0.0)]);
    }

    #[test]
    fn csv_target_is_still_supported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        assert_eq!(write_results(&path, &records(), 1).unwrap(), ResultsFormat::Csv);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "Reading,hCG Concentration\n0.376,49.3\n0.001,0.0\n");
    }

    #[test]
    fn number_format_matches_precision() {
        assert_eq!(number_format(0), "0");
        assert_eq!(number_format(1), "0.0");
        assert_eq!(number_format(3), "0.000");
    }

    #[test]
    fn csv_file_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hcg_results.csv");
        write_results_csv(&path, &records(), 2).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Reading,hCG Concentration\n"));
        assert!(text.contains("0.376,49.30\n"));
    }
}
