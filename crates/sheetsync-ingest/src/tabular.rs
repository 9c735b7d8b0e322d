//! Tabular file readers
//!
//! The reader is picked from the file extension: `.csv` and `.tsv` go
//! through the `csv` crate, anything else is treated as a spreadsheet
//! workbook and opened with `calamine`, which sniffs xlsx/xlsm/xlsb/xls/ods
//! from the bytes themselves.
//!
//! The first row is always the header. Empty cells come out as `null`.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use calamine::{Data, DataType, Reader};
use serde_json::{Number, Value};

use crate::error::ParseError;
use crate::transform::Row;

/// Cell texts read as missing, matching what common dataframe readers treat as NA
const NA_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularFormat {
    Csv,
    Tsv,
    Spreadsheet,
}

impl TabularFormat {
    /// Pick a reader from the extension of `name`
    pub fn from_file_name(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("csv") => TabularFormat::Csv,
            Some("tsv") => TabularFormat::Tsv,
            _ => TabularFormat::Spreadsheet,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TabularFormat::Csv => "csv",
            TabularFormat::Tsv => "tsv",
            TabularFormat::Spreadsheet => "spreadsheet",
        }
    }
}

impl std::fmt::Display for TabularFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse `bytes` into header-keyed rows
pub fn parse(bytes: &[u8], format: TabularFormat) -> Result<Vec<Row>, ParseError> {
    let rows = match format {
        TabularFormat::Csv => parse_delimited(bytes, b',')?,
        TabularFormat::Tsv => parse_delimited(bytes, b'\t')?,
        TabularFormat::Spreadsheet => parse_spreadsheet(bytes)?,
    };
    tracing::debug!(format = %format, rows = rows.len(), "Parsed tabular file");
    Ok(rows)
}

/// Read a file from disk, picking the format from its name
pub fn parse_path(path: &Path) -> Result<Vec<Row>, ParseError> {
    let bytes = std::fs::read(path)?;
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    parse(&bytes, TabularFormat::from_file_name(name))
}

// ============================================================================
// Delimited text
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int,
    Float,
    Bool,
    Text,
}

fn parse_delimited(bytes: &[u8], delimiter: u8) -> Result<Vec<Row>, ParseError> {
    // Strip a UTF-8 BOM so it does not end up in the first header
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let raw_headers = reader.headers()?.clone();
    if raw_headers.is_empty() || raw_headers.iter().all(|h| h.trim().is_empty()) {
        return Err(ParseError::Empty);
    }
    let headers = header_names(raw_headers.iter().map(str::to_string).collect());
    let width = headers.len();

    let mut cells: Vec<Vec<Option<String>>> = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        if record.len() > width {
            return Err(ParseError::RaggedRow {
                line: record.position().map(|p| p.line()).unwrap_or_default(),
                expected: width,
                found: record.len(),
            });
        }

        let mut row: Vec<Option<String>> = record
            .iter()
            .map(|field| (!is_na(field)).then(|| field.to_string()))
            .collect();
        row.resize(width, None);
        cells.push(row);
    }

    let kinds: Vec<ColumnKind> = (0..width)
        .map(|col| infer_kind(cells.iter().filter_map(|row| row[col].as_deref())))
        .collect();

    Ok(cells
        .into_iter()
        .map(|row| {
            headers
                .iter()
                .zip(kinds.iter())
                .zip(row)
                .map(|((name, kind), cell)| {
                    let value = cell.map_or(Value::Null, |text| typed_cell(&text, *kind));
                    (name.clone(), value)
                })
                .collect()
        })
        .collect())
}

fn is_na(field: &str) -> bool {
    NA_MARKERS.contains(&field.trim())
}

fn infer_kind<'a>(mut values: impl Iterator<Item = &'a str> + Clone) -> ColumnKind {
    if values.clone().all(|v| v.trim().parse::<i64>().is_ok()) {
        ColumnKind::Int
    } else if values
        .clone()
        .all(|v| v.trim().parse::<f64>().is_ok_and(f64::is_finite))
    {
        ColumnKind::Float
    } else if values.all(|v| parse_bool(v).is_some()) {
        ColumnKind::Bool
    } else {
        ColumnKind::Text
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim() {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

fn typed_cell(text: &str, kind: ColumnKind) -> Value {
    let typed = match kind {
        ColumnKind::Int => text.trim().parse::<i64>().ok().map(Value::from),
        ColumnKind::Float => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        ColumnKind::Bool => parse_bool(text).map(Value::Bool),
        ColumnKind::Text => None,
    };
    typed.unwrap_or_else(|| Value::String(text.to_string()))
}

/// Fill blank header cells and make repeated names unique (`a`, `a.1`, `a.2`)
fn header_names(raw: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    raw.into_iter()
        .enumerate()
        .map(|(idx, name)| {
            let base = if name.trim().is_empty() {
                format!("Unnamed: {idx}")
            } else {
                name
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let unique = if *count == 0 {
                base
            } else {
                format!("{base}.{count}")
            };
            *count += 1;
            unique
        })
        .collect()
}

// ============================================================================
// Spreadsheets
// ============================================================================

fn parse_spreadsheet(bytes: &[u8]) -> Result<Vec<Row>, ParseError> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ParseError::Spreadsheet(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ParseError::NoWorksheet)?
        .map_err(|e| ParseError::Spreadsheet(e.to_string()))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Err(ParseError::Empty);
    };
    // The range is rectangular, so cells right of the last header land
    // under `Unnamed: N` rather than being dropped
    let headers = header_names(header_row.iter().map(header_text).collect());

    Ok(rows
        .filter(|cells| !cells.iter().all(is_blank_cell))
        .map(|cells| {
            headers
                .iter()
                .enumerate()
                .map(|(idx, name)| {
                    let value = cells.get(idx).map_or(Value::Null, cell_value);
                    (name.clone(), value)
                })
                .collect()
        })
        .collect())
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

fn is_blank_cell(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) if is_na(s) => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(_) => cell
            .as_datetime()
            .map_or(Value::Null, |dt| Value::String(dt.format("%Y-%m-%dT%H:%M:%S").to_string())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
    }
}
