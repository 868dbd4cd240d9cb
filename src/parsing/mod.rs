// Parsing: vendor raw files into the canonical table shared with the output writer

pub mod registry;
pub mod strategies;

pub use registry::{ParsingStrategy, StrategyRegistry};

use anyhow::{bail, Context, Result};
use calamine::{open_workbook_auto, Data, DataType, Reader};
use chrono::NaiveDate;
use std::fs;
use std::path::Path;

const DATE_FORMATS: &[&str] = &["%d-%b-%Y", "%m/%d/%Y", "%Y-%m-%d"];
const OUTPUT_DATE_FORMAT: &str = "%Y-%m-%d";
const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// One value of a canonical table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Text(String),
    Date(NaiveDate),
}

impl Cell {
    /// Classify a raw field: blank, a recognized date, or text kept verbatim.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        for fmt in DATE_FORMATS {
            if let Ok(d) = NaiveDate::parse_from_str(trimmed, fmt) {
                return Cell::Date(d);
            }
        }
        Cell::Text(raw.to_string())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Field text as written to output; dates are ISO `YYYY-MM-DD`.
    pub fn render(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Date(d) => d.format(OUTPUT_DATE_FORMAT).to_string(),
        }
    }
}

/// Header plus zero or more rows, every row as wide as the header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CanonicalTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl CanonicalTable {
    /// Build a table, padding short rows with `Cell::Empty` and unnamed columns with "".
    pub fn new(mut header: Vec<String>, mut rows: Vec<Vec<Cell>>) -> Self {
        let width = rows.iter().map(Vec::len).chain([header.len()]).max().unwrap_or(0);
        header.resize(width, String::new());
        for row in &mut rows {
            row.resize(width, Cell::Empty);
        }
        Self { header, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read a raw vendor file as a grid of cells, with no header interpretation.
///
/// Spreadsheet extensions go through the first worksheet of the workbook;
/// anything else is read as comma-separated text.
pub fn read_raw_rows(path: &Path) -> Result<Vec<Vec<Cell>>> {
    let is_workbook = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| WORKBOOK_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false);

    if is_workbook {
        return read_workbook_rows(path);
    }
    Ok(read_delimited_rows(path)?
        .into_iter()
        .map(|r| r.iter().map(|f| Cell::infer(f)).collect())
        .collect())
}

/// Read the first worksheet of a workbook, keeping blank rows in place.
pub fn read_workbook_rows(path: &Path) -> Result<Vec<Vec<Cell>>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open workbook {}", path.display()))?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.with_context(|| format!("Failed to read first sheet of {}", path.display()))?,
        None => bail!("workbook {} has no sheets", path.display()),
    };

    // the range begins at the first used cell, not at A1
    let (row_offset, col_offset) = range.start().unwrap_or((0, 0));
    let mut rows: Vec<Vec<Cell>> = (0..row_offset).map(|_| Vec::new()).collect();
    for row in range.rows() {
        let mut cells = vec![Cell::Empty; col_offset as usize];
        cells.extend(row.iter().map(workbook_cell));
        rows.push(cells);
    }
    Ok(rows)
}

fn workbook_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::infer(s),
        Data::DateTime(_) | Data::DateTimeIso(_) => data
            .as_date()
            .map(Cell::Date)
            .unwrap_or_else(|| Cell::Text(data.to_string())),
        other => Cell::Text(other.to_string()),
    }
}

/// Read a comma-separated file into raw rows, keeping blank lines as empty rows.
///
/// Rows may have different widths. Invalid UTF-8 is replaced rather than rejected.
pub fn read_delimited_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    // The csv reader silently skips blank lines, so split logical lines first
    // and hand each non-blank one to the reader on its own.
    let mut rows = Vec::new();
    for (idx, line) in split_logical_lines(&data).into_iter().enumerate() {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.iter().all(u8::is_ascii_whitespace) {
            rows.push(Vec::new());
            continue;
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(line);
        let mut record = csv::ByteRecord::new();
        reader
            .read_byte_record(&mut record)
            .with_context(|| format!("Malformed delimited data in {} at row {}", path.display(), idx))?;
        rows.push(
            record
                .iter()
                .map(|f| String::from_utf8_lossy(f).into_owned())
                .collect(),
        );
    }
    Ok(rows)
}

/// Split on newlines that are not inside a quoted field.
fn split_logical_lines(data: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut field_start = true;
    let mut i = 0;
    while i < data.len() {
        let b = data[i];
        if in_quotes {
            if b == b'"' {
                if data.get(i + 1) == Some(&b'"') {
                    i += 1;
                } else {
                    in_quotes = false;
                }
            }
        } else {
            match b {
                b'"' if field_start => in_quotes = true,
                b'\n' => {
                    lines.push(&data[start..i]);
                    start = i + 1;
                }
                _ => {}
            }
            field_start = b == b',' || b == b'\n';
        }
        i += 1;
    }
    if start < data.len() {
        lines.push(&data[start..]);
    }
    lines
}

/// True when every cell of the row is empty (or the row has no cells).
pub fn is_blank_row(row: &[Cell]) -> bool {
    row.iter().all(Cell::is_empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn infers_dates_in_vendor_formats() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(Cell::infer("15-Jan-2024"), Cell::Date(d));
        assert_eq!(Cell::infer("01/15/2024"), Cell::Date(d));
        assert_eq!(Cell::infer(" 2024-01-15 "), Cell::Date(d));
        assert_eq!(Cell::infer("  "), Cell::Empty);
        assert_eq!(Cell::infer("APPLE INC"), Cell::Text("APPLE INC".to_string()));
        assert_eq!(Cell::infer("  APPLE INC "), Cell::Text("  APPLE INC ".to_string()));
        assert_eq!(Cell::infer("7.12"), Cell::Text("7.12".to_string()));
    }

    #[test]
    fn table_pads_to_widest_row() {
        let t = CanonicalTable::new(
            vec!["Name".to_string()],
            vec![vec![Cell::Text("A".to_string()), Cell::Text("1".to_string())], vec![]],
        );
        assert_eq!(t.header, vec!["Name".to_string(), String::new()]);
        assert_eq!(t.header.len(), 2);
        assert_eq!(t.rows[1], vec![Cell::Empty, Cell::Empty]);
    }

    #[test]
    fn blank_lines_survive_as_empty_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raw.csv");
        fs::write(&path, "Fund Name:,SPY\n\nName,Note\nA,\"two\nlines\"\n,,\nB,x\n\n").unwrap();

        let rows = read_raw_rows(&path).unwrap();
        let blanks: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, r)| is_blank_row(r))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(rows.len(), 7);
        assert_eq!(blanks, vec![1, 4, 6]);
        assert_eq!(rows[3], vec![Cell::Text("A".to_string()), Cell::Text("two\nlines".to_string())]);
        assert_eq!(rows[5], vec![Cell::Text("B".to_string()), Cell::Text("x".to_string())]);
    }
}
