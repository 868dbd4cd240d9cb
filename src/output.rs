use std::path::{Path, PathBuf};

use crate::error::{IngestError, Result};
use crate::parsing::CanonicalTable;

/// Raw file name with its extension swapped for `file_extension`.
pub fn create_data_parsed_filename(raw_file: &Path, file_extension: &str) -> String {
    let base = raw_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = base.rsplit_once('.').map(|(s, _)| s).unwrap_or(&base);
    format!("{}.{}", stem, file_extension)
}

/// Write `table` as CSV under `output_dir`, named after `raw_file`.
///
/// Comma-separated with a header row, no index column, ISO dates and
/// double quotes only where a field needs them.
pub fn write_table(table: &CanonicalTable, output_dir: &Path, raw_file: &Path) -> Result<PathBuf> {
    let path = output_dir.join(create_data_parsed_filename(raw_file, "csv"));
    let write_err = |reason: String| IngestError::Write {
        path: path.clone(),
        reason,
    };

    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b',')
        .quote(b'"')
        .quote_style(csv::QuoteStyle::Necessary)
        .from_path(&path)
        .map_err(|e| write_err(e.to_string()))?;

    wtr.write_record(&table.header)
        .map_err(|e| write_err(e.to_string()))?;
    for row in &table.rows {
        wtr.write_record(row.iter().map(|c| c.render()))
            .map_err(|e| write_err(e.to_string()))?;
    }
    wtr.flush().map_err(|e| write_err(e.to_string()))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::Cell;
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn parsed_name_swaps_extension() {
        let raw = Path::new("/data/raw/2024-01-15-10-00_SPY_holdings.xlsx");
        assert_eq!(create_data_parsed_filename(raw, "csv"), "2024-01-15-10-00_SPY_holdings.csv");
        assert_eq!(create_data_parsed_filename(Path::new("a.b.xlsx"), "csv"), "a.b.csv");
        assert_eq!(create_data_parsed_filename(Path::new("noext"), "csv"), "noext.csv");
    }

    #[test]
    fn writes_header_quotes_and_iso_dates() {
        let dir = tempdir().unwrap();
        let table = CanonicalTable::new(
            vec!["Name".to_string(), "Weight".to_string(), "Acquired".to_string()],
            vec![
                vec![
                    Cell::Text("MICROSOFT CORP, CLASS A".to_string()),
                    Cell::Text("6.98".to_string()),
                    Cell::Date(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()),
                ],
                vec![Cell::Text("SAY \"HI\"".to_string()), Cell::Empty, Cell::Empty],
            ],
        );

        let path = write_table(&table, dir.path(), Path::new("2024-01-15-10-00_SPY_holdings.csv")).unwrap();

        assert_eq!(path, dir.path().join("2024-01-15-10-00_SPY_holdings.csv"));
        assert_eq!(
            fs::read_to_string(path).unwrap(),
            "Name,Weight,Acquired\n\"MICROSOFT CORP, CLASS A\",6.98,2024-01-05\n\"SAY \"\"HI\"\"\",,\n"
        );
    }

    #[test]
    fn unwritable_directory_is_write_error() {
        let dir = tempdir().unwrap();
        let table = CanonicalTable::new(vec!["Name".to_string()], Vec::new());
        let err = write_table(&table, &dir.path().join("missing"), Path::new("x.csv")).unwrap_err();
        assert!(matches!(err, IngestError::Write { .. }));
    }
}
