use anyhow::{bail, Result};
use std::path::Path;
use tracing::debug;

use crate::parsing::registry::ParsingStrategy;
use crate::parsing::{is_blank_row, read_raw_rows, CanonicalTable, Cell};

/// State Street (SSGA) holdings export.
///
/// Published as an `.xlsx` workbook; delimited text exports are read too.
/// The sheet opens with fund metadata and closes with disclaimers; the
/// holdings block sits between the first two fully-empty rows, header first.
pub struct SsgaStrategy;

impl SsgaStrategy {
    pub const NAME: &'static str = "ssga";
}

impl ParsingStrategy for SsgaStrategy {
    fn parse(&self, file_path: &Path) -> Result<CanonicalTable> {
        let rows = read_raw_rows(file_path)?;
        extract_between_blank_rows(rows)
    }
}

fn extract_between_blank_rows(rows: Vec<Vec<Cell>>) -> Result<CanonicalTable> {
    let mut blanks = rows
        .iter()
        .enumerate()
        .filter(|(_, r)| is_blank_row(r))
        .map(|(i, _)| i);

    let (first, second) = match (blanks.next(), blanks.next()) {
        (Some(a), Some(b)) => (a, b),
        (found, _) => bail!(
            "expected two fully-empty rows around the data block, found {}",
            usize::from(found.is_some())
        ),
    };
    debug!(first, second, "SsgaStrategy: data block bounds");

    let mut region = rows
        .into_iter()
        .skip(first + 1)
        .take(second - first - 1);
    let header: Vec<String> = match region.next() {
        Some(h) => h.iter().map(|c| c.render().trim().to_string()).collect(),
        None => bail!("data block between rows {} and {} is empty", first, second),
    };
    let body: Vec<Vec<Cell>> = region.collect();

    Ok(CanonicalTable::new(header, body))
}
