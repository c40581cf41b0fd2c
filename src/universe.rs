// =============================================================================
// Scan Universe — symbol list loaded from CSV
// =============================================================================
//
// The scan list lives in a CSV file with a "Stock" column. Blank cells are
// skipped and duplicates are dropped while preserving first-seen order.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

/// Load the symbol universe from the CSV file at `path`.
pub fn load_universe(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open universe file {}", path.display()))?;

    let symbols = read_universe(file)
        .with_context(|| format!("failed to parse universe file {}", path.display()))?;

    info!(path = %path.display(), count = symbols.len(), "scan universe loaded");
    Ok(symbols)
}

/// Parse the "Stock" column from CSV data.
pub fn read_universe<R: std::io::Read>(reader: R) -> Result<Vec<String>> {
    let mut rdr = csv::Reader::from_reader(reader);

    let headers = rdr.headers().context("universe CSV has no header row")?;
    let stock_idx = headers
        .iter()
        .position(|h| h.trim() == "Stock")
        .context("universe CSV is missing a 'Stock' column")?;

    let mut seen = HashSet::new();
    let mut symbols = Vec::new();

    for record in rdr.records() {
        let record = record.context("malformed universe CSV record")?;
        let Some(raw) = record.get(stock_idx) else {
            continue;
        };
        let symbol = raw.trim();
        if symbol.is_empty() {
            continue;
        }
        if seen.insert(symbol.to_string()) {
            symbols.push(symbol.to_string());
        }
    }

    Ok(symbols)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_stock_column() {
        let csv = "Stock,Sector\nRELIANCE.NS,Energy\nTCS.NS,IT\nINFY.NS,IT\n";
        let symbols = read_universe(csv.as_bytes()).unwrap();
        assert_eq!(symbols, vec!["RELIANCE.NS", "TCS.NS", "INFY.NS"]);
    }

    #[test]
    fn skips_blanks_and_duplicates() {
        let csv = "Stock\nRELIANCE.NS\n\n  \nTCS.NS\nRELIANCE.NS\n";
        let symbols = read_universe(csv.as_bytes()).unwrap();
        assert_eq!(symbols, vec!["RELIANCE.NS", "TCS.NS"]);
    }

    #[test]
    fn trims_whitespace() {
        let csv = "Stock\n  HDFCBANK.NS \n";
        let symbols = read_universe(csv.as_bytes()).unwrap();
        assert_eq!(symbols, vec!["HDFCBANK.NS"]);
    }

    #[test]
    fn missing_stock_column_is_error() {
        let csv = "Symbol\nRELIANCE.NS\n";
        assert!(read_universe(csv.as_bytes()).is_err());
    }
}
