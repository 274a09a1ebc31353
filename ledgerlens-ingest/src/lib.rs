//! ledgerlens-ingest: turn uploaded CSV / spreadsheet bytes into normalized transactions.

pub mod types;
pub mod parsers;

use ledgerlens_core::Transaction;

pub use parsers::csv_file::parse_csv;
pub use parsers::spreadsheet::parse_spreadsheet;
pub use types::{FileFormat, ParseError, UnsupportedFormat, REQUIRED_COLUMNS};

/// Parse a whole file. All-or-nothing: the first bad row fails the file.
pub fn parse(bytes: &[u8], format: FileFormat) -> Result<Vec<Transaction>, ParseError> {
    match format {
        FileFormat::Csv => parse_csv(bytes),
        FileFormat::Spreadsheet => parse_spreadsheet(bytes),
    }
}
