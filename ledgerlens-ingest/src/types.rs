use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Columns every input file must carry, matched exactly.
pub const DATE_COLUMN: &str = "Date";
pub const DESCRIPTION_COLUMN: &str = "Description";
pub const AMOUNT_COLUMN: &str = "Amount";
pub const REQUIRED_COLUMNS: [&str; 3] = [DATE_COLUMN, DESCRIPTION_COLUMN, AMOUNT_COLUMN];

/// Date layout for text cells.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileFormat {
    /// Comma-delimited text with a header row
    Csv,
    /// `.xls` / `.xlsx` workbook, first sheet
    Spreadsheet,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported file type '{name}'; only CSV and Excel (.xls, .xlsx) are supported")]
pub struct UnsupportedFormat {
    pub name: String,
}

impl FileFormat {
    /// Pick a format from the file extension.
    pub fn from_filename(name: &str) -> Result<Self, UnsupportedFormat> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("csv") => Ok(FileFormat::Csv),
            Some("xls") | Some("xlsx") => Ok(FileFormat::Spreadsheet),
            _ => Err(UnsupportedFormat {
                name: name.to_string(),
            }),
        }
    }
}

/// Why a file was rejected. Any of these fails the whole file.
///
/// `row` is the 1-based data row (the header is not counted).
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Missing expected column '{column}'. Ensure 'Date', 'Description', 'Amount' are present.")]
    MissingColumn { column: &'static str },

    #[error("Row {row}: missing value for column '{column}'")]
    MissingValue { row: usize, column: &'static str },

    #[error("Row {row}: invalid date '{value}' in column 'Date' (expected YYYY-MM-DD)")]
    InvalidDate { row: usize, value: String },

    #[error("Row {row}: invalid amount '{value}' in column 'Amount'")]
    InvalidAmount { row: usize, value: String },

    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Could not read workbook: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("Workbook contains no worksheets")]
    NoWorksheet,
}
