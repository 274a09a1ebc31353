//! Delimited-text parser.
//!
//! Expected layout (header first, extra columns ignored):
//!   Date,Description,Amount
//!   2026-02-16,CLIPPER TRANSIT,10.00
//!   2026-02-17,PAYROLL ACME INC,-2500.00

use ledgerlens_core::Transaction;
use tracing::debug;

use super::{parse_amount_text, parse_date_text, transaction_id, ColumnMap};
use crate::types::{ParseError, AMOUNT_COLUMN, DATE_COLUMN, DESCRIPTION_COLUMN};

/// Parse CSV bytes into transactions, failing the whole file on the first bad row.
pub fn parse_csv(bytes: &[u8]) -> Result<Vec<Transaction>, ParseError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Fields)
        .from_reader(bytes);

    let headers = rdr.headers()?.clone();
    let cols = ColumnMap::from_headers(headers.iter().map(Some))?;

    let mut txns = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        let row = i + 1;

        let date_raw = record
            .get(cols.date)
            .filter(|d| !d.is_empty())
            .ok_or(ParseError::MissingValue {
                row,
                column: DATE_COLUMN,
            })?;
        let description = record
            .get(cols.description)
            .filter(|d| !d.is_empty())
            .ok_or(ParseError::MissingValue {
                row,
                column: DESCRIPTION_COLUMN,
            })?;
        let amount_raw = record
            .get(cols.amount)
            .filter(|a| !a.is_empty())
            .ok_or(ParseError::MissingValue {
                row,
                column: AMOUNT_COLUMN,
            })?;

        txns.push(Transaction::new(
            transaction_id(row),
            parse_date_text(date_raw, row)?,
            description,
            parse_amount_text(amount_raw, row)?,
        ));
    }

    debug!(rows = txns.len(), "parsed csv");
    Ok(txns)
}
