//! Spreadsheet (.xls / .xlsx) parser.
//!
//! Reads the first worksheet. The first row of the used range is the header;
//! every following row up to the last non-empty one is a transaction.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::NaiveDate;
use ledgerlens_core::Transaction;
use tracing::debug;

use super::{parse_amount_text, parse_date_text, transaction_id, ColumnMap};
use crate::types::{ParseError, AMOUNT_COLUMN, DATE_COLUMN, DESCRIPTION_COLUMN};

static EMPTY: Data = Data::Empty;

/// Parse workbook bytes; the format (xls, xlsx, ods) is sniffed from the content.
pub fn parse_spreadsheet(bytes: &[u8]) -> Result<Vec<Transaction>, ParseError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ParseError::NoWorksheet)??;

    let txns = parse_rows(range.rows())?;
    debug!(rows = txns.len(), "parsed spreadsheet");
    Ok(txns)
}

/// Convert header + data rows into transactions.
pub(crate) fn parse_rows<'a>(
    mut rows: impl Iterator<Item = &'a [Data]>,
) -> Result<Vec<Transaction>, ParseError> {
    // An empty sheet has no header, so every required column is missing.
    let header = rows.next().unwrap_or(&[]);
    let cols = ColumnMap::from_headers(header.iter().map(header_text))?;

    let mut txns = Vec::new();
    for (i, cells) in rows.enumerate() {
        let row = i + 1;
        let cell = |idx: usize| cells.get(idx).unwrap_or(&EMPTY);

        txns.push(Transaction::new(
            transaction_id(row),
            cell_to_date(cell(cols.date), row)?,
            cell_to_description(cell(cols.description), row)?,
            cell_to_amount(cell(cols.amount), row)?,
        ));
    }
    Ok(txns)
}

fn header_text(cell: &Data) -> Option<&str> {
    match cell {
        Data::String(s) => Some(s.as_str()),
        _ => None,
    }
}

fn cell_to_date(cell: &Data, row: usize) -> Result<NaiveDate, ParseError> {
    let invalid = || ParseError::InvalidDate {
        row,
        value: cell.to_string(),
    };
    match cell {
        Data::DateTime(dt) => dt.as_datetime().map(|d| d.date()).ok_or_else(invalid),
        Data::DateTimeIso(s) => s
            .get(..10)
            .ok_or_else(invalid)
            .and_then(|d| parse_date_text(d, row)),
        Data::String(s) => parse_date_text(s, row),
        Data::Empty => Err(ParseError::MissingValue {
            row,
            column: DATE_COLUMN,
        }),
        _ => Err(invalid()),
    }
}

fn cell_to_description(cell: &Data, row: usize) -> Result<String, ParseError> {
    let text = match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Int(_) | Data::Float(_) => cell.to_string(),
        _ => String::new(),
    };
    if text.is_empty() {
        return Err(ParseError::MissingValue {
            row,
            column: DESCRIPTION_COLUMN,
        });
    }
    Ok(text)
}

fn cell_to_amount(cell: &Data, row: usize) -> Result<f64, ParseError> {
    match cell {
        Data::Float(f) if f.is_finite() => Ok(*f),
        Data::Int(i) => Ok(*i as f64),
        Data::String(s) => parse_amount_text(s, row),
        Data::Empty => Err(ParseError::MissingValue {
            row,
            column: AMOUNT_COLUMN,
        }),
        _ => Err(ParseError::InvalidAmount {
            row,
            value: cell.to_string(),
        }),
    }
}
