pub mod csv_file;
pub mod spreadsheet;

use chrono::NaiveDate;

use crate::types::{ParseError, DATE_FORMAT, REQUIRED_COLUMNS};

/// Positions of the required columns in a header row.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ColumnMap {
    pub date: usize,
    pub description: usize,
    pub amount: usize,
}

impl ColumnMap {
    pub fn from_headers<'a>(
        headers: impl Iterator<Item = Option<&'a str>> + Clone,
    ) -> Result<Self, ParseError> {
        let find = |name: &'static str| {
            headers
                .clone()
                .position(|h| h == Some(name))
                .ok_or(ParseError::MissingColumn { column: name })
        };
        let [date, description, amount] = REQUIRED_COLUMNS;
        Ok(Self {
            date: find(date)?,
            description: find(description)?,
            amount: find(amount)?,
        })
    }
}

pub(crate) fn parse_date_text(s: &str, row: usize) -> Result<NaiveDate, ParseError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|_| ParseError::InvalidDate {
        row,
        value: s.to_string(),
    })
}

pub(crate) fn parse_amount_text(s: &str, row: usize) -> Result<f64, ParseError> {
    let invalid = || ParseError::InvalidAmount {
        row,
        value: s.to_string(),
    };
    let amount: f64 = s.trim().parse().map_err(|_| invalid())?;
    if !amount.is_finite() {
        return Err(invalid());
    }
    Ok(amount)
}

pub(crate) fn transaction_id(row: usize) -> String {
    format!("txn-{:05}", row)
}
