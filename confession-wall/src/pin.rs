//! PIN parsing and comparison
//!
//! New PINs are validated as exactly four ASCII digits and stored as
//! integers. Older rows may carry the PIN as text ("0042"), so every
//! comparison normalizes both sides to a number first.

use crate::config::PIN_LENGTH;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::fmt;

/// A validated 4-digit PIN
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pin(u16);

impl Pin {
    /// Parse user input; leading zeros are kept significant for length only.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.len() != PIN_LENGTH || !input.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AppError::Validation(format!(
                "PIN must be exactly {} digits",
                PIN_LENGTH
            )));
        }

        input
            .parse::<u16>()
            .map(Pin)
            .map_err(|e| AppError::Validation(format!("Invalid PIN: {}", e)))
    }

    pub fn value(self) -> i64 {
        i64::from(self.0)
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

/// PIN as found in the store: a number, or text on legacy rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredPin {
    Number(i64),
    Text(String),
}

impl StoredPin {
    /// Numeric value of the stored PIN, if it has one
    pub fn normalized(&self) -> Option<i64> {
        match self {
            StoredPin::Number(n) => Some(*n),
            StoredPin::Text(s) => parse_numeric(s),
        }
    }

    /// Compare a submitted candidate against this PIN numerically
    pub fn matches(&self, candidate: &str) -> bool {
        match (self.normalized(), parse_numeric(candidate)) {
            (Some(stored), Some(given)) => stored == given,
            _ => false,
        }
    }

    /// Read the `column` of a row whether SQLite holds it as INTEGER or TEXT
    pub(crate) fn from_column(row: &SqliteRow, column: &str) -> std::result::Result<Self, sqlx::Error> {
        match row.try_get::<i64, _>(column) {
            Ok(n) => Ok(StoredPin::Number(n)),
            Err(sqlx::Error::ColumnDecode { .. }) => {
                row.try_get::<String, _>(column).map(StoredPin::Text)
            }
            Err(e) => Err(e),
        }
    }
}

impl From<Pin> for StoredPin {
    fn from(pin: Pin) -> Self {
        StoredPin::Number(pin.value())
    }
}

fn parse_numeric(input: &str) -> Option<i64> {
    let input = input.trim();
    if input.is_empty() || !input.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    input.parse().ok()
}
