use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::amount::Amount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Income => write!(f, "income"),
            TransactionKind::Expense => write!(f, "expense"),
        }
    }
}

/// Why a data row did not become a [`TransactionRecord`]. Non-fatal: the
/// row is dropped and counted, the batch continues.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowRejection {
    #[error("invalid kind")]
    InvalidKind,
    #[error("empty description")]
    EmptyDescription,
    #[error("invalid amount")]
    InvalidAmount,
    #[error("invalid date")]
    InvalidDate,
    #[error("too few columns")]
    TooFewColumns,
}

/// Field values extracted from one data row, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRecord {
    pub kind: Option<TransactionKind>,
    pub description: String,
    /// Unsigned magnitude as extracted; `None` when the cell did not parse.
    pub amount: Option<Decimal>,
    /// Date text after extractor normalization.
    pub date: String,
    pub category: Option<String>,
    pub source_row: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub kind: TransactionKind,
    pub description: String,
    pub amount: Amount,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub source_row_number: usize,
}

impl TransactionRecord {
    /// Checks run in order and the first failure wins.
    pub fn validate(candidate: CandidateRecord) -> Result<TransactionRecord, RowRejection> {
        let kind = candidate.kind.ok_or(RowRejection::InvalidKind)?;

        let description = candidate.description.trim();
        if description.is_empty() {
            return Err(RowRejection::EmptyDescription);
        }

        let amount = candidate
            .amount
            .and_then(Amount::new)
            .ok_or(RowRejection::InvalidAmount)?;

        let date = parse_final_date(&candidate.date).ok_or(RowRejection::InvalidDate)?;

        let category = candidate
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        Ok(TransactionRecord {
            kind,
            description: description.to_string(),
            amount,
            date,
            category,
            source_row_number: candidate.source_row,
        })
    }
}

/// Accepts exactly `YYYY-MM-DD` or `DD/MM/YYYY` naming a real calendar day.
pub fn parse_final_date(s: &str) -> Option<NaiveDate> {
    let b = s.as_bytes();
    let digits = |range: std::ops::Range<usize>| b[range].iter().all(u8::is_ascii_digit);

    if b.len() != 10 {
        return None;
    }
    if b[4] == b'-' && b[7] == b'-' && digits(0..4) && digits(5..7) && digits(8..10) {
        return NaiveDate::parse_from_str(s, "%Y-%m-%d").ok();
    }
    if b[2] == b'/' && b[5] == b'/' && digits(0..2) && digits(3..5) && digits(6..10) {
        return NaiveDate::parse_from_str(s, "%d/%m/%Y").ok();
    }
    None
}
