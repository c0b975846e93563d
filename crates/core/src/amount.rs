use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A strictly positive transaction magnitude. Direction lives in
/// [`TransactionKind`](crate::TransactionKind), never in the sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    /// Returns `None` for zero or negative values.
    pub fn new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Amount(value.normalize()))
        } else {
            None
        }
    }

    pub fn from_cents(cents: i64) -> Option<Self> {
        Self::new(Decimal::new(cents, 2))
    }

    pub fn value(self) -> Decimal {
        self.0
    }

    pub fn to_cents(self) -> i64 {
        (self.0 * Decimal::from(100))
            .round()
            .to_i64()
            .unwrap_or(i64::MAX)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = String;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Amount::new(value).ok_or_else(|| format!("amount must be positive, got {value}"))
    }
}
