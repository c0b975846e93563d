use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{Duration, NaiveDate};
use peso_core::{CanonicalField, ColumnMapping, TransactionKind};
use regex::Regex;
use rust_decimal::Decimal;

use crate::header::normalize_header;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_day_mon_yy, r"^(\d{1,2})-([A-Za-z]{3})-(\d{2})$");
re!(re_dmy_slash, r"^(\d{1,2})/(\d{1,2})/(\d{4})$");
re!(re_serial, r"^(\d{5})(?:\.\d+)?$");
// Upper-case ISO 4217 style codes only; stray lower-case text stays and fails to parse.
re!(re_currency_code, r"^[A-Z]{3}\s*|\s*[A-Z]{3}$");

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥', '₡', '₲', '₱', '₹', '₩'];

// Spreadsheet serial day numbers in this window are read as dates
// (roughly 1954 through 2119).
const SERIAL_MIN: i64 = 20_000;
const SERIAL_MAX: i64 = 80_000;

// ── Date ─────────────────────────────────────────────────────────────────────

/// Rewrites the date layouts banks export into one of the two final forms.
/// Anything unrecognized is returned unchanged (trimmed) for the validator
/// to reject.
pub fn normalize_date(raw: &str) -> String {
    let s = raw.trim();

    if let Some(caps) = re_day_mon_yy().captures(s) {
        let month = MONTHS
            .iter()
            .position(|m| caps[2].eq_ignore_ascii_case(m))
            .map(|i| i + 1);
        if let Some(month) = month {
            return format!("{:0>2}/{:02}/20{}", &caps[1], month, &caps[3]);
        }
    }

    if let Some(caps) = re_dmy_slash().captures(s) {
        return format!("{:0>2}/{:0>2}/{}", &caps[1], &caps[2], &caps[3]);
    }

    if let Some(caps) = re_serial().captures(s) {
        if let Ok(serial) = caps[1].parse::<i64>() {
            if (SERIAL_MIN..=SERIAL_MAX).contains(&serial) {
                if let Some(date) = serial_to_date(serial) {
                    return date.format("%Y-%m-%d").to_string();
                }
            }
        }
    }

    s.to_string()
}

fn serial_to_date(serial: i64) -> Option<NaiveDate> {
    // The 1900 date system counts a fictitious 1900-02-29, hence the 30th.
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial))
}

// ── Amount ───────────────────────────────────────────────────────────────────

/// Parses a bank-formatted number into a signed decimal.
///
/// Handles currency symbols, `(x)` as negative, and either `,` or `.` as
/// the decimal separator: with both present the later one is decimal; a
/// lone comma is decimal only when one or two digits follow it. Returns
/// `None` for blank or unparsable text.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let mut s = raw.trim().to_string();
    if s.is_empty() {
        return None;
    }

    let negative = s.starts_with('(') && s.ends_with(')');
    s.retain(|c| c != '(' && c != ')');

    s = s.replace("B/.", "").replace("S/.", "").replace("S/", "");
    s.retain(|c| !CURRENCY_SYMBOLS.contains(&c));
    s = re_currency_code().replace_all(s.trim(), "").to_string();
    s.retain(|c| !c.is_whitespace());

    let has_comma = s.contains(',');
    let has_dot = s.contains('.');
    if has_comma && has_dot {
        let last_comma = s.rfind(',').unwrap_or(0);
        let last_dot = s.rfind('.').unwrap_or(0);
        if last_comma > last_dot {
            s = s.replace('.', "").replacen(',', ".", 1);
        } else {
            s = s.replace(',', "");
        }
    } else if has_comma {
        let parts: Vec<&str> = s.split(',').collect();
        let decimal_comma = parts.len() == 2
            && (1..=2).contains(&parts[1].len())
            && parts[1].chars().all(|c| c.is_ascii_digit());
        s = if decimal_comma {
            s.replacen(',', ".", 1)
        } else {
            s.replace(',', "")
        };
    } else if s.matches('.').count() > 1 {
        s = s.replace('.', "");
    }

    let s = s.strip_prefix('+').unwrap_or(&s);
    if s.is_empty() {
        return None;
    }
    let value = Decimal::from_str(s).ok()?;
    Some(if negative { -value.abs() } else { value })
}

// ── Kind ─────────────────────────────────────────────────────────────────────

const INCOME_KEYWORDS: &[&str] = &["credit", "credito", "abono", "ingreso", "haber", "income", "deposit"];

/// Classifies an explicit type-column label.
pub fn kind_from_label(label: &str) -> TransactionKind {
    let label = normalize_header(label);
    let income = label == "c"
        || label == "cr"
        || INCOME_KEYWORDS.iter().any(|k| label.contains(k));
    if income {
        TransactionKind::Income
    } else {
        TransactionKind::Expense
    }
}

/// How income vs. expense is decided for a given mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindPolicy {
    /// One amount column plus an explicit type column.
    TypeColumn,
    /// One signed amount column; the sign decides.
    SignedAmount,
    /// Separate debit and credit columns.
    DebitCredit,
}

impl KindPolicy {
    pub fn for_mapping(mapping: &ColumnMapping) -> KindPolicy {
        match (
            mapping.get(CanonicalField::Amount),
            mapping.get(CanonicalField::Kind),
        ) {
            (Some(_), Some(_)) => KindPolicy::TypeColumn,
            (Some(_), None) => KindPolicy::SignedAmount,
            (None, _) => KindPolicy::DebitCredit,
        }
    }
}

/// Cells relevant to kind and amount for one row.
#[derive(Debug, Default, Clone, Copy)]
pub struct AmountCells<'a> {
    pub amount: Option<&'a str>,
    pub kind: Option<&'a str>,
    pub debit: Option<&'a str>,
    pub credit: Option<&'a str>,
}

/// Resolves `(kind, magnitude)` for one row. The magnitude is `None` when
/// the relevant cell does not parse.
pub fn resolve_kind_and_amount(
    policy: KindPolicy,
    cells: AmountCells<'_>,
) -> (TransactionKind, Option<Decimal>) {
    match policy {
        KindPolicy::TypeColumn => {
            let amount = cells.amount.and_then(parse_amount).map(|a| a.abs());
            (kind_from_label(cells.kind.unwrap_or_default()), amount)
        }
        KindPolicy::SignedAmount => {
            let signed = cells.amount.and_then(parse_amount);
            let kind = match signed {
                Some(v) if v < Decimal::ZERO => TransactionKind::Expense,
                _ => TransactionKind::Income,
            };
            (kind, signed.map(|a| a.abs()))
        }
        KindPolicy::DebitCredit => {
            let credit = cells.credit.and_then(parse_amount).map(|a| a.abs());
            match credit {
                Some(c) if c > Decimal::ZERO => (TransactionKind::Income, Some(c)),
                _ => {
                    let debit = cells.debit.and_then(parse_amount).map(|a| a.abs());
                    (TransactionKind::Expense, debit)
                }
            }
        }
    }
}
