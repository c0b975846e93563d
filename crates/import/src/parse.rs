use peso_core::{CandidateRecord, CanonicalField, ColumnMapping, RowRejection, TransactionRecord};
use serde::Serialize;
use tracing::debug;

use crate::extract::{normalize_date, resolve_kind_and_amount, AmountCells, KindPolicy};
use crate::header::HeaderSet;
use crate::table::RawTable;

/// Rejected rows logged per attempt when nothing at all was accepted.
const DIAGNOSTIC_ROWS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedRow {
    pub source_row_number: usize,
    pub reason: RowRejection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOutcome {
    pub records: Vec<TransactionRecord>,
    pub rejected: Vec<RejectedRow>,
}

impl ParseOutcome {
    pub fn total(&self) -> usize {
        self.records.len() + self.rejected.len()
    }

    pub fn accepted(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Column positions of a mapping within the full-width header row.
#[derive(Debug, Clone, Copy, Default)]
struct Columns {
    date: Option<usize>,
    description: Option<usize>,
    amount: Option<usize>,
    debit: Option<usize>,
    credit: Option<usize>,
    kind: Option<usize>,
    category: Option<usize>,
}

impl Columns {
    fn resolve(headers: &HeaderSet, mapping: &ColumnMapping) -> Self {
        let pos = |field| mapping.get(field).and_then(|name| headers.position_of(name));
        Columns {
            date: pos(CanonicalField::Date),
            description: pos(CanonicalField::Description),
            amount: pos(CanonicalField::Amount),
            debit: pos(CanonicalField::Debit),
            credit: pos(CanonicalField::Credit),
            kind: pos(CanonicalField::Kind),
            category: pos(CanonicalField::Category),
        }
    }
}

fn cell(fields: &[String], col: Option<usize>) -> Option<&str> {
    col.and_then(|c| fields.get(c)).map(|s| s.trim())
}

/// Applies `mapping` to every data row of `table`. Never fails as a whole:
/// each row either becomes a record or a [`RejectedRow`].
pub fn parse_rows(table: &RawTable, headers: &HeaderSet, mapping: &ColumnMapping) -> ParseOutcome {
    let columns = Columns::resolve(headers, mapping);
    let policy = KindPolicy::for_mapping(mapping);
    let has_amount_column = mapping.has_amount_field();

    let mut outcome = ParseOutcome::default();

    for (row_number, fields) in table.data_rows() {
        if fields.len() < 2 {
            outcome.rejected.push(RejectedRow {
                source_row_number: row_number,
                reason: RowRejection::TooFewColumns,
            });
            continue;
        }

        let (kind, amount) = resolve_kind_and_amount(
            policy,
            AmountCells {
                amount: cell(&fields, columns.amount),
                kind: cell(&fields, columns.kind),
                debit: cell(&fields, columns.debit),
                credit: cell(&fields, columns.credit),
            },
        );

        let candidate = CandidateRecord {
            kind: has_amount_column.then_some(kind),
            description: cell(&fields, columns.description)
                .unwrap_or_default()
                .to_string(),
            amount,
            date: normalize_date(cell(&fields, columns.date).unwrap_or_default()),
            category: cell(&fields, columns.category).map(str::to_string),
            source_row: row_number,
        };

        match TransactionRecord::validate(candidate) {
            Ok(record) => outcome.records.push(record),
            Err(reason) => {
                if outcome.records.is_empty() && outcome.rejected.len() < DIAGNOSTIC_ROWS {
                    debug!(row = row_number, %reason, ?fields, "row rejected");
                }
                outcome.rejected.push(RejectedRow {
                    source_row_number: row_number,
                    reason,
                });
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectionConfig;
    use peso_core::TransactionKind;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn table(text: &str) -> RawTable {
        RawTable::from_text(text, &DetectionConfig::default()).unwrap()
    }

    fn run(text: &str, mapping: &ColumnMapping) -> ParseOutcome {
        let t = table(text);
        parse_rows(&t, &t.headers(), mapping)
    }

    fn spanish() -> ColumnMapping {
        ColumnMapping::default()
            .with(CanonicalField::Date, "Fecha")
            .with(CanonicalField::Description, "Concepto")
            .with(CanonicalField::Amount, "Importe")
    }

    #[test]
    fn signed_amount_rows() {
        let out = run(
            "Fecha;Concepto;Importe\n04/12/2025;Supermercado;-45,50\n05/12/2025;Nomina;1.500,00\n",
            &spanish(),
        );
        assert_eq!(out.accepted(), 2);
        assert!(out.rejected.is_empty());
        assert_eq!(out.records[0].kind, TransactionKind::Expense);
        assert_eq!(out.records[0].amount.value(), Decimal::from_str("45.50").unwrap());
        assert_eq!(out.records[1].kind, TransactionKind::Income);
        assert_eq!(out.records[1].amount.to_cents(), 150000);
    }

    #[test]
    fn bad_rows_do_not_block_the_rest() {
        let out = run(
            "Fecha;Concepto;Importe\n04/12/2025;Cafe;abc\n04/12/2025;;-3,00\nsoloesto\n05/12/2025;Pan;-2,00\n",
            &spanish(),
        );
        assert_eq!(out.accepted(), 1);
        assert_eq!(out.total(), 4);
        assert_eq!(
            out.rejected,
            vec![
                RejectedRow { source_row_number: 2, reason: RowRejection::InvalidAmount },
                RejectedRow { source_row_number: 3, reason: RowRejection::EmptyDescription },
                RejectedRow { source_row_number: 4, reason: RowRejection::TooFewColumns },
            ]
        );
        assert_eq!(out.records[0].source_row_number, 5);
    }

    #[test]
    fn blank_header_columns_do_not_shift_cells() {
        let mapping = spanish();
        let out = run("Fecha;;Concepto;Importe\n04/12/2025;X;Pan;-2,00\n", &mapping);
        assert_eq!(out.records[0].description, "Pan");
        assert_eq!(out.records[0].amount.to_cents(), 200);
    }

    #[test]
    fn mapping_names_are_matched_case_insensitively() {
        let mapping = ColumnMapping::default()
            .with(CanonicalField::Date, "fecha")
            .with(CanonicalField::Description, "CONCEPTO")
            .with(CanonicalField::Amount, "importe");
        let out = run("Fecha;Concepto;Importe\n04/12/2025;Pan;-2,00\n", &mapping);
        assert_eq!(out.accepted(), 1);
    }

    #[test]
    fn unknown_headers_parse_nothing() {
        let mapping = ColumnMapping::default()
            .with(CanonicalField::Date, "Fecha")
            .with(CanonicalField::Description, "Concepto")
            .with(CanonicalField::Amount, "Saldo");
        let out = run("Fecha;Concepto;Importe\n04/12/2025;Pan;-2,00\n", &mapping);
        assert!(out.is_empty());
        assert_eq!(out.rejected[0].reason, RowRejection::InvalidAmount);
    }

    #[test]
    fn debit_credit_columns() {
        let mapping = ColumnMapping::default()
            .with(CanonicalField::Date, "Fecha")
            .with(CanonicalField::Description, "Detalle")
            .with(CanonicalField::Debit, "Debito")
            .with(CanonicalField::Credit, "Credito");
        let out = run(
            "Fecha;Detalle;Debito;Credito\n01/12/2025;Renta;120.00;\n02/12/2025;Deposito;;300.00\n",
            &mapping,
        );
        assert_eq!(out.accepted(), 2);
        assert_eq!(out.records[0].kind, TransactionKind::Expense);
        assert_eq!(out.records[0].amount.to_cents(), 12000);
        assert_eq!(out.records[1].kind, TransactionKind::Income);
        assert_eq!(out.records[1].amount.to_cents(), 30000);
    }

    #[test]
    fn category_and_type_columns() {
        let mapping = ColumnMapping::default()
            .with(CanonicalField::Date, "fecha")
            .with(CanonicalField::Description, "descripcion")
            .with(CanonicalField::Amount, "monto")
            .with(CanonicalField::Kind, "tipo")
            .with(CanonicalField::Category, "categoria");
        let out = run(
            "tipo,descripcion,monto,fecha,categoria\ngasto,Netflix,12.99,2025-11-10,Entretenimiento\ningreso,Freelance,350.00,2025-11-15,\n",
            &mapping,
        );
        assert_eq!(out.records[0].kind, TransactionKind::Expense);
        assert_eq!(out.records[0].category.as_deref(), Some("Entretenimiento"));
        assert_eq!(out.records[1].kind, TransactionKind::Income);
        assert_eq!(out.records[1].category, None);
    }

    #[test]
    fn amounts_are_always_positive() {
        let out = run(
            "Fecha;Concepto;Importe\n01/12/2025;a;-1,00\n01/12/2025;b;(2,00)\n01/12/2025;c;$3.00\n01/12/2025;d;-0,00\n",
            &spanish(),
        );
        assert_eq!(out.accepted(), 3);
        assert!(out.records.iter().all(|r| r.amount.value() > Decimal::ZERO));
        assert_eq!(out.rejected[0].reason, RowRejection::InvalidAmount);
    }
}
