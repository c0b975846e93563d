use peso_core::CanonicalField;

use crate::header::normalize_header;

/// Known header spellings per canonical field, Spanish and English banking
/// vocabulary. Compared after [`normalize_header`], so punctuated entries
/// such as `d/c` match the folded form `dc`.
pub const ALIASES: &[(CanonicalField, &[&str])] = &[
    (
        CanonicalField::Date,
        &[
            "fecha", "date", "fecha transaccion", "fecha de transaccion",
            "fecha operacion", "fecha de operacion", "fecha valor",
            "fecha movimiento", "fecha de movimiento", "transaction date",
            "fecha txn", "fecha de pago", "posting date", "fecha contable",
            "fecha proceso", "fecha efectiva", "settlement date", "post date",
            "value date", "booking date",
        ],
    ),
    (
        CanonicalField::Description,
        &[
            "descripcion", "description", "detalle", "concepto", "comercio",
            "narracion", "narrative", "memo", "referencia", "reference",
            "nombre comercio", "nombre de comercio", "beneficiario",
            "transaction description", "details", "merchant", "remarks",
            "detalle de movimiento", "glosa", "descripcion de movimiento",
            "concepto del movimiento", "descripcion del cargo", "payee",
        ],
    ),
    (
        CanonicalField::Amount,
        &[
            "monto", "amount", "importe", "valor", "value", "total",
            "monto transaccion", "transaction amount", "suma", "monto total",
            "importe transaccion",
        ],
    ),
    (
        CanonicalField::Debit,
        &[
            "debito", "debit", "cargo", "cargos", "egreso", "egresos",
            "retiro", "retiros", "withdrawal", "withdrawals", "salida", "salidas",
            "debe", "debit amount", "monto debito", "debitos", "charges",
            "debito usd", "importe debito", "monto cargo", "debito (usd)",
        ],
    ),
    (
        CanonicalField::Credit,
        &[
            "credito", "credit", "abono", "abonos", "ingreso en cuenta",
            "deposito", "depositos", "deposit", "deposits", "haber", "credit amount",
            "monto credito", "creditos", "credits", "credito usd",
            "importe credito", "monto abono", "credito (usd)",
        ],
    ),
    (
        CanonicalField::Kind,
        &[
            "tipo", "type", "tipo movimiento", "tipo de movimiento",
            "dc", "d/c", "debito credito", "clase", "tipo transaccion",
            "transaction type",
        ],
    ),
    (
        CanonicalField::Category,
        &["categoria", "category", "rubro", "clasificacion", "subcategoria"],
    ),
];

pub fn aliases_for(field: CanonicalField) -> &'static [&'static str] {
    ALIASES
        .iter()
        .find(|(f, _)| *f == field)
        .map(|(_, aliases)| *aliases)
        .unwrap_or(&[])
}

/// Whether an already-normalized header names `field`.
pub fn matches_field(normalized: &str, field: CanonicalField) -> bool {
    !normalized.is_empty()
        && aliases_for(field)
            .iter()
            .any(|alias| normalize_header(alias) == normalized)
}

/// First canonical field whose dictionary contains this normalized header.
pub fn field_for_alias(normalized: &str) -> Option<CanonicalField> {
    CanonicalField::ALL
        .into_iter()
        .find(|f| matches_field(normalized, *f))
}

pub fn is_known_alias(normalized: &str) -> bool {
    field_for_alias(normalized).is_some()
}
