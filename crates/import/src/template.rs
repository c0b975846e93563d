use peso_core::{Amount, TransactionKind, TransactionRecord};

/// Header of the engine's own export format.
pub const TEMPLATE_HEADER: [&str; 5] = ["tipo", "descripcion", "monto", "fecha", "categoria"];

const EXAMPLE_ROWS: &[(&str, &str, &str, &str, &str)] = &[
    ("ingreso", "Salario", "2500.00", "2025-11-01", ""),
    ("gasto", "Supermercado", "45.50", "2025-11-05", "Comida"),
    ("gasto", "Netflix", "12.99", "2025-11-10", "Entretenimiento"),
    ("ingreso", "Freelance", "350.00", "2025-11-15", ""),
    ("gasto", "Gasolina", "60.00", "2025-11-18", "Transporte"),
    ("gasto", "Restaurante", "85.25", "2025-11-20", "Comida"),
    ("ingreso", "Venta producto", "120.00", "2025-11-22", ""),
    ("gasto", "Farmacia", "22.50", "2025-11-25", "Salud"),
    ("gasto", "Gym", "40.00", "2025-11-28", "Ejercicio"),
    ("gasto", "Amazon", "75.99", "2025-11-30", "Compras"),
];

fn kind_label(kind: TransactionKind) -> &'static str {
    match kind {
        TransactionKind::Income => "ingreso",
        TransactionKind::Expense => "gasto",
    }
}

/// Full precision, padded to at least two decimals.
fn export_amount(amount: Amount) -> String {
    let mut value = amount.value();
    if value.scale() < 2 {
        value.rescale(2);
    }
    value.to_string()
}

fn write_rows<'a, I>(rows: I) -> Result<String, csv::Error>
where
    I: IntoIterator<Item = [&'a str; 5]>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(TEMPLATE_HEADER)?;
    for row in rows {
        writer.write_record(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Writes records in the template format so they re-import through the
/// template strategy unchanged.
pub fn export_records(records: &[TransactionRecord]) -> Result<String, csv::Error> {
    let cells: Vec<[String; 4]> = records
        .iter()
        .map(|r| {
            [
                r.description.clone(),
                export_amount(r.amount),
                r.date.format("%Y-%m-%d").to_string(),
                r.category.clone().unwrap_or_default(),
            ]
        })
        .collect();

    write_rows(records.iter().zip(&cells).map(|(r, [desc, amount, date, category])| {
        [
            kind_label(r.kind),
            desc.as_str(),
            amount.as_str(),
            date.as_str(),
            category.as_str(),
        ]
    }))
}

/// The downloadable sample file.
pub fn example_template() -> Result<String, csv::Error> {
    write_rows(
        EXAMPLE_ROWS
            .iter()
            .map(|&(kind, desc, amount, date, category)| [kind, desc, amount, date, category]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn record(kind: TransactionKind, desc: &str, cents: i64, date: &str, cat: Option<&str>) -> TransactionRecord {
        TransactionRecord {
            kind,
            description: desc.to_string(),
            amount: Amount::from_cents(cents).unwrap(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            category: cat.map(str::to_string),
            source_row_number: 2,
        }
    }

    #[test]
    fn example_has_ten_rows_and_template_header() {
        let text = example_template().unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "tipo,descripcion,monto,fecha,categoria");
        assert_eq!(lines.len(), 11);
        assert_eq!(lines[1], "ingreso,Salario,2500.00,2025-11-01,");
        assert_eq!(lines[10], "gasto,Amazon,75.99,2025-11-30,Compras");
    }

    #[test]
    fn example_rows_parse_as_five_fields() {
        let text = example_template().unwrap();
        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let rows: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), EXAMPLE_ROWS.len());
        assert!(rows.iter().all(|r| r.len() == TEMPLATE_HEADER.len()));
    }

    #[test]
    fn export_writes_spanish_kinds_and_fixed_decimals() {
        let out = export_records(&[
            record(TransactionKind::Expense, "Pan", 250, "2025-01-03", Some("Comida")),
            record(TransactionKind::Income, "Nómina", 150000, "2025-01-31", None),
        ])
        .unwrap();
        assert_eq!(
            out,
            "tipo,descripcion,monto,fecha,categoria\n\
             gasto,Pan,2.50,2025-01-03,Comida\n\
             ingreso,Nómina,1500.00,2025-01-31,\n"
        );
    }

    #[test]
    fn export_keeps_sub_cent_precision() {
        let mut rec = record(TransactionKind::Expense, "Gasolina", 1, "2025-01-03", None);
        rec.amount = Amount::new(Decimal::new(12_345, 3)).unwrap();
        let mut tiny = rec.clone();
        tiny.amount = Amount::new(Decimal::new(4, 3)).unwrap();
        let out = export_records(&[rec, tiny]).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[1], "gasto,Gasolina,12.345,2025-01-03,");
        assert_eq!(lines[2], "gasto,Gasolina,0.004,2025-01-03,");
    }

    #[test]
    fn export_quotes_delimiters_in_descriptions() {
        let out = export_records(&[record(
            TransactionKind::Expense,
            "Café, pan y \"leche\"",
            390,
            "2025-02-01",
            None,
        )])
        .unwrap();
        assert!(out.contains("\"Café, pan y \"\"leche\"\"\""));
    }
}
