use peso_core::{BankProfile, CanonicalField, ColumnMapping};
use serde::Serialize;
use std::fmt;

use crate::aliases::matches_field;
use crate::header::HeaderSet;

/// The mapping cascade, in the order it is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Template,
    StoredProfile,
    Pattern,
    Oracle,
    Manual,
}

impl StrategyKind {
    pub const CASCADE: [StrategyKind; 5] = [
        StrategyKind::Template,
        StrategyKind::StoredProfile,
        StrategyKind::Pattern,
        StrategyKind::Oracle,
        StrategyKind::Manual,
    ];
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StrategyKind::Template => "template",
            StrategyKind::StoredProfile => "stored profile",
            StrategyKind::Pattern => "pattern",
            StrategyKind::Oracle => "oracle",
            StrategyKind::Manual => "manual",
        };
        f.write_str(s)
    }
}

/// Normalized column names of the engine's own export format. Each field
/// also accepts its English spelling.
const TEMPLATE_FIELDS: &[(CanonicalField, &[&str])] = &[
    (CanonicalField::Kind, &["tipo", "type"]),
    (CanonicalField::Description, &["descripcion", "description"]),
    (CanonicalField::Amount, &["monto", "amount"]),
    (CanonicalField::Date, &["fecha", "date"]),
];

const TEMPLATE_CATEGORY: &[&str] = &["categoria", "category"];

fn first_present<'h>(headers: &'h HeaderSet, names: &[&str]) -> Option<&'h str> {
    names.iter().find_map(|n| headers.raw_for_normalized(n))
}

/// Direct mapping when the file carries the export schema's columns.
pub fn template_mapping(headers: &HeaderSet) -> Option<ColumnMapping> {
    let mut mapping = ColumnMapping::default();
    for (field, names) in TEMPLATE_FIELDS {
        mapping = mapping.with(*field, first_present(headers, names)?);
    }
    if let Some(category) = first_present(headers, TEMPLATE_CATEGORY) {
        mapping = mapping.with(CanonicalField::Category, category);
    }
    Some(mapping)
}

pub fn profile_mapping(profile: Option<&BankProfile>) -> Option<ColumnMapping> {
    profile
        .map(|p| p.column_map.clone())
        .filter(ColumnMapping::is_usable)
}

/// First dictionary match per canonical field. Only a usable mapping is
/// proposed.
pub fn pattern_mapping(headers: &HeaderSet) -> Option<ColumnMapping> {
    let mut mapping = ColumnMapping::default();
    for field in CanonicalField::ALL {
        let hit = headers
            .normalized
            .iter()
            .position(|h| matches_field(h, field));
        if let Some(i) = hit {
            mapping = mapping.with(field, headers.raw[i].clone());
        }
    }
    mapping.is_usable().then_some(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> HeaderSet {
        HeaderSet::new(names.iter().map(|s| s.to_string()).collect())
    }

    // ── template ──────────────────────────────────────────────────────────────

    #[test]
    fn template_headers_map_directly() {
        let h = headers(&["Tipo", "Descripción", "Monto", "Fecha", "Categoría"]);
        let m = template_mapping(&h).unwrap();
        assert_eq!(m.kind.as_deref(), Some("Tipo"));
        assert_eq!(m.description.as_deref(), Some("Descripción"));
        assert_eq!(m.amount.as_deref(), Some("Monto"));
        assert_eq!(m.date.as_deref(), Some("Fecha"));
        assert_eq!(m.category.as_deref(), Some("Categoría"));
    }

    #[test]
    fn template_category_is_optional() {
        let m = template_mapping(&headers(&["fecha", "monto", "descripcion", "tipo"])).unwrap();
        assert!(m.category.is_none());
        assert!(m.is_usable());
    }

    #[test]
    fn template_needs_all_four_columns() {
        assert!(template_mapping(&headers(&["tipo", "descripcion", "monto"])).is_none());
        assert!(template_mapping(&headers(&["Fecha", "Concepto", "Importe"])).is_none());
    }

    // ── stored profile ────────────────────────────────────────────────────────

    #[test]
    fn profile_mapping_uses_saved_columns() {
        let map = ColumnMapping::default()
            .with(CanonicalField::Date, "F. Valor")
            .with(CanonicalField::Description, "Texto")
            .with(CanonicalField::Amount, "Cant");
        let profile = BankProfile::new("cant|f valor|texto", map.clone(), "Mi banco");
        assert_eq!(profile_mapping(Some(&profile)), Some(map));
        assert_eq!(profile_mapping(None), None);
    }

    #[test]
    fn unusable_profile_is_ignored() {
        let map = ColumnMapping::default().with(CanonicalField::Date, "Fecha");
        let profile = BankProfile::new("fecha", map, "roto");
        assert_eq!(profile_mapping(Some(&profile)), None);
    }

    // ── pattern ───────────────────────────────────────────────────────────────

    #[test]
    fn pattern_finds_signed_amount_layout() {
        let m = pattern_mapping(&headers(&["Fecha", "Concepto", "Importe", "Saldo"])).unwrap();
        assert_eq!(m.date.as_deref(), Some("Fecha"));
        assert_eq!(m.description.as_deref(), Some("Concepto"));
        assert_eq!(m.amount.as_deref(), Some("Importe"));
        assert!(m.debit.is_none());
    }

    #[test]
    fn pattern_finds_debit_credit_layout() {
        let m = pattern_mapping(&headers(&[
            "Fecha de Operación",
            "Detalle",
            "Débito",
            "Crédito",
        ]))
        .unwrap();
        assert_eq!(m.date.as_deref(), Some("Fecha de Operación"));
        assert_eq!(m.debit.as_deref(), Some("Débito"));
        assert_eq!(m.credit.as_deref(), Some("Crédito"));
        assert!(m.amount.is_none());
    }

    #[test]
    fn pattern_takes_first_match_per_field() {
        let m = pattern_mapping(&headers(&["Fecha", "Fecha Valor", "Memo", "Amount"])).unwrap();
        assert_eq!(m.date.as_deref(), Some("Fecha"));
    }

    #[test]
    fn pattern_rejects_partial_matches() {
        assert!(pattern_mapping(&headers(&["Fecha", "Importe", "Saldo"])).is_none());
        assert!(pattern_mapping(&headers(&["Col A", "Col B", "Col C"])).is_none());
    }

    #[test]
    fn cascade_order() {
        assert!(StrategyKind::CASCADE.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(StrategyKind::CASCADE.first(), Some(&StrategyKind::Template));
        assert_eq!(StrategyKind::CASCADE.last(), Some(&StrategyKind::Manual));
    }
}
