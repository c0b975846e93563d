use serde::Serialize;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Folds header text for comparison: lowercase, no diacritics, letters,
/// digits and single spaces only. Idempotent.
pub fn normalize_header(header: &str) -> String {
    let folded: String = header
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The header row of one file.
///
/// `full` keeps every position, blank-named columns included, so data cells
/// are always looked up by their real index. `raw` and `normalized` are the
/// parallel lists of named columns used for matching and display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderSet {
    pub full: Vec<String>,
    pub raw: Vec<String>,
    pub normalized: Vec<String>,
}

impl HeaderSet {
    pub fn new(fields: Vec<String>) -> Self {
        let raw: Vec<String> = fields
            .iter()
            .filter(|h| !h.trim().is_empty())
            .cloned()
            .collect();
        let normalized = raw.iter().map(|h| normalize_header(h)).collect();
        HeaderSet {
            full: fields,
            raw,
            normalized,
        }
    }

    /// Sorted normalized names joined with `|`. Column order does not matter.
    pub fn signature(&self) -> String {
        let mut names = self.normalized.clone();
        names.sort();
        names.join("|")
    }

    pub fn contains_normalized(&self, name: &str) -> bool {
        self.normalized.iter().any(|h| h == name)
    }

    /// Literal header text for a normalized name, first occurrence.
    pub fn raw_for_normalized(&self, name: &str) -> Option<&str> {
        self.normalized
            .iter()
            .position(|h| h == name)
            .map(|i| self.raw[i].as_str())
    }

    /// Column index in the full-width row for a literal header name. Exact
    /// match first, then case-insensitive on trimmed text.
    pub fn position_of(&self, name: &str) -> Option<usize> {
        if let Some(i) = self.full.iter().position(|h| h == name) {
            return Some(i);
        }
        let wanted = name.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        self.full
            .iter()
            .position(|h| h.trim().to_lowercase() == wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> HeaderSet {
        HeaderSet::new(names.iter().map(|s| s.to_string()).collect())
    }

    // ── normalize_header ──────────────────────────────────────────────────────

    #[test]
    fn folds_case_accents_and_punctuation() {
        assert_eq!(normalize_header("Descripción"), "descripcion");
        assert_eq!(normalize_header("  FECHA de Operación "), "fecha de operacion");
        assert_eq!(normalize_header("Débito (USD)"), "debito usd");
        assert_eq!(normalize_header("D/C"), "dc");
        assert_eq!(normalize_header("Año"), "ano");
    }

    #[test]
    fn collapses_inner_whitespace() {
        assert_eq!(normalize_header("Fecha\t  Valor"), "fecha valor");
    }

    #[test]
    fn normalization_is_idempotent() {
        let samples = [
            "Descripción",
            "Débito (USD)",
            "  Monto   Total ",
            "Nº Operación",
            "İstanbul Şube",
            "Ångström",
            "ＦＵＬＬＷＩＤＴＨ",
            "naïve_café-crème",
            "",
            "   ",
            "123 ABC",
            "Ǆemal",
            "ﬁnance",
        ];
        for s in samples {
            let once = normalize_header(s);
            assert_eq!(normalize_header(&once), once, "not idempotent for {s:?}");
        }
    }

    // ── HeaderSet ─────────────────────────────────────────────────────────────

    #[test]
    fn blank_columns_keep_positions() {
        let h = headers(&["Fecha", "", "Concepto", "Importe"]);
        assert_eq!(h.raw, vec!["Fecha", "Concepto", "Importe"]);
        assert_eq!(h.normalized, vec!["fecha", "concepto", "importe"]);
        assert_eq!(h.raw.len(), h.normalized.len());
        assert_eq!(h.position_of("Concepto"), Some(2));
        assert_eq!(h.position_of("Importe"), Some(3));
        assert_eq!(h.full.len(), 4);
    }

    #[test]
    fn signature_ignores_column_order() {
        let a = headers(&["Fecha", "Concepto", "Importe"]);
        let b = headers(&["Importe", "FECHA", "Concepto"]);
        assert_eq!(a.signature(), "concepto|fecha|importe");
        assert_eq!(a.signature(), b.signature());
    }

    #[test]
    fn position_falls_back_to_case_insensitive() {
        let h = headers(&["Fecha", "Concepto"]);
        assert_eq!(h.position_of("concepto"), Some(1));
        assert_eq!(h.position_of(" FECHA "), Some(0));
        assert_eq!(h.position_of("Saldo"), None);
        assert_eq!(h.position_of(""), None);
    }

    #[test]
    fn raw_lookup_by_normalized_name() {
        let h = headers(&["Descripción", "Monto"]);
        assert_eq!(h.raw_for_normalized("descripcion"), Some("Descripción"));
        assert!(h.contains_normalized("monto"));
        assert!(!h.contains_normalized("fecha"));
    }
}
