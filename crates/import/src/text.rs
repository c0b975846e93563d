use serde::{Deserialize, Serialize};
use std::fmt;

const BOM: char = '\u{FEFF}';

/// Drops a leading byte-order mark and unifies line endings to `\n`.
pub fn normalize_text(raw: &str) -> String {
    let raw = raw.strip_prefix(BOM).unwrap_or(raw);
    raw.replace("\r\n", "\n").replace('\r', "\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    Comma,
    Semicolon,
    Tab,
}

impl Delimiter {
    pub fn as_byte(self) -> u8 {
        match self {
            Delimiter::Comma => b',',
            Delimiter::Semicolon => b';',
            Delimiter::Tab => b'\t',
        }
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delimiter::Comma => write!(f, "comma"),
            Delimiter::Semicolon => write!(f, "semicolon"),
            Delimiter::Tab => write!(f, "tab"),
        }
    }
}

/// Picks the separator from the first line, looking at no more than
/// `sample_chars` characters of it. Semicolon must strictly beat both
/// others; tab must strictly beat comma; comma is the default.
pub fn detect_delimiter(text: &str, sample_chars: usize) -> Delimiter {
    let first_line = text.split('\n').next().unwrap_or_default();
    let (mut semi, mut comma, mut tab) = (0usize, 0usize, 0usize);
    for c in first_line.chars().take(sample_chars) {
        match c {
            ';' => semi += 1,
            ',' => comma += 1,
            '\t' => tab += 1,
            _ => {}
        }
    }

    if semi > comma && semi > tab {
        Delimiter::Semicolon
    } else if tab > comma {
        Delimiter::Tab
    } else {
        Delimiter::Comma
    }
}

/// Splits one line into trimmed fields. `"` quotes a field and `""` inside
/// quotes is a literal quote. Always returns at least one field.
pub fn split_fields(line: &str, delimiter: Delimiter) -> Vec<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .delimiter(delimiter.as_byte())
        .quote(b'"')
        .double_quote(true)
        .from_reader(line.as_bytes());

    let mut record = csv::StringRecord::new();
    match reader.read_record(&mut record) {
        Ok(true) => record.iter().map(|f| f.trim().to_string()).collect(),
        // Unreadable bytes or an empty line: keep the text as a single field
        // so the row is still counted (and rejected) downstream.
        _ => vec![line.trim().to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── normalize_text ────────────────────────────────────────────────────────

    #[test]
    fn strips_leading_bom() {
        assert_eq!(normalize_text("\u{FEFF}a,b\n1,2"), "a,b\n1,2");
    }

    #[test]
    fn bom_elsewhere_is_kept() {
        assert_eq!(normalize_text("a\u{FEFF}b"), "a\u{FEFF}b");
    }

    #[test]
    fn unifies_line_endings() {
        assert_eq!(normalize_text("a\r\nb\rc\nd"), "a\nb\nc\nd");
    }

    // ── detect_delimiter ──────────────────────────────────────────────────────

    #[test]
    fn semicolon_wins_when_strictly_greatest() {
        assert_eq!(detect_delimiter("Fecha;Concepto;Importe\n1,2;x;3", 1000), Delimiter::Semicolon);
        assert_eq!(detect_delimiter("a;b,c;d", 1000), Delimiter::Semicolon);
    }

    #[test]
    fn comma_only_is_comma() {
        assert_eq!(detect_delimiter("tipo,descripcion,monto,fecha", 1000), Delimiter::Comma);
    }

    #[test]
    fn tab_beats_comma() {
        assert_eq!(detect_delimiter("a\tb\tc,d", 1000), Delimiter::Tab);
    }

    #[test]
    fn ties_fall_back_to_comma() {
        assert_eq!(detect_delimiter("a;b,c", 1000), Delimiter::Comma);
        assert_eq!(detect_delimiter("a\tb,c", 1000), Delimiter::Comma);
        assert_eq!(detect_delimiter("", 1000), Delimiter::Comma);
    }

    #[test]
    fn only_first_line_counts() {
        assert_eq!(detect_delimiter("a,b,c\n;;;;;;;;", 1000), Delimiter::Comma);
    }

    #[test]
    fn sample_window_is_respected() {
        let line = format!("{}{}", ",".repeat(5), ";".repeat(10));
        assert_eq!(detect_delimiter(&line, 5), Delimiter::Comma);
        assert_eq!(detect_delimiter(&line, 100), Delimiter::Semicolon);
    }

    // ── split_fields ──────────────────────────────────────────────────────────

    #[test]
    fn splits_and_trims() {
        assert_eq!(
            split_fields(" a , b ,c", Delimiter::Comma),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn quoted_delimiters_are_literal() {
        assert_eq!(
            split_fields(r#"2025-11-01,"Pago, tarjeta",1.234,56"#, Delimiter::Comma),
            vec!["2025-11-01", "Pago, tarjeta", "1.234", "56"]
        );
        assert_eq!(
            split_fields(r#"04/12/2025;"Compra; super";"-45,50""#, Delimiter::Semicolon),
            vec!["04/12/2025", "Compra; super", "-45,50"]
        );
    }

    #[test]
    fn doubled_quotes_escape() {
        assert_eq!(
            split_fields(r#""Tienda ""La Esquina""",10"#, Delimiter::Comma),
            vec![r#"Tienda "La Esquina""#, "10"]
        );
    }

    #[test]
    fn trailing_empty_field_is_kept() {
        assert_eq!(split_fields("a;b;", Delimiter::Semicolon), vec!["a", "b", ""]);
    }

    #[test]
    fn tab_separated() {
        assert_eq!(split_fields("a\tb c\td", Delimiter::Tab), vec!["a", "b c", "d"]);
    }

    #[test]
    fn never_empty() {
        assert_eq!(split_fields("", Delimiter::Comma).len(), 1);
    }
}
