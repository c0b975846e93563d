use serde::Serialize;
use thiserror::Error;

use crate::aliases::is_known_alias;
use crate::config::DetectionConfig;
use crate::header::{normalize_header, HeaderSet};
use crate::text::{detect_delimiter, normalize_text, split_fields, Delimiter};

/// Fatal to one import attempt; no partial result is produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    #[error("The file must contain a header line and at least one data line")]
    TooFewLines,
    #[error("No rows split into multiple {0}-separated fields")]
    NoDelimitedRows(Delimiter),
}

/// Why a particular line was taken as the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderBasis {
    /// A token matched the alias dictionary.
    AliasMatch,
    /// No alias matched; the first line has at least three non-numeric tokens.
    TextualFirstLine,
    /// No signal at all; the first line is assumed.
    FirstLineDefault,
}

/// The non-blank lines of one file after normalization, split at the header.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub delimiter: Delimiter,
    /// Index of the header among the non-blank lines.
    pub header_index: usize,
    pub header_basis: HeaderBasis,
    /// Metadata lines that precede the header.
    pub preamble: Vec<String>,
    /// Header line first, then every data line.
    pub lines: Vec<String>,
}

impl RawTable {
    pub fn from_text(raw: &str, config: &DetectionConfig) -> Result<RawTable, StructuralError> {
        let text = normalize_text(raw);
        let delimiter = detect_delimiter(&text, config.delimiter_sample_chars);

        let all_lines: Vec<String> = text
            .split('\n')
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect();
        if all_lines.len() < 2 {
            return Err(StructuralError::TooFewLines);
        }

        let (header_index, header_basis) =
            locate_header(&all_lines, delimiter, config.header_scan_lines);

        let mut all_lines = all_lines;
        let lines = all_lines.split_off(header_index);
        let table = RawTable {
            delimiter,
            header_index,
            header_basis,
            preamble: all_lines,
            lines,
        };

        let header_width = table.header_fields().len();
        let any_delimited_row = table.data_rows().any(|(_, fields)| fields.len() >= 2);
        if header_width < 2 || !any_delimited_row {
            return Err(StructuralError::NoDelimitedRows(delimiter));
        }

        Ok(table)
    }

    pub fn header_fields(&self) -> Vec<String> {
        split_fields(&self.lines[0], self.delimiter)
    }

    pub fn headers(&self) -> HeaderSet {
        HeaderSet::new(self.header_fields())
    }

    /// `(source_row_number, fields)` for every data line. Row numbers are
    /// 1-based positions among the file's non-blank lines.
    pub fn data_rows(&self) -> impl Iterator<Item = (usize, Vec<String>)> + '_ {
        let offset = self.header_index + 1;
        self.lines
            .iter()
            .enumerate()
            .skip(1)
            .map(move |(i, line)| (offset + i, split_fields(line, self.delimiter)))
    }

    pub fn data_row_count(&self) -> usize {
        self.lines.len() - 1
    }

    pub fn sample_rows(&self, n: usize) -> Vec<Vec<String>> {
        self.data_rows().take(n).map(|(_, fields)| fields).collect()
    }
}

/// Scans at most `scan_lines` leading lines (never the last one) for a row
/// whose tokens include a known header alias.
fn locate_header(lines: &[String], delimiter: Delimiter, scan_lines: usize) -> (usize, HeaderBasis) {
    let limit = scan_lines.min(lines.len() - 1);

    for (i, line) in lines.iter().enumerate().take(limit) {
        let tokens = split_fields(line, delimiter);
        if tokens.len() < 2 {
            continue;
        }
        if tokens.iter().any(|t| is_known_alias(&normalize_header(t))) {
            return (i, HeaderBasis::AliasMatch);
        }
    }

    let first = split_fields(&lines[0], delimiter);
    let textual = first.iter().filter(|t| is_non_numeric(t)).count();
    if textual >= 3 {
        (0, HeaderBasis::TextualFirstLine)
    } else {
        (0, HeaderBasis::FirstLineDefault)
    }
}

fn is_non_numeric(token: &str) -> bool {
    let stripped: String = token.chars().filter(|c| *c != '.' && *c != ',').collect();
    let stripped = stripped.trim();
    let unsigned = stripped.trim_start_matches(['-', '+']);
    let is_number = !unsigned.is_empty() && unsigned.bytes().all(|b| b.is_ascii_digit());
    !stripped.is_empty() && !is_number
}
