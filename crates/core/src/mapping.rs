use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The engine's fixed target concepts that file columns are mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalField {
    Date,
    Description,
    Amount,
    Debit,
    Credit,
    #[serde(rename = "type")]
    Kind,
    Category,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 7] = [
        CanonicalField::Date,
        CanonicalField::Description,
        CanonicalField::Amount,
        CanonicalField::Debit,
        CanonicalField::Credit,
        CanonicalField::Kind,
        CanonicalField::Category,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CanonicalField::Date => "date",
            CanonicalField::Description => "description",
            CanonicalField::Amount => "amount",
            CanonicalField::Debit => "debit",
            CanonicalField::Credit => "credit",
            CanonicalField::Kind => "type",
            CanonicalField::Category => "category",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for CanonicalField {
    type Err = String;

    /// Accepts the English names and the Spanish ones used by the template
    /// export and by older saved profiles.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "date" | "fecha" => Ok(CanonicalField::Date),
            "description" | "descripcion" | "descripción" => Ok(CanonicalField::Description),
            "amount" | "monto" => Ok(CanonicalField::Amount),
            "debit" | "debito" | "débito" => Ok(CanonicalField::Debit),
            "credit" | "credito" | "crédito" => Ok(CanonicalField::Credit),
            "type" | "kind" | "tipo" => Ok(CanonicalField::Kind),
            "category" | "categoria" | "categoría" => Ok(CanonicalField::Category),
            other => Err(format!("Unknown field: '{other}'")),
        }
    }
}

/// Canonical field → literal header text. Fields left `None` are unmapped.
/// Deserialization also accepts the Spanish keys of older saved profiles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    #[serde(default, alias = "fecha", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, alias = "descripcion", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "monto", skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, alias = "debito", skip_serializing_if = "Option::is_none")]
    pub debit: Option<String>,
    #[serde(default, alias = "credito", skip_serializing_if = "Option::is_none")]
    pub credit: Option<String>,
    #[serde(rename = "type", alias = "tipo", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, alias = "categoria", skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ColumnMapping {
    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        let slot = match field {
            CanonicalField::Date => &self.date,
            CanonicalField::Description => &self.description,
            CanonicalField::Amount => &self.amount,
            CanonicalField::Debit => &self.debit,
            CanonicalField::Credit => &self.credit,
            CanonicalField::Kind => &self.kind,
            CanonicalField::Category => &self.category,
        };
        slot.as_deref().filter(|h| !h.trim().is_empty())
    }

    /// Builder-style setter; a blank header leaves the field unmapped.
    pub fn with(mut self, field: CanonicalField, header: impl Into<String>) -> Self {
        let header = header.into();
        let value = if header.trim().is_empty() { None } else { Some(header) };
        match field {
            CanonicalField::Date => self.date = value,
            CanonicalField::Description => self.description = value,
            CanonicalField::Amount => self.amount = value,
            CanonicalField::Debit => self.debit = value,
            CanonicalField::Credit => self.credit = value,
            CanonicalField::Kind => self.kind = value,
            CanonicalField::Category => self.category = value,
        }
        self
    }

    pub fn has_amount_field(&self) -> bool {
        self.get(CanonicalField::Amount).is_some()
            || self.get(CanonicalField::Debit).is_some()
            || self.get(CanonicalField::Credit).is_some()
    }

    /// Date, description and at least one amount-bearing column.
    pub fn is_usable(&self) -> bool {
        self.get(CanonicalField::Date).is_some()
            && self.get(CanonicalField::Description).is_some()
            && self.has_amount_field()
    }

    /// Required fields that are still unmapped, for user-facing messages.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.get(CanonicalField::Date).is_none() {
            missing.push("date");
        }
        if self.get(CanonicalField::Description).is_none() {
            missing.push("description");
        }
        if !self.has_amount_field() {
            missing.push("amount, debit or credit");
        }
        missing
    }

    pub fn mapped_fields(&self) -> impl Iterator<Item = (CanonicalField, &str)> {
        CanonicalField::ALL
            .into_iter()
            .filter_map(move |f| self.get(f).map(|h| (f, h)))
    }
}

/// A remembered column layout for one header signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankProfile {
    #[serde(skip)]
    pub signature: String,
    pub column_map: ColumnMapping,
    pub profile_name: String,
    pub saved_at: DateTime<Utc>,
}

impl BankProfile {
    pub fn new(signature: &str, column_map: ColumnMapping, profile_name: &str) -> Self {
        BankProfile {
            signature: signature.to_string(),
            column_map,
            profile_name: profile_name.trim().to_string(),
            saved_at: Utc::now(),
        }
    }
}
