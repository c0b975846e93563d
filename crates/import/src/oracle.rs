use async_trait::async_trait;
use peso_core::{CanonicalField, ColumnMapping};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use crate::config::{OracleConfig, MAX_ORACLE_SAMPLE_ROWS};
use crate::header::HeaderSet;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("No API key in environment variable {0}")]
    MissingKey(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Oracle returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Oracle reply carried no message content")]
    EmptyReply,
}

/// What the oracle is shown: literal headers and a few tokenized rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleRequest {
    pub headers: Vec<String>,
    pub sample_rows: Vec<Vec<String>>,
}

impl OracleRequest {
    pub fn new(headers: Vec<String>, mut sample_rows: Vec<Vec<String>>) -> Self {
        sample_rows.truncate(MAX_ORACLE_SAMPLE_ROWS);
        OracleRequest {
            headers,
            sample_rows,
        }
    }
}

/// An external text-generation service asked to name the columns.
#[async_trait]
pub trait ColumnOracle: Send + Sync {
    /// The service's raw reply text; interpretation is the caller's job.
    async fn complete(&self, request: &OracleRequest) -> Result<String, OracleError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleVerdict {
    Mapping(ColumnMapping),
    Unusable(String),
}

fn is_unknown_marker(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "" | "null" | "none" | "unknown" | "n/a"
    )
}

/// Validates an untrusted oracle reply against the file's headers. The
/// mapping is taken whole or not at all.
pub fn interpret_reply(reply: &str, headers: &HeaderSet) -> OracleVerdict {
    let (Some(start), Some(end)) = (reply.find('{'), reply.rfind('}')) else {
        return OracleVerdict::Unusable("no JSON object in reply".to_string());
    };
    if end < start {
        return OracleVerdict::Unusable("no JSON object in reply".to_string());
    }

    let object = match serde_json::from_str::<Value>(&reply[start..=end]) {
        Ok(Value::Object(object)) => object,
        Ok(_) => return OracleVerdict::Unusable("reply is not a JSON object".to_string()),
        Err(e) => return OracleVerdict::Unusable(format!("malformed JSON: {e}")),
    };

    let mut mapping = ColumnMapping::default();
    for (key, value) in &object {
        let Ok(field) = key.parse::<CanonicalField>() else {
            return OracleVerdict::Unusable(format!("unknown field '{key}'"));
        };
        let header = match value {
            Value::Null => continue,
            Value::String(s) if is_unknown_marker(s) => continue,
            Value::String(s) => s,
            other => return OracleVerdict::Unusable(format!("'{key}' is not a string: {other}")),
        };
        if headers.position_of(header).is_none() {
            return OracleVerdict::Unusable(format!("'{key}' names missing header '{header}'"));
        }
        mapping = mapping.with(field, header.trim());
    }

    if !mapping.is_usable() {
        return OracleVerdict::Unusable(format!(
            "mapping lacks {}",
            mapping.missing_required().join(", ")
        ));
    }
    OracleVerdict::Mapping(mapping)
}

pub fn build_prompt(request: &OracleRequest) -> String {
    let headers = serde_json::to_string(&request.headers).unwrap_or_default();
    let rows = request
        .sample_rows
        .iter()
        .enumerate()
        .map(|(i, row)| format!("Row {}: {}", i + 1, serde_json::to_string(row).unwrap_or_default()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are an expert on bank statement exports. Map the columns of this CSV file onto the internal schema.

Detected headers: {headers}
Sample rows:
{rows}

Internal schema:
- date: the transaction date column
- description: merchant name or movement description
- amount: the amount column when there is ONE numeric column
- debit: debits/charges/withdrawals column (when debit and credit are separate)
- credit: credits/deposits column (when debit and credit are separate)
- type: column stating whether the row is income or expense (null if absent)
- category: category column (null if absent)

RULES:
1. Separate debit and credit columns -> use "debit" and "credit", NOT "amount"
2. A single amount column -> use "amount"
3. Use the EXACT header text as it appears in the headers
4. Use null for any field you cannot identify with certainty

Reply with JSON only, no explanation:
{{"date": "...", "description": "...", "amount": null, "debit": "...", "credit": "...", "type": null, "category": null}}"#
    )
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat-completions client.
pub struct HttpOracle {
    client: reqwest::Client,
    config: OracleConfig,
    api_key: String,
}

impl HttpOracle {
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        let api_key = config
            .api_key()
            .ok_or_else(|| OracleError::MissingKey(config.api_key_env.clone()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(HttpOracle {
            client,
            config,
            api_key,
        })
    }
}

#[async_trait]
impl ColumnOracle for HttpOracle {
    async fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": 0,
            "messages": [{ "role": "user", "content": build_prompt(request) }],
        });

        let resp = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = resp.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(OracleError::EmptyReply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> HeaderSet {
        HeaderSet::new(
            ["F. Operación", "Movimiento", "Cargo", "Abono", "Saldo"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }

    // ── interpret_reply ───────────────────────────────────────────────────────

    #[test]
    fn accepts_fenced_reply_with_english_keys() {
        let reply = "Sure!\n```json\n{\"date\": \"F. Operación\", \"description\": \"Movimiento\", \
                     \"amount\": null, \"debit\": \"Cargo\", \"credit\": \"Abono\", \"type\": null}\n```";
        let OracleVerdict::Mapping(m) = interpret_reply(reply, &headers()) else {
            panic!("expected a mapping");
        };
        assert_eq!(m.date.as_deref(), Some("F. Operación"));
        assert_eq!(m.debit.as_deref(), Some("Cargo"));
        assert_eq!(m.credit.as_deref(), Some("Abono"));
        assert!(m.amount.is_none());
    }

    #[test]
    fn accepts_spanish_keys_and_unknown_markers() {
        let reply = r#"{"fecha": "F. Operación", "descripcion": "Movimiento", "monto": "None",
                        "debito": "Cargo", "credito": "Abono", "tipo": "null", "categoria": ""}"#;
        assert!(matches!(interpret_reply(reply, &headers()), OracleVerdict::Mapping(_)));
    }

    #[test]
    fn rejects_invented_headers() {
        let reply = r#"{"date": "Date", "description": "Movimiento", "amount": "Saldo"}"#;
        assert!(matches!(interpret_reply(reply, &headers()), OracleVerdict::Unusable(_)));
    }

    #[test]
    fn rejects_unknown_keys_and_wrong_shapes() {
        let h = headers();
        let unknown = r#"{"date": "F. Operación", "description": "Movimiento", "amount": "Cargo", "balance": "Saldo"}"#;
        assert!(matches!(interpret_reply(unknown, &h), OracleVerdict::Unusable(_)));
        let numeric = r#"{"date": 1, "description": "Movimiento", "amount": "Cargo"}"#;
        assert!(matches!(interpret_reply(numeric, &h), OracleVerdict::Unusable(_)));
        assert!(matches!(interpret_reply("[1, 2]", &h), OracleVerdict::Unusable(_)));
        assert!(matches!(interpret_reply("I don't know", &h), OracleVerdict::Unusable(_)));
        assert!(matches!(interpret_reply("} {", &h), OracleVerdict::Unusable(_)));
        assert!(matches!(interpret_reply("{not json}", &h), OracleVerdict::Unusable(_)));
    }

    #[test]
    fn rejects_incomplete_mapping() {
        let reply = r#"{"date": "F. Operación", "description": null, "amount": "Cargo"}"#;
        match interpret_reply(reply, &headers()) {
            OracleVerdict::Unusable(reason) => assert!(reason.contains("description")),
            other => panic!("unexpected {other:?}"),
        }
    }

    // ── request ───────────────────────────────────────────────────────────────

    #[test]
    fn request_keeps_at_most_three_rows() {
        let rows = (0..5).map(|i| vec![i.to_string()]).collect();
        let req = OracleRequest::new(vec!["a".into()], rows);
        assert_eq!(req.sample_rows.len(), 3);
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("sampleRows").is_some());
    }

    #[test]
    fn prompt_lists_headers_and_rows() {
        let req = OracleRequest::new(
            vec!["Fecha".into(), "Cargo".into()],
            vec![vec!["01/02/2025".into(), "10,00".into()]],
        );
        let prompt = build_prompt(&req);
        assert!(prompt.contains(r#"["Fecha","Cargo"]"#));
        assert!(prompt.contains(r#"Row 1: ["01/02/2025","10,00"]"#));
    }

    #[test]
    fn http_oracle_needs_a_key() {
        let cfg = OracleConfig {
            api_key_env: "PESO_TEST_NO_SUCH_KEY".to_string(),
            ..OracleConfig::default()
        };
        assert!(matches!(HttpOracle::new(cfg), Err(OracleError::MissingKey(_))));
    }
}
