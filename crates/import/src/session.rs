use peso_core::{
    BankProfile, ColumnMapping, DateRange, StoreError, TransactionRecord, TransactionSink,
};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::header::HeaderSet;
use crate::parse::parse_rows;
use crate::resolver::{Attempt, AttemptOutcome, MappedImport, MappingResolver, Resolution};
use crate::strategy::StrategyKind;
use crate::table::{RawTable, StructuralError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Detecting,
    Previewing,
    AwaitingManualMapping,
    Importing,
    Completed,
    Errored,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Detecting => "detecting",
            SessionState::Previewing => "previewing",
            SessionState::AwaitingManualMapping => "awaiting manual mapping",
            SessionState::Importing => "importing",
            SessionState::Completed => "completed",
            SessionState::Errored => "errored",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error("Mapping is missing required fields: {}", .0.join(", "))]
    IncompleteMapping(Vec<&'static str>),
    #[error("The mapping produced no valid rows ({rejected} rejected)")]
    NoValidRows { rejected: usize },
    #[error("Detection result belongs to a superseded attempt")]
    Superseded,
    #[error("Not allowed while the session is {0}")]
    InvalidState(SessionState),
    #[error("Persistence failed: {0}")]
    Persistence(String),
    #[error("Profile store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    /// Data rows in the file.
    pub total: usize,
    pub imported: usize,
    /// Rejected rows plus anything the sink refused.
    pub errors: usize,
    pub date_range: Option<DateRange>,
}

/// Proof of which detection attempt a result belongs to. Only the ticket
/// from the latest [`ImportSession::begin`] is accepted by `finish`.
#[derive(Debug, Clone)]
pub struct DetectionTicket {
    attempt: u64,
    table: Arc<RawTable>,
    headers: Arc<HeaderSet>,
}

impl DetectionTicket {
    pub fn table(&self) -> &RawTable {
        &self.table
    }

    pub fn headers(&self) -> &HeaderSet {
        &self.headers
    }
}

struct Detected {
    table: Arc<RawTable>,
    headers: Arc<HeaderSet>,
}

/// UI-facing coordinator for one file at a time.
pub struct ImportSession {
    resolver: Arc<MappingResolver>,
    state: SessionState,
    attempt: u64,
    detected: Option<Detected>,
    preview: Option<MappedImport>,
    attempts: Vec<Attempt>,
}

impl ImportSession {
    pub fn new(resolver: MappingResolver) -> Self {
        ImportSession {
            resolver: Arc::new(resolver),
            state: SessionState::Idle,
            attempt: 0,
            detected: None,
            preview: None,
            attempts: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn resolver(&self) -> Arc<MappingResolver> {
        Arc::clone(&self.resolver)
    }

    pub fn preview(&self) -> Option<&MappedImport> {
        self.preview.as_ref()
    }

    pub fn headers(&self) -> Option<&HeaderSet> {
        self.detected.as_ref().map(|d| d.headers.as_ref())
    }

    pub fn table(&self) -> Option<&RawTable> {
        self.detected.as_ref().map(|d| d.table.as_ref())
    }

    /// Every strategy tried for the current file, in order.
    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    fn clear(&mut self) {
        self.detected = None;
        self.preview = None;
        self.attempts.clear();
    }

    /// Starts a new attempt, invalidating any earlier ticket, and runs the
    /// synchronous structural phase.
    pub fn begin(&mut self, text: &str) -> Result<DetectionTicket, ImportError> {
        self.attempt += 1;
        self.clear();

        let table = match RawTable::from_text(text, self.resolver.config()) {
            Ok(table) => table,
            Err(e) => {
                warn!(error = %e, "file is structurally unusable");
                self.state = SessionState::Errored;
                return Err(e.into());
            }
        };

        let headers = Arc::new(table.headers());
        let table = Arc::new(table);
        debug!(
            attempt = self.attempt,
            delimiter = %table.delimiter,
            header_index = table.header_index,
            rows = table.data_row_count(),
            "detection started"
        );

        self.detected = Some(Detected {
            table: Arc::clone(&table),
            headers: Arc::clone(&headers),
        });
        self.state = SessionState::Detecting;
        Ok(DetectionTicket {
            attempt: self.attempt,
            table,
            headers,
        })
    }

    /// Applies a resolution if its ticket is still current. Stale results
    /// are discarded and leave the session untouched.
    pub fn finish(
        &mut self,
        ticket: DetectionTicket,
        resolution: Resolution,
    ) -> Result<SessionState, ImportError> {
        if ticket.attempt != self.attempt || self.state != SessionState::Detecting {
            debug!(
                ticket = ticket.attempt,
                current = self.attempt,
                "discarding stale detection result"
            );
            return Err(ImportError::Superseded);
        }

        match resolution {
            Resolution::Mapped(mapped) => {
                info!(strategy = %mapped.strategy, rows = mapped.outcome.accepted(), "preview ready");
                self.attempts = mapped.attempts.clone();
                self.preview = Some(mapped);
                self.state = SessionState::Previewing;
            }
            Resolution::Exhausted { attempts } => {
                info!("awaiting manual mapping");
                self.attempts = attempts;
                self.state = SessionState::AwaitingManualMapping;
            }
        }
        Ok(self.state)
    }

    /// Structural phase plus the automatic cascade.
    pub async fn detect(&mut self, text: &str) -> Result<SessionState, ImportError> {
        let ticket = self.begin(text)?;
        let resolver = self.resolver();
        let resolution = resolver.resolve(ticket.table(), ticket.headers()).await;
        self.finish(ticket, resolution)
    }

    /// Uses a caller-supplied mapping. Allowed after exhaustion, or over an
    /// automatic preview to correct it. A non-blank `save_as` remembers the
    /// mapping for this header signature once it has parsed valid rows.
    pub async fn apply_manual_mapping(
        &mut self,
        mapping: ColumnMapping,
        save_as: Option<&str>,
    ) -> Result<&MappedImport, ImportError> {
        if !matches!(
            self.state,
            SessionState::AwaitingManualMapping | SessionState::Previewing
        ) {
            return Err(ImportError::InvalidState(self.state));
        }
        let Some(detected) = &self.detected else {
            return Err(ImportError::InvalidState(self.state));
        };

        let missing = mapping.missing_required();
        if !missing.is_empty() {
            return Err(ImportError::IncompleteMapping(missing));
        }

        let outcome = parse_rows(&detected.table, &detected.headers, &mapping);
        if outcome.is_empty() {
            return Err(ImportError::NoValidRows {
                rejected: outcome.rejected.len(),
            });
        }

        if let Some(label) = save_as.map(str::trim).filter(|l| !l.is_empty()) {
            let signature = detected.headers.signature();
            let profile = BankProfile::new(&signature, mapping.clone(), label);
            self.resolver.profiles().save(profile).await?;
            info!(%signature, profile = label, "bank profile saved");
        }

        let mut attempts = self.attempts.clone();
        attempts.push(Attempt {
            strategy: StrategyKind::Manual,
            outcome: AttemptOutcome::Accepted {
                rows: outcome.accepted(),
            },
        });
        self.attempts = attempts.clone();
        self.state = SessionState::Previewing;
        Ok(&*self.preview.insert(MappedImport {
            strategy: StrategyKind::Manual,
            mapping,
            outcome,
            attempts,
        }))
    }

    /// Hands the previewed batch to `sink` in one call.
    pub async fn import(&mut self, sink: &dyn TransactionSink) -> Result<ImportSummary, ImportError> {
        if self.state != SessionState::Previewing {
            return Err(ImportError::InvalidState(self.state));
        }
        let Some(preview) = &self.preview else {
            return Err(ImportError::InvalidState(self.state));
        };

        self.state = SessionState::Importing;
        let records: &[TransactionRecord] = &preview.outcome.records;
        let total = preview.outcome.total();
        let rejected = preview.outcome.rejected.len();
        let date_range = DateRange::spanning(records.iter().map(|r| r.date));

        match sink.persist_batch(records).await {
            Ok(receipt) => {
                let summary = ImportSummary {
                    total,
                    imported: receipt.imported,
                    errors: rejected + receipt.errors,
                    date_range,
                };
                info!(
                    total = summary.total,
                    imported = summary.imported,
                    errors = summary.errors,
                    "import completed"
                );
                self.state = SessionState::Completed;
                Ok(summary)
            }
            Err(e) => {
                warn!(error = %e, "persistence rejected the batch");
                self.clear();
                self.state = SessionState::Idle;
                Err(ImportError::Persistence(e.0))
            }
        }
    }

    /// Back to `Idle`; any outstanding ticket becomes stale.
    pub fn reset(&mut self) {
        self.attempt += 1;
        self.clear();
        self.state = SessionState::Idle;
    }
}
