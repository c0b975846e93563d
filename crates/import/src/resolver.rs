use peso_core::{BankProfile, ColumnMapping, ProfileStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::DetectionConfig;
use crate::header::HeaderSet;
use crate::oracle::{interpret_reply, ColumnOracle, OracleRequest, OracleVerdict};
use crate::parse::{parse_rows, ParseOutcome};
use crate::strategy::{pattern_mapping, profile_mapping, template_mapping, StrategyKind};
use crate::table::RawTable;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum AttemptOutcome {
    /// The strategy had nothing to offer for these headers.
    NoProposal,
    /// A mapping was proposed but no row survived validation.
    ZeroRows { rejected: usize },
    /// The oracle could not be reached or its reply was unusable.
    Unavailable { reason: String },
    Accepted { rows: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attempt {
    pub strategy: StrategyKind,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

/// A mapping that parsed at least one valid row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedImport {
    pub strategy: StrategyKind,
    pub mapping: ColumnMapping,
    pub outcome: ParseOutcome,
    pub attempts: Vec<Attempt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Mapped(MappedImport),
    /// Every automatic strategy failed; manual mapping is required.
    Exhausted { attempts: Vec<Attempt> },
}

impl Resolution {
    pub fn attempts(&self) -> &[Attempt] {
        match self {
            Resolution::Mapped(m) => &m.attempts,
            Resolution::Exhausted { attempts } => attempts,
        }
    }
}

/// Walks the automatic mapping cascade for one file.
pub struct MappingResolver {
    profiles: Arc<dyn ProfileStore>,
    oracle: Option<Arc<dyn ColumnOracle>>,
    config: DetectionConfig,
}

impl MappingResolver {
    pub fn new(profiles: Arc<dyn ProfileStore>, config: DetectionConfig) -> Self {
        MappingResolver {
            profiles,
            oracle: None,
            config,
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn ColumnOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn profiles(&self) -> &Arc<dyn ProfileStore> {
        &self.profiles
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    async fn stored_profile(&self, signature: &str) -> Option<BankProfile> {
        match self.profiles.find(signature).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(error = %e, "profile lookup failed, continuing without profile");
                None
            }
        }
    }

    /// Tries each automatic strategy in cascade order and stops at the
    /// first mapping that parses at least one row. Later strategies are
    /// never computed once one succeeds.
    pub async fn resolve(&self, table: &RawTable, headers: &HeaderSet) -> Resolution {
        let mut attempts = Vec::new();

        for strategy in StrategyKind::CASCADE {
            let proposal = match strategy {
                StrategyKind::Template => template_mapping(headers),
                StrategyKind::StoredProfile => {
                    let profile = self.stored_profile(&headers.signature()).await;
                    profile_mapping(profile.as_ref())
                }
                StrategyKind::Pattern => pattern_mapping(headers),
                StrategyKind::Oracle => {
                    let Some(oracle) = &self.oracle else {
                        debug!("oracle not configured, skipping");
                        continue;
                    };
                    // Failures are recorded by the oracle round trip itself.
                    match self.ask_oracle(oracle.as_ref(), table, headers, &mut attempts).await {
                        Some(mapping) => Some(mapping),
                        None => continue,
                    }
                }
                StrategyKind::Manual => break,
            };

            if let Some(found) = try_mapping(strategy, proposal, table, headers, &mut attempts) {
                return Resolution::Mapped(MappedImport { attempts, ..found });
            }
        }

        info!(attempts = attempts.len(), "automatic mapping exhausted");
        Resolution::Exhausted { attempts }
    }

    /// One round trip, no retry. Every failure is recorded and swallowed.
    async fn ask_oracle(
        &self,
        oracle: &dyn ColumnOracle,
        table: &RawTable,
        headers: &HeaderSet,
        attempts: &mut Vec<Attempt>,
    ) -> Option<ColumnMapping> {
        let request = OracleRequest::new(
            headers.raw.clone(),
            table.sample_rows(self.config.sample_rows()),
        );

        let reason = match oracle.complete(&request).await {
            Ok(reply) => match interpret_reply(&reply, headers) {
                OracleVerdict::Mapping(mapping) => return Some(mapping),
                OracleVerdict::Unusable(reason) => reason,
            },
            Err(e) => e.to_string(),
        };

        warn!(%reason, "oracle produced no mapping");
        attempts.push(Attempt {
            strategy: StrategyKind::Oracle,
            outcome: AttemptOutcome::Unavailable { reason },
        });
        None
    }
}

/// Parses the whole table with a proposed mapping. A mapping that yields
/// zero valid rows counts as a failed strategy.
fn try_mapping(
    strategy: StrategyKind,
    proposal: Option<ColumnMapping>,
    table: &RawTable,
    headers: &HeaderSet,
    attempts: &mut Vec<Attempt>,
) -> Option<MappedImport> {
    let Some(mapping) = proposal else {
        debug!(%strategy, "no proposal");
        attempts.push(Attempt {
            strategy,
            outcome: AttemptOutcome::NoProposal,
        });
        return None;
    };

    let outcome = parse_rows(table, headers, &mapping);
    if outcome.is_empty() {
        warn!(%strategy, rejected = outcome.rejected.len(), "mapping parsed zero valid rows, continuing");
        attempts.push(Attempt {
            strategy,
            outcome: AttemptOutcome::ZeroRows {
                rejected: outcome.rejected.len(),
            },
        });
        return None;
    }

    info!(
        %strategy,
        rows = outcome.accepted(),
        rejected = outcome.rejected.len(),
        "mapping accepted"
    );
    attempts.push(Attempt {
        strategy,
        outcome: AttemptOutcome::Accepted {
            rows: outcome.accepted(),
        },
    });
    Some(MappedImport {
        strategy,
        mapping,
        outcome,
        attempts: Vec::new(),
    })
}
