pub mod aliases;
pub mod config;
pub mod extract;
pub mod header;
pub mod oracle;
pub mod parse;
pub mod resolver;
pub mod session;
pub mod strategy;
pub mod table;
pub mod template;
pub mod text;

pub use config::{ConfigError, DetectionConfig, ImportConfig, OracleConfig};
pub use header::{normalize_header, HeaderSet};
pub use oracle::{ColumnOracle, HttpOracle, OracleError, OracleRequest, OracleVerdict};
pub use parse::{parse_rows, ParseOutcome, RejectedRow};
pub use resolver::{Attempt, AttemptOutcome, MappedImport, MappingResolver, Resolution};
pub use session::{DetectionTicket, ImportError, ImportSession, ImportSummary, SessionState};
pub use strategy::StrategyKind;
pub use table::{HeaderBasis, RawTable, StructuralError};
pub use template::{example_template, export_records, TEMPLATE_HEADER};
pub use text::Delimiter;

use peso_core::ProfileStore;
use std::sync::Arc;
use tracing::warn;

/// Builds a resolver from configuration, attaching the HTTP oracle when an
/// `[oracle]` table is present and its key is available.
pub fn resolver_from_config(config: &ImportConfig, profiles: Arc<dyn ProfileStore>) -> MappingResolver {
    let resolver = MappingResolver::new(profiles, config.detection.clone());
    match &config.oracle {
        Some(oracle_config) => match HttpOracle::new(oracle_config.clone()) {
            Ok(oracle) => resolver.with_oracle(Arc::new(oracle)),
            Err(e) => {
                warn!(error = %e, "oracle configured but unavailable");
                resolver
            }
        },
        None => resolver,
    }
}
