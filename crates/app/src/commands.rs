use anyhow::{anyhow, bail, Context, Result};
use peso_core::{CanonicalField, ColumnMapping, ProfileStore, TransactionRecord};
use peso_import::{
    example_template, Attempt, AttemptOutcome, Delimiter, ImportSession, ImportSummary,
    RejectedRow, SessionState, StrategyKind,
};
use peso_storage::{SqliteProfileStore, SqliteTransactionSink};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::AppState;

const PREVIEW_ROWS: usize = 10;

pub struct ImportArgs {
    pub file: PathBuf,
    pub map: Vec<String>,
    pub save_profile: Option<String>,
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub file: String,
    pub delimiter: Option<Delimiter>,
    pub headers: Vec<String>,
    pub strategy: StrategyKind,
    pub mapping: ColumnMapping,
    pub attempts: Vec<Attempt>,
    pub records: Vec<TransactionRecord>,
    pub rejected: Vec<RejectedRow>,
    pub dry_run: bool,
    pub summary: Option<ImportSummary>,
}

/// Parses repeated `--map field=Header` arguments.
pub fn parse_mapping(args: &[String]) -> Result<Option<ColumnMapping>> {
    if args.is_empty() {
        return Ok(None);
    }
    let mut mapping = ColumnMapping::default();
    for arg in args {
        let (field, header) = arg
            .split_once('=')
            .with_context(|| format!("Invalid --map '{arg}', expected FIELD=HEADER"))?;
        let field: CanonicalField = field.parse().map_err(|e: String| anyhow!(e))?;
        mapping = mapping.with(field, header.trim());
    }
    Ok(Some(mapping))
}

pub async fn import_file(state: &AppState, args: &ImportArgs) -> Result<ImportReport> {
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let text = String::from_utf8_lossy(&bytes);
    let manual = parse_mapping(&args.map)?;

    let profiles: Arc<dyn ProfileStore> = Arc::new(SqliteProfileStore::new(state.db.clone()));
    let resolver = peso_import::resolver_from_config(&state.config, profiles);
    let mut session = ImportSession::new(resolver);

    let detected = session.detect(&text).await?;
    match (detected, manual) {
        (_, Some(mapping)) => {
            session
                .apply_manual_mapping(mapping, args.save_profile.as_deref())
                .await?;
        }
        (SessionState::AwaitingManualMapping, None) => {
            let columns = session
                .headers()
                .map(|h| h.raw.join(", "))
                .unwrap_or_default();
            bail!(
                "Could not detect the column layout (columns: {columns}). \
                 Map them with --map date=<column> --map description=<column> --map amount=<column>"
            );
        }
        (SessionState::Previewing, None) => {
            // Confirming the detected mapping under a name saves it as a profile.
            if let Some(label) = args.save_profile.as_deref() {
                let mapping = session
                    .preview()
                    .map(|p| p.mapping.clone())
                    .context("No preview available")?;
                session.apply_manual_mapping(mapping, Some(label)).await?;
            }
        }
        (other, None) => bail!("Unexpected session state: {other}"),
    }

    let preview = session.preview().context("No preview available")?;
    let mut report = ImportReport {
        file: args.file.display().to_string(),
        delimiter: session.table().map(|t| t.delimiter),
        headers: session.headers().map(|h| h.raw.clone()).unwrap_or_default(),
        strategy: preview.strategy,
        mapping: preview.mapping.clone(),
        attempts: preview.attempts.clone(),
        records: preview.outcome.records.clone(),
        rejected: preview.outcome.rejected.clone(),
        dry_run: args.dry_run,
        summary: None,
    };

    if !args.dry_run {
        let sink = SqliteTransactionSink::new(state.db.clone());
        report.summary = Some(session.import(&sink).await?);
    }

    Ok(report)
}

fn describe(attempt: &Attempt) -> String {
    let outcome = match &attempt.outcome {
        AttemptOutcome::NoProposal => "no match".to_string(),
        AttemptOutcome::ZeroRows { rejected } => format!("0 valid rows ({rejected} rejected)"),
        AttemptOutcome::Unavailable { reason } => format!("unavailable ({reason})"),
        AttemptOutcome::Accepted { rows } => format!("{rows} rows"),
    };
    format!("{}: {outcome}", attempt.strategy)
}

pub fn print_report(report: &ImportReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    match report.delimiter {
        Some(d) => println!("File:     {} ({d}-separated)", report.file),
        None => println!("File:     {}", report.file),
    }
    let mapped: Vec<String> = report
        .mapping
        .mapped_fields()
        .map(|(field, header)| format!("{field}={header}"))
        .collect();
    println!("Mapping:  {} [{}]", report.strategy, mapped.join(", "));
    let attempts: Vec<String> = report.attempts.iter().map(describe).collect();
    println!("Attempts: {}", attempts.join("; "));
    println!();

    println!(
        "Preview ({} of {} valid rows):",
        report.records.len().min(PREVIEW_ROWS),
        report.records.len()
    );
    for r in report.records.iter().take(PREVIEW_ROWS) {
        let category = r.category.as_deref().map(|c| format!("  [{c}]")).unwrap_or_default();
        println!(
            "  {}  {:<7}  {:>12}  {}{category}",
            r.date,
            r.kind.to_string(),
            r.amount.to_string(),
            r.description
        );
    }

    if !report.rejected.is_empty() {
        println!();
        println!("Rejected rows:");
        for row in &report.rejected {
            println!("  row {}: {}", row.source_row_number, row.reason);
        }
    }

    println!();
    match &report.summary {
        Some(s) => {
            let range = s.date_range.map(|r| format!(", {r}")).unwrap_or_default();
            println!(
                "Imported {} of {} rows ({} errors){range}",
                s.imported, s.total, s.errors
            );
        }
        None => println!(
            "Dry run: {} rows would be imported, {} rejected",
            report.records.len(),
            report.rejected.len()
        ),
    }
    Ok(())
}

pub async fn list_profiles(state: &AppState, json: bool) -> Result<()> {
    let store = SqliteProfileStore::new(state.db.clone());
    let profiles = store.list().await?;

    if json {
        let keyed: serde_json::Map<String, serde_json::Value> = profiles
            .iter()
            .map(|p| Ok((p.signature.clone(), serde_json::to_value(p)?)))
            .collect::<Result<_, serde_json::Error>>()?;
        println!("{}", serde_json::to_string_pretty(&keyed)?);
        return Ok(());
    }

    if profiles.is_empty() {
        println!("No saved bank profiles.");
        return Ok(());
    }
    for p in &profiles {
        let mapped: Vec<String> = p
            .column_map
            .mapped_fields()
            .map(|(field, header)| format!("{field}={header}"))
            .collect();
        println!("{}  (saved {})", p.profile_name, p.saved_at.format("%Y-%m-%d %H:%M"));
        println!("  columns: {}", p.signature);
        println!("  mapping: {}", mapped.join(", "));
    }
    Ok(())
}

pub fn write_template(out: Option<&Path>) -> Result<()> {
    let text = example_template().context("Failed to build the template")?;
    match out {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "template written");
        }
        None => print!("{text}"),
    }
    Ok(())
}
