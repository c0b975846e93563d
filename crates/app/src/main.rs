use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use peso_import::ImportConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::ImportArgs;

pub struct AppState {
    pub db: peso_storage::DbPool,
    pub config: ImportConfig,
}

#[derive(Parser)]
#[command(name = "peso", version, about = "Import bank statement CSV files into your budget.")]
struct Cli {
    /// Configuration file (default: <data dir>/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Database file (default: <data dir>/peso.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the layout of a statement file and import its transactions.
    Import {
        /// Delimited text file exported by the bank
        file: PathBuf,
        /// Column mapping used when detection fails, e.g. --map date=Fecha
        #[arg(long = "map", value_name = "FIELD=HEADER")]
        map: Vec<String>,
        /// Remember the mapping for files with the same columns
        #[arg(long = "save-profile", value_name = "NAME")]
        save_profile: Option<String>,
        /// Show the preview without storing anything
        #[arg(long = "dry-run")]
        dry_run: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write the example template file.
    Template {
        /// Output path (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List saved bank profiles.
    Profiles {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Template { out } = &cli.command {
        return commands::write_template(out.as_deref());
    }

    let project_dirs = directories::ProjectDirs::from("com", "peso", "Peso")
        .context("Failed to get app directory")?;
    let data_dir = project_dirs.data_dir().to_path_buf();
    std::fs::create_dir_all(&data_dir).context("Failed to create data directory")?;

    let config_path = cli.config.unwrap_or_else(|| data_dir.join("config.toml"));
    let config = if config_path.exists() {
        ImportConfig::load(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?
    } else {
        ImportConfig::default()
    };

    let db_path = cli.db.unwrap_or_else(|| data_dir.join("peso.db"));
    let db = peso_storage::create_db(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    tracing::debug!(db = %db_path.display(), "database ready");

    let state = AppState { db, config };

    match cli.command {
        Commands::Import {
            file,
            map,
            save_profile,
            dry_run,
            json,
        } => {
            let args = ImportArgs {
                file,
                map,
                save_profile,
                dry_run,
            };
            let report = commands::import_file(&state, &args).await?;
            commands::print_report(&report, json)
        }
        Commands::Profiles { json } => commands::list_profiles(&state, json).await,
        Commands::Template { .. } => Ok(()),
    }
}
