//! EcoTrack CLI - emissions records server and CSV importer
//!
//! ```bash
//! ecotrack serve                         # Start HTTP server (port 7001)
//! ecotrack import emissions.csv          # Reconcile a CSV into the database
//! ecotrack list --search steel           # Print stored records as JSON
//! ecotrack init-db                       # Create the database schema
//! ```
//!
//! Defaults come from the environment (see `ECOTRACK_*` in `.env`); flags win.

use clap::{Parser, Subcommand};
use ecotrack::{import_file, start_server, Config, Database, ImportError, RecordQuery};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ecotrack")]
#[command(about = "Emissions records API and CSV import reconciliation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Import a CSV file into the database
    Import {
        /// Input CSV file
        input: PathBuf,

        /// SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Print stored records as JSON
    List {
        /// Terms matched against company or sector
        #[arg(short, long)]
        search: Option<String>,

        /// e.g. "-year,co2_emissions_tons"
        #[arg(short, long)]
        ordering: Option<String>,

        /// SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Create the database and its schema
    InitDb {
        /// SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { port, db } => {
            let mut config = with_db(config, db);
            if let Some(port) = port {
                config = config.with_port(port);
            }
            start_server(config).await
        }
        Commands::Import { input, db } => cmd_import(&with_db(config, db), &input),
        Commands::List {
            search,
            ordering,
            db,
        } => cmd_list(&with_db(config, db), RecordQuery { search, ordering }),
        Commands::InitDb { db } => cmd_init_db(&with_db(config, db)),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn with_db(config: Config, db: Option<PathBuf>) -> Config {
    match db {
        Some(path) => config.with_db_path(path),
        None => config,
    }
}

fn cmd_import(config: &Config, input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Importing: {}", input.display());

    let db = Database::open(&config.db_path)?;
    let outcome = match import_file(&db, input) {
        Ok(outcome) => outcome,
        Err(ImportError::NoValidRows { errors }) => {
            for message in &errors {
                eprintln!("   ⚠️  {}", message);
            }
            return Err(ImportError::NoValidRows { errors }.into());
        }
        Err(e) => return Err(e.into()),
    };

    eprintln!("   Created:   {}", outcome.created);
    eprintln!("   Updated:   {}", outcome.updated);
    eprintln!("   Unchanged: {}", outcome.unchanged);
    for message in &outcome.errors {
        eprintln!("   ⚠️  {}", message);
    }
    eprintln!("\n✨ {}", outcome.message());
    Ok(())
}

fn cmd_list(config: &Config, query: RecordQuery) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(&config.db_path)?;
    let records = db.list(&query)?;
    eprintln!("📋 {} records", records.len());
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

fn cmd_init_db(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(&config.db_path)?;
    eprintln!(
        "✅ Database ready at {} ({} records)",
        config.db_path.display(),
        db.count()?
    );
    Ok(())
}
