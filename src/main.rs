//! # Datatake Completeness CLI (`dtc`)
//!
//! The `dtc` binary initializes the database, consumes the event inbox and
//! reports or recomputes datatake completeness.
//!
//! ## Usage
//!
//! ```bash
//! dtc --config ./config/dtc.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dtc init` | Create the SQLite database and run schema migrations |
//! | `dtc ingest` | Consume product and datatake events from the inbox |
//! | `dtc recompute <mission> <unit> <datatake> <type>` | Recompute one key and its cascade |
//! | `dtc status <unit> <datatake>` | Print a datatake's completeness records |
//! | `dtc refresh-tiles <unit> <datatake>` | Re-resolve an S2 datatake's tile count |
//! | `dtc masks` | List geo masks, or a footprint's coverage of each |
//!
//! Logging goes to stderr. `RUST_LOG` overrides `[logging].filter`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use datatake_completeness::core::models::Mission;
use datatake_completeness::{config, ingest, masks, migrate, recompute, status};

/// Datatake completeness consolidation.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/dtc.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "dtc",
    about = "Completeness consolidation for satellite datatakes",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/dtc.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Ingest events from the inbox.
    ///
    /// Stores products and datatakes and recomputes every affected key.
    /// Supports incremental runs via a checkpoint.
    Ingest {
        /// Ignore the checkpoint and replay every inbox file.
        #[arg(long)]
        full: bool,

        /// Show event counts without writing to the database.
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of events to process.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Recompute one compute key and everything it cascades to.
    Recompute {
        /// Mission code: S1, S2, S3 or S5.
        mission: Mission,
        satellite_unit: String,
        datatake_id: String,
        product_type: String,

        /// Key qualifier (S3 timeliness).
        #[arg(long)]
        qualifier: Option<String>,
    },

    /// Show the completeness records of a datatake.
    Status {
        satellite_unit: String,
        datatake_id: String,
    },

    /// Drop and re-resolve the expected tile count of an S2 datatake.
    RefreshTiles {
        satellite_unit: String,
        datatake_id: String,
    },

    /// List configured geo masks.
    Masks {
        /// GeoJSON footprint to intersect with every mask.
        #[arg(long)]
        footprint: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.filter)),
        )
        .init();

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            full,
            dry_run,
            limit,
        } => {
            ingest::run_ingest(&cfg, full, dry_run, limit).await?;
        }
        Commands::Recompute {
            mission,
            satellite_unit,
            datatake_id,
            product_type,
            qualifier,
        } => {
            recompute::run_recompute(
                &cfg,
                mission,
                &satellite_unit,
                &datatake_id,
                &product_type,
                qualifier.as_deref(),
            )
            .await?;
        }
        Commands::Status {
            satellite_unit,
            datatake_id,
        } => {
            status::run_status(&cfg, &satellite_unit, &datatake_id).await?;
        }
        Commands::RefreshTiles {
            satellite_unit,
            datatake_id,
        } => {
            recompute::run_refresh_tiles(&cfg, &satellite_unit, &datatake_id).await?;
        }
        Commands::Masks { footprint } => {
            masks::run_masks(&cfg.masks, footprint.as_deref())?;
        }
    }

    Ok(())
}
