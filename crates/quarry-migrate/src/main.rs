//! quarry-migrate CLI
//!
//! Compiles a JSON-serialized migration set and prints the result.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use quarry_migrate::prelude::*;

/// Compile schema migrations into SQLite DDL.
#[derive(Parser)]
#[command(name = "quarry-migrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file holding the migration set.
    #[arg(short, long, env = "QUARRY_MIGRATION_SET")]
    input: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every compiled statement.
    Sql,

    /// Show the sorted migrations and the statements each one produces.
    Plan,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let set = load_migration_set(&cli.input)?;
    let compiler = MigrationCompiler::new(JsonSchemaSerializer::new());

    match cli.command {
        Commands::Sql => {
            for statement in compiler.compile(&set)? {
                println!("{};", statement.sql);
            }
        }

        Commands::Plan => {
            let plan = compiler.plan(&set)?;
            println!("\nMigration plan (db version {}):", set.db_version());
            println!("{:-<60}", "");
            for step in &plan {
                if step.skipped {
                    println!(" [-] {} (covered by CREATE TABLE)", step.migration);
                } else {
                    println!(" [X] {} ({} statements)", step.migration, step.statements.len());
                }
            }
            println!();
            let skipped = plan.iter().filter(|s| s.skipped).count();
            info!(migrations = plan.len(), skipped, "plan complete");
        }
    }

    Ok(())
}
