//! tsql-migrate CLI
//!
//! Command-line tool for inspecting the T-SQL generated from model files.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use tsql_core::{SelectQuery, StatementBuilder, Where};
use tsql_migrate::prelude::*;

/// Schema synchronization for SQL Server.
#[derive(Parser)]
#[command(name = "tsql-migrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file with adapter settings and model declarations.
    #[arg(short, long, env = "TSQL_MODELS", default_value = "models.json")]
    models: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the DDL creating every table and index.
    Ddl {
        /// Print DROP statements before each table.
        #[arg(long)]
        rebuild: bool,
    },

    /// Print the DDL converging a recorded schema snapshot to the models.
    Diff {
        /// JSON snapshot of the live schema, keyed by table name.
        #[arg(short, long, env = "TSQL_SNAPSHOT")]
        snapshot: PathBuf,
    },

    /// Print a compiled SELECT and its parameters.
    Compile {
        /// Model name.
        #[arg(long)]
        model: String,

        /// Filter as JSON, e.g. '{"name":{"inq":["John Lennon"]}}'.
        #[arg(short, long = "where")]
        filter: Option<String>,

        /// Comma-separated ORDER BY terms.
        #[arg(short, long)]
        order: Option<String>,

        /// Rows to skip.
        #[arg(long)]
        skip: Option<u64>,

        /// Maximum rows to return.
        #[arg(long)]
        limit: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let registry = SchemaFile::load(&cli.models)?.into_registry()?;
    info!(path = %cli.models.display(), models = registry.models().count(), "Loaded models");

    match cli.command {
        Commands::Ddl { rebuild } => {
            let ddl = MssqlDdl::new(registry.settings().clone());
            for model in registry.models() {
                println!("-- {}", model.name);
                if rebuild {
                    println!("{}", ddl.drop_table_sql(model));
                }
                println!("{}\n", ddl.create_table_sql(model));
            }
        }

        Commands::Diff { snapshot } => {
            let introspector = SnapshotIntrospector::load(&snapshot)?;
            let executor = DryRunExecutor::new();
            let sync = SchemaSynchronizer::new(&registry, &executor, introspector);
            let report = sync.synchronize(SyncMode::Check).await?;

            for model in &report.models {
                for mismatch in &model.mismatches {
                    warn!(model = %model.model, "{}", mismatch.message);
                }
                if !model.changes_needed() {
                    continue;
                }
                println!("-- {} ({:?})", model.model, model.action);
                for change in &model.changes {
                    println!("--   {}", change.describe());
                }
                for sql in &model.statements {
                    println!("{sql}\n");
                }
            }
            if report.is_actual() {
                info!("Schema is up to date.");
            }
        }

        Commands::Compile {
            model,
            filter,
            order,
            skip,
            limit,
        } => {
            let mut query = SelectQuery::new();
            if let Some(filter) = filter {
                let model_def = registry.model(&model)?;
                query = query.filter(Where::from_json_for(model_def, serde_json::from_str(&filter)?)?);
            }
            if let Some(order) = order {
                query = query.order(&order);
            }
            if let Some(skip) = skip {
                query = query.skip(skip);
            }
            if let Some(limit) = limit {
                query = query.limit(limit);
            }

            let stmt = StatementBuilder::new(&registry).select(&model, &query)?;
            println!("{}", stmt.sql);
            for param in &stmt.params {
                println!("-- @{} = {}", param.name, param.value.to_json());
            }
        }
    }

    Ok(())
}
