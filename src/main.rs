//! Command line entry point: load a backend and ingest, show or run tasks.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use geolife_db::{
    config::Config,
    util::{logging, time::Benchmark},
    App, BackendKind,
};

#[derive(Parser)]
#[command(name = "geolife-db")]
#[command(about = "Load the Geolife GPS dataset into MySQL or MongoDB and query it", long_about = None)]
struct Cli {
    /// TOML configuration file, optional
    #[arg(short, long, default_value = "geolife.toml")]
    config: PathBuf,

    #[command(subcommand)]
    backend: Backend,
}

#[derive(Subcommand)]
enum Backend {
    /// Relational schema in MySQL
    Sql {
        #[command(subcommand)]
        action: Action,
    },
    /// Document schema in MongoDB
    Mongo {
        #[command(subcommand)]
        action: Action,
    },
}

#[derive(Subcommand)]
enum Action {
    /// Recreate the schema and load the dataset
    Ingest,
    /// Print the first rows of every table or collection
    Show,
    /// Run analytical tasks by id (e.g. 1 7a 6b2), or `all`
    Task {
        #[arg(required = true, value_name = "TASK")]
        tasks: Vec<String>,
    },
}

async fn run_action(app: &mut App, action: &Action) -> Result<()> {
    match action {
        Action::Ingest => {
            let summary = app.ingest().await.context("ingestion failed")?;
            println!(
                "Inserted {} users, {} activities, {} trackpoints ({} files skipped)",
                summary.users, summary.activities, summary.track_points, summary.skipped_files
            );
        }
        Action::Show => {
            for report in app.show().await.context("show failed")? {
                println!("{}", report);
            }
        }
        Action::Task { tasks } => {
            for report in app.run_tasks(tasks).await.context("task failed")? {
                println!("{}", report);
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _timer = Benchmark::start("geolife-db");

    let config = Config::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    logging::init(&config.logging);

    let (kind, action) = match &cli.backend {
        Backend::Sql { action } => (BackendKind::Sql, action),
        Backend::Mongo { action } => (BackendKind::Mongo, action),
    };

    let mut app = App::connect(config, kind)
        .await
        .context("connecting to the database")?;

    let outcome = run_action(&mut app, action).await;
    let closed = app.close().await;

    if let Err(e) = &outcome {
        tracing::error!("{:#}", e);
    }

    outcome?;
    closed.context("closing the database connection")?;
    Ok(())
}
