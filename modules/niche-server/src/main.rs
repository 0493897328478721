use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use apify_client::ApifyClient;
use clap::{Parser, Subcommand};
use sheets_client::SheetsClient;
use tracing_subscriber::EnvFilter;

use niche_engine::{
    load_config, AppConfig, ApifyJobProvider, EngineSettings, FileConfig, RunEngine,
};
use niche_server::routes::{self, AppState};
use niche_server::runner;

#[derive(Parser)]
#[command(name = "niche-server", about = "Row-by-row niche scrape runner")]
struct Cli {
    /// Path to config TOML file
    #[arg(long, global = true, default_value = "./config/niche-runner.toml")]
    config: PathBuf,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP run-control API (default)
    Serve,
    /// Run one spec to completion from the command line
    Run {
        /// Path to a run spec TOML file
        #[arg(long)]
        spec: PathBuf,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let file_config = if path.exists() {
        tracing::info!(config = %path.display(), "Loading config");
        load_config(path)?
    } else {
        tracing::warn!(config = %path.display(), "Config file not found, using defaults");
        FileConfig::default()
    };
    file_config.validate()?;
    Ok(file_config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let config = AppConfig::from_env();
    let file_config = load_file_config(&cli.config)?;

    let sheets = Arc::new(SheetsClient::new(config.google_access_token.clone()));
    let jobs = Arc::new(ApifyJobProvider::new(ApifyClient::new(), &file_config.provider));
    let engine = Arc::new(RunEngine::new(
        jobs,
        sheets.clone(),
        EngineSettings::from_config(&config, &file_config),
    ));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let app = routes::build_router(
                AppState { engine, sheets },
                &file_config.server.allowed_origins,
            );
            let addr = format!("{}:{}", file_config.server.host, file_config.server.port);
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {addr}"))?;
            tracing::info!(addr = addr.as_str(), "Starting niche-server");
            axum::serve(listener, app).await?;
        }
        Command::Run { spec } => {
            let spec = runner::load_run_spec(&spec)?;
            let summary = runner::run_to_completion(engine, spec).await?;
            println!("{}", runner::summary_line(&summary));
        }
    }

    Ok(())
}
