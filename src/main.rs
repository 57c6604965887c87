use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

mod config;
mod dashboard;
mod data;
mod db;
mod metrics;
mod pipeline;

use config::{Config, DataSourceKind};
use dashboard::AppState;
use data::{CachedProvider, DataSource, LocalDataProvider, RemoteDataProvider};
use db::models::RunRecord;
use db::Database;
use pipeline::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let weights = config.event_weights()?;
    info!(
        "Window {:.0}s, {} weighted event categories (total weight {:.3})",
        config.window_secs(),
        weights.iter().count(),
        weights.total()
    );

    // Open database
    let db = Database::open(&config.database_path)
        .with_context(|| format!("opening database {}", config.database_path))?;
    info!("Database opened: {}", config.database_path);

    let source: Arc<dyn DataSource> = match config.data_source {
        DataSourceKind::Local => Arc::new(CachedProvider::new(LocalDataProvider::new(
            config.data_dir.clone(),
            config.max_frames(),
        ))),
        DataSourceKind::Remote => Arc::new(CachedProvider::new(RemoteDataProvider::new(
            config.data_base_url.as_deref(),
            Duration::from_secs(config.request_timeout_secs),
            config.max_frames(),
        )?)),
    };

    let started_at = Utc::now();
    let (corpus, failures) = data::load_corpus(
        Arc::clone(&source),
        &config.match_ids,
        !config.skip_tracking,
        config.fetch_concurrency,
    )
    .await
    .context("loading match corpus")?;
    if corpus.is_empty() {
        anyhow::bail!("no matches could be loaded ({} failed)", failures.len());
    }
    for f in &failures {
        warn!("Skipped match {}: {}", f.match_id, f.reason);
    }

    // Metric evaluation is CPU-bound; keep it off the async workers
    let orchestrator = Orchestrator::new(weights, config.window_secs());
    let report = tokio::task::spawn_blocking(move || orchestrator.run(&corpus)).await?;
    report.summary.log();

    let run = RunRecord {
        id: None,
        started_at,
        finished_at: Utc::now(),
        data_source: source.name().to_string(),
        window_secs: report.window_secs,
        matches: report.matches as i64,
        failed_matches: failures.len() as i64,
        events: report.results.len() as i64,
        players_with_baseline: report.players_with_baseline as i64,
    };
    let run_id = db.insert_run(&run)?;
    let saved = db.insert_results(run_id, &report.results)?;
    info!("Run {} saved: {} result(s)", run_id, saved);

    if let Some(path) = &config.csv_output {
        db::export::write_csv(path, &report.results)?;
        info!("Results written to {}", path.display());
    }

    if config.serve {
        let app = dashboard::router(AppState {
            db: db.clone(),
            window_secs: report.window_secs,
        });
        let addr: SocketAddr = config.dashboard_addr.parse()?;
        info!("Dashboard listening on http://{}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
    }

    Ok(())
}
