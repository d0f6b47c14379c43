use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing_subscriber::EnvFilter;

mod ai;
mod api;
mod app;
mod config;
mod db;
mod error;
mod models;
mod services;
#[cfg(test)]
mod testing;

use api::AppState;
use app::App;
use config::Config;
use services::Trigger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (info for this crate unless RUST_LOG says otherwise)
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok()))
        .with_writer(std::io::stderr)
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from);

    // Check for --replenish flag (headless single pass)
    let headless_replenish = args.iter().any(|a| a == "--replenish");

    let config = load_config(config_path.as_deref())?;

    let app = App::new(&config)
        .await
        .with_context(|| format!("failed to open article store at {}", config.db_path))?;
    app.prepare().await.context("startup maintenance failed")?;

    if headless_replenish {
        let report = app.replenisher.run().await.context("replenish pass failed")?;
        println!(
            "Needed {}, attempted {}, inserted {}, failed {}",
            report.needed, report.attempted, report.inserted, report.failed
        );
        return Ok(());
    }

    let (scheduler, worker) = app.start_scheduler();
    scheduler.trigger(Trigger::Startup);

    let router = api::build_router(AppState::new(&app, scheduler));
    let result = api::serve(router, &config.bind_addr)
        .await
        .with_context(|| format!("server on {} failed", config.bind_addr));

    worker.abort();
    result
}

const DEFAULT_LOG_FILTER: &str = "topic_buffer=info";

fn log_filter(rust_log: Option<String>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Config::load().context("failed to load config"),
    }
}
