mod api;
mod auth;
mod config;
mod dashboard;
mod db;
mod error;
mod models;
mod run;
mod service;
mod sync;

#[cfg(test)]
mod fixtures;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config = config::Config::from_env()?;
    tracing::debug!(?config, "configuration loaded");
    run::as_cli(&args, config)
}
