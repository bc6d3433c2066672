mod app_error;
mod cli;
mod config;
mod controllers;
mod features;
mod model;

use crate::cli::Cli;
use crate::config::config::Config;
use crate::controllers::router;
use crate::model::{Classifier, Model, ModelState};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    enable_logging(cli.verbose);
    let Some(config) = Config::from_path(&cli.config_path) else {
        return Ok(ExitCode::FAILURE);
    };

    // The listener is only bound once a model is in memory.
    let model_path = cli
        .model_path
        .unwrap_or_else(|| config.model_path().to_path_buf());
    let model = match Model::load(&model_path) {
        Ok(model) => model,
        Err(err) => {
            error!("{}", err);
            return Ok(ExitCode::FAILURE);
        }
    };
    info!(
        "Loaded {} model from {}",
        model.kind(),
        model_path.display()
    );
    let state: ModelState = Arc::new(model);

    let app = router(state).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_headers(Any)
            .allow_methods(Any),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(ExitCode::SUCCESS)
}

fn enable_logging(verbose: u8) {
    let log_level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutting down");
}
