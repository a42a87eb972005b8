mod cli;
mod cloud;
mod config;
mod db;
mod errors;
mod handlers;
mod ml;
mod models;
mod output;
mod period;
mod services;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};
use crate::cloud::azure::{AzureCostClient, AzureCredential};
use crate::config::AppConfig;
use crate::handlers::AppState;
use crate::services::CostService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(matches!(cli.command, Commands::Serve { .. }));

    let mut config = AppConfig::load(cli.config.as_deref())?;
    let pool = db::open(std::path::Path::new(&config.storage.path)).await?;
    cli::apply_store_overrides(&mut config, &pool).await?;
    tracing::debug!(storage = %config.storage.path, "configuration loaded");

    let format = cli.output;
    let rendered = match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            return serve(config, pool).await;
        }
        Commands::Config(cmd) => cli::run_config(cmd, &config, &pool, format).await?,
        Commands::Cloud(cmd) => cli::run_cloud(cmd, &config, format)?,
        Commands::Cost(cmd) => {
            let service = build_service(&config, pool)?;
            cli::run_cost(cmd, &service, format).await?
        }
    };

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(rendered.as_bytes())?;
    if !rendered.ends_with('\n') {
        writeln!(stdout)?;
    }
    Ok(())
}

/// CLI commands log compact lines to stderr so stdout stays parseable; the server logs JSON.
fn init_tracing(server: bool) {
    let default_filter = if server {
        "costwatch=info,tower_http=info"
    } else {
        "costwatch=warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    let registry = tracing_subscriber::registry().with(filter);

    if server {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

fn build_service(config: &AppConfig, pool: SqlitePool) -> anyhow::Result<CostService> {
    let credential = AzureCredential::from_config(&config.azure, &config.http)?;
    let client = AzureCostClient::new(
        config.azure.subscription_id.clone(),
        config.azure.management_url.clone(),
        Arc::new(credential),
        Duration::from_secs(config.http.timeout_secs),
    )?;
    Ok(CostService::new(pool, Arc::new(client), config.trend.clone()))
}

async fn serve(config: AppConfig, pool: SqlitePool) -> anyhow::Result<()> {
    let service = Arc::new(build_service(&config, pool.clone())?);
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let state = AppState {
        service,
        pool,
        config: Arc::new(config),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = handlers::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!("Starting costwatch server on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
