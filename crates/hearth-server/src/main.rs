use anyhow::Result;
use std::net::SocketAddr;

use hearth_server::app;
use hearth_server::config::HearthConfig;
use hearth_server::logging;
use hearth_server::monitor::Monitor;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  hearth-server [config.toml]    Start the monitor (default: config/hearth.toml)");
    eprintln!();
    eprintln!("Environment overrides: HEARTH_HTTP_PORT, HEARTH_SAMPLE_INTERVAL_SECS,");
    eprintln!("  HEARTH_STORAGE_BACKEND, HEARTH_DATABASE_URL, HEARTH_SQLITE_PATH,");
    eprintln!("  HEARTH_WEBHOOK_URL, HEARTH_SMTP_PASSWORD, HEARTH_LOG_FORMAT");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config_path = match args.get(1).map(|s| s.as_str()) {
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(path) => path.to_string(),
        None => "config/hearth.toml".to_string(),
    };

    let config = HearthConfig::load_or_default(&config_path)?;
    logging::init(&config.logging)?;
    hearth_common::id::init(1, 1);

    run_server(config, &config_path).await
}

async fn run_server(config: HearthConfig, config_path: &str) -> Result<()> {
    tracing::info!(
        config = %config_path,
        http_port = config.server.http_port,
        backend = ?config.storage.backend,
        interval_secs = config.collector.interval_secs,
        "hearth-server starting"
    );

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.server.http_port).parse()?;

    let mut monitor = Monitor::initialize(config).await?;
    monitor.start()?;

    let app = app::build_http_app(monitor.state());
    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    tracing::info!(http = %http_addr, "Server started");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    if let Err(e) = served {
        tracing::error!(error = %e, "HTTP server error");
    }

    monitor.shutdown().await;
    tracing::info!("hearth-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received shutdown signal"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
