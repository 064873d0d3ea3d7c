use archer_health_server::{server, storage};
mod cli;

use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    use clap::Parser;
    let args = cli::Cli::parse();

    // Console-only logging with env-driven level
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_ansi(true)
        .init();

    let config = match args.config {
        Some(path) => server::AppConfig::load_from_path(path),
        None => server::AppConfig::load(),
    };
    let config = match config {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error=%e, "Failed to load config");
            std::process::exit(2);
        }
    };

    // Connect storage (SQLite via Diesel)
    let db_path = std::env::var("DB_PATH").unwrap_or_else(|_| "data/archer-health.db".into());
    // Ensure data dir exists when using default
    if let Some(parent) = std::path::Path::new(&db_path).parent()
        && !parent.as_os_str().is_empty()
    {
        let _ = std::fs::create_dir_all(parent);
    }
    let store = match storage::Store::connect_sqlite(&db_path).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error=%e, path=%db_path, "Failed to connect DB");
            std::process::exit(3);
        }
    };

    // Decide listen port: --port overrides PORT, which overrides config
    let port = args
        .port
        .or_else(|| std::env::var("PORT").ok().and_then(|s| s.parse::<u16>().ok()))
        .or(config.listen_port)
        .unwrap_or(5150);

    let state = server::AppState::new(config, store);
    let shutdown_token = state.shutdown_token();
    let shutdown_token_for_server = shutdown_token.clone();

    let app = server::router(state);

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind listener");

    // Graceful shutdown on SIGINT/SIGTERM with fallback timeout to force-close stuck connections
    let mut server_task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_token_for_server.cancelled_owned())
            .await
    });

    // Wait for OS signal; then trigger graceful, and if it hangs beyond timeout, force abort.
    shutdown_signal().await;
    tracing::info!("shutdown: initiating graceful stop");
    shutdown_token.cancel();
    match tokio::time::timeout(std::time::Duration::from_secs(3), &mut server_task).await {
        Ok(join_res) => match join_res {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::error!(%err, "server error"),
            Err(e) => tracing::error!(error=%e, "server task join error"),
        },
        Err(_) => {
            tracing::warn!("shutdown: forcing server abort due to timeout");
            server_task.abort();
        }
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigint = signal(SignalKind::interrupt()).expect("listen SIGINT");
        let mut sigterm = signal(SignalKind::terminate()).expect("listen SIGTERM");
        tokio::select! {
            _ = sigint.recv() => {
                tracing::info!("shutdown: received SIGINT");
            }
            _ = sigterm.recv() => {
                tracing::info!("shutdown: received SIGTERM");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown: received Ctrl+C");
    }
}
