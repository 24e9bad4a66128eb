use skillloop_server::{server, storage};
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

    if let Some(cmd) = args.command {
        match cmd {
            cli::Command::Migrate { db_path } => {
                let path = db_path
                    .map(|p| p.to_string_lossy().into_owned())
                    .or_else(|| std::env::var("DB_PATH").ok())
                    .unwrap_or_else(|| "data/app.db".into());
                ensure_parent_dir(&path);
                match storage::migrate_sqlite(&path) {
                    Ok(n) => tracing::info!(path=%path, applied=n, "migrations complete"),
                    Err(e) => {
                        tracing::error!(error=%e, path=%path, "migration failed");
                        std::process::exit(3);
                    }
                }
                return;
            }
            cli::Command::CheckConfig { config_path } => {
                let res = match config_path {
                    Some(p) => server::AppConfig::load_from_path(p),
                    None => server::AppConfig::load(),
                };
                match res {
                    Ok(c) => tracing::info!(app=%c.app_name, "config ok"),
                    Err(e) => {
                        tracing::error!(error=%e, "config invalid");
                        std::process::exit(2);
                    }
                }
                return;
            }
        }
    }

    let config = match server::AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error=%e, "Failed to load config");
            std::process::exit(2);
        }
    };
    if config.debug {
        tracing::warn!("debug mode enabled");
    }

    let db_path = config.resolved_db_path();
    ensure_parent_dir(&db_path);
    let store = match storage::Store::connect_sqlite(&db_path).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error=%e, path=%db_path, "Failed to connect DB");
            std::process::exit(3);
        }
    };

    let verifier = match server::auth::verifier_from_config(&config.auth) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error=%e, "Failed to set up token verification");
            std::process::exit(4);
        }
    };

    let port = config.resolved_port();
    let app_name = config.app_name.clone();
    let state = server::AppState::new(config, store, verifier);
    let shutdown_token = state.shutdown_token();
    let shutdown_token_for_server = shutdown_token.clone();

    let app = server::router(state);

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    tracing::info!(%addr, app=%app_name, "Starting server");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error=%e, %addr, "Failed to bind listener");
            std::process::exit(5);
        }
    };

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

fn ensure_parent_dir(db_path: &str) {
    if let Err(e) = storage::ensure_parent_dir(db_path) {
        tracing::warn!(error=%e, path=%db_path, "could not create database directory");
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
