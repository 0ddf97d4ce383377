use std::sync::Arc;

use gembridge::api;
use gembridge::config::load_config;
use gembridge::observability::init_tracing;
use gembridge::state::AppState;

fn main() {
    let config = load_config("config.yaml").unwrap_or_else(|err| {
        eprintln!("Failed to load configuration: {err}");
        eprintln!("Fix 'config.yaml' or remove it to run with defaults.");
        std::process::exit(1);
    });

    init_tracing(&config.features.log_level);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .build()
        .unwrap_or_else(|err| {
            eprintln!("Failed to initialize Tokio runtime: {err}");
            std::process::exit(1);
        });

    runtime.block_on(async move {
        run(config).await;
    });
}

async fn run(config: gembridge::config::AppConfig) {
    let host = config.server.host.clone();
    let port = config.server.port;
    let state = Arc::new(AppState::new(config));

    tracing::info!("gembridge starting on {}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}"))
        .await
        .unwrap_or_else(|err| {
            eprintln!("Failed to bind to {host}:{port}: {err}");
            std::process::exit(1);
        });

    tracing::info!("gembridge is ready to accept connections");

    if let Err(err) = axum::serve(listener, api::router(state)).await {
        eprintln!("Server error: {err}");
        std::process::exit(1);
    }
}
