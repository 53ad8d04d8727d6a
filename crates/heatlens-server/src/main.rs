use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use heatlens_server::auth::api_keys::{generate_api_key, generate_key_id};
use heatlens_server::state::AppState;

/// `heatlens health` — liveness probe for container health checks.
///
/// Calls `GET http://localhost:$HEATLENS_PORT/health`.
/// Exits 0 if the server responds with HTTP 200, exits 1 otherwise.
async fn run_health_check() -> ! {
    let port = std::env::var("HEATLENS_PORT").unwrap_or_else(|_| "3000".to_string());
    let url = format!("http://localhost:{port}/health");
    match reqwest::get(&url).await {
        Ok(resp) if resp.status().is_success() => std::process::exit(0),
        _ => std::process::exit(1),
    }
}

fn open_backend(cfg: &heatlens_core::config::Config) -> Result<heatlens_duckdb::DuckDbBackend> {
    std::fs::create_dir_all(&cfg.data_dir)?;
    let db_path = format!("{}/heatlens.db", cfg.data_dir);
    heatlens_duckdb::DuckDbBackend::open(&db_path, &cfg.duckdb_memory_limit)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(String::as_str) == Some("health") {
        run_health_check().await;
    }

    // Structured JSON logging. Level controlled via RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("heatlens=info".parse()?),
        )
        .json()
        .init();

    let cfg = heatlens_core::config::Config::from_env().map_err(|e| anyhow::anyhow!(e))?;
    let db = open_backend(&cfg)?;

    // `heatlens create-key <account_id>` mints an API key and prints it once.
    if args.get(1).map(String::as_str) == Some("create-key") {
        let account_id = args
            .get(2)
            .ok_or_else(|| anyhow::anyhow!("usage: heatlens create-key <account_id>"))?;
        let (raw_key, hash, prefix) = generate_api_key();
        db.create_api_key(&generate_key_id(), account_id, &hash, &prefix)
            .await?;
        println!("{raw_key}");
        return Ok(());
    }

    let state = Arc::new(AppState::new(db, cfg.clone()));
    let addr = format!("0.0.0.0:{}", cfg.port);
    let app = heatlens_server::app::build_app(Arc::clone(&state));

    info!(port = cfg.port, "heatlens listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    info!("heatlens stopped");
    Ok(())
}
