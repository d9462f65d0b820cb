use bucket_bloom_rs::api::create_router;
use bucket_bloom_rs::{AppState, FilterStore, RedbSnapshotStore, ServerConfig};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    // load configuration from environment variables
    let config = ServerConfig::from_env()?;
    let filter_config = config.filter_config();

    let snapshots = config
        .snapshot_path
        .as_ref()
        .map(RedbSnapshotStore::open)
        .transpose()?;

    let store = match &snapshots {
        Some(snapshots) => snapshots.load(filter_config.clone())?,
        None => FilterStore::new(filter_config.clone())?,
    };

    let state = Arc::new(AppState { store, snapshots });
    let app = create_router(state.clone());

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        r#"
    🦀 Bucket Bloom Filter Server Starting! 🚀

    📊 Filter Configuration:
       • Table size: {:>14} slots
       • Hash: {:>18?} (a={}, b={})
       • Memory per key: {:>10.2} KB
       • Snapshot path: {:>14}

    🌐 Server Information:
       • Listening on:  http://{}
       • Swagger UI:    http://{}/swagger-ui/
       • Health Check:  http://{}/health
    "#,
        filter_config.table_size,
        filter_config.hash_kind,
        filter_config.hash_a,
        filter_config.hash_b,
        filter_config.table_size as f64 / 1024.0,
        config.snapshot_path.as_deref().unwrap_or("-"),
        addr,
        addr,
        addr,
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(snapshots) = &state.snapshots {
        match snapshots.save(&state.store) {
            Ok(filters) => info!(filters, "snapshot written on shutdown"),
            Err(e) => error!("failed to write snapshot on shutdown: {e}"),
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
    }
    info!("shutting down");
}
