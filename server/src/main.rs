//! Custody Server - equipment inventory, loans and returns with spreadsheet
//! sync.
//!
//! This server owns the record store and exposes it over HTTP and WebSocket.
//! When configured it also polls a spreadsheet endpoint, pushes local changes
//! back to it, and mirrors the collections to a REST document store.

use custody_engine::{Importer, RecordStore, StoreMode};
use custody_server::{
    app,
    cloud::{self, RestClient, RestMirror},
    config::Config,
    sheets::{self, OutboundHook, SheetClient, SyncController},
    storage::FileStorage,
    websocket::{ConnectionManager, LiveFeedHook},
    AppState,
};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "custody_server=debug,custody_engine=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Custody Server on {}:{}", config.host, config.port);

    let storage = FileStorage::open(&config.data_dir)?;
    tracing::info!(data_dir = %storage.dir().display(), "Using file storage");

    let conn_manager = ConnectionManager::new_shared();
    let (stop_tx, stop_rx) = watch::channel(false);

    // Cloud mirror, if configured
    let cloud_client = config
        .cloud_url
        .as_ref()
        .map(|url| RestClient::new(url.as_str(), config.request_timeout));
    let mode = match &cloud_client {
        Some(client) => {
            let (tx, rx) = mpsc::unbounded_channel();
            cloud::spawn_writer(client.clone(), rx);
            tracing::info!("Cloud mode enabled");
            StoreMode::Cloud(Box::new(RestMirror::new(tx)))
        }
        None => StoreMode::Local,
    };

    let mut store = RecordStore::open(Box::new(storage), mode);
    store.register_hook(Box::new(LiveFeedHook::new(conn_manager.clone())));

    // Spreadsheet client and outbound push
    let sheet_client = match &config.sheets_url {
        Some(url) => Some(SheetClient::new(sheets::default_transport(
            url,
            config.request_timeout,
        )?)),
        None => None,
    };
    if let (Some(client), true) = (&sheet_client, config.push_enabled) {
        let (tx, rx) = mpsc::unbounded_channel();
        store.register_hook(Box::new(OutboundHook::new(tx)));
        sheets::spawn_pusher(client.clone(), rx);
        tracing::info!("Outbound push to spreadsheet enabled");
    }

    let store = Arc::new(Mutex::new(store));

    let sync = sheet_client.map(|client| {
        SyncController::new(
            client,
            store.clone(),
            Importer::new(config.import_policy.clone()),
            conn_manager.clone(),
            config.sync_interval,
        )
    });
    if let (Some(controller), true) = (&sync, config.sheets_enabled) {
        controller.start();
    }

    if let Some(client) = cloud_client {
        cloud::spawn_snapshot_poller(
            client,
            store.clone(),
            conn_manager.clone(),
            config.cloud_poll_interval,
            stop_rx,
        );
    }

    let state = AppState {
        store,
        config: Arc::new(config.clone()),
        conn_manager,
        sync: sync.clone(),
    };

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(controller) = sync {
        controller.stop();
    }
    let _ = stop_tx.send(true);
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
