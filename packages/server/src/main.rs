use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use common::storage::UploadStore;
use common::storage::filesystem::FilesystemUploadStore;
use tracing::{Level, info, warn};

use erp_server::config::AppConfig;
use erp_server::services::mail::{HttpMailer, LogMailer, Mailer};
use erp_server::services::vision::{DisabledVisionClient, HttpVisionClient, VisionClient};
use erp_server::state::AppState;
use erp_server::{build_router, database, seed};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = database::init_db(&config.database.url)
        .await
        .context("Failed to initialize database")?;
    seed::seed_bootstrap_admin(&db, config.auth.bootstrap_admin.as_ref()).await?;
    seed::ensure_indexes(&db).await?;

    let uploads: Arc<dyn UploadStore> = Arc::new(
        FilesystemUploadStore::new(
            config.storage.uploads_dir.clone(),
            config.storage.max_upload_size,
        )
        .await
        .context("Failed to open upload directory")?,
    );

    let mailer: Arc<dyn Mailer> = if config.mail.enabled {
        Arc::new(HttpMailer::new(&config.mail).context("Failed to build mail client")?)
    } else {
        info!("Mail relay disabled; notifications will only be logged");
        Arc::new(LogMailer)
    };

    let vision: Arc<dyn VisionClient> = if config.vision.enabled {
        Arc::new(HttpVisionClient::new(&config.vision).context("Failed to build vision client")?)
    } else {
        warn!("Vision model disabled; certificate validation uses neutral AI scores");
        Arc::new(DisabledVisionClient)
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let state = AppState {
        db,
        config,
        uploads,
        mailer,
        vision,
    };
    let app = build_router(state);

    info!("Server running at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down");
}
