mod logs;
mod mpd;

use axum::Router;
use mpd::MpdPlayer;
use pmoconfig::get_config;
use pmoradiobrowser::api_rest::{create_artwork_router, create_router};
use pmoradiobrowser::RadioBrowserConfigExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

const DEFAULT_PLAYER_HOST: &str = "localhost";
const DEFAULT_PLAYER_PORT: u64 = 6600;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = get_config();
    logs::init_logging(&config);

    // ========== Lecteur ==========
    let player_host = config.get_string_or(&["player", "host"], DEFAULT_PLAYER_HOST);
    let player_port = u16::try_from(config.get_u64_or(&["player", "port"], DEFAULT_PLAYER_PORT))
        .unwrap_or(DEFAULT_PLAYER_PORT as u16);
    info!("🎛️ MPD player at {}:{}", player_host, player_port);
    let player = Arc::new(MpdPlayer::new(&player_host, player_port));

    // ========== Radio Browser ==========
    if !config.get_radiobrowser_enabled()? {
        warn!("⚠️ Radio Browser source is disabled, nothing to serve");
        return Ok(());
    }
    let service = Arc::new(config.create_radiobrowser(player)?);

    let app = Router::new()
        .nest("/api/radiobrowser", create_router(service.clone()))
        .merge(create_artwork_router(service));

    // ========== Serveur HTTP ==========
    let addr = SocketAddr::from(([0, 0, 0, 0], config.get_http_port()));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🌐 PMORadio listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = signal::ctrl_c().await {
                warn!("Cannot listen for Ctrl+C: {}", e);
            }
            info!("Shutting down...");
        })
        .await?;

    Ok(())
}
