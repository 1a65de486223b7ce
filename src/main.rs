use std::{error::Error, path::Path, sync::Arc};

use tokio::signal;
use tracing::{error, info, warn};

use game::store::BingoStore;
use models::settings::Settings;
use tcp::server::ServerInstance;

mod game;
mod models;
mod tcp;
mod utils;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    utils::logger::init();

    let settings = Settings::load()?;
    let store = Arc::new(BingoStore::new(&settings));

    if let Some(path) = settings.snapshot_path.as_deref().map(Path::new) {
        if path.exists() {
            store.load_snapshot(path).await?;
        } else {
            info!("[STORE] No snapshot at `{}`, starting empty", path.display());
        }
    }

    let server = Arc::new(ServerInstance::create_instance(&settings, Arc::clone(&store)).await?);
    info!("[SERVER] Listening on {}", server.local_addr()?);

    tokio::select! {
        _ = server.run() => {},
        _ = shutdown_signal() => {},
    }

    if let Some(path) = settings.snapshot_path.as_deref().map(Path::new) {
        if let Err(error) = store.save_snapshot(path).await {
            error!("[STORE] Could not save snapshot ({error})");
        }
    }

    info!("[SERVER] Shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("[SERVER] Received Ctrl+C, shutting down"),
            Err(error) => {
                warn!("[SERVER] Ctrl+C handler unavailable ({error})");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("[SERVER] Received terminate signal, shutting down");
            }
            Err(error) => {
                warn!("[SERVER] Terminate handler unavailable ({error})");
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
}
