use std::{io::Error, net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::game::store::BingoStore;
use crate::models::settings::Settings;
use crate::tcp::client::TemporaryClient;
use crate::tcp::protocol::Protocol;

pub struct ServerInstance {
    pub socket: TcpListener,
    pub protocol: Arc<Protocol>,
}

impl ServerInstance {
    pub async fn create_instance(settings: &Settings, store: Arc<BingoStore>) -> Result<Self, Error> {
        let socket = TcpListener::bind((settings.host.as_str(), settings.port)).await?;

        Ok(ServerInstance {
            socket,
            protocol: Arc::new(Protocol::new(store, settings.max_payload)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        self.socket.local_addr()
    }

    /// Accepts connections forever, one task per connection.
    pub async fn run(self: Arc<Self>) {
        loop {
            match self.socket.accept().await {
                Ok((stream, addr)) => {
                    info!("[SERVER] Incoming connection from `{addr}`");
                    let client = TemporaryClient::new(stream, addr, Arc::clone(&self.protocol));
                    tokio::spawn(client.handle_temp_client());
                }
                Err(error) => warn!("[SERVER] Failed to accept connection ({error})"),
            }
        }
    }
}
