use std::{net::SocketAddr, sync::Arc};

use tokio::{
    io::AsyncWriteExt,
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    sync::{
        broadcast::{error::RecvError, Receiver},
        Mutex,
    },
};
use tracing::{debug, error, info, warn};

use crate::game::player::Player;
use crate::models::views::PlayerView;
use crate::tcp::header::HeaderType;
use crate::tcp::packet::Packet;
use crate::tcp::protocol::Protocol;
use crate::utils::checksum::CheckSum;
use crate::utils::errors::{PlayerConnectionError, ProtocolError};

/// A connection that has identified itself with CONNECT.
///
/// Responses and broadcast events share the write half, so every packet is
/// written while holding its lock.
pub struct Client {
    pub player: Player,
    pub addr: SocketAddr,
    pub protocol: Arc<Protocol>,
    write_stream: Mutex<OwnedWriteHalf>,
}

impl Client {
    pub fn new(
        write_stream: OwnedWriteHalf,
        addr: SocketAddr,
        player: Player,
        protocol: Arc<Protocol>,
    ) -> Self {
        Self {
            player,
            addr,
            protocol,
            write_stream: Mutex::new(write_stream),
        }
    }

    /// Handles the main lifecycle of a connected client.
    ///
    /// - Spawns a task forwarding `events` to the client.
    /// - Reads packets in a loop, verifies checksums and answers each request.
    ///
    /// Returns once the peer disconnects, sends DISCONNECT, or breaks framing.
    pub async fn connect(self: Arc<Self>, mut read_stream: OwnedReadHalf, events: Receiver<Packet>) {
        debug!("[CLIENT] Listening to `{}` ({})", self.addr, self.player.username);

        let forwarder = tokio::spawn({
            let client = Arc::clone(&self);
            async move { client.listen_to_events(events).await }
        });

        loop {
            let packet = match Packet::read_from(&mut read_stream, self.protocol.max_payload).await {
                Ok(packet) => packet,
                Err(ProtocolError::ConnectionClosed) => break,
                Err(error) => {
                    // Framing is lost after a bad header, so the connection cannot continue.
                    warn!("[CLIENT] Dropping `{}` ({error})", self.addr);
                    let packet = Packet::new(HeaderType::InvalidHeader, error.to_string().as_bytes());
                    let _ = self.send_packet(&packet).await;
                    break;
                }
            };

            if !CheckSum::check(packet.header.checksum, &packet.payload) {
                error!("[CLIENT] Invalid checksum from `{}`", self.addr);
                if self.send_packet(&Packet::new(HeaderType::InvalidChecksum, b"")).await.is_err() {
                    break;
                }
                continue;
            }

            if packet.header_type() == HeaderType::Disconnect {
                let _ = self.send_packet(&Packet::new(HeaderType::Disconnect, b"")).await;
                break;
            }

            let response = self.protocol.handle_packet(&self.player, &packet).await;
            if let Err(error) = self.send_packet(&response).await {
                error!("[CLIENT] Unable to write to `{}` ({error})", self.addr);
                break;
            }
        }

        forwarder.abort();
        self.protocol.handle_disconnect(&self.player).await;
        let _ = self.write_stream.lock().await.shutdown().await;
        info!("[CLIENT] Closed connection with `{}`", self.addr);
    }

    pub async fn send_packet(&self, packet: &Packet) -> Result<(), ProtocolError> {
        let mut stream = self.write_stream.lock().await;
        packet.write_to(&mut *stream).await?;
        debug!(
            "[CLIENT] Sent packet {{ type: {}, size: {} }} to `{}`",
            packet.header_type(),
            packet.header.payload_length,
            self.addr
        );
        Ok(())
    }

    /// Forwards broadcast packets until the client goes away.
    async fn listen_to_events(self: Arc<Self>, mut receiver: Receiver<Packet>) {
        loop {
            match receiver.recv().await {
                Ok(packet) => {
                    if self.send_packet(&packet).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("[CLIENT] `{}` missed {skipped} events", self.addr);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

/// A connection that has not sent CONNECT yet.
///
/// Only PING, CONNECT and DISCONNECT are answered; anything else gets
/// NOT_CONNECTED.
pub struct TemporaryClient {
    pub addr: SocketAddr,
    pub protocol: Arc<Protocol>,
    pub stream: TcpStream,
}

impl TemporaryClient {
    pub fn new(stream: TcpStream, addr: SocketAddr, protocol: Arc<Protocol>) -> Self {
        TemporaryClient {
            addr,
            stream,
            protocol,
        }
    }

    /// Waits for a valid CONNECT, then hands the stream to a `Client`.
    pub async fn handle_temp_client(mut self) {
        let addr = self.addr;
        debug!("[CLIENT] Waiting for `{addr}` to identify itself");

        loop {
            let packet = match Packet::read_from(&mut self.stream, self.protocol.max_payload).await {
                Ok(packet) => packet,
                Err(ProtocolError::ConnectionClosed) => return,
                Err(error) => {
                    warn!("[CLIENT] Invalid packet from `{addr}` ({error})");
                    let packet = Packet::new(HeaderType::InvalidHeader, error.to_string().as_bytes());
                    let _ = packet.write_to(&mut self.stream).await;
                    return;
                }
            };

            let response = if !CheckSum::check(packet.header.checksum, &packet.payload) {
                Packet::new(HeaderType::InvalidChecksum, b"")
            } else {
                match packet.header_type() {
                    HeaderType::Connect => {
                        let connection = self.protocol.handle_connect(&packet, addr).await;
                        match connection {
                            Ok(player) => return self.promote(player).await,
                            Err(error) => {
                                error!("[CLIENT] Could not connect `{addr}` ({error})");
                                rejection_packet(&error)
                            }
                        }
                    }
                    HeaderType::Ping => Packet::new(HeaderType::Ping, &packet.payload),
                    HeaderType::Disconnect => {
                        let _ = Packet::new(HeaderType::Disconnect, b"")
                            .write_to(&mut self.stream)
                            .await;
                        return;
                    }
                    _ => Packet::new(HeaderType::NotConnected, b""),
                }
            };

            if response.write_to(&mut self.stream).await.is_err() {
                return;
            }
        }
    }

    async fn promote(self, player: Player) {
        let (read, write) = self.stream.into_split();
        // Subscribe before CONNECTED goes out so no event sent afterwards is missed.
        let events = self.protocol.subscribe();
        let client = Arc::new(Client::new(write, self.addr, player, self.protocol));

        let connected = match Packet::with_body(HeaderType::Connected, &PlayerView::from(&client.player)) {
            Ok(packet) => packet,
            Err(error) => Packet::new(HeaderType::ERROR, error.to_string().as_bytes()),
        };

        if client.send_packet(&connected).await.is_err() {
            client.protocol.handle_disconnect(&client.player).await;
            return;
        }

        client.connect(read, events).await;
    }
}

fn rejection_packet(error: &PlayerConnectionError) -> Packet {
    let header_type = match error {
        PlayerConnectionError::AlreadyConnected(_) => HeaderType::AlreadyConnected,
        PlayerConnectionError::InvalidPlayerPayload(_) => HeaderType::InvalidPlayerData,
    };
    Packet::new(header_type, error.to_string().as_bytes())
}
