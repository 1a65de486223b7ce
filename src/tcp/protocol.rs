use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use serde::de::DeserializeOwned;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::game::player::Player;
use crate::game::store::{BingoStore, MarkOutcome};
use crate::models::client_requests::{
    CreateGameRequest, GameRequest, GenerateCardRequest, ListGamesRequest, MarkCellRequest,
    MarkNumberRequest, UpdateGameRequest, UpdateGoalsRequest,
};
use crate::models::views::{CardCompletedEvent, CardView, ErrorView, GameView};
use crate::tcp::header::HeaderType;
use crate::tcp::packet::Packet;
use crate::utils::errors::{PlayerConnectionError, ProtocolError, RequestError};

/// Completion events kept for slow subscribers before they start lagging.
const EVENT_CAPACITY: usize = 32;

/// Turns request packets into store operations and response packets.
///
/// Shared by every connection. Knows nothing about sockets: clients hand it
/// a decoded packet and write back whatever it returns.
pub struct Protocol {
    pub store: Arc<BingoStore>,
    pub max_payload: usize,
    transmitter: broadcast::Sender<Packet>,
    sessions: RwLock<HashMap<String, SocketAddr>>,
}

impl Protocol {
    pub fn new(store: Arc<BingoStore>, max_payload: usize) -> Self {
        let (transmitter, _) = broadcast::channel(EVENT_CAPACITY);
        Protocol {
            store,
            max_payload,
            transmitter,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Receiver for packets broadcast to every connected client.
    pub fn subscribe(&self) -> broadcast::Receiver<Packet> {
        self.transmitter.subscribe()
    }

    /// Binds a connection to the user named in a CONNECT payload.
    ///
    /// Authenticates nothing: the payload names the user, and a user may hold
    /// a single connection at a time.
    ///
    /// # Arguments
    ///
    /// * `packet` - The CONNECT packet carrying a CBOR `ConnectRequest`.
    /// * `addr` - The peer address, kept for the session table.
    ///
    /// # Returns
    ///
    /// * `Err(PlayerConnectionError::InvalidPlayerPayload)` if the payload is unusable.
    /// * `Err(PlayerConnectionError::AlreadyConnected)` if the user already has a session.
    pub async fn handle_connect(
        &self,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<Player, PlayerConnectionError> {
        let player = Player::new_connection(&packet.payload)?;
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&player.user_id) {
            return Err(PlayerConnectionError::AlreadyConnected(player.user_id));
        }

        sessions.insert(player.user_id.clone(), addr);
        info!("[PROTOCOL] `{addr}` connected as `{}`", player.username);
        Ok(player)
    }

    /// Frees the user's session so they may connect again.
    pub async fn handle_disconnect(&self, player: &Player) {
        self.sessions.write().await.remove(&player.user_id);
        info!("[PROTOCOL] `{}` disconnected", player.username);
    }

    /// Answers one request from a connected player.
    ///
    /// # Arguments
    ///
    /// * `player` - The identity bound to the connection by CONNECT.
    /// * `packet` - A packet whose checksum has already been verified.
    ///
    /// # Returns
    ///
    /// The response packet. Never fails:
    /// - store rejections become `REJECTED` with an `ErrorView`,
    /// - undecodable payloads become `INVALID_PACKET_PAYLOAD`,
    /// - responses too large for one frame become `ERROR`,
    /// - types a client may not send become `INVALID_HEADER`.
    pub async fn handle_packet(&self, player: &Player, packet: &Packet) -> Packet {
        let header_type = packet.header_type();
        debug!(
            "[PROTOCOL] `{}` sent {{ type: {header_type}, size: {} }}",
            player.username, packet.header.payload_length
        );

        let result = match header_type {
            HeaderType::Ping => Ok(Packet::new(HeaderType::Ping, &packet.payload)),
            HeaderType::Connect => Ok(Packet::new(HeaderType::AlreadyConnected, b"")),

            HeaderType::CreateGame => self.handle_create_game(player, packet).await,
            HeaderType::ListGames => self.handle_list_games(packet).await,
            HeaderType::GetGame => self.handle_get_game(packet).await,
            HeaderType::UpdateGame => self.handle_update_game(player, packet).await,
            HeaderType::CompleteGame => self.handle_complete_game(player, packet).await,

            HeaderType::GenerateCard => self.handle_generate_card(player, packet).await,
            HeaderType::GetCards => self.handle_get_cards(player, packet).await,
            HeaderType::MarkCell => self.handle_mark_cell(player, packet).await,
            HeaderType::MarkNumber => self.handle_mark_number(player, packet).await,
            HeaderType::UpdateGoals => self.handle_update_goals(player, packet).await,

            _ => {
                warn!("[PROTOCOL] `{}` sent unexpected {header_type}", player.username);
                Ok(Packet::new(HeaderType::InvalidHeader, b""))
            }
        };

        result.unwrap_or_else(|error| error_packet(player, error))
    }

    async fn handle_create_game(&self, player: &Player, packet: &Packet) -> Result<Packet, RequestError> {
        let request: CreateGameRequest = body_or_default(packet)?;
        let game = self
            .store
            .create_game(
                &player.user_id,
                request.room_name,
                request.description,
                request.max_players,
            )
            .await?;

        Ok(Packet::with_body(HeaderType::Game, &GameView::from(game))?)
    }

    async fn handle_list_games(&self, packet: &Packet) -> Result<Packet, RequestError> {
        let request: ListGamesRequest = body_or_default(packet)?;
        let games: Vec<GameView> = self
            .store
            .list_games(request.status)
            .await
            .into_iter()
            .map(GameView::from)
            .collect();

        Ok(Packet::with_body(HeaderType::GameList, &games)?)
    }

    async fn handle_get_game(&self, packet: &Packet) -> Result<Packet, RequestError> {
        let request: GameRequest = packet.body()?;
        let game = self.store.get_game(request.game_id).await?;
        Ok(Packet::with_body(HeaderType::Game, &GameView::from(game))?)
    }

    async fn handle_update_game(&self, player: &Player, packet: &Packet) -> Result<Packet, RequestError> {
        let request: UpdateGameRequest = packet.body()?;
        let game = self
            .store
            .update_game(request.game_id, &player.user_id, request.update)
            .await?;
        Ok(Packet::with_body(HeaderType::Game, &GameView::from(game))?)
    }

    async fn handle_complete_game(&self, player: &Player, packet: &Packet) -> Result<Packet, RequestError> {
        let request: GameRequest = packet.body()?;
        let game = self
            .store
            .complete_game(request.game_id, &player.user_id)
            .await?;
        Ok(Packet::with_body(HeaderType::Game, &GameView::from(game))?)
    }

    async fn handle_generate_card(&self, player: &Player, packet: &Packet) -> Result<Packet, RequestError> {
        let request: GenerateCardRequest = packet.body()?;
        let card = self
            .store
            .generate_card(request.game_id, &player.user_id, request.card)
            .await?;
        Ok(Packet::with_body(HeaderType::Card, &CardView::from(card))?)
    }

    async fn handle_get_cards(&self, player: &Player, packet: &Packet) -> Result<Packet, RequestError> {
        let request: GameRequest = packet.body()?;
        let cards: Vec<CardView> = self
            .store
            .cards_for(request.game_id, &player.user_id)
            .await
            .into_iter()
            .map(CardView::from)
            .collect();
        Ok(Packet::with_body(HeaderType::CardList, &cards)?)
    }

    async fn handle_mark_cell(&self, player: &Player, packet: &Packet) -> Result<Packet, RequestError> {
        let request: MarkCellRequest = packet.body()?;
        let outcome = self
            .store
            .mark_cell(request.card_id, &player.user_id, request.row, request.col)
            .await?;
        self.card_marked(player, outcome)
    }

    async fn handle_mark_number(&self, player: &Player, packet: &Packet) -> Result<Packet, RequestError> {
        let request: MarkNumberRequest = packet.body()?;
        let outcome = self
            .store
            .mark_number(request.card_id, &player.user_id, request.number)
            .await?;
        self.card_marked(player, outcome)
    }

    async fn handle_update_goals(&self, player: &Player, packet: &Packet) -> Result<Packet, RequestError> {
        let request: UpdateGoalsRequest = packet.body()?;
        let card = self
            .store
            .update_goals(request.card_id, &player.user_id, request.goals)
            .await?;
        Ok(Packet::with_body(HeaderType::Card, &CardView::from(card))?)
    }

    /// Builds the CARD response and, on a first win, broadcasts CARD_COMPLETED.
    fn card_marked(&self, player: &Player, outcome: MarkOutcome) -> Result<Packet, RequestError> {
        let view = CardView::from(outcome.card);

        if outcome.newly_completed {
            let event = CardCompletedEvent {
                username: player.username.clone(),
                card: view.clone(),
            };
            // The mark is already committed, so a failed event must not fail the response.
            match Packet::with_body(HeaderType::CardCompleted, &event) {
                Ok(event_packet) => {
                    // No subscribers just means nobody is listening.
                    let listeners = self.transmitter.send(event_packet).unwrap_or(0);
                    info!(
                        "[PROTOCOL] BINGO for `{}` on card `{}`, notified {listeners} clients",
                        player.username, view.id
                    );
                }
                Err(error) => warn!("[PROTOCOL] Could not announce card `{}` ({error})", view.id),
            }
        }

        Ok(Packet::with_body(HeaderType::Card, &view)?)
    }
}

/// Some requests carry only optional fields; an empty payload means "all defaults".
fn body_or_default<T: DeserializeOwned + Default>(packet: &Packet) -> Result<T, ProtocolError> {
    if packet.payload.is_empty() {
        return Ok(T::default());
    }
    packet.body()
}

fn error_packet(player: &Player, error: RequestError) -> Packet {
    match error {
        RequestError::Rejected(rejection) => {
            debug!("[PROTOCOL] Rejected request from `{}` ({rejection})", player.username);
            Packet::with_body(HeaderType::Rejected, &ErrorView::from(&rejection))
                .unwrap_or_else(|e| Packet::new(HeaderType::ERROR, e.to_string().as_bytes()))
        }
        RequestError::Protocol(ProtocolError::InvalidPayloadError(message)) => {
            warn!("[PROTOCOL] Could not parse payload from `{}` ({message})", player.username);
            Packet::new(HeaderType::InvalidPacketPayload, message.as_bytes())
        }
        RequestError::Protocol(other) => {
            warn!("[PROTOCOL] Could not answer `{}` ({other})", player.username);
            Packet::new(HeaderType::ERROR, other.to_string().as_bytes())
        }
    }
}
