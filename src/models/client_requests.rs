use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::card::CardKind;
use crate::game::game::{GameStatus, GameUpdate};

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct ConnectRequest {
    pub user_id: String,
    #[serde(default)]
    pub username: String,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct CreateGameRequest {
    pub room_name: Option<String>,
    pub description: Option<String>,
    pub max_players: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct ListGamesRequest {
    pub status: Option<GameStatus>,
}

/// Used by GET_GAME, COMPLETE_GAME and GET_CARDS.
#[derive(Serialize, Deserialize, Debug)]
pub struct GameRequest {
    pub game_id: Uuid,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UpdateGameRequest {
    pub game_id: Uuid,
    pub update: GameUpdate,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct GenerateCardRequest {
    pub game_id: Uuid,
    pub card: CardKind,
}

/// Row and column stay signed so out-of-range values reach validation
/// instead of failing to decode.
#[derive(Serialize, Deserialize, Debug)]
pub struct MarkCellRequest {
    pub card_id: Uuid,
    pub row: i32,
    pub col: i32,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MarkNumberRequest {
    pub card_id: Uuid,
    pub number: u8,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UpdateGoalsRequest {
    pub card_id: Uuid,
    pub goals: Vec<Vec<String>>,
}
