use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::card::{Card, CardContent, Grid};
use crate::game::completion::{completed_lines, Cell, Line};
use crate::game::game::{Game, GameStatus};
use crate::game::player::Player;
use crate::utils::errors::BingoError;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlayerView {
    pub user_id: String,
    pub username: String,
}

impl From<&Player> for PlayerView {
    fn from(player: &Player) -> Self {
        Self {
            user_id: player.user_id.clone(),
            username: player.username.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GameView {
    pub id: Uuid,
    pub created_by: String,
    pub room_name: String,
    pub description: String,
    pub max_players: u32,
    pub status: GameStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<Game> for GameView {
    fn from(game: Game) -> Self {
        Self {
            id: game.id,
            created_by: game.created_by,
            room_name: game.room_name,
            description: game.description,
            max_players: game.max_players,
            status: game.status,
            created_at: game.created_at,
            finished_at: game.finished_at,
        }
    }
}

/// A card as clients see it. Exactly one of `numbers` and `goals` is set.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CardView {
    pub id: Uuid,
    pub game_id: Uuid,
    pub user_id: String,
    pub numbers: Option<Grid<u8>>,
    pub goals: Option<Grid<String>>,
    pub marked: Vec<Cell>,
    pub winning_lines: Vec<Line>,
    pub is_winner: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Card> for CardView {
    fn from(card: Card) -> Self {
        let winning_lines = completed_lines(&card.marked);
        let (numbers, goals) = match card.content {
            CardContent::Numbers(grid) => (Some(grid), None),
            CardContent::Goals(grid) => (None, Some(grid)),
        };

        Self {
            numbers,
            goals,
            winning_lines,
            id: card.id,
            game_id: card.game_id,
            user_id: card.user_id,
            marked: card.marked.into_iter().collect(),
            is_winner: card.is_winner,
            completed_at: card.completed_at,
        }
    }
}

/// Broadcast to every connection when a card wins for the first time.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CardCompletedEvent {
    pub username: String,
    pub card: CardView,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorView {
    pub kind: String,
    pub message: String,
}

impl From<&BingoError> for ErrorView {
    fn from(error: &BingoError) -> Self {
        Self {
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}
