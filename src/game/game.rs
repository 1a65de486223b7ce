use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::errors::BingoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Waiting,
    Active,
    Completed,
    Finished,
}

/// A room players generate cards in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: Uuid,
    pub created_by: String,
    pub room_name: String,
    pub description: String,
    pub max_players: u32,
    pub status: GameStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Fields of a room that its creator may change. `None` leaves a field as is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameUpdate {
    pub room_name: Option<String>,
    pub description: Option<String>,
    pub max_players: Option<u32>,
    pub status: Option<GameStatus>,
}

/// Longest accepted room name or description, in bytes.
pub const MAX_ROOM_TEXT: usize = 256;

fn check_length(field: &'static str, value: &str) -> Result<(), BingoError> {
    if value.len() > MAX_ROOM_TEXT {
        return Err(BingoError::TextTooLong {
            field,
            max: MAX_ROOM_TEXT,
        });
    }
    Ok(())
}

impl Game {
    /// Opens a new room in the `active` state.
    ///
    /// # Arguments
    ///
    /// * `created_by` - User id of the creator, the only one allowed to change the room.
    /// * `room_name` - Display name. Blank or missing names become `Goal Card <millis>`.
    /// * `description` - Free text, empty when missing.
    /// * `max_players` - How many cards the room hands out.
    ///
    /// # Returns
    ///
    /// `Err(BingoError::TextTooLong)` if the name or description exceeds `MAX_ROOM_TEXT`.
    pub fn new(
        created_by: &str,
        room_name: Option<String>,
        description: Option<String>,
        max_players: u32,
    ) -> Result<Self, BingoError> {
        let created_at = Utc::now();
        let room_name = room_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("Goal Card {}", created_at.timestamp_millis()));
        let description = description.unwrap_or_default();

        check_length("room_name", &room_name)?;
        check_length("description", &description)?;

        Ok(Self {
            room_name,
            description,
            created_at,
            max_players,
            id: Uuid::new_v4(),
            created_by: created_by.to_string(),
            status: GameStatus::Active,
            finished_at: None,
        })
    }

    /// Completed and finished rooms no longer hand out cards.
    pub fn is_closed(&self) -> bool {
        matches!(self.status, GameStatus::Completed | GameStatus::Finished)
    }

    pub fn ensure_creator(&self, user_id: &str) -> Result<(), BingoError> {
        if self.created_by != user_id {
            return Err(BingoError::NotGameCreator);
        }
        Ok(())
    }

    /// Applies every field set in `update`, or none of them.
    ///
    /// Moving into `completed` or `finished` stamps `finished_at` with `now`.
    /// A closed room may switch between the two closed states but never
    /// becomes `waiting` or `active` again.
    ///
    /// # Returns
    ///
    /// * `Err(BingoError::TextTooLong)` for an oversized name or description.
    /// * `Err(BingoError::CannotReopen)` when a closed room is given an open status.
    pub fn apply(&mut self, update: GameUpdate, now: DateTime<Utc>) -> Result<(), BingoError> {
        if let Some(room_name) = &update.room_name {
            check_length("room_name", room_name)?;
        }
        if let Some(description) = &update.description {
            check_length("description", description)?;
        }
        let closing = matches!(
            update.status,
            Some(GameStatus::Completed | GameStatus::Finished)
        );
        if self.is_closed() && update.status.is_some() && !closing {
            return Err(BingoError::CannotReopen(self.id.to_string()));
        }

        if let Some(room_name) = update.room_name {
            self.room_name = room_name;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(max_players) = update.max_players {
            self.max_players = max_players;
        }
        if let Some(status) = update.status {
            if closing && !self.is_closed() {
                self.finished_at = Some(now);
            }
            self.status = status;
        }
        Ok(())
    }

    /// Closes the room as `completed`. An earlier `finished_at` is kept.
    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = GameStatus::Completed;
        self.finished_at.get_or_insert(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(name: Option<&str>) -> Game {
        Game::new("ana", name.map(str::to_string), None, 1).unwrap()
    }

    #[test]
    fn test_new_game_defaults() {
        let game = game(None);
        assert!(game.room_name.starts_with("Goal Card "));
        assert_eq!(game.description, "");
        assert_eq!(game.status, GameStatus::Active);
        assert_eq!(game.finished_at, None);
        assert!(!game.is_closed());

        let blank = Game::new("ana", Some("  ".to_string()), None, 1).unwrap();
        assert!(blank.room_name.starts_with("Goal Card "));
    }

    #[test]
    fn test_room_text_is_bounded() {
        let long = "n".repeat(MAX_ROOM_TEXT + 1);
        assert_eq!(
            Game::new("ana", Some(long.clone()), None, 1).unwrap_err(),
            BingoError::TextTooLong {
                field: "room_name",
                max: MAX_ROOM_TEXT
            }
        );
        assert!(Game::new("ana", None, Some("d".repeat(MAX_ROOM_TEXT)), 1).is_ok());

        let mut game = game(Some("Friday"));
        let update = GameUpdate {
            description: Some(long),
            max_players: Some(9),
            ..Default::default()
        };
        assert!(matches!(
            game.apply(update, Utc::now()),
            Err(BingoError::TextTooLong { field: "description", .. })
        ));
        assert_eq!(game.max_players, 1);
    }

    #[test]
    fn test_apply_only_touches_given_fields() {
        let mut game = Game::new("ana", Some("Friday".to_string()), Some("desc".to_string()), 4).unwrap();
        game.apply(
            GameUpdate {
                max_players: Some(8),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(game.room_name, "Friday");
        assert_eq!(game.description, "desc");
        assert_eq!(game.max_players, 8);
        assert_eq!(game.finished_at, None);
    }

    #[test]
    fn test_closing_status_stamps_finished_at() {
        let mut game = game(None);
        let closed_at = Utc::now();
        game.apply(
            GameUpdate {
                status: Some(GameStatus::Finished),
                ..Default::default()
            },
            closed_at,
        )
        .unwrap();
        assert!(game.is_closed());
        assert_eq!(game.finished_at, Some(closed_at));

        // Switching between closed states keeps the first timestamp.
        game.apply(
            GameUpdate {
                status: Some(GameStatus::Completed),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(game.status, GameStatus::Completed);
        assert_eq!(game.finished_at, Some(closed_at));

        let reopen = GameUpdate {
            status: Some(GameStatus::Active),
            ..Default::default()
        };
        assert_eq!(
            game.apply(reopen, Utc::now()),
            Err(BingoError::CannotReopen(game.id.to_string()))
        );
        assert_eq!(game.status, GameStatus::Completed);
    }

    #[test]
    fn test_complete_and_creator_check() {
        let mut game = game(None);
        assert!(game.ensure_creator("ana").is_ok());
        assert_eq!(game.ensure_creator("bo"), Err(BingoError::NotGameCreator));

        let now = Utc::now();
        game.complete(now);
        assert_eq!(game.status, GameStatus::Completed);
        assert_eq!(game.finished_at, Some(now));
        assert!(game.is_closed());

        game.complete(Utc::now());
        assert_eq!(game.finished_at, Some(now));
    }
}
