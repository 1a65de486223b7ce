use std::{collections::HashMap, path::Path, sync::Arc};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::card::{Card, CardKind, CompletionPolicy};
use crate::game::completion::{Cell, MarkSet};
use crate::game::game::{Game, GameStatus, GameUpdate};
use crate::models::settings::Settings;
use crate::utils::errors::{BingoError, StoreError};

/// Result of a mark operation.
#[derive(Debug, Clone)]
pub struct MarkOutcome {
    pub card: Card,
    /// `true` only for the mark that turned the card into a winner.
    pub newly_completed: bool,
}

/// Everything the store holds, as written to and read from disk.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub games: Vec<Game>,
    pub cards: Vec<Card>,
}

#[derive(Default)]
struct CardTable {
    by_id: HashMap<Uuid, Arc<RwLock<Card>>>,
    by_owner: HashMap<(Uuid, String), Uuid>,
}

impl CardTable {
    fn insert(&mut self, card: Card) {
        self.by_owner
            .insert((card.game_id, card.user_id.clone()), card.id);
        self.by_id.insert(card.id, Arc::new(RwLock::new(card)));
    }

    /// Fails if the card's id or its `(game, user)` slot is already taken.
    fn ensure_vacant(&self, card: &Card) -> Result<(), BingoError> {
        if self.by_id.contains_key(&card.id)
            || self
                .by_owner
                .contains_key(&(card.game_id, card.user_id.clone()))
        {
            return Err(BingoError::DuplicateCard(card.user_id.clone()));
        }
        Ok(())
    }

    fn count_in_game(&self, game_id: Uuid) -> usize {
        self.by_owner.keys().filter(|(game, _)| *game == game_id).count()
    }
}

/// In-memory rooms and cards.
///
/// Lock order is always `games` before `cards` before a single card.
/// A card mutation holds that card's write lock from reading the current
/// marks until the new marks and completion flag are written.
pub struct BingoStore {
    policy: CompletionPolicy,
    games_limit: usize,
    default_max_players: u32,
    games: RwLock<HashMap<Uuid, Game>>,
    cards: RwLock<CardTable>,
}

impl BingoStore {
    pub fn new(settings: &Settings) -> Self {
        Self {
            policy: settings.completion_policy,
            games_limit: settings.games_limit,
            default_max_players: settings.default_max_players,
            games: RwLock::new(HashMap::new()),
            cards: RwLock::new(CardTable::default()),
        }
    }
}

// Games
impl BingoStore {
    /// Opens a room owned by `creator`.
    ///
    /// # Arguments
    ///
    /// * `creator` - User id of the requester, who becomes the only one allowed to change the room.
    /// * `room_name` - Optional display name; a generated one is used when blank.
    /// * `description` - Optional free text.
    /// * `max_players` - Card limit for the room; falls back to `default_max_players`.
    ///
    /// # Returns
    ///
    /// The stored room, or `Err(BingoError::TextTooLong)` for oversized text.
    pub async fn create_game(
        &self,
        creator: &str,
        room_name: Option<String>,
        description: Option<String>,
        max_players: Option<u32>,
    ) -> Result<Game, BingoError> {
        let max_players = max_players.unwrap_or(self.default_max_players);
        let game = Game::new(creator, room_name, description, max_players)?;
        info!("[STORE] `{creator}` created game `{}` ({})", game.room_name, game.id);

        self.games.write().await.insert(game.id, game.clone());
        Ok(game)
    }

    /// Newest rooms first, optionally filtered by status.
    ///
    /// At most `games_limit` rooms are returned.
    pub async fn list_games(&self, status: Option<GameStatus>) -> Vec<Game> {
        let games = self.games.read().await;
        let mut listed: Vec<Game> = games
            .values()
            .filter(|game| status.map_or(true, |status| game.status == status))
            .cloned()
            .collect();

        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        listed.truncate(self.games_limit);
        listed
    }

    pub async fn get_game(&self, game_id: Uuid) -> Result<Game, BingoError> {
        self.games
            .read()
            .await
            .get(&game_id)
            .cloned()
            .ok_or_else(|| BingoError::GameNotFound(game_id.to_string()))
    }

    /// Changes the fields set in `update` on a room.
    ///
    /// # Arguments
    ///
    /// * `game_id` - The room to change.
    /// * `user_id` - The requester; must be the room's creator.
    /// * `update` - Fields to overwrite. `None` fields are left alone.
    ///
    /// # Returns
    ///
    /// The updated room, or one of `GameNotFound`, `NotGameCreator`,
    /// `TextTooLong` and `CannotReopen`. A rejected update changes nothing.
    pub async fn update_game(
        &self,
        game_id: Uuid,
        user_id: &str,
        update: GameUpdate,
    ) -> Result<Game, BingoError> {
        let mut games = self.games.write().await;
        let game = games
            .get_mut(&game_id)
            .ok_or_else(|| BingoError::GameNotFound(game_id.to_string()))?;

        game.ensure_creator(user_id)?;
        game.apply(update, Utc::now())?;
        Ok(game.clone())
    }

    /// Closes a room as `completed`. Creator only.
    pub async fn complete_game(&self, game_id: Uuid, user_id: &str) -> Result<Game, BingoError> {
        let mut games = self.games.write().await;
        let game = games
            .get_mut(&game_id)
            .ok_or_else(|| BingoError::GameNotFound(game_id.to_string()))?;

        game.ensure_creator(user_id)?;
        game.complete(Utc::now());
        info!("[STORE] Game `{}` marked as completed", game.id);
        Ok(game.clone())
    }
}

// Cards
impl BingoStore {
    /// Creates the single card `user_id` may hold in `game_id`.
    ///
    /// # Arguments
    ///
    /// * `game_id` - The room the card belongs to.
    /// * `user_id` - The requester, who becomes the card's owner.
    /// * `kind` - Random numbers or the requester's own 5x5 goals.
    ///
    /// # Returns
    ///
    /// * `Err(BingoError::GameNotFound)` / `Err(BingoError::GameClosed)` for a missing or closed room.
    /// * `Err(BingoError::DuplicateCard)` if the user already holds a card in the room.
    /// * `Err(BingoError::RoomFull)` once the room holds `max_players` cards.
    /// * `Err(BingoError::InvalidGoalGrid)` for goals that are not 5x5.
    pub async fn generate_card(
        &self,
        game_id: Uuid,
        user_id: &str,
        kind: CardKind,
    ) -> Result<Card, BingoError> {
        let games = self.games.read().await;
        let game = games
            .get(&game_id)
            .ok_or_else(|| BingoError::GameNotFound(game_id.to_string()))?;

        if game.is_closed() {
            return Err(BingoError::GameClosed(game_id.to_string()));
        }

        let card = Card::generate(game_id, user_id, kind)?;

        let mut cards = self.cards.write().await;
        cards.ensure_vacant(&card)?;
        if cards.count_in_game(game_id) >= game.max_players as usize {
            return Err(BingoError::RoomFull(game_id.to_string()));
        }

        info!("[STORE] Generated card `{}` for `{user_id}` in `{game_id}`", card.id);
        cards.insert(card.clone());
        Ok(card)
    }

    /// The user's cards in `game_id`: none or exactly one.
    pub async fn cards_for(&self, game_id: Uuid, user_id: &str) -> Vec<Card> {
        let card_lock = {
            let cards = self.cards.read().await;
            cards
                .by_owner
                .get(&(game_id, user_id.to_string()))
                .and_then(|id| cards.by_id.get(id))
                .cloned()
        };

        match card_lock {
            Some(card) => vec![card.read().await.clone()],
            None => Vec::new(),
        }
    }

    /// Flips one cell on the caller's card and re-evaluates completion.
    ///
    /// # Arguments
    ///
    /// * `card_id` - The card to mark.
    /// * `user_id` - The requester; must own the card.
    /// * `row`, `col` - Raw client coordinates, validated before the card is touched.
    ///
    /// # Returns
    ///
    /// A `MarkOutcome` whose `newly_completed` is `true` only for the mark that
    /// made the card a winner. Rejections leave the card unchanged.
    pub async fn mark_cell(
        &self,
        card_id: Uuid,
        user_id: &str,
        row: i32,
        col: i32,
    ) -> Result<MarkOutcome, BingoError> {
        let cell = Cell::mutable(row, col)?;
        self.mutate_marks(card_id, user_id, |card| Ok(card.toggled(cell)))
            .await
    }

    /// Marks the cell holding `number`. Marking an already marked number is a no-op.
    pub async fn mark_number(
        &self,
        card_id: Uuid,
        user_id: &str,
        number: u8,
    ) -> Result<MarkOutcome, BingoError> {
        self.mutate_marks(card_id, user_id, |card| {
            let cell = card.cell_of_number(number)?;
            let mut marked = card.marked.clone();
            marked.insert(cell);
            Ok(marked)
        })
        .await
    }

    /// Replaces the texts of a goals card. Marks and completion are kept.
    pub async fn update_goals(
        &self,
        card_id: Uuid,
        user_id: &str,
        goals: Vec<Vec<String>>,
    ) -> Result<Card, BingoError> {
        let card_lock = self.card_lock(card_id).await?;
        let mut card = card_lock.write().await;
        if !card.is_owned_by(user_id) {
            return Err(BingoError::NotCardOwner);
        }

        card.set_goals(goals)?;
        debug!("[STORE] Updated goals on card `{card_id}`");
        Ok(card.clone())
    }

    async fn card_lock(&self, card_id: Uuid) -> Result<Arc<RwLock<Card>>, BingoError> {
        self.cards
            .read()
            .await
            .by_id
            .get(&card_id)
            .cloned()
            .ok_or_else(|| BingoError::CardNotFound(card_id.to_string()))
    }

    async fn mutate_marks<F>(
        &self,
        card_id: Uuid,
        user_id: &str,
        next_marks: F,
    ) -> Result<MarkOutcome, BingoError>
    where
        F: FnOnce(&Card) -> Result<MarkSet, BingoError>,
    {
        let card_lock = self.card_lock(card_id).await?;
        let mut card = card_lock.write().await;
        if !card.is_owned_by(user_id) {
            return Err(BingoError::NotCardOwner);
        }

        let marked = next_marks(&*card)?;
        let newly_completed = card.commit_marks(marked, self.policy, Utc::now());
        if newly_completed {
            info!("[STORE] Card `{card_id}` of `{user_id}` completed a line");
        }

        Ok(MarkOutcome {
            card: card.clone(),
            newly_completed,
        })
    }
}

// Snapshots
impl BingoStore {
    pub async fn snapshot(&self) -> StoreSnapshot {
        let games = self.games.read().await.values().cloned().collect();
        let card_locks: Vec<Arc<RwLock<Card>>> =
            self.cards.read().await.by_id.values().cloned().collect();

        let mut cards = Vec::with_capacity(card_locks.len());
        for card in card_locks {
            cards.push(card.read().await.clone());
        }

        StoreSnapshot { games, cards }
    }

    /// Adds the rooms and cards of `snapshot` that pass the same checks as
    /// live requests. Anything else is skipped with a warning.
    ///
    /// # Returns
    ///
    /// The number of skipped entries.
    pub async fn restore(&self, snapshot: StoreSnapshot) -> usize {
        let mut games = self.games.write().await;
        let mut cards = self.cards.write().await;
        let mut skipped = 0;

        for game in snapshot.games {
            if games.contains_key(&game.id) {
                warn!("[STORE] Skipping game `{}`: already loaded", game.id);
                skipped += 1;
                continue;
            }
            games.insert(game.id, game);
        }

        for card in snapshot.cards {
            let admitted = match games.get(&card.game_id) {
                None => Err(BingoError::GameNotFound(card.game_id.to_string())),
                Some(_) => card.check_marks().and_then(|_| cards.ensure_vacant(&card)),
            };
            match admitted {
                Ok(()) => cards.insert(card),
                Err(error) => {
                    warn!("[STORE] Skipping card `{}` ({error})", card.id);
                    skipped += 1;
                }
            }
        }

        skipped
    }

    /// Writes every room and card as JSON.
    ///
    /// The snapshot goes to a sibling `.tmp` file first and is renamed over
    /// `path`, so an interrupted save leaves the previous snapshot intact.
    pub async fn save_snapshot(&self, path: &Path) -> Result<(), StoreError> {
        let snapshot = self.snapshot().await;
        let json = serde_json::to_vec_pretty(&snapshot)?;

        let staging = path.with_extension("tmp");
        tokio::fs::write(&staging, json).await?;
        tokio::fs::rename(&staging, path).await?;

        info!(
            "[STORE] Saved {} games and {} cards to `{}`",
            snapshot.games.len(),
            snapshot.cards.len(),
            path.display()
        );
        Ok(())
    }

    pub async fn load_snapshot(&self, path: &Path) -> Result<(), StoreError> {
        let bytes = tokio::fs::read(path).await?;
        let snapshot: StoreSnapshot = serde_json::from_slice(&bytes)?;

        info!(
            "[STORE] Loaded {} games and {} cards from `{}`",
            snapshot.games.len(),
            snapshot.cards.len(),
            path.display()
        );
        let skipped = self.restore(snapshot).await;
        if skipped > 0 {
            warn!("[STORE] Ignored {skipped} invalid snapshot entries");
        }
        Ok(())
    }
}
