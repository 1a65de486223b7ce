use chrono::{DateTime, Utc};
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::completion::{is_winning_pattern, Cell, MarkSet, FREE_SPACE, GRID_SIZE};
use crate::utils::errors::BingoError;

const SIZE: usize = GRID_SIZE as usize;

/// Numbers per bingo column: B 1-15, I 16-30, N 31-45, G 46-60, O 61-75.
const COLUMN_SPAN: u8 = 15;

/// Value stored in the centre of a numbers card.
pub const FREE_NUMBER: u8 = 0;

/// Text stored in the centre of a goals card.
pub const FREE_GOAL: &str = "FREE";

pub type Grid<T> = [[T; SIZE]; SIZE];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", content = "grid", rename_all = "lowercase")]
pub enum CardContent {
    Numbers(Grid<u8>),
    Goals(Grid<String>),
}

/// What a player asks for when generating a card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CardKind {
    /// Random numbers in the classic B-I-N-G-O column ranges.
    Bingo,
    /// A 5x5 grid of the player's own goals.
    Goals { goals: Vec<Vec<String>> },
}

/// How a card's completion flag reacts to marks being removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionPolicy {
    /// Once a winner, always a winner.
    #[default]
    Latch,
    /// The flag always reflects the current mark set.
    Reevaluate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: Uuid,
    pub game_id: Uuid,
    pub user_id: String,
    pub content: CardContent,
    pub marked: MarkSet,
    pub is_winner: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Card {
    fn with_content(game_id: Uuid, user_id: &str, content: CardContent) -> Self {
        Self {
            content,
            game_id,
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            marked: MarkSet::new(),
            is_winner: false,
            completed_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn new_numbers<R: Rng + ?Sized>(game_id: Uuid, user_id: &str, rng: &mut R) -> Self {
        Self::with_content(game_id, user_id, CardContent::Numbers(random_numbers(rng)))
    }

    pub fn new_goals(game_id: Uuid, user_id: &str, goals: Vec<Vec<String>>) -> Result<Self, BingoError> {
        Ok(Self::with_content(
            game_id,
            user_id,
            CardContent::Goals(goal_grid(goals)?),
        ))
    }

    pub fn generate(game_id: Uuid, user_id: &str, kind: CardKind) -> Result<Self, BingoError> {
        match kind {
            CardKind::Bingo => Ok(Self::new_numbers(game_id, user_id, &mut rand::thread_rng())),
            CardKind::Goals { goals } => Self::new_goals(game_id, user_id, goals),
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    /// Fails if a stored mark is one no request could have made: off the grid
    /// or on the free space.
    pub fn check_marks(&self) -> Result<(), BingoError> {
        for cell in &self.marked {
            Cell::mutable(i32::from(cell.row), i32::from(cell.col))?;
        }
        Ok(())
    }

    /// Mark set after flipping `cell`. The card itself is untouched.
    pub fn toggled(&self, cell: Cell) -> MarkSet {
        let mut marked = self.marked.clone();
        if !marked.remove(&cell) {
            marked.insert(cell);
        }
        marked
    }

    /// Locates `number` on a numbers card.
    pub fn cell_of_number(&self, number: u8) -> Result<Cell, BingoError> {
        let CardContent::Numbers(grid) = &self.content else {
            return Err(BingoError::WrongCardVariant("numbers"));
        };
        if number == FREE_NUMBER {
            return Err(BingoError::FreeSpaceMutation);
        }

        grid.iter()
            .enumerate()
            .find_map(|(row, values)| {
                values.iter().position(|&v| v == number).map(|col| Cell {
                    row: row as u8,
                    col: col as u8,
                })
            })
            .ok_or(BingoError::NumberNotOnCard(number))
    }

    /// Replaces the goal texts, keeping the marks.
    pub fn set_goals(&mut self, goals: Vec<Vec<String>>) -> Result<(), BingoError> {
        if !matches!(self.content, CardContent::Goals(_)) {
            return Err(BingoError::WrongCardVariant("goals"));
        }
        self.content = CardContent::Goals(goal_grid(goals)?);
        Ok(())
    }

    /// Commits a new mark set together with the completion flag it implies.
    ///
    /// Returns `true` only when this call turned the card into a winner.
    pub fn commit_marks(&mut self, marked: MarkSet, policy: CompletionPolicy, now: DateTime<Utc>) -> bool {
        let winning = is_winning_pattern(&marked);
        let was_winner = self.is_winner;
        self.marked = marked;

        match (winning, policy) {
            (true, _) if !was_winner => {
                self.is_winner = true;
                self.completed_at = Some(now);
            }
            (false, CompletionPolicy::Reevaluate) => {
                self.is_winner = false;
                self.completed_at = None;
            }
            _ => {}
        }

        self.is_winner && !was_winner
    }
}

/// Five distinct numbers per column, drawn from that column's range.
fn random_numbers<R: Rng + ?Sized>(rng: &mut R) -> Grid<u8> {
    let mut grid = [[FREE_NUMBER; SIZE]; SIZE];
    for col in 0..SIZE {
        let low = col as u8 * COLUMN_SPAN + 1;
        let pool: Vec<u8> = (low..low + COLUMN_SPAN).collect();
        for (row, &number) in pool.choose_multiple(rng, SIZE).enumerate() {
            grid[row][col] = number;
        }
    }
    grid[FREE_SPACE.row as usize][FREE_SPACE.col as usize] = FREE_NUMBER;
    grid
}

fn goal_grid(goals: Vec<Vec<String>>) -> Result<Grid<String>, BingoError> {
    let shape = || {
        let widths: Vec<String> = goals.iter().map(|row| row.len().to_string()).collect();
        format!("{} rows [{}]", goals.len(), widths.join(", "))
    };
    if goals.len() != SIZE || goals.iter().any(|row| row.len() != SIZE) {
        return Err(BingoError::InvalidGoalGrid(shape()));
    }

    let mut grid: Grid<String> = Default::default();
    for (row, texts) in goals.into_iter().enumerate() {
        for (col, text) in texts.into_iter().enumerate() {
            grid[row][col] = text.trim().to_string();
        }
    }
    grid[FREE_SPACE.row as usize][FREE_SPACE.col as usize] = FREE_GOAL.to_string();
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use std::collections::HashSet;

    fn goals(text: &str) -> Vec<Vec<String>> {
        (0..SIZE)
            .map(|row| (0..SIZE).map(|col| format!("{text} {row}{col}")).collect())
            .collect()
    }

    fn cell(row: u8, col: u8) -> Cell {
        Cell { row, col }
    }

    #[test]
    fn test_numbers_follow_column_ranges() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let card = Card::new_numbers(Uuid::new_v4(), "ana", &mut rng);
            let CardContent::Numbers(grid) = &card.content else {
                panic!("expected a numbers card");
            };

            let mut seen = HashSet::new();
            for (row, values) in grid.iter().enumerate() {
                for (col, &value) in values.iter().enumerate() {
                    if row == 2 && col == 2 {
                        assert_eq!(value, FREE_NUMBER);
                        continue;
                    }
                    let low = col as u8 * 15 + 1;
                    assert!((low..=low + 14).contains(&value), "{value} in column {col}");
                    assert!(seen.insert(value), "{value} repeated");
                }
            }
            assert_eq!(seen.len(), 24);
        }
    }

    #[test]
    fn test_goal_grid_forces_free_space() {
        let card = Card::new_goals(Uuid::new_v4(), "ana", goals("run")).unwrap();
        let CardContent::Goals(grid) = &card.content else {
            panic!("expected a goals card");
        };
        assert_eq!(grid[2][2], FREE_GOAL);
        assert_eq!(grid[0][1], "run 01");
    }

    #[test]
    fn test_goal_grid_rejects_wrong_shape() {
        let mut short = goals("x");
        short[3].pop();
        assert!(matches!(
            Card::new_goals(Uuid::new_v4(), "ana", short),
            Err(BingoError::InvalidGoalGrid(_))
        ));

        let mut tall = goals("x");
        tall.push(vec![String::new(); 5]);
        assert!(matches!(
            Card::new_goals(Uuid::new_v4(), "ana", tall),
            Err(BingoError::InvalidGoalGrid(_))
        ));
    }

    #[test]
    fn test_set_goals_keeps_marks_and_checks_variant() {
        let mut card = Card::new_goals(Uuid::new_v4(), "ana", goals("old")).unwrap();
        card.marked.insert(cell(0, 0));
        card.set_goals(goals("new")).unwrap();
        assert!(card.marked.contains(&cell(0, 0)));
        assert_eq!(card.content, CardContent::Goals(goal_grid(goals("new")).unwrap()));

        let mut rng = StdRng::seed_from_u64(1);
        let mut numbers = Card::new_numbers(Uuid::new_v4(), "ana", &mut rng);
        assert_eq!(
            numbers.set_goals(goals("new")),
            Err(BingoError::WrongCardVariant("goals"))
        );
    }

    #[test]
    fn test_toggle_adds_then_removes() {
        let card = Card::new_goals(Uuid::new_v4(), "ana", goals("g")).unwrap();
        let once = card.toggled(cell(1, 1));
        assert!(once.contains(&cell(1, 1)));

        let mut card = card;
        card.marked = once;
        assert!(card.toggled(cell(1, 1)).is_empty());
    }

    #[test]
    fn test_check_marks() {
        let mut card = Card::new_goals(Uuid::new_v4(), "ana", goals("g")).unwrap();
        card.marked = winning_row();
        assert_eq!(card.check_marks(), Ok(()));

        card.marked.insert(FREE_SPACE);
        assert_eq!(card.check_marks(), Err(BingoError::FreeSpaceMutation));

        card.marked = [cell(0, 7)].into();
        assert_eq!(
            card.check_marks(),
            Err(BingoError::InvalidCoordinate { row: 0, col: 7 })
        );
    }

    #[test]
    fn test_cell_of_number() {
        let mut rng = StdRng::seed_from_u64(3);
        let card = Card::new_numbers(Uuid::new_v4(), "ana", &mut rng);
        let CardContent::Numbers(grid) = card.content.clone() else {
            panic!("expected a numbers card");
        };

        assert_eq!(card.cell_of_number(grid[4][1]), Ok(cell(4, 1)));
        assert_eq!(card.cell_of_number(0), Err(BingoError::FreeSpaceMutation));

        let absent = (1..=75).find(|n| grid.iter().flatten().all(|v| v != n)).unwrap();
        assert_eq!(card.cell_of_number(absent), Err(BingoError::NumberNotOnCard(absent)));

        let goal_card = Card::new_goals(Uuid::new_v4(), "ana", goals("g")).unwrap();
        assert_eq!(
            goal_card.cell_of_number(5),
            Err(BingoError::WrongCardVariant("numbers"))
        );
    }

    fn winning_row() -> MarkSet {
        [cell(0, 0), cell(0, 1), cell(0, 2), cell(0, 3), cell(0, 4)].into()
    }

    #[test]
    fn test_commit_marks_latches_completion() {
        let mut card = Card::new_goals(Uuid::new_v4(), "ana", goals("g")).unwrap();
        let first = Utc::now();

        assert!(card.commit_marks(winning_row(), CompletionPolicy::Latch, first));
        assert!(card.is_winner);
        assert_eq!(card.completed_at, Some(first));

        // Still winning: no new transition, timestamp kept.
        let mut more = winning_row();
        more.insert(cell(4, 4));
        assert!(!card.commit_marks(more, CompletionPolicy::Latch, Utc::now()));
        assert_eq!(card.completed_at, Some(first));

        // Breaking the line does not clear the flag.
        let broken: MarkSet = [cell(0, 0)].into();
        assert!(!card.commit_marks(broken.clone(), CompletionPolicy::Latch, Utc::now()));
        assert!(card.is_winner);
        assert_eq!(card.completed_at, Some(first));
        assert_eq!(card.marked, broken);
    }

    #[test]
    fn test_commit_marks_reevaluates_when_configured() {
        let mut card = Card::new_goals(Uuid::new_v4(), "ana", goals("g")).unwrap();
        assert!(card.commit_marks(winning_row(), CompletionPolicy::Reevaluate, Utc::now()));

        assert!(!card.commit_marks(MarkSet::new(), CompletionPolicy::Reevaluate, Utc::now()));
        assert!(!card.is_winner);
        assert_eq!(card.completed_at, None);

        assert!(card.commit_marks(winning_row(), CompletionPolicy::Reevaluate, Utc::now()));
    }
}
