use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::utils::errors::BingoError;

/// Side length of every card.
pub const GRID_SIZE: u8 = 5;

/// The centre cell. Always satisfied, never stored in a mark set.
pub const FREE_SPACE: Cell = Cell { row: 2, col: 2 };

/// A 0-indexed position on a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub row: u8,
    pub col: u8,
}

impl Cell {
    /// Validates raw client coordinates into a `Cell` a user may toggle.
    ///
    /// # Returns
    /// * `Err(BingoError::InvalidCoordinate)` if either value is outside `[0, 4]`.
    /// * `Err(BingoError::FreeSpaceMutation)` for the centre cell.
    pub fn mutable(row: i32, col: i32) -> Result<Self, BingoError> {
        let in_range = |v: i32| (0..GRID_SIZE as i32).contains(&v);
        if !in_range(row) || !in_range(col) {
            return Err(BingoError::InvalidCoordinate { row, col });
        }

        let cell = Cell {
            row: row as u8,
            col: col as u8,
        };
        if cell == FREE_SPACE {
            return Err(BingoError::FreeSpaceMutation);
        }

        Ok(cell)
    }
}

/// Cells a user has flagged. The free space is implicit and never a member.
pub type MarkSet = BTreeSet<Cell>;

/// One of the twelve lines that win a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "index")]
pub enum Line {
    Row(u8),
    Column(u8),
    MainDiagonal,
    AntiDiagonal,
}

impl Line {
    pub const ALL: [Line; 12] = [
        Line::Row(0),
        Line::Row(1),
        Line::Row(2),
        Line::Row(3),
        Line::Row(4),
        Line::Column(0),
        Line::Column(1),
        Line::Column(2),
        Line::Column(3),
        Line::Column(4),
        Line::MainDiagonal,
        Line::AntiDiagonal,
    ];

    pub fn cells(self) -> [Cell; GRID_SIZE as usize] {
        std::array::from_fn(|i| {
            let i = i as u8;
            match self {
                Line::Row(row) => Cell { row, col: i },
                Line::Column(col) => Cell { row: i, col },
                Line::MainDiagonal => Cell { row: i, col: i },
                Line::AntiDiagonal => Cell {
                    row: i,
                    col: GRID_SIZE - 1 - i,
                },
            }
        })
    }

    pub fn is_complete(self, marked: &MarkSet) -> bool {
        self.cells()
            .iter()
            .all(|cell| *cell == FREE_SPACE || marked.contains(cell))
    }
}

/// Returns `true` if any row, column or diagonal is fully marked, counting
/// the free space as marked.
///
/// Pure and total over in-range cells; range checks belong to the caller.
pub fn is_winning_pattern(marked: &MarkSet) -> bool {
    Line::ALL.iter().any(|line| line.is_complete(marked))
}

/// Every complete line, in row, column, diagonal order.
pub fn completed_lines(marked: &MarkSet) -> Vec<Line> {
    Line::ALL
        .iter()
        .copied()
        .filter(|line| line.is_complete(marked))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marks(cells: &[(u8, u8)]) -> MarkSet {
        cells.iter().map(|&(row, col)| Cell { row, col }).collect()
    }

    #[test]
    fn test_empty_set_is_not_winning() {
        assert!(!is_winning_pattern(&MarkSet::new()));
        assert!(completed_lines(&MarkSet::new()).is_empty());
    }

    #[test]
    fn test_every_full_row_wins() {
        for row in 0..GRID_SIZE {
            let set: MarkSet = (0..GRID_SIZE)
                .map(|col| Cell { row, col })
                .filter(|cell| *cell != FREE_SPACE)
                .collect();
            assert!(is_winning_pattern(&set), "row {row}");
            assert_eq!(completed_lines(&set), vec![Line::Row(row)]);
        }
    }

    #[test]
    fn test_every_full_column_wins() {
        for col in 0..GRID_SIZE {
            let set: MarkSet = (0..GRID_SIZE)
                .map(|row| Cell { row, col })
                .filter(|cell| *cell != FREE_SPACE)
                .collect();
            assert!(is_winning_pattern(&set), "column {col}");
            assert_eq!(completed_lines(&set), vec![Line::Column(col)]);
        }
    }

    #[test]
    fn test_diagonals_win_through_free_space() {
        let main = marks(&[(0, 0), (1, 1), (3, 3), (4, 4)]);
        assert!(is_winning_pattern(&main));
        assert_eq!(completed_lines(&main), vec![Line::MainDiagonal]);

        let anti = marks(&[(0, 4), (1, 3), (3, 1), (4, 0)]);
        assert!(is_winning_pattern(&anti));
        assert_eq!(completed_lines(&anti), vec![Line::AntiDiagonal]);
    }

    #[test]
    fn test_free_space_in_input_is_harmless() {
        let set = marks(&[(2, 0), (2, 1), (2, 2), (2, 3), (2, 4)]);
        assert!(is_winning_pattern(&set));
    }

    #[test]
    fn test_four_of_five_everywhere_is_not_winning() {
        // One gap per row and per column, with (0,0) and (1,3) breaking the diagonals.
        let gaps = marks(&[(0, 0), (1, 3), (2, 4), (3, 1), (4, 2)]);
        let set: MarkSet = (0..GRID_SIZE)
            .flat_map(|row| (0..GRID_SIZE).map(move |col| Cell { row, col }))
            .filter(|cell| *cell != FREE_SPACE && !gaps.contains(cell))
            .collect();
        assert_eq!(set.len(), 19);
        assert!(!is_winning_pattern(&set), "{:?}", completed_lines(&set));
    }

    #[test]
    fn test_partial_lines_are_not_winning() {
        let set = marks(&[(0, 0), (0, 1), (0, 2), (0, 3), (1, 1), (3, 3)]);
        assert!(!is_winning_pattern(&set));
    }

    #[test]
    fn test_evaluation_is_idempotent_and_monotone() {
        let winning = marks(&[(4, 0), (4, 1), (4, 2), (4, 3), (4, 4)]);
        assert_eq!(is_winning_pattern(&winning), is_winning_pattern(&winning));

        let mut superset = winning.clone();
        superset.extend(marks(&[(0, 0), (1, 3), (3, 2)]));
        assert!(is_winning_pattern(&superset));
    }

    #[test]
    fn test_mutable_cell_validation() {
        assert_eq!(Cell::mutable(0, 4), Ok(Cell { row: 0, col: 4 }));
        assert_eq!(
            Cell::mutable(5, 0),
            Err(BingoError::InvalidCoordinate { row: 5, col: 0 })
        );
        assert_eq!(
            Cell::mutable(1, -1),
            Err(BingoError::InvalidCoordinate { row: 1, col: -1 })
        );
        assert_eq!(Cell::mutable(2, 2), Err(BingoError::FreeSpaceMutation));
    }
}
