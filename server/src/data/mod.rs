use minesweeper_common::models::BoardView;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{Error, Result};

/// State of a single square. Each variant has a one-byte code, which is
/// what gets persisted and shown to players.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cell {
    /// `E`
    Hidden,
    /// `M`
    Mine,
    /// `e`
    Flagged,
    /// `m`
    FlaggedMine,
    /// `B`
    Blank,
    /// `1`..`8`
    Adjacent(u8),
    /// `X`
    Exploded,
}

impl Cell {
    pub fn code(self) -> u8 {
        match self {
            Self::Hidden => b'E',
            Self::Mine => b'M',
            Self::Flagged => b'e',
            Self::FlaggedMine => b'm',
            Self::Blank => b'B',
            Self::Adjacent(count) => b'0' + count,
            Self::Exploded => b'X',
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            b'E' => Some(Self::Hidden),
            b'M' => Some(Self::Mine),
            b'e' => Some(Self::Flagged),
            b'm' => Some(Self::FlaggedMine),
            b'B' => Some(Self::Blank),
            b'1'..=b'8' => Some(Self::Adjacent(code - b'0')),
            b'X' => Some(Self::Exploded),
            _ => None,
        }
    }

    pub fn is_mine(self) -> bool {
        matches!(self, Self::Mine | Self::FlaggedMine | Self::Exploded)
    }

    pub fn is_revealed(self) -> bool {
        matches!(self, Self::Blank | Self::Adjacent(_) | Self::Exploded)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevealOutcome {
    /// Hit an unflagged mine.
    Detonated,
    Revealed { cells: usize },
    AlreadyRevealed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlagOutcome {
    Flagged,
    Unflagged,
    AlreadyRevealed,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("board has no rows")]
    Empty,
    #[error("row {row} has {found} cells, expected {expected}")]
    Ragged {
        row: usize,
        found: usize,
        expected: usize,
    },
    #[error("unknown cell code {code:?} at ({row}, {col})")]
    UnknownCode { code: char, row: usize, col: usize },
}

/// Rectangular minefield, stored row-major.
///
/// Persisted as one string of cell codes per row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Board {
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
}

impl Board {
    /// Places `mines` mines by redrawing random coordinates until that many
    /// distinct cells are mined. Requests above the cell count are clamped.
    pub fn generate<R: Rng + ?Sized>(rows: usize, cols: usize, mines: usize, rng: &mut R) -> Self {
        let mut cells = vec![Cell::Hidden; rows * cols];
        let mines = mines.min(cells.len());

        let mut placed = 0;
        while placed < mines {
            let row = rng.random_range(0..rows);
            let col = rng.random_range(0..cols);
            let cell = &mut cells[row * cols + col];
            if *cell != Cell::Mine {
                *cell = Cell::Mine;
                placed += 1;
            }
        }

        Self { rows, cols, cells }
    }

    /// Builds a board from rows of cell codes, e.g. `["M1", "11"]`.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> std::result::Result<Self, DecodeError> {
        let cols = rows.first().ok_or(DecodeError::Empty)?.as_ref().len();
        let mut cells = Vec::with_capacity(rows.len() * cols);

        for (row, codes) in rows.iter().enumerate() {
            let codes = codes.as_ref().as_bytes();
            if codes.len() != cols {
                return Err(DecodeError::Ragged {
                    row,
                    found: codes.len(),
                    expected: cols,
                });
            }
            for (col, &code) in codes.iter().enumerate() {
                let cell = Cell::from_code(code).ok_or(DecodeError::UnknownCode {
                    code: code as char,
                    row,
                    col,
                })?;
                cells.push(cell);
            }
        }

        Ok(Self {
            rows: rows.len(),
            cols,
            cells,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<Cell> {
        if row < self.rows && col < self.cols {
            Some(self.cells[row * self.cols + col])
        } else {
            None
        }
    }

    /// Mines in any state: veiled, flagged or exploded.
    pub fn mine_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_mine()).count()
    }

    pub fn code_rows(&self) -> Vec<String> {
        self.cells
            .chunks(self.cols.max(1))
            .map(|row| row.iter().map(|cell| cell.code() as char).collect())
            .collect()
    }

    pub fn view(&self) -> BoardView {
        self.cells
            .chunks(self.cols.max(1))
            .map(|row| row.iter().map(|cell| (cell.code() as char).to_string()).collect())
            .collect()
    }

    pub fn reveal(&mut self, row: i64, col: i64) -> Result<RevealOutcome> {
        let index = self.position(row, col)?;

        match self.cells[index] {
            Cell::Flagged | Cell::FlaggedMine => Err(Error::CellFlagged),
            Cell::Mine => {
                self.cells[index] = Cell::Exploded;
                Ok(RevealOutcome::Detonated)
            }
            Cell::Hidden => Ok(RevealOutcome::Revealed {
                cells: self.flood(index),
            }),
            Cell::Blank | Cell::Adjacent(_) | Cell::Exploded => Ok(RevealOutcome::AlreadyRevealed),
        }
    }

    pub fn toggle_flag(&mut self, row: i64, col: i64) -> Result<FlagOutcome> {
        let index = self.position(row, col)?;
        let cell = &mut self.cells[index];

        let (next, outcome) = match *cell {
            Cell::Hidden => (Cell::Flagged, FlagOutcome::Flagged),
            Cell::Mine => (Cell::FlaggedMine, FlagOutcome::Flagged),
            Cell::Flagged => (Cell::Hidden, FlagOutcome::Unflagged),
            Cell::FlaggedMine => (Cell::Mine, FlagOutcome::Unflagged),
            Cell::Blank | Cell::Adjacent(_) | Cell::Exploded => {
                return Ok(FlagOutcome::AlreadyRevealed);
            }
        };
        *cell = next;

        Ok(outcome)
    }

    /// Won once every safe cell is revealed and nothing has exploded.
    /// Remaining mines may or may not be flagged.
    pub fn has_won(&self) -> bool {
        !self
            .cells
            .iter()
            .any(|cell| matches!(cell, Cell::Hidden | Cell::Flagged | Cell::Exploded))
    }

    fn position(&self, row: i64, col: i64) -> Result<usize> {
        let row = usize::try_from(row)
            .ok()
            .filter(|&row| row < self.rows)
            .ok_or(Error::OutOfBounds)?;
        let col = usize::try_from(col)
            .ok()
            .filter(|&col| col < self.cols)
            .ok_or(Error::OutOfBounds)?;

        Ok(row * self.cols + col)
    }

    fn neighbors(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        let (row, col) = (index / self.cols, index % self.cols);

        (-1isize..=1)
            .flat_map(|dy| (-1isize..=1).map(move |dx| (dy, dx)))
            .filter(|&offset| offset != (0, 0))
            .filter_map(move |(dy, dx)| {
                let y = row.checked_add_signed(dy)?;
                let x = col.checked_add_signed(dx)?;
                (y < self.rows && x < self.cols).then_some(y * self.cols + x)
            })
    }

    fn adjacent_mines(&self, index: usize) -> u8 {
        self.neighbors(index)
            .filter(|&neighbor| matches!(self.cells[neighbor], Cell::Mine | Cell::FlaggedMine))
            .count() as u8
    }

    /// Reveals `start` and spreads through zero-count cells. Only `Hidden`
    /// cells are ever pushed or opened, so flagged cells stay closed.
    fn flood(&mut self, start: usize) -> usize {
        let mut stack = vec![start];
        let mut revealed = 0;

        while let Some(index) = stack.pop() {
            if self.cells[index] != Cell::Hidden {
                continue;
            }
            revealed += 1;

            match self.adjacent_mines(index) {
                0 => {
                    self.cells[index] = Cell::Blank;
                    stack.extend(
                        self.neighbors(index)
                            .filter(|&neighbor| self.cells[neighbor] == Cell::Hidden),
                    );
                }
                count => self.cells[index] = Cell::Adjacent(count),
            }
        }

        revealed
    }
}

impl TryFrom<Vec<String>> for Board {
    type Error = DecodeError;

    fn try_from(rows: Vec<String>) -> std::result::Result<Self, Self::Error> {
        Self::from_rows(&rows)
    }
}

impl From<Board> for Vec<String> {
    fn from(board: Board) -> Self {
        board.code_rows()
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn board(rows: &[&str]) -> Board {
        Board::from_rows(rows).unwrap()
    }

    #[test]
    fn generate_places_exact_mine_count() {
        let mut rng = StdRng::seed_from_u64(7);
        let board = Board::generate(10, 10, 15, &mut rng);
        assert_eq!((board.rows(), board.cols()), (10, 10));
        assert_eq!(board.mine_count(), 15);
        assert!(
            board
                .code_rows()
                .iter()
                .all(|row| row.bytes().all(|code| code == b'E' || code == b'M'))
        );
    }

    #[test]
    fn generate_is_deterministic_for_a_seed() {
        let a = Board::generate(30, 30, 99, &mut StdRng::seed_from_u64(42));
        let b = Board::generate(30, 30, 99, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn generate_clamps_mines_to_cell_count() {
        let mut rng = StdRng::seed_from_u64(1);
        let full = Board::generate(2, 3, 100, &mut rng);
        assert_eq!(full.mine_count(), 6);
        assert_eq!(full.code_rows(), vec!["MMM", "MMM"]);

        let empty = Board::generate(3, 3, 0, &mut rng);
        assert_eq!(empty.mine_count(), 0);
    }

    #[test]
    fn decode_rejects_bad_rows() {
        assert_eq!(Board::from_rows::<&str>(&[]), Err(DecodeError::Empty));
        assert_eq!(
            Board::from_rows(&["EE", "E"]),
            Err(DecodeError::Ragged {
                row: 1,
                found: 1,
                expected: 2
            })
        );
        assert_eq!(
            Board::from_rows(&["E0"]),
            Err(DecodeError::UnknownCode {
                code: '0',
                row: 0,
                col: 1
            })
        );
    }

    #[test]
    fn serializes_as_code_rows() {
        let board = board(&["M1B", "eXm"]);
        let json = serde_json::to_string(&board).unwrap();
        assert_eq!(json, r#"["M1B","eXm"]"#);
        assert_eq!(serde_json::from_str::<Board>(&json).unwrap(), board);
        assert!(serde_json::from_str::<Board>(r#"["EE","Z"]"#).is_err());
    }

    #[test]
    fn view_is_one_string_per_cell() {
        let board = board(&["ME", "1B"]);
        assert_eq!(
            board.view(),
            vec![
                vec!["M".to_string(), "E".to_string()],
                vec!["1".to_string(), "B".to_string()]
            ]
        );
    }

    #[test]
    fn reveal_out_of_bounds_leaves_board_unchanged() {
        let mut board = board(&["MEEE", "EEEE", "EEEE", "EEEE"]);
        let before = board.clone();
        for (row, col) in [(-1, 0), (0, -1), (4, 0), (0, 4), (4, 4), (i64::MAX, 0)] {
            assert!(matches!(board.reveal(row, col), Err(Error::OutOfBounds)));
            assert!(matches!(board.toggle_flag(row, col), Err(Error::OutOfBounds)));
        }
        assert_eq!(board, before);
    }

    #[test]
    fn reveal_flagged_cell_is_rejected() {
        let mut board = board(&["eE", "Em"]);
        assert!(matches!(board.reveal(0, 0), Err(Error::CellFlagged)));
        assert!(matches!(board.reveal(1, 1), Err(Error::CellFlagged)));
        assert_eq!(board.code_rows(), vec!["eE", "Em"]);
    }

    #[test]
    fn reveal_mine_only_changes_that_cell() {
        let mut board = board(&["ME", "EE"]);
        assert_eq!(board.reveal(0, 0).unwrap(), RevealOutcome::Detonated);
        assert_eq!(board.code_rows(), vec!["XE", "EE"]);
        assert_eq!(board.mine_count(), 1);
        assert!(!board.has_won());
    }

    #[test]
    fn flood_fill_stops_at_numbers() {
        let mut board = board(&["MEEE", "EEEE", "EEEE", "EEEE"]);
        assert_eq!(board.reveal(3, 3).unwrap(), RevealOutcome::Revealed { cells: 15 });
        assert_eq!(board.code_rows(), vec!["M1BB", "11BB", "BBBB", "BBBB"]);
        assert!(board.has_won());
    }

    #[test]
    fn numbered_cell_does_not_spread() {
        let mut board = board(&["EEMEE"]);
        assert_eq!(board.reveal(0, 0).unwrap(), RevealOutcome::Revealed { cells: 2 });
        assert_eq!(board.code_rows(), vec!["B1MEE"]);

        let mut board = Board::from_rows(&["EEE", "EME", "EEE"]).unwrap();
        assert_eq!(board.reveal(0, 0).unwrap(), RevealOutcome::Revealed { cells: 1 });
        assert_eq!(board.code_rows(), vec!["1EE", "EME", "EEE"]);
    }

    #[test]
    fn flood_fill_skips_flagged_cells() {
        let mut board = board(&["EEE", "EeE", "EEE"]);
        board.reveal(0, 0).unwrap();
        assert_eq!(board.code_rows(), vec!["BBB", "BeB", "BBB"]);
        assert!(!board.has_won());
    }

    #[test]
    fn flagged_mines_count_as_neighbors() {
        let mut board = board(&["mE", "EE"]);
        board.reveal(1, 1).unwrap();
        assert_eq!(board.code_rows(), vec!["mE", "E1"]);
    }

    #[test]
    fn empty_board_opens_completely() {
        let mut board = board(&["EEEE", "EEEE", "EEEE", "EEEE"]);
        assert_eq!(board.reveal(0, 0).unwrap(), RevealOutcome::Revealed { cells: 16 });
        assert!(board.code_rows().iter().all(|row| row == "BBBB"));
        assert!(board.has_won());
    }

    #[test]
    fn revealing_twice_is_a_no_op() {
        let mut board = board(&["ME", "EE"]);
        board.reveal(1, 1).unwrap();
        let before = board.clone();
        assert_eq!(board.reveal(1, 1).unwrap(), RevealOutcome::AlreadyRevealed);
        assert_eq!(board, before);
    }

    #[test]
    fn toggle_flag_twice_restores_cell() {
        let mut board = board(&["ME", "1X"]);
        assert_eq!(board.toggle_flag(0, 0).unwrap(), FlagOutcome::Flagged);
        assert_eq!(board.toggle_flag(0, 1).unwrap(), FlagOutcome::Flagged);
        assert_eq!(board.code_rows(), vec!["me", "1X"]);
        assert_eq!(board.toggle_flag(0, 0).unwrap(), FlagOutcome::Unflagged);
        assert_eq!(board.toggle_flag(0, 1).unwrap(), FlagOutcome::Unflagged);
        assert_eq!(board.code_rows(), vec!["ME", "1X"]);

        for _ in 0..2 {
            assert_eq!(board.toggle_flag(1, 0).unwrap(), FlagOutcome::AlreadyRevealed);
            assert_eq!(board.toggle_flag(1, 1).unwrap(), FlagOutcome::AlreadyRevealed);
        }
        assert_eq!(board.code_rows(), vec!["ME", "1X"]);
    }

    #[test]
    fn win_ignores_whether_mines_are_flagged() {
        assert!(board(&["m1", "11"]).has_won());
        assert!(board(&["M1", "11"]).has_won());
        assert!(!board(&["X1", "11"]).has_won());
        assert!(!board(&["M1", "1E"]).has_won());
        assert!(!board(&["M1", "1e"]).has_won());
    }

    #[test]
    fn mine_count_survives_every_action() {
        let mut rng = StdRng::seed_from_u64(2024);
        let mut board = Board::generate(8, 8, 10, &mut rng);

        for row in 0..8 {
            for col in 0..8 {
                if (row + col) % 3 == 0 {
                    board.toggle_flag(row, col).unwrap();
                }
            }
        }
        assert_eq!(board.mine_count(), 10);

        for row in 0..8 {
            for col in 0..8 {
                let _ = board.reveal(row, col);
            }
        }
        assert_eq!(board.mine_count(), 10);
    }
}
