use std::{env, str::FromStr};

use chrono::{DateTime, Utc};
use minesweeper_common::{models::GameStatus, protocol::ClickData};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use tracing::{debug, info, instrument, warn};

use crate::{
    data::{Board, FlagOutcome, RevealOutcome},
    error::{Error, Result},
};

pub const DEFAULT_ROWS: usize = 10;
pub const DEFAULT_COLS: usize = 10;
pub const DEFAULT_MINES: usize = 15;
pub const MIN_SIDE: usize = 2;
pub const MAX_SIDE: usize = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GameParams {
    pub rows: usize,
    pub cols: usize,
    pub mines: usize,
}

impl GameParams {
    /// Fills in defaults, clamps both sides to `[MIN_SIDE, MAX_SIDE]` and
    /// caps the mines at the number of cells.
    pub fn normalized(rows: Option<usize>, cols: Option<usize>, mines: Option<usize>) -> Self {
        let rows = rows.unwrap_or(DEFAULT_ROWS).clamp(MIN_SIDE, MAX_SIDE);
        let cols = cols.unwrap_or(DEFAULT_COLS).clamp(MIN_SIDE, MAX_SIDE);
        let mines = mines.unwrap_or(DEFAULT_MINES).min(rows * cols);
        Self { rows, cols, mines }
    }
}

impl Default for GameParams {
    fn default() -> Self {
        Self::normalized(None, None, None)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClickKind {
    Reveal,
    Flag,
}

impl FromStr for ClickKind {
    type Err = Error;

    fn from_str(kind: &str) -> Result<Self> {
        match kind {
            "click" => Ok(Self::Reveal),
            "flag" => Ok(Self::Flag),
            _ => Err(Error::InvalidClickKind),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Click {
    pub row: i64,
    pub col: i64,
    pub kind: ClickKind,
}

impl TryFrom<&ClickData> for Click {
    type Error = Error;

    fn try_from(data: &ClickData) -> Result<Self> {
        Ok(Self {
            row: data.row,
            col: data.col,
            kind: data.kind.parse()?,
        })
    }
}

/// What to do when a player reveals a flagged cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FlaggedClick {
    /// Fail with [`Error::CellFlagged`].
    #[default]
    Reject,
    /// Accept the request without touching the board.
    Ignore,
}

impl FromStr for FlaggedClick {
    type Err = String;

    fn from_str(policy: &str) -> std::result::Result<Self, Self::Err> {
        match policy.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "ignore" => Ok(Self::Ignore),
            other => Err(format!("unknown flagged click policy: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rules {
    pub flagged_click: FlaggedClick,
}

impl Rules {
    pub fn from_env() -> Self {
        let flagged_click = match env::var("FLAGGED_CLICK_POLICY") {
            Ok(value) => value.parse().unwrap_or_else(|e| {
                warn!("{}, falling back to reject", e);
                FlaggedClick::Reject
            }),
            Err(_) => FlaggedClick::Reject,
        };
        Self { flagged_click }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Reveal(RevealOutcome),
    Flag(FlagOutcome),
    /// Reveal of a flagged cell under [`FlaggedClick::Ignore`].
    Ignored,
}

/// A stored game whose header fields disagree with its board.
#[derive(ThisError, Debug, PartialEq, Eq)]
#[error("header says {header:?} but the board holds {board:?} (rows, cols, mines)")]
pub struct BoardMismatch {
    pub header: (usize, usize, usize),
    pub board: (usize, usize, usize),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub name: String,
    pub username: String,
    pub rows: usize,
    pub cols: usize,
    pub mines: usize,
    pub status: GameStatus,
    pub board: Board,
    pub clicks: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub time_spent_ms: u64,
}

impl Game {
    #[instrument(level = "trace", skip(rng))]
    pub fn new<R: Rng + ?Sized>(
        name: String,
        username: String,
        params: GameParams,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Self {
        info!(
            "Creating game {}: {}x{} with {} mines",
            name, params.rows, params.cols, params.mines
        );
        let board = Board::generate(params.rows, params.cols, params.mines, rng);
        Self::with_board(name, username, board, now)
    }

    /// Wraps an existing board in a fresh `Ready` game.
    pub fn with_board(name: String, username: String, board: Board, now: DateTime<Utc>) -> Self {
        Self {
            name,
            username,
            rows: board.rows(),
            cols: board.cols(),
            mines: board.mine_count(),
            status: GameStatus::Ready,
            board,
            clicks: 0,
            created_at: now,
            started_at: None,
            time_spent_ms: 0,
        }
    }

    pub fn check_board(&self) -> std::result::Result<(), BoardMismatch> {
        let header = (self.rows, self.cols, self.mines);
        let board = (self.board.rows(), self.board.cols(), self.board.mine_count());
        if header == board {
            Ok(())
        } else {
            Err(BoardMismatch { header, board })
        }
    }

    /// Runs one player action against the game.
    ///
    /// Finished games reject everything. On any error the game is left as it
    /// was; on success the first action starts the clock, a detonation ends
    /// the game and a board with every safe cell open is won.
    #[instrument(level = "trace", skip(self, rules), fields(game = %self.name, status = %self.status))]
    pub fn apply(&mut self, click: &Click, rules: &Rules, now: DateTime<Utc>) -> Result<Outcome> {
        match self.status {
            GameStatus::Over => return Err(Error::GameOver),
            GameStatus::Won => return Err(Error::GameWon),
            GameStatus::Ready | GameStatus::InProgress => {}
        }

        let outcome = match click.kind {
            ClickKind::Reveal => match self.board.reveal(click.row, click.col) {
                Ok(outcome) => Outcome::Reveal(outcome),
                Err(Error::CellFlagged) if rules.flagged_click == FlaggedClick::Ignore => {
                    debug!("Ignoring reveal on flagged cell ({}, {})", click.row, click.col);
                    Outcome::Ignored
                }
                Err(e) => return Err(e),
            },
            ClickKind::Flag => Outcome::Flag(self.board.toggle_flag(click.row, click.col)?),
        };

        if self.status == GameStatus::Ready {
            self.status = GameStatus::InProgress;
            self.started_at = Some(now);
            debug!("Game {} started", self.name);
        }

        match outcome {
            Outcome::Reveal(RevealOutcome::Detonated) => {
                warn!(
                    "Mine hit at ({}, {}) in game {} - game over!",
                    click.row, click.col, self.name
                );
                self.status = GameStatus::Over;
            }
            Outcome::Reveal(RevealOutcome::Revealed { cells }) => {
                self.clicks += 1;
                debug!("Revealed {} cells", cells);
            }
            _ => {}
        }

        if let Some(started_at) = self.started_at {
            self.time_spent_ms = u64::try_from((now - started_at).num_milliseconds()).unwrap_or(0);
        }

        if self.status == GameStatus::InProgress && self.board.has_won() {
            info!("Game {} won after {} clicks", self.name, self.clicks);
            self.status = GameStatus::Won;
        }

        Ok(outcome)
    }
}
