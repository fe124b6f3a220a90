use std::fmt;

use thiserror::Error;

use crate::store::StoreError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entity {
    Game,
    User,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Game => "game",
            Self::User => "user",
        })
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Cell is out of bounds")]
    OutOfBounds,
    #[error("Cell is flagged, unflag it before revealing")]
    CellFlagged,
    #[error("Click kind must be \"click\" or \"flag\"")]
    InvalidClickKind,
    #[error("Game is over, no new moves are accepted")]
    GameOver,
    #[error("Game is already won, no new moves are accepted")]
    GameWon,
    #[error("The {0} does not exist")]
    NotFound(Entity),
    #[error("Username must not be empty")]
    InvalidUsername,
    #[error("User already exists")]
    UserExists,
    #[error("A game with this name already exists")]
    GameExists,
    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl Error {
    /// Stable identifier sent to clients alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::OutOfBounds => "out_of_bounds",
            Self::CellFlagged => "cell_flagged",
            Self::InvalidClickKind => "bad_click_kind",
            Self::GameOver => "game_over",
            Self::GameWon => "game_won",
            Self::NotFound(Entity::Game) => "game_not_found",
            Self::NotFound(Entity::User) => "user_not_found",
            Self::InvalidUsername => "invalid_username",
            Self::UserExists => "user_already_exist",
            Self::GameExists => "game_already_exist",
            Self::Storage(_) => "storage_failure",
        }
    }

    /// Whether the request itself broke a game rule, as opposed to a lookup
    /// or storage problem.
    pub fn is_rule_violation(&self) -> bool {
        matches!(
            self,
            Self::OutOfBounds
                | Self::CellFlagged
                | Self::InvalidClickKind
                | Self::GameOver
                | Self::GameWon
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
