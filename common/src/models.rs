use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a single game.
///
/// `Ready` until the first accepted action, then `InProgress` until the game
/// ends in `Over` or `Won`. Neither terminal state is ever left.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    #[default]
    Ready,
    InProgress,
    Over,
    Won,
}

impl GameStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Over | Self::Won)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ready => "ready",
            Self::InProgress => "in_progress",
            Self::Over => "over",
            Self::Won => "won",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Display projection of a board: one single-character string per cell,
/// row-major.
pub type BoardView = Vec<Vec<String>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_uses_snake_case_names() {
        assert_eq!(
            serde_json::to_string(&GameStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        let status: GameStatus = serde_json::from_str("\"won\"").unwrap();
        assert_eq!(status, GameStatus::Won);
        assert_eq!(GameStatus::Over.to_string(), "over");
    }

    #[test]
    fn only_over_and_won_are_finished() {
        assert!(!GameStatus::Ready.is_finished());
        assert!(!GameStatus::InProgress.is_finished());
        assert!(GameStatus::Over.is_finished());
        assert!(GameStatus::Won.is_finished());
    }
}
