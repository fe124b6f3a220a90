use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
pub struct NewUser {
    pub username: String,
}

/// Body of a game creation request.
///
/// Omitted dimensions fall back to the server defaults; an explicit
/// `mines: 0` is honoured.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct NewGame {
    pub name: Option<String>,
    pub username: String,
    pub rows: Option<usize>,
    pub cols: Option<usize>,
    pub mines: Option<usize>,
}

/// A reveal or flag request. `kind` is kept as free text so that an unknown
/// action reaches the game rules instead of failing JSON decoding.
#[derive(Debug, Deserialize, Serialize)]
pub struct ClickData {
    pub row: i64,
    pub col: i64,
    pub kind: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_game_fields_are_optional() {
        let game: NewGame = serde_json::from_str(r#"{"username":"ann"}"#).unwrap();
        assert_eq!(game.username, "ann");
        assert!(game.name.is_none());
        assert!(game.rows.is_none() && game.cols.is_none() && game.mines.is_none());

        let game: NewGame = serde_json::from_str(r#"{"username":"ann","mines":0}"#).unwrap();
        assert_eq!(game.mines, Some(0));
    }

    #[test]
    fn click_accepts_negative_coordinates_and_any_kind() {
        let click: ClickData =
            serde_json::from_str(r#"{"row":-1,"col":3,"kind":"poke"}"#).unwrap();
        assert_eq!((click.row, click.col), (-1, 3));
        assert_eq!(click.kind, "poke");
    }
}
